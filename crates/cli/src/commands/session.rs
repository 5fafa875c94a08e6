//! Pipeline start-up shared by the interactive and one-shot commands.

use medrag_core::{config::AppConfig, AppError, AppResult};
use medrag_pipeline::{ConfiguredBootstrap, PipelineController, PipelineState};
use medrag_retrieval::RetrievalFilter;
use std::sync::Arc;
use std::time::Duration;

/// Initialize a pipeline from `config` and wait up to `wait_secs` for it.
pub async fn start_pipeline(config: &AppConfig, wait_secs: u64) -> AppResult<PipelineController> {
    let controller = PipelineController::new(Arc::new(ConfiguredBootstrap::new(config.clone())));
    let mut updates = controller.subscribe();
    controller.request_initialization();

    // Echo progress while waiting
    let progress = tokio::spawn(async move {
        while updates.changed().await.is_ok() {
            let status = updates.borrow_and_update().clone();
            tracing::info!("{}", status.message);
            if status.state.is_settled() {
                break;
            }
        }
    });

    let status = controller
        .wait_until_settled(Duration::from_secs(wait_secs))
        .await;
    progress.abort();

    match status.state {
        PipelineState::Ready => Ok(controller),
        PipelineState::Failed => Err(AppError::InitializationFailed(status.message)),
        PipelineState::Uninitialized | PipelineState::Initializing => Err(AppError::NotReady(
            format!("still {} after {}s ({})", status.state, wait_secs, status.message),
        )),
    }
}

/// Parse a filter given either in short form (`years:2018-2020`) or as JSON.
pub fn parse_filter(spec: &str) -> AppResult<RetrievalFilter> {
    if spec.trim_start().starts_with('{') {
        RetrievalFilter::from_json(spec)
    } else {
        spec.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_short_and_json_forms() {
        assert_eq!(
            parse_filter("years:2018-2020").unwrap(),
            parse_filter(r#"{"type":"years","start":2018,"end":2020}"#).unwrap()
        );
        assert!(parse_filter("none").unwrap().is_none());
    }

    #[test]
    fn test_parse_rejects_unknown() {
        let err = parse_filter(r#"{"type":"authors","names":["x"]}"#).unwrap_err();
        assert_eq!(err.kind(), medrag_core::ErrorKind::InvalidFilter);
        assert!(parse_filter("authors:x").is_err());
    }
}
