//! Search backend construction from configuration.

use crate::embeddings::create_embedder;
use crate::memory::MemoryIndex;
use crate::opensearch::OpenSearchService;
use crate::retriever::RetrieverOptions;
use crate::search::SearchService;
use medrag_core::{AppConfig, AppError, AppResult};
use std::sync::Arc;

/// Create the search service named by `search.backend`.
///
/// The memory backend loads and embeds its corpus here, so this may take a
/// while for larger files.
pub async fn create_search_service(config: &AppConfig) -> AppResult<Arc<dyn SearchService>> {
    let embedder = create_embedder(&config.search)?;

    match config.search.backend.as_str() {
        "memory" => {
            let path = config.corpus_path();
            tracing::debug!("Loading corpus from {:?}", path);
            let index =
                MemoryIndex::from_jsonl(&path, embedder, config.search.embed_concurrency).await?;
            if index.is_empty() {
                tracing::warn!("Corpus {:?} contains no documents", path);
            }
            Ok(Arc::new(index))
        }
        "opensearch" => Ok(Arc::new(OpenSearchService::from_config(
            &config.search,
            embedder,
        )?)),
        other => Err(AppError::Config(format!(
            "Unknown search backend: '{}'. Supported backends: memory, opensearch",
            other
        ))),
    }
}

/// Retriever options derived from the search and timeout sections.
pub fn retriever_options(config: &AppConfig) -> RetrieverOptions {
    RetrieverOptions {
        top_k: config.search.top_k,
        timeout: config.search_timeout(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;
    use std::io::Write;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_memory_backend_from_workspace_corpus() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join(".medrag")).unwrap();
        let mut file = std::fs::File::create(dir.path().join(".medrag/corpus.jsonl")).unwrap();
        let doc = Document::new("123", "123-0", "Capitals", "Paris is the capital of France.");
        writeln!(file, "{}", serde_json::to_string(&doc).unwrap()).unwrap();

        let config = AppConfig {
            workspace: dir.path().to_path_buf(),
            ..AppConfig::default()
        };
        let service = create_search_service(&config).await.unwrap();
        assert_eq!(service.name(), "memory");

        let docs = service.search("capital of France", None, 5).await.unwrap();
        assert_eq!(docs.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_corpus_is_config_error() {
        let dir = TempDir::new().unwrap();
        let config = AppConfig {
            workspace: dir.path().to_path_buf(),
            ..AppConfig::default()
        };
        let err = create_search_service(&config).await.err().unwrap();
        assert_eq!(err.kind(), medrag_core::ErrorKind::Config);
    }

    #[tokio::test]
    async fn test_opensearch_backend() {
        let mut config = AppConfig::default();
        config.search.backend = "opensearch".to_string();
        let service = create_search_service(&config).await.unwrap();
        assert_eq!(service.name(), "opensearch");
        assert!(service.supports_constraints());
    }

    #[tokio::test]
    async fn test_unknown_backend() {
        let mut config = AppConfig::default();
        config.search.backend = "faiss".to_string();
        assert!(create_search_service(&config).await.is_err());
    }

    #[test]
    fn test_retriever_options_follow_config() {
        let mut config = AppConfig::default();
        config.search.top_k = 7;
        config.timeouts.search_secs = 3;
        let options = retriever_options(&config);
        assert_eq!(options.top_k, 7);
        assert_eq!(options.timeout.as_secs(), 3);
    }
}
