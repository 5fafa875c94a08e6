//! External acquisition steps run by pipeline initialization.

use medrag_core::{AppConfig, AppError, AppResult};
use medrag_llm::{create_client, LlmClient};
use medrag_prompt::{FallbackTemplateSource, PromptTemplate, TemplateSource};
use medrag_retrieval::{create_search_service, retriever_options, RetrieverOptions, SearchService};
use std::sync::Arc;
use std::time::Duration;

/// Secrets resolved by the first initialization step.
#[derive(Clone, Default)]
pub struct Credentials {
    pub api_key: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// A completion client plus the model and time bound to use with it.
#[derive(Clone)]
pub struct CompletionHandle {
    pub client: Arc<dyn LlmClient>,
    pub model: String,
    pub timeout: Duration,
}

/// The steps `PipelineController` runs, in order, to build a pipeline.
///
/// Each step may touch an external service. A failing step aborts the
/// initialization and its error message becomes the status message.
#[async_trait::async_trait]
pub trait PipelineBootstrap: Send + Sync {
    async fn acquire_credentials(&self) -> AppResult<Credentials>;

    async fn completion_service(&self, credentials: &Credentials) -> AppResult<CompletionHandle>;

    async fn search_service(&self) -> AppResult<Arc<dyn SearchService>>;

    /// Fetched once per initialization.
    async fn prompt_template(&self) -> AppResult<PromptTemplate>;

    fn retriever_options(&self) -> RetrieverOptions {
        RetrieverOptions::default()
    }
}

/// Production bootstrap driven by `AppConfig`.
#[derive(Debug, Clone)]
pub struct ConfiguredBootstrap {
    config: AppConfig,
}

impl ConfiguredBootstrap {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }
}

#[async_trait::async_trait]
impl PipelineBootstrap for ConfiguredBootstrap {
    async fn acquire_credentials(&self) -> AppResult<Credentials> {
        self.config.validate()?;
        Ok(Credentials {
            api_key: self.config.resolve_api_key(&self.config.provider),
        })
    }

    async fn completion_service(&self, credentials: &Credentials) -> AppResult<CompletionHandle> {
        let endpoint = self.config.resolve_endpoint();
        let client = create_client(
            &self.config.provider,
            endpoint.as_deref(),
            credentials.api_key.as_deref(),
            Some(self.config.completion_timeout()),
        )
        .map_err(|e| AppError::Llm(format!("Failed to create LLM client: {}", e)))?;

        tracing::debug!(
            provider = client.provider_name(),
            model = %self.config.model,
            "Created completion client"
        );

        Ok(CompletionHandle {
            client,
            model: self.config.model.clone(),
            timeout: self.config.completion_timeout(),
        })
    }

    async fn search_service(&self) -> AppResult<Arc<dyn SearchService>> {
        create_search_service(&self.config).await
    }

    async fn prompt_template(&self) -> AppResult<PromptTemplate> {
        let source = FallbackTemplateSource::workspace_then_builtin(self.config.templates_dir());
        source.fetch(&self.config.prompt.template_id).await
    }

    fn retriever_options(&self) -> RetrieverOptions {
        retriever_options(&self.config)
    }
}
