//! Prompt-template sources.
//!
//! The answer pipeline fetches its grounding template exactly once, during
//! initialization, through a `TemplateSource`.

use crate::loader::load_definition;
use crate::types::PromptTemplate;
use medrag_core::{AppError, AppResult};
use std::path::PathBuf;

/// Identifier of the template shipped with the binary.
pub const DEFAULT_TEMPLATE_ID: &str = "rag-prompt";

const RAG_PROMPT: &str = "You are an assistant for question-answering tasks over biomedical literature. \
Use the following pieces of retrieved context to answer the question. \
If the context is empty or does not contain the answer, say that you cannot answer the question from the provided context. \
Use three sentences maximum and keep the answer concise.\n\
Question: {{question}}\n\
Context: {{context}}\n\
Answer:";

/// A place prompt templates can be fetched from.
#[async_trait::async_trait]
pub trait TemplateSource: Send + Sync {
    /// Short name used in logs and status messages.
    fn name(&self) -> &str;

    /// Fetch and validate the template with the given identifier.
    async fn fetch(&self, template_id: &str) -> AppResult<PromptTemplate>;
}

/// Templates compiled into the binary.
#[derive(Debug, Default, Clone)]
pub struct BuiltinTemplateSource;

#[async_trait::async_trait]
impl TemplateSource for BuiltinTemplateSource {
    fn name(&self) -> &str {
        "builtin"
    }

    async fn fetch(&self, template_id: &str) -> AppResult<PromptTemplate> {
        match template_id {
            DEFAULT_TEMPLATE_ID => PromptTemplate::new(DEFAULT_TEMPLATE_ID, RAG_PROMPT),
            _ => Err(AppError::Prompt(format!(
                "No builtin template named '{}'",
                template_id
            ))),
        }
    }
}

/// YAML definitions in a directory (`<dir>/<id>.yml`).
#[derive(Debug, Clone)]
pub struct DirectoryTemplateSource {
    dir: PathBuf,
}

impl DirectoryTemplateSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait::async_trait]
impl TemplateSource for DirectoryTemplateSource {
    fn name(&self) -> &str {
        "directory"
    }

    async fn fetch(&self, template_id: &str) -> AppResult<PromptTemplate> {
        let dir = self.dir.clone();
        let id = template_id.to_string();
        let definition = tokio::task::spawn_blocking(move || load_definition(&dir, &id))
            .await
            .map_err(|e| AppError::Prompt(format!("Template loader task failed: {}", e)))??;
        PromptTemplate::try_from(definition)
    }
}

/// Tries a primary source and falls back to a secondary one when the primary
/// does not have the template.
pub struct FallbackTemplateSource {
    primary: Box<dyn TemplateSource>,
    fallback: Box<dyn TemplateSource>,
}

impl FallbackTemplateSource {
    pub fn new(primary: Box<dyn TemplateSource>, fallback: Box<dyn TemplateSource>) -> Self {
        Self { primary, fallback }
    }

    /// Workspace templates first, builtin templates second.
    pub fn workspace_then_builtin(dir: impl Into<PathBuf>) -> Self {
        Self::new(
            Box::new(DirectoryTemplateSource::new(dir)),
            Box::new(BuiltinTemplateSource),
        )
    }
}

#[async_trait::async_trait]
impl TemplateSource for FallbackTemplateSource {
    fn name(&self) -> &str {
        "fallback"
    }

    async fn fetch(&self, template_id: &str) -> AppResult<PromptTemplate> {
        match self.primary.fetch(template_id).await {
            Ok(template) => Ok(template),
            Err(primary_err) => {
                tracing::debug!(
                    "Template '{}' not available from {} ({}), trying {}",
                    template_id,
                    self.primary.name(),
                    primary_err,
                    self.fallback.name()
                );
                self.fallback.fetch(template_id).await.map_err(|fallback_err| {
                    AppError::Prompt(format!(
                        "Template '{}' unavailable: {}; {}",
                        template_id, primary_err, fallback_err
                    ))
                })
            }
        }
    }
}
