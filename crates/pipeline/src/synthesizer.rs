//! Grounded answer synthesis.

use medrag_core::{AppError, AppResult};
use medrag_llm::{LlmClient, LlmRequest};
use medrag_prompt::{build_prompt, PromptTemplate};
use medrag_retrieval::Document;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

/// Separator between document texts in the rendered context.
const CONTEXT_SEPARATOR: &str = "\n\n";

/// Low temperature for factual answers.
const ANSWER_TEMPERATURE: f32 = 0.0;

const MAX_ANSWER_TOKENS: u32 = 1000;

/// Renders the grounding prompt and makes one completion call per question.
#[derive(Clone)]
pub struct AnswerSynthesizer {
    llm: Arc<dyn LlmClient>,
    model: String,
    template: Arc<PromptTemplate>,
    timeout: Duration,
}

impl std::fmt::Debug for AnswerSynthesizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnswerSynthesizer")
            .field("provider", &self.llm.provider_name())
            .field("model", &self.model)
            .field("template", &self.template.id)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl AnswerSynthesizer {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        model: impl Into<String>,
        template: PromptTemplate,
        timeout: Duration,
    ) -> Self {
        Self {
            llm,
            model: model.into(),
            template: Arc::new(template),
            timeout,
        }
    }

    pub fn template(&self) -> &PromptTemplate {
        &self.template
    }

    /// Answer `query` from `documents`.
    ///
    /// An empty document list still goes to the model; the template tells it
    /// to decline when there is no context.
    pub async fn synthesize(&self, query: &str, documents: &[Document]) -> AppResult<String> {
        let context = build_context(documents);
        let prompt = build_prompt(&self.template, query, &context)?;

        let request = LlmRequest::new(prompt, &self.model)
            .with_temperature(ANSWER_TEMPERATURE)
            .with_max_tokens(MAX_ANSWER_TOKENS);

        tracing::debug!(
            provider = self.llm.provider_name(),
            model = %self.model,
            documents = documents.len(),
            "Requesting completion"
        );

        let response = tokio::time::timeout(self.timeout, self.llm.complete(&request))
            .await
            .map_err(|_| {
                AppError::SynthesisFailed(format!(
                    "Completion timed out after {:?}",
                    self.timeout
                ))
            })?
            .map_err(|e| AppError::SynthesisFailed(format!("Completion failed: {}", e)))?;

        let answer = response.content.trim();
        if answer.is_empty() {
            return Err(AppError::SynthesisFailed(
                "Completion service returned an empty answer".to_string(),
            ));
        }

        Ok(answer.to_string())
    }
}

/// Join document texts in rank order, one text per source article.
fn build_context(documents: &[Document]) -> String {
    let mut seen = HashSet::new();
    documents
        .iter()
        .filter(|doc| seen.insert(doc.pmid.as_str()))
        .map(|doc| doc.text.trim())
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR)
}
