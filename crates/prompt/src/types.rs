//! Prompt types for medrag.
//!
//! A `PromptDefinition` is the on-disk YAML shape; a `PromptTemplate` is the
//! validated, render-ready template handed to the answer pipeline.

use medrag_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// Placeholder receiving the user's question.
pub const QUESTION_VAR: &str = "question";

/// Placeholder receiving the concatenated document texts.
pub const CONTEXT_VAR: &str = "context";

/// A prompt definition loaded from YAML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptDefinition {
    /// Unique prompt identifier
    pub id: String,

    /// Human-readable title
    pub title: String,

    /// API version for schema evolution
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Creator identifier
    #[serde(rename = "createdBy", default)]
    pub created_by: String,

    /// Template string with Handlebars syntax
    pub template: String,
}

/// A validated grounding template.
///
/// Guaranteed to reference both `{{question}}` and `{{context}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptTemplate {
    pub id: String,
    pub template: String,
}

impl PromptTemplate {
    /// Build a template, rejecting one that cannot carry the question or the
    /// retrieved context.
    pub fn new(id: impl Into<String>, template: impl Into<String>) -> AppResult<Self> {
        let id = id.into();
        let template = template.into();

        for var in [QUESTION_VAR, CONTEXT_VAR] {
            if !references_variable(&template, var) {
                return Err(AppError::Prompt(format!(
                    "Template '{}' does not reference {{{{{}}}}}",
                    id, var
                )));
            }
        }

        Ok(Self { id, template })
    }
}

impl TryFrom<PromptDefinition> for PromptTemplate {
    type Error = AppError;

    fn try_from(def: PromptDefinition) -> AppResult<Self> {
        PromptTemplate::new(def.id, def.template)
    }
}

/// Accepts `{{var}}`, `{{ var }}` and the triple-stash `{{{var}}}` forms.
fn references_variable(template: &str, var: &str) -> bool {
    template.match_indices("{{").any(|(idx, _)| {
        template[idx..]
            .trim_start_matches('{')
            .trim_start()
            .strip_prefix(var)
            .map(|rest| rest.trim_start().starts_with("}}"))
            .unwrap_or(false)
    })
}
