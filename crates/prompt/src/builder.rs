//! Prompt rendering.

use crate::types::{PromptTemplate, CONTEXT_VAR, QUESTION_VAR};
use handlebars::Handlebars;
use medrag_core::{AppError, AppResult};
use std::collections::HashMap;

/// Render a grounding prompt from a template, the question and the context.
///
/// # Example
/// ```no_run
/// use medrag_prompt::{build_prompt, PromptTemplate};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let template = PromptTemplate::new("qa", "Q: {{question}}\nC: {{context}}")?;
/// let prompt = build_prompt(&template, "What is BRCA1?", "BRCA1 is a gene.")?;
/// println!("{}", prompt);
/// # Ok(())
/// # }
/// ```
pub fn build_prompt(template: &PromptTemplate, question: &str, context: &str) -> AppResult<String> {
    tracing::debug!("Building prompt from template: {}", template.id);

    let mut variables = HashMap::new();
    variables.insert(QUESTION_VAR.to_string(), question.to_string());
    variables.insert(CONTEXT_VAR.to_string(), context.to_string());

    render_template(&template.template, &variables)
}

/// Render a Handlebars template with variables.
fn render_template(template: &str, variables: &HashMap<String, String>) -> AppResult<String> {
    let mut handlebars = Handlebars::new();

    // Plain text, not HTML
    handlebars.register_escape_fn(handlebars::no_escape);

    handlebars
        .register_template_string("prompt", template)
        .map_err(|e| AppError::Prompt(format!("Failed to register template: {}", e)))?;

    handlebars
        .render("prompt", &variables)
        .map_err(|e| AppError::Prompt(format!("Failed to render template: {}", e)))
}
