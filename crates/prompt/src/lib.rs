//! Prompt templates for medrag.
//!
//! This crate provides:
//! - YAML-based template definitions
//! - Handlebars rendering of the grounding prompt
//! - Template sources (builtin, workspace directory, fallback chain)

pub mod builder;
pub mod loader;
pub mod source;
pub mod types;

// Re-export main types
pub use builder::build_prompt;
pub use loader::{list_templates, load_definition};
pub use source::{
    BuiltinTemplateSource, DirectoryTemplateSource, FallbackTemplateSource, TemplateSource,
    DEFAULT_TEMPLATE_ID,
};
pub use types::{PromptDefinition, PromptTemplate};
