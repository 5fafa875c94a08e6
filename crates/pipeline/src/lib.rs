//! Filterable retrieval-and-answer pipeline.
//!
//! `PipelineController` is the entry point: it initializes the pipeline once,
//! reports progress, answers questions against an immutable snapshot and
//! swaps the retrieval filter atomically.

pub mod bootstrap;
pub mod controller;
pub mod references;
pub mod synthesizer;
pub mod types;

#[cfg(test)]
mod tests;

pub use bootstrap::{CompletionHandle, ConfiguredBootstrap, Credentials, PipelineBootstrap};
pub use controller::PipelineController;
pub use references::{Citation, ReferenceBuilder};
pub use synthesizer::AnswerSynthesizer;
pub use types::{AnswerResult, PipelineState, PipelineStatus};
