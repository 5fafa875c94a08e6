//! Pipeline status and answer types.

use crate::references::Citation;
use medrag_retrieval::{Document, RetrievalFilter};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Readiness of the answer pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Uninitialized,
    Initializing,
    Ready,
    Failed,
}

impl PipelineState {
    /// `Ready` or `Failed`: no initialization is in flight.
    pub fn is_settled(&self) -> bool {
        matches!(self, PipelineState::Ready | PipelineState::Failed)
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PipelineState::Uninitialized => "uninitialized",
            PipelineState::Initializing => "initializing",
            PipelineState::Ready => "ready",
            PipelineState::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// State plus the latest human-readable progress or failure message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineStatus {
    pub state: PipelineState,
    pub message: String,
}

impl PipelineStatus {
    pub fn new(state: PipelineState, message: impl Into<String>) -> Self {
        Self {
            state,
            message: message.into(),
        }
    }

    pub(crate) fn uninitialized() -> Self {
        Self::new(PipelineState::Uninitialized, "Pipeline has not been initialized")
    }
}

impl fmt::Display for PipelineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.state, self.message)
    }
}

/// Result of answering one question.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerResult {
    /// Text produced by the completion service
    pub answer_text: String,

    /// Retrieved documents in retrieval-rank order
    pub supporting_documents: Vec<Document>,

    /// Rendered citation string
    pub citations: String,

    /// Deduplicated citations, first-seen order
    pub references: Vec<Citation>,

    /// Filter the documents were retrieved under
    pub filter: RetrievalFilter,
}
