//! Citation rendering for answer sources.

use medrag_retrieval::Document;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Separator between rendered citation tokens.
pub const CITATION_SEPARATOR: &str = "; ";

/// One cited source article.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    pub pmid: String,
    pub title: String,
}

impl Citation {
    /// Compact token, `PMID:<id>` followed by the title when there is one.
    pub fn token(&self) -> String {
        if self.title.trim().is_empty() {
            format!("PMID:{}", self.pmid)
        } else {
            format!("PMID:{} {}", self.pmid, self.title.trim())
        }
    }
}

/// Builds citation strings from retrieved documents.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReferenceBuilder;

impl ReferenceBuilder {
    /// Deduplicate by pmid, keeping the first occurrence and retrieval order.
    pub fn citations(documents: &[Document]) -> Vec<Citation> {
        let mut seen = HashSet::new();
        documents
            .iter()
            .filter(|doc| seen.insert(doc.pmid.as_str()))
            .map(|doc| Citation {
                pmid: doc.pmid.clone(),
                title: doc.title.clone(),
            })
            .collect()
    }

    /// Render the deduplicated citations as a single string.
    pub fn build(documents: &[Document]) -> String {
        Self::render(&Self::citations(documents))
    }

    pub fn render(citations: &[Citation]) -> String {
        citations
            .iter()
            .map(Citation::token)
            .collect::<Vec<_>>()
            .join(CITATION_SEPARATOR)
    }
}
