//! Retrieved document chunks.

use serde::{Deserialize, Serialize};

/// A chunk of a source article returned by nearest-neighbor search.
///
/// Produced by a `SearchService` and never mutated afterwards; the pipeline
/// only reorders, filters and clones documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Source article identifier (PubMed ID)
    pub pmid: String,

    /// Chunk identifier, unique within the index
    #[serde(default)]
    pub chunk_id: String,

    #[serde(default)]
    pub title: String,

    /// Chunk text
    pub text: String,

    /// Relevance score reported by the search service (higher is better)
    #[serde(default)]
    pub score: f32,

    /// Fields filters are evaluated against
    #[serde(default)]
    pub metadata: DocumentMetadata,
}

/// Filterable article fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    /// Publication year
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,

    /// MeSH terms / author keywords
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
}

impl Document {
    pub fn new(
        pmid: impl Into<String>,
        chunk_id: impl Into<String>,
        title: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            pmid: pmid.into(),
            chunk_id: chunk_id.into(),
            title: title.into(),
            text: text.into(),
            score: 0.0,
            metadata: DocumentMetadata::default(),
        }
    }

    pub fn with_score(mut self, score: f32) -> Self {
        self.score = score;
        self
    }

    pub fn with_year(mut self, year: i32) -> Self {
        self.metadata.year = Some(year);
        self
    }

    pub fn with_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.metadata.keywords = keywords.into_iter().map(Into::into).collect();
        self
    }
}

/// Sort by descending score. Stable, so equal scores keep backend order.
pub fn sort_by_score(documents: &mut [Document]) {
    documents.sort_by(|a, b| b.score.total_cmp(&a.score));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_corpus_record() {
        let line = r#"{"pmid":"31452104","chunk_id":"31452104-0","title":"Metformin and aging","text":"Metformin ...","metadata":{"year":2019,"keywords":["Metformin","Aging"]}}"#;
        let doc: Document = serde_json::from_str(line).unwrap();
        assert_eq!(doc.pmid, "31452104");
        assert_eq!(doc.metadata.year, Some(2019));
        assert_eq!(doc.metadata.keywords.len(), 2);
        assert_eq!(doc.score, 0.0);
    }

    #[test]
    fn test_sort_by_score_is_stable() {
        let mut docs = vec![
            Document::new("1", "1-0", "a", "a").with_score(0.5),
            Document::new("2", "2-0", "b", "b").with_score(0.9),
            Document::new("3", "3-0", "c", "c").with_score(0.5),
        ];
        sort_by_score(&mut docs);
        let order: Vec<&str> = docs.iter().map(|d| d.pmid.as_str()).collect();
        assert_eq!(order, vec!["2", "1", "3"]);
    }
}
