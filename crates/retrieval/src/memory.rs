//! In-process, brute-force vector index over a JSONL corpus.
//!
//! Suitable for small corpora, local development and tests. Constraints are
//! applied before scoring, so filtered searches are exact.

use crate::document::{sort_by_score, Document};
use crate::embeddings::{cosine_similarity, QueryEmbedder};
use crate::search::{SearchConstraint, SearchService};
use futures::stream::{self, StreamExt, TryStreamExt};
use medrag_core::{AppError, AppResult};
use std::path::Path;
use std::sync::Arc;

struct IndexedDocument {
    document: Document,
    embedding: Vec<f32>,
}

pub struct MemoryIndex {
    entries: Vec<IndexedDocument>,
    embedder: Arc<dyn QueryEmbedder>,
}

impl MemoryIndex {
    /// Embed and index `documents`. Title and text are embedded together,
    /// with at most `concurrency` embedding calls in flight.
    pub async fn build(
        documents: Vec<Document>,
        embedder: Arc<dyn QueryEmbedder>,
        concurrency: usize,
    ) -> AppResult<Self> {
        let texts: Vec<String> = documents
            .iter()
            .map(|doc| format!("{}\n{}", doc.title, doc.text))
            .collect();
        let embeddings: Vec<Vec<f32>> = stream::iter(texts.into_iter().map(|text| {
            let embedder = Arc::clone(&embedder);
            async move { embedder.embed(&text).await }
        }))
        .buffered(concurrency.max(1))
        .try_collect()
        .await?;

        let entries = documents
            .into_iter()
            .zip(embeddings)
            .map(|(document, embedding)| IndexedDocument {
                document,
                embedding,
            })
            .collect::<Vec<_>>();

        tracing::info!(
            documents = entries.len(),
            embedder = embedder.provider_name(),
            "Built in-memory index"
        );

        Ok(Self { entries, embedder })
    }

    /// Load a corpus with one JSON `Document` per line. Blank lines are skipped.
    pub async fn from_jsonl(
        path: &Path,
        embedder: Arc<dyn QueryEmbedder>,
        concurrency: usize,
    ) -> AppResult<Self> {
        let contents = tokio::fs::read_to_string(path).await.map_err(|e| {
            AppError::Config(format!("Failed to read corpus {:?}: {}", path, e))
        })?;

        let mut documents = Vec::new();
        for (line_num, line) in contents.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let document: Document = serde_json::from_str(line).map_err(|e| {
                AppError::Serialization(format!(
                    "Failed to parse line {} of {:?}: {}",
                    line_num + 1,
                    path,
                    e
                ))
            })?;
            documents.push(document);
        }

        Self::build(documents, embedder, concurrency).await
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait::async_trait]
impl SearchService for MemoryIndex {
    fn name(&self) -> &str {
        "memory"
    }

    fn supports_constraints(&self) -> bool {
        true
    }

    async fn search(
        &self,
        query: &str,
        constraint: Option<&SearchConstraint>,
        k: usize,
    ) -> AppResult<Vec<Document>> {
        let query_embedding = self.embedder.embed(query).await?;

        let mut scored: Vec<Document> = self
            .entries
            .iter()
            .filter(|entry| constraint.map_or(true, |c| c.admits(&entry.document)))
            .map(|entry| {
                let mut document = entry.document.clone();
                document.score = cosine_similarity(&query_embedding, &entry.embedding);
                document
            })
            .collect();

        sort_by_score(&mut scored);
        scored.truncate(k);
        Ok(scored)
    }
}
