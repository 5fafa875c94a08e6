//! Query embedding for vector search backends.

pub mod ollama;
pub mod trigram;

pub use ollama::OllamaEmbedder;
pub use trigram::TrigramEmbedder;

use medrag_core::config::SearchConfig;
use medrag_core::{AppError, AppResult};
use std::sync::Arc;

/// Turns text into a dense vector comparable with the indexed embeddings.
#[async_trait::async_trait]
pub trait QueryEmbedder: Send + Sync + std::fmt::Debug {
    /// Provider name (e.g. "trigram", "ollama")
    fn provider_name(&self) -> &str;

    /// Vector length produced by `embed`
    fn dimensions(&self) -> usize;

    async fn embed(&self, text: &str) -> AppResult<Vec<f32>>;
}

/// Create the embedder named by the search configuration.
pub fn create_embedder(config: &SearchConfig) -> AppResult<Arc<dyn QueryEmbedder>> {
    match config.embedding_provider.as_str() {
        "trigram" => Ok(Arc::new(TrigramEmbedder::new(config.embedding_dim))),
        "ollama" => {
            let endpoint = config
                .embedding_endpoint
                .as_deref()
                .unwrap_or("http://localhost:11434");
            Ok(Arc::new(OllamaEmbedder::new(
                endpoint,
                &config.embedding_model,
                config.embedding_dim,
            )))
        }
        other => Err(AppError::Config(format!(
            "Unknown embedding provider: '{}'. Supported providers: trigram, ollama",
            other
        ))),
    }
}

/// Cosine similarity; zero when either vector has no magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_trigram_embedder() {
        let embedder = create_embedder(&SearchConfig::default()).unwrap();
        assert_eq!(embedder.provider_name(), "trigram");
        assert_eq!(embedder.dimensions(), 384);
    }

    #[test]
    fn test_create_unknown_embedder() {
        let config = SearchConfig {
            embedding_provider: "word2vec".to_string(),
            ..SearchConfig::default()
        };
        let err = create_embedder(&config).unwrap_err();
        assert!(err.to_string().contains("Unknown embedding provider"));
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }
}
