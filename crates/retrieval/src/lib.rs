//! Filtered document retrieval for medrag.
//!
//! A `SearchService` is an opaque nearest-neighbor backend. `FilteredRetriever`
//! binds one to a `RetrievalFilter`, pushing the filter down as a
//! `SearchConstraint` when the backend supports it and filtering results
//! itself when it does not.

pub mod document;
pub mod embeddings;
pub mod factory;
pub mod filter;
pub mod memory;
pub mod opensearch;
pub mod retriever;
pub mod search;

pub use document::{Document, DocumentMetadata};
pub use embeddings::{create_embedder, QueryEmbedder};
pub use factory::{create_search_service, retriever_options};
pub use filter::{KeywordSet, RetrievalFilter, YearRange};
pub use memory::MemoryIndex;
pub use opensearch::OpenSearchService;
pub use retriever::{FilteredRetriever, RetrieverOptions};
pub use search::{SearchConstraint, SearchService};
