//! Filter-aware retrieval over an opaque search service.

use crate::document::{sort_by_score, Document};
use crate::filter::RetrievalFilter;
use crate::search::{SearchConstraint, SearchService};
use medrag_core::config::DEFAULT_TOP_K;
use medrag_core::{AppError, AppResult, ErrorKind};
use std::sync::Arc;
use std::time::Duration;

/// Initial candidate window, as a multiple of `k`, when filtering after search.
const OVERFETCH_FACTOR: usize = 4;

/// Tuning for a [`FilteredRetriever`].
#[derive(Debug, Clone)]
pub struct RetrieverOptions {
    /// `k` used by [`FilteredRetriever::retrieve_configured`]
    pub top_k: usize,

    /// Bound on each search call
    pub timeout: Duration,
}

impl Default for RetrieverOptions {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            timeout: Duration::from_secs(10),
        }
    }
}

/// A base search capability paired with one filter.
///
/// Cheap to clone; the base service is shared. Swapping filters means
/// building a new retriever with [`FilteredRetriever::with_filter`].
#[derive(Clone)]
pub struct FilteredRetriever {
    base: Arc<dyn SearchService>,
    filter: RetrievalFilter,
    options: RetrieverOptions,
}

impl std::fmt::Debug for FilteredRetriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilteredRetriever")
            .field("base", &self.base.name())
            .field("filter", &self.filter)
            .field("options", &self.options)
            .finish()
    }
}

impl FilteredRetriever {
    pub fn new(base: Arc<dyn SearchService>, filter: RetrievalFilter) -> Self {
        Self::with_options(base, filter, RetrieverOptions::default())
    }

    pub fn with_options(
        base: Arc<dyn SearchService>,
        filter: RetrievalFilter,
        options: RetrieverOptions,
    ) -> Self {
        Self {
            base,
            filter,
            options,
        }
    }

    /// Same base service and options, different filter.
    pub fn with_filter(&self, filter: RetrievalFilter) -> Self {
        Self {
            base: Arc::clone(&self.base),
            filter,
            options: self.options.clone(),
        }
    }

    pub fn filter(&self) -> &RetrievalFilter {
        &self.filter
    }

    pub fn options(&self) -> &RetrieverOptions {
        &self.options
    }

    /// Retrieve with this retriever's own filter and configured `k`.
    pub async fn retrieve_configured(&self, query: &str) -> AppResult<Vec<Document>> {
        self.retrieve(query, &self.filter, self.options.top_k).await
    }

    /// Top-`k` documents satisfying `filter`, by descending score.
    ///
    /// Every returned document satisfies `filter`. Fewer than `k` results
    /// means fewer than `k` matching documents exist.
    pub async fn retrieve(
        &self,
        query: &str,
        filter: &RetrievalFilter,
        k: usize,
    ) -> AppResult<Vec<Document>> {
        if k == 0 {
            return Err(AppError::InvalidArgument("k must be greater than 0".to_string()));
        }

        let mut documents = match SearchConstraint::from_filter(filter) {
            None => self.timed_search(query, None, k).await?,
            Some(constraint) if self.base.supports_constraints() => {
                self.timed_search(query, Some(&constraint), k).await?
            }
            Some(_) => self.search_then_exclude(query, filter, k).await?,
        };

        documents.retain(|doc| filter.matches(doc));
        sort_by_score(&mut documents);
        documents.truncate(k);

        tracing::debug!(
            backend = self.base.name(),
            filter = %filter,
            k,
            returned = documents.len(),
            "Retrieved documents"
        );

        Ok(documents)
    }

    /// Fallback for backends without constrained search: widen the candidate
    /// window until `k` documents match or the backend runs out.
    ///
    /// The window has no upper bound. A backend that cannot filter has no
    /// other way to reach matches ranked below any fixed cutoff.
    async fn search_then_exclude(
        &self,
        query: &str,
        filter: &RetrievalFilter,
        k: usize,
    ) -> AppResult<Vec<Document>> {
        let mut window = k.saturating_mul(OVERFETCH_FACTOR);

        loop {
            let candidates = self.timed_search(query, None, window).await?;
            let exhausted = candidates.len() < window || window == usize::MAX;
            let matching: Vec<Document> = candidates
                .into_iter()
                .filter(|doc| filter.matches(doc))
                .collect();

            if matching.len() >= k || exhausted {
                return Ok(matching);
            }

            tracing::debug!(
                backend = self.base.name(),
                window,
                matched = matching.len(),
                "Widening candidate window"
            );
            window = window.saturating_mul(2);
        }
    }

    async fn timed_search(
        &self,
        query: &str,
        constraint: Option<&SearchConstraint>,
        k: usize,
    ) -> AppResult<Vec<Document>> {
        match tokio::time::timeout(self.options.timeout, self.base.search(query, constraint, k))
            .await
        {
            Ok(Ok(documents)) => Ok(documents),
            Ok(Err(e)) if e.kind() == ErrorKind::RetrievalFailed => Err(e),
            Ok(Err(e)) => Err(AppError::RetrievalFailed(format!(
                "{} search failed: {}",
                self.base.name(),
                e
            ))),
            Err(_) => Err(AppError::RetrievalFailed(format!(
                "{} search timed out after {:?}",
                self.base.name(),
                self.options.timeout
            ))),
        }
    }
}
