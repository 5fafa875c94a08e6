//! Nearest-neighbor search service abstraction.

use crate::document::Document;
use crate::filter::RetrievalFilter;
use medrag_core::AppResult;
use serde::{Deserialize, Serialize};

/// A metadata predicate passed alongside the query to a search service that
/// supports constrained search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchConstraint {
    /// Publication year in `[start, end]`
    YearBetween { start: i32, end: i32 },

    /// Keyword set intersects `terms` (lowercase)
    AnyKeyword { terms: Vec<String> },
}

impl SearchConstraint {
    /// Translate a filter into a constraint. `None` constrains nothing.
    pub fn from_filter(filter: &RetrievalFilter) -> Option<Self> {
        match filter {
            RetrievalFilter::None => None,
            RetrievalFilter::YearRange(range) => Some(SearchConstraint::YearBetween {
                start: range.start(),
                end: range.end(),
            }),
            RetrievalFilter::Keyword(set) => Some(SearchConstraint::AnyKeyword {
                terms: set.terms().iter().cloned().collect(),
            }),
        }
    }

    /// Evaluate the constraint against a document's metadata.
    pub fn admits(&self, document: &Document) -> bool {
        match self {
            SearchConstraint::YearBetween { start, end } => document
                .metadata
                .year
                .is_some_and(|year| (*start..=*end).contains(&year)),
            SearchConstraint::AnyKeyword { terms } => document
                .metadata
                .keywords
                .iter()
                .any(|k| terms.contains(&k.trim().to_lowercase())),
        }
    }
}

/// An opaque nearest-neighbor search backend.
///
/// Implementations return at most `k` documents ordered by descending score.
/// Calls must be idempotent so callers can retry them.
#[async_trait::async_trait]
pub trait SearchService: Send + Sync {
    /// Backend name for logs.
    fn name(&self) -> &str;

    /// Whether `search` honours a `SearchConstraint` itself. When false the
    /// caller filters results after the search.
    fn supports_constraints(&self) -> bool;

    async fn search(
        &self,
        query: &str,
        constraint: Option<&SearchConstraint>,
        k: usize,
    ) -> AppResult<Vec<Document>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_none_filter_has_no_constraint() {
        assert_eq!(SearchConstraint::from_filter(&RetrievalFilter::None), None);
    }

    #[test]
    fn test_year_filter_translation() {
        let filter = RetrievalFilter::year_range(2018, 2020).unwrap();
        assert_eq!(
            SearchConstraint::from_filter(&filter),
            Some(SearchConstraint::YearBetween {
                start: 2018,
                end: 2020
            })
        );
    }

    #[test]
    fn test_keyword_filter_translation_is_sorted() {
        let filter = RetrievalFilter::keywords(["Obesity", "asthma"]).unwrap();
        assert_eq!(
            SearchConstraint::from_filter(&filter),
            Some(SearchConstraint::AnyKeyword {
                terms: vec!["asthma".to_string(), "obesity".to_string()]
            })
        );
    }
}
