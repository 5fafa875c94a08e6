//! Retrieval filters.
//!
//! A `RetrievalFilter` is a closed set of value types describing which
//! documents may be returned. Filters never scan documents themselves; the
//! `FilteredRetriever` translates them into search constraints and uses
//! [`RetrievalFilter::matches`] only to verify results.

use crate::document::Document;
use crate::search::SearchConstraint;
use medrag_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// How candidate documents are narrowed before ranking.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "FilterSpec", into = "FilterSpec")]
pub enum RetrievalFilter {
    /// Every document matches.
    #[default]
    None,

    /// Publication year within an inclusive range.
    YearRange(YearRange),

    /// At least one keyword in common with the document.
    Keyword(KeywordSet),
}

/// Inclusive publication-year range. `start <= end` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct YearRange {
    start: i32,
    end: i32,
}

impl YearRange {
    pub fn new(start: i32, end: i32) -> AppResult<Self> {
        if start > end {
            return Err(AppError::InvalidFilter(format!(
                "year range start {} is after end {}",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> i32 {
        self.start
    }

    pub fn end(&self) -> i32 {
        self.end
    }
}

/// Non-empty set of lowercase keywords.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordSet {
    terms: BTreeSet<String>,
}

impl KeywordSet {
    pub fn new<I, S>(terms: I) -> AppResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let terms: BTreeSet<String> = terms
            .into_iter()
            .map(|t| t.as_ref().trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();

        if terms.is_empty() {
            return Err(AppError::InvalidFilter(
                "keyword filter needs at least one term".to_string(),
            ));
        }
        Ok(Self { terms })
    }

    pub fn terms(&self) -> &BTreeSet<String> {
        &self.terms
    }
}

impl RetrievalFilter {
    pub fn none() -> Self {
        RetrievalFilter::None
    }

    pub fn year_range(start: i32, end: i32) -> AppResult<Self> {
        YearRange::new(start, end).map(RetrievalFilter::YearRange)
    }

    pub fn keywords<I, S>(terms: I) -> AppResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        KeywordSet::new(terms).map(RetrievalFilter::Keyword)
    }

    /// Parse the tagged JSON form, e.g. `{"type":"years","start":2018,"end":2020}`.
    pub fn from_json(json: &str) -> AppResult<Self> {
        serde_json::from_str(json).map_err(|e| AppError::InvalidFilter(e.to_string()))
    }

    /// Whether `document` satisfies this filter.
    pub fn matches(&self, document: &Document) -> bool {
        SearchConstraint::from_filter(self).map_or(true, |c| c.admits(document))
    }

    pub fn is_none(&self) -> bool {
        matches!(self, RetrievalFilter::None)
    }
}

impl fmt::Display for RetrievalFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetrievalFilter::None => write!(f, "none"),
            RetrievalFilter::YearRange(range) if range.start == range.end => {
                write!(f, "years:{}", range.start)
            }
            RetrievalFilter::YearRange(range) => write!(f, "years:{}-{}", range.start, range.end),
            RetrievalFilter::Keyword(set) => {
                let terms: Vec<&str> = set.terms.iter().map(String::as_str).collect();
                write!(f, "keywords:{}", terms.join(","))
            }
        }
    }
}

/// Short form used on the command line: `none`, `years:2018-2020`,
/// `years:2019`, `keywords:diabetes,insulin`.
impl FromStr for RetrievalFilter {
    type Err = AppError;

    fn from_str(s: &str) -> AppResult<Self> {
        let s = s.trim();
        let (tag, value) = s.split_once(':').unwrap_or((s, ""));

        match tag.trim().to_lowercase().as_str() {
            "none" if value.trim().is_empty() => Ok(RetrievalFilter::None),
            "years" => {
                let (start, end) = value.split_once('-').unwrap_or((value, value));
                RetrievalFilter::year_range(parse_year(start)?, parse_year(end)?)
            }
            "keywords" => RetrievalFilter::keywords(value.split(',')),
            _ => Err(AppError::InvalidFilter(format!(
                "unrecognized filter '{}' (expected none, years:START-END or keywords:a,b)",
                s
            ))),
        }
    }
}

fn parse_year(value: &str) -> AppResult<i32> {
    value
        .trim()
        .parse()
        .map_err(|_| AppError::InvalidFilter(format!("'{}' is not a year", value.trim())))
}

/// Wire form of a filter. Deserializing an unknown `type` tag fails.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum FilterSpec {
    None,
    Years {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        start: Option<i32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        end: Option<i32>,
        /// Explicit list of years; must be contiguous
        #[serde(default, skip_serializing_if = "Option::is_none")]
        years: Option<Vec<YearValue>>,
    },
    Keywords {
        terms: Vec<String>,
    },
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum YearValue {
    Number(i32),
    Text(String),
}

impl YearValue {
    fn year(&self) -> AppResult<i32> {
        match self {
            YearValue::Number(year) => Ok(*year),
            YearValue::Text(text) => parse_year(text),
        }
    }
}

impl TryFrom<FilterSpec> for RetrievalFilter {
    type Error = AppError;

    fn try_from(spec: FilterSpec) -> AppResult<Self> {
        match spec {
            FilterSpec::None => Ok(RetrievalFilter::None),
            FilterSpec::Years {
                start: Some(start),
                end: Some(end),
                years: None,
            } => RetrievalFilter::year_range(start, end),
            FilterSpec::Years {
                start: None,
                end: None,
                years: Some(years),
            } => {
                let mut years = years
                    .iter()
                    .map(YearValue::year)
                    .collect::<AppResult<Vec<_>>>()?;
                years.sort_unstable();
                years.dedup();

                let (first, last) = match (years.first(), years.last()) {
                    (Some(first), Some(last)) => (*first, *last),
                    _ => {
                        return Err(AppError::InvalidFilter(
                            "years list cannot be empty".to_string(),
                        ))
                    }
                };
                let span = i64::from(last) - i64::from(first) + 1;
                if usize::try_from(span).ok() != Some(years.len()) {
                    return Err(AppError::InvalidFilter(format!(
                        "years list {:?} is not a contiguous range",
                        years
                    )));
                }
                RetrievalFilter::year_range(first, last)
            }
            FilterSpec::Years { .. } => Err(AppError::InvalidFilter(
                "years filter needs either start and end, or a years list".to_string(),
            )),
            FilterSpec::Keywords { terms } => RetrievalFilter::keywords(terms),
        }
    }
}

impl From<RetrievalFilter> for FilterSpec {
    fn from(filter: RetrievalFilter) -> Self {
        match filter {
            RetrievalFilter::None => FilterSpec::None,
            RetrievalFilter::YearRange(range) => FilterSpec::Years {
                start: Some(range.start),
                end: Some(range.end),
                years: None,
            },
            RetrievalFilter::Keyword(set) => FilterSpec::Keywords {
                terms: set.terms.into_iter().collect(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use medrag_core::ErrorKind;

    #[test]
    fn test_inverted_year_range_rejected() {
        let err = RetrievalFilter::year_range(2020, 2018).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidFilter);
    }

    #[test]
    fn test_single_year_range_allowed() {
        let filter = RetrievalFilter::year_range(2019, 2019).unwrap();
        assert!(filter.matches(&Document::new("1", "1-0", "t", "x").with_year(2019)));
        assert_eq!(filter.to_string(), "years:2019");
    }

    #[test]
    fn test_empty_keywords_rejected() {
        let err = RetrievalFilter::keywords(Vec::<String>::new()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidFilter);

        let err = RetrievalFilter::keywords(["  ", ""]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidFilter);
    }

    #[test]
    fn test_none_matches_everything() {
        let doc = Document::new("1", "1-0", "t", "x");
        assert!(RetrievalFilter::None.matches(&doc));
    }

    #[test]
    fn test_year_range_bounds_inclusive() {
        let filter = RetrievalFilter::year_range(2018, 2020).unwrap();
        let at = |year| Document::new("1", "1-0", "t", "x").with_year(year);

        assert!(filter.matches(&at(2018)));
        assert!(filter.matches(&at(2020)));
        assert!(!filter.matches(&at(2017)));
        assert!(!filter.matches(&at(2021)));
        // Unknown year never satisfies a year filter
        assert!(!filter.matches(&Document::new("1", "1-0", "t", "x")));
    }

    #[test]
    fn test_keyword_match_is_case_insensitive() {
        let filter = RetrievalFilter::keywords(["Diabetes", "insulin"]).unwrap();
        let doc = Document::new("1", "1-0", "t", "x").with_keywords(["INSULIN resistance", "Insulin"]);
        assert!(filter.matches(&doc));

        let other = Document::new("2", "2-0", "t", "x").with_keywords(["asthma"]);
        assert!(!filter.matches(&other));
    }

    #[test]
    fn test_parse_tagged_json() {
        assert_eq!(
            RetrievalFilter::from_json(r#"{"type":"none"}"#).unwrap(),
            RetrievalFilter::None
        );
        assert_eq!(
            RetrievalFilter::from_json(r#"{"type":"years","start":2018,"end":2020}"#).unwrap(),
            RetrievalFilter::year_range(2018, 2020).unwrap()
        );
        assert_eq!(
            RetrievalFilter::from_json(r#"{"type":"years","years":["2018","2019","2020"]}"#)
                .unwrap(),
            RetrievalFilter::year_range(2018, 2020).unwrap()
        );
        assert_eq!(
            RetrievalFilter::from_json(r#"{"type":"keywords","terms":["covid-19"]}"#).unwrap(),
            RetrievalFilter::keywords(["covid-19"]).unwrap()
        );
    }

    #[test]
    fn test_unknown_tag_fails_fast() {
        let err = RetrievalFilter::from_json(r#"{"type":"authors","names":["Doe"]}"#).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidFilter);

        let err = RetrievalFilter::from_json(r#"{"start":2018}"#).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidFilter);
    }

    #[test]
    fn test_json_validation_errors() {
        for bad in [
            r#"{"type":"years","start":2020,"end":2018}"#,
            r#"{"type":"years","years":[]}"#,
            r#"{"type":"years","years":["2015","2019"]}"#,
            r#"{"type":"years","start":2018}"#,
            r#"{"type":"keywords","terms":[]}"#,
        ] {
            assert!(RetrievalFilter::from_json(bad).is_err(), "accepted {}", bad);
        }
    }

    #[test]
    fn test_extreme_years_list_is_invalid_not_a_panic() {
        let err =
            RetrievalFilter::from_json(r#"{"type":"years","years":[-2147483648, 2147483647]}"#)
                .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidFilter);

        assert_eq!(
            RetrievalFilter::from_json(r#"{"type":"years","years":[2147483646, 2147483647]}"#)
                .unwrap(),
            RetrievalFilter::year_range(2147483646, 2147483647).unwrap()
        );
    }

    #[test]
    fn test_json_serialization_is_tagged() {
        let filter = RetrievalFilter::year_range(2018, 2020).unwrap();
        let json = serde_json::to_value(&filter).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"type": "years", "start": 2018, "end": 2020})
        );
    }

    #[test]
    fn test_parse_short_form() {
        assert_eq!("none".parse::<RetrievalFilter>().unwrap(), RetrievalFilter::None);
        assert_eq!(
            "years:2018-2020".parse::<RetrievalFilter>().unwrap(),
            RetrievalFilter::year_range(2018, 2020).unwrap()
        );
        assert_eq!(
            "keywords: asthma , COPD".parse::<RetrievalFilter>().unwrap(),
            RetrievalFilter::keywords(["asthma", "copd"]).unwrap()
        );
        assert!("years:2020-2018".parse::<RetrievalFilter>().is_err());
        assert!("years:soon".parse::<RetrievalFilter>().is_err());
        assert!("authors:doe".parse::<RetrievalFilter>().is_err());
    }

    #[test]
    fn test_display_round_trips_through_short_form() {
        let filter = RetrievalFilter::keywords(["insulin", "diabetes"]).unwrap();
        assert_eq!(filter.to_string(), "keywords:diabetes,insulin");
        assert_eq!(filter.to_string().parse::<RetrievalFilter>().unwrap(), filter);
    }
}
