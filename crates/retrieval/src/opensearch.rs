//! OpenSearch k-NN search backend.
//!
//! Embeds the query, then issues a `knn` query against the configured index
//! with the constraint rendered as an efficient k-NN `filter`. Transport
//! errors, 429 and 5xx responses are retried with exponential backoff.

use crate::document::{Document, DocumentMetadata};
use crate::embeddings::QueryEmbedder;
use crate::search::{SearchConstraint, SearchService};
use medrag_core::config::SearchConfig;
use medrag_core::{AppError, AppResult};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

const BASE_RETRY_DELAY: Duration = Duration::from_millis(200);

/// Index field names.
#[derive(Debug, Clone)]
struct FieldMap {
    text: String,
    vector: String,
    title: String,
    pmid: String,
    year: String,
    keywords: String,
}

pub struct OpenSearchService {
    search_url: String,
    fields: FieldMap,
    credentials: Option<(String, String)>,
    max_retries: u32,
    embedder: Arc<dyn QueryEmbedder>,
    client: reqwest::Client,
}

impl OpenSearchService {
    /// Build from configuration. Credentials are read from the environment
    /// variables named in the config.
    pub fn from_config(config: &SearchConfig, embedder: Arc<dyn QueryEmbedder>) -> AppResult<Self> {
        let credentials = match (&config.username_env, &config.password_env) {
            (Some(user_env), Some(pass_env)) => {
                let user = std::env::var(user_env).map_err(|_| {
                    AppError::Config(format!("Environment variable {} is not set", user_env))
                })?;
                let pass = std::env::var(pass_env).map_err(|_| {
                    AppError::Config(format!("Environment variable {} is not set", pass_env))
                })?;
                Some((user, pass))
            }
            (None, None) => None,
            _ => {
                return Err(AppError::Config(
                    "search.usernameEnv and search.passwordEnv must be set together".to_string(),
                ))
            }
        };

        Ok(Self {
            search_url: format!(
                "{}/{}/_search",
                config.endpoint.trim_end_matches('/'),
                config.index_name
            ),
            fields: FieldMap {
                text: config.text_field.clone(),
                vector: config.vector_field.clone(),
                title: config.title_field.clone(),
                pmid: config.pmid_field.clone(),
                year: config.year_field.clone(),
                keywords: config.keywords_field.clone(),
            },
            credentials,
            max_retries: config.max_retries,
            embedder,
            client: reqwest::Client::new(),
        })
    }

    fn request_body(&self, vector: &[f32], constraint: Option<&SearchConstraint>, k: usize) -> Value {
        let mut knn = json!({ "vector": vector, "k": k });
        if let Some(constraint) = constraint {
            knn["filter"] = self.constraint_clause(constraint);
        }

        json!({
            "size": k,
            "_source": { "excludes": [self.fields.vector] },
            "query": { "knn": { self.fields.vector.clone(): knn } }
        })
    }

    fn constraint_clause(&self, constraint: &SearchConstraint) -> Value {
        match constraint {
            SearchConstraint::YearBetween { start, end } => json!({
                "range": { self.fields.year.clone(): { "gte": start, "lte": end } }
            }),
            // `terms` is case-sensitive on keyword fields; `admits` is not.
            SearchConstraint::AnyKeyword { terms } => {
                let should: Vec<Value> = terms
                    .iter()
                    .map(|term| {
                        json!({
                            "term": {
                                self.fields.keywords.clone(): {
                                    "value": term,
                                    "case_insensitive": true
                                }
                            }
                        })
                    })
                    .collect();
                json!({ "bool": { "should": should, "minimum_should_match": 1 } })
            }
        }
    }

    fn parse_hits(&self, body: &Value) -> AppResult<Vec<Document>> {
        let hits = body["hits"]["hits"].as_array().ok_or_else(|| {
            AppError::RetrievalFailed("OpenSearch response has no hits array".to_string())
        })?;

        hits.iter().map(|hit| self.parse_hit(hit)).collect()
    }

    fn parse_hit(&self, hit: &Value) -> AppResult<Document> {
        let source = &hit["_source"];
        let pmid = scalar_string(&source[&self.fields.pmid]).ok_or_else(|| {
            AppError::RetrievalFailed(format!("Hit is missing field '{}'", self.fields.pmid))
        })?;
        let text = source[&self.fields.text]
            .as_str()
            .ok_or_else(|| {
                AppError::RetrievalFailed(format!("Hit is missing field '{}'", self.fields.text))
            })?
            .to_string();

        let keywords = match &source[&self.fields.keywords] {
            Value::Array(items) => items.iter().filter_map(scalar_string).collect(),
            Value::String(single) => vec![single.clone()],
            _ => Vec::new(),
        };

        Ok(Document {
            chunk_id: scalar_string(&hit["_id"]).unwrap_or_else(|| pmid.clone()),
            pmid,
            title: source[&self.fields.title].as_str().unwrap_or_default().to_string(),
            text,
            score: hit["_score"].as_f64().unwrap_or(0.0) as f32,
            metadata: DocumentMetadata {
                year: scalar_string(&source[&self.fields.year]).and_then(|y| y.parse().ok()),
                keywords,
            },
        })
    }

    async fn post_with_retry(&self, body: &Value) -> AppResult<Value> {
        let mut attempt = 0u32;

        loop {
            let mut request = self.client.post(&self.search_url).json(body);
            if let Some((ref user, ref pass)) = self.credentials {
                request = request.basic_auth(user, Some(pass));
            }

            let error = match request.send().await {
                Ok(response) if response.status().is_success() => {
                    return response.json::<Value>().await.map_err(|e| {
                        AppError::RetrievalFailed(format!("Failed to parse OpenSearch response: {}", e))
                    });
                }
                Ok(response) => {
                    let status = response.status();
                    let text = response.text().await.unwrap_or_default();
                    let message = format!("OpenSearch error ({}): {}", status, text);
                    if !(status.is_server_error() || status.as_u16() == 429) {
                        return Err(AppError::RetrievalFailed(message));
                    }
                    message
                }
                Err(e) => format!("OpenSearch request failed: {}", e),
            };

            if attempt >= self.max_retries {
                return Err(AppError::RetrievalFailed(format!(
                    "{} (gave up after {} attempts)",
                    error,
                    attempt + 1
                )));
            }

            let delay = BASE_RETRY_DELAY * 2u32.saturating_pow(attempt);
            tracing::warn!(attempt = attempt + 1, ?delay, "{}; retrying", error);
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

/// Strings and numbers both render as strings (PMIDs and years are stored
/// either way depending on the ingest job).
fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[async_trait::async_trait]
impl SearchService for OpenSearchService {
    fn name(&self) -> &str {
        "opensearch"
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
        let vector = self.embedder.embed(query).await?;
        let body = self.request_body(&vector, constraint, k);
        let response = self.post_with_retry(&body).await?;
        self.parse_hits(&response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::TrigramEmbedder;
    use crate::filter::RetrievalFilter;

    fn service() -> OpenSearchService {
        OpenSearchService::from_config(
            &SearchConfig::default(),
            Arc::new(TrigramEmbedder::new(4)),
        )
        .unwrap()
    }

    #[test]
    fn test_search_url() {
        assert_eq!(
            service().search_url,
            "http://localhost:9200/pubmed_500_100/_search"
        );
    }

    #[test]
    fn test_unconstrained_body() {
        let body = service().request_body(&[0.1, 0.2], None, 20);
        assert_eq!(body["size"], 20);
        assert_eq!(body["query"]["knn"]["embedding"]["k"], 20);
        assert!(body["query"]["knn"]["embedding"].get("filter").is_none());
        assert_eq!(body["_source"]["excludes"][0], "embedding");
    }

    #[test]
    fn test_year_constraint_body() {
        let constraint = SearchConstraint::YearBetween {
            start: 2018,
            end: 2020,
        };
        let body = service().request_body(&[0.1], Some(&constraint), 5);
        assert_eq!(
            body["query"]["knn"]["embedding"]["filter"],
            json!({"range": {"year": {"gte": 2018, "lte": 2020}}})
        );
    }

    #[test]
    fn test_keyword_constraint_body_is_case_insensitive() {
        let filter = RetrievalFilter::keywords(["Diabetes", "asthma"]).unwrap();
        let constraint = SearchConstraint::from_filter(&filter).unwrap();
        let body = service().request_body(&[0.1], Some(&constraint), 5);
        assert_eq!(
            body["query"]["knn"]["embedding"]["filter"],
            json!({"bool": {
                "should": [
                    {"term": {"keywords": {"value": "asthma", "case_insensitive": true}}},
                    {"term": {"keywords": {"value": "diabetes", "case_insensitive": true}}}
                ],
                "minimum_should_match": 1
            }})
        );

        // The local check agrees for a document indexed with different casing
        let doc = Document::new("1", "1-0", "t", "x").with_keywords(["DIABETES"]);
        assert!(filter.matches(&doc));
    }

    #[test]
    fn test_parse_hits() {
        let response = json!({
            "hits": {"hits": [
                {"_id": "a1", "_score": 0.92, "_source": {
                    "pmid": 123, "title": "Capitals", "chunk": "Paris is the capital of France.",
                    "year": "2019", "keywords": ["Geography"]
                }},
                {"_id": "b2", "_score": 0.41, "_source": {
                    "pmid": "456", "chunk": "Unrelated."
                }}
            ]}
        });

        let docs = service().parse_hits(&response).unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].pmid, "123");
        assert_eq!(docs[0].chunk_id, "a1");
        assert_eq!(docs[0].metadata.year, Some(2019));
        assert_eq!(docs[0].metadata.keywords, vec!["Geography".to_string()]);
        assert!((docs[0].score - 0.92).abs() < 1e-6);
        assert_eq!(docs[1].title, "");
        assert_eq!(docs[1].metadata.year, None);
    }

    #[test]
    fn test_parse_hit_missing_text() {
        let response = json!({"hits": {"hits": [{"_id": "x", "_source": {"pmid": "1"}}]}});
        let err = service().parse_hits(&response).unwrap_err();
        assert!(err.to_string().contains("chunk"));
    }

    #[test]
    fn test_partial_credentials_rejected() {
        let config = SearchConfig {
            username_env: Some("MEDRAG_TEST_OS_USER".to_string()),
            ..SearchConfig::default()
        };
        let result = OpenSearchService::from_config(&config, Arc::new(TrigramEmbedder::new(4)));
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_unreachable_host_exhausts_retries() {
        let config = SearchConfig {
            endpoint: "http://127.0.0.1:9".to_string(),
            max_retries: 1,
            ..SearchConfig::default()
        };
        let service =
            OpenSearchService::from_config(&config, Arc::new(TrigramEmbedder::new(4))).unwrap();

        let err = service.search("q", None, 3).await.unwrap_err();
        assert_eq!(err.kind(), medrag_core::ErrorKind::RetrievalFailed);
        assert!(err.to_string().contains("gave up after 2 attempts"));
    }
}
