//! HTTP client for a vector-search endpoint.
//!
//! `POST {base_url}/collections/{collection}/search` with
//! `{"query", "k", "filter"}`; the response is `{"hits": [{"text", "score"}]}`.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{SearchFilter, SearchHit, SearchService};
use crate::error::SearchError;

#[derive(Debug, Clone)]
pub struct HttpSearchClient {
    base_url: String,
    api_key: Option<String>,
}

#[derive(Deserialize)]
struct SearchResponse {
    hits: Vec<SearchHit>,
}

impl HttpSearchClient {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        HttpSearchClient {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        }
    }

    fn body(query: &str, k: usize, filter: Option<&SearchFilter>) -> Value {
        json!({
            "query": query,
            "k": k,
            "filter": filter.map(SearchFilter::to_json).unwrap_or(Value::Null),
        })
    }
}

#[async_trait]
impl SearchService for HttpSearchClient {
    async fn search(
        &self,
        collection: &str,
        query: &str,
        k: usize,
        filter: Option<&SearchFilter>,
    ) -> Result<Vec<SearchHit>, SearchError> {
        let url = format!("{}/collections/{}/search", self.base_url, collection);
        let body = Self::body(query, k, filter);
        let api_key = self.api_key.clone();

        tokio::task::spawn_blocking(move || {
            let agent = ureq::Agent::new_with_defaults();
            let mut request = agent.post(&url).header("content-type", "application/json");
            if let Some(key) = &api_key {
                request = request.header("api-key", key);
            }
            match request.send_json(body) {
                Ok(resp) => {
                    let parsed: SearchResponse = resp
                        .into_body()
                        .read_json()
                        .map_err(|e| SearchError::Malformed(e.to_string()))?;
                    Ok(parsed.hits)
                }
                Err(ureq::Error::StatusCode(status)) => Err(SearchError::Api {
                    status,
                    message: format!("search endpoint returned HTTP {status}"),
                }),
                Err(e) => Err(SearchError::Network(e.to_string())),
            }
        })
        .await
        .map_err(|e| SearchError::Network(format!("task join error: {e}")))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::FieldMatch;

    #[test]
    fn body_carries_filter_or_null() {
        let unfiltered = HttpSearchClient::body("80C limit", 2, None);
        assert_eq!(unfiltered["k"], 2);
        assert!(unfiltered["filter"].is_null());

        let filter = SearchFilter::any_of([FieldMatch {
            key: "metadata.section".into(),
            value: "80C".into(),
        }]);
        let filtered = HttpSearchClient::body("80C limit", 3, Some(&filter));
        assert_eq!(filtered["filter"]["should"][0]["match"]["value"], "80C");
    }

    #[test]
    fn base_url_is_normalised() {
        let client = HttpSearchClient::new("http://localhost:6333/", None);
        assert_eq!(client.base_url, "http://localhost:6333");
    }
}
