//! Legal-corpus search collaborator.
//!
//! The corpus is a set of named collections of text passages, each passage
//! tagged with metadata (`metadata.section`, `metadata.rule`). A search is
//! a semantic query against one collection with an optional filter.

#[cfg(feature = "http-search")]
mod http;

#[cfg(feature = "http-search")]
pub use http::HttpSearchClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::SearchError;

/// One passage returned by a search, with its relevance score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub text: String,
    pub score: f32,
}

/// Exact match on one metadata key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMatch {
    pub key: String,
    pub value: String,
}

/// A disjunction of exact metadata matches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchFilter {
    pub should: Vec<FieldMatch>,
}

impl SearchFilter {
    pub fn any_of(matches: impl IntoIterator<Item = FieldMatch>) -> Self {
        SearchFilter {
            should: matches.into_iter().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.should.is_empty()
    }

    /// Wire form: `{"should": [{"key": .., "match": {"value": ..}}]}`.
    pub fn to_json(&self) -> Value {
        let should: Vec<Value> = self
            .should
            .iter()
            .map(|m| json!({ "key": m.key, "match": { "value": m.value } }))
            .collect();
        json!({ "should": should })
    }
}

#[async_trait]
pub trait SearchService: Send + Sync {
    /// Top `k` passages from `collection` for `query`, best first.
    async fn search(
        &self,
        collection: &str,
        query: &str,
        k: usize,
        filter: Option<&SearchFilter>,
    ) -> Result<Vec<SearchHit>, SearchError>;
}
