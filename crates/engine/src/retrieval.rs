//! Legal retrieval adapter.
//!
//! For one query: a precision search filtered to the sections and rules the
//! query names (only when it names any), an unfiltered fallback over the
//! same primary collections, and a search of the supporting collections.
//! All searches run concurrently; hits are merged and deduplicated by exact
//! text, first seen wins. A failing search contributes nothing.

use std::collections::HashSet;
use std::sync::{Arc, OnceLock};

use futures::future::join_all;
use regex::Regex;
use tracing::{debug, warn};

use crate::search::{FieldMatch, SearchFilter, SearchHit, SearchService};

/// Statutory text collections.
pub const PRIMARY_COLLECTIONS: [&str; 2] = ["tax_law_chunks", "tax_rules_chunks"];

/// Case law and administrative notifications.
pub const SUPPORTING_COLLECTIONS: [&str; 2] = ["capital_gain_cases", "cbdt_notifications"];

pub const PRECISION_K: usize = 3;
pub const FALLBACK_K: usize = 2;
pub const SUPPORTING_K: usize = 2;

const SECTION_KEY: &str = "metadata.section";
const RULE_KEY: &str = "metadata.rule";

/// Section and rule identifiers named in a query, as corpus tags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LegalReferences {
    pub sections: Vec<String>,
    pub rules: Vec<String>,
}

impl LegalReferences {
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty() && self.rules.is_empty()
    }

    fn section_filter(&self) -> SearchFilter {
        SearchFilter::any_of(self.sections.iter().map(|s| FieldMatch {
            key: SECTION_KEY.to_string(),
            value: s.clone(),
        }))
    }

    fn reference_filter(&self) -> SearchFilter {
        let rules = self.rules.iter().map(|r| FieldMatch {
            key: RULE_KEY.to_string(),
            value: r.clone(),
        });
        let mut filter = self.section_filter();
        filter.should.extend(rules);
        filter
    }
}

/// One reference id with optional parenthesised sub-clauses, e.g. `80CCD(1B)`.
const REFERENCE_ID: &str = r"\d+[a-z]*(?:\([0-9a-z]+\))*";

/// A keyword followed by one id or a list joined by commas, `&`, `and` or `or`.
fn reference_list(keyword: &str) -> Option<Regex> {
    let pattern = format!(
        r"(?i)\b(?:{keyword})\s*({REFERENCE_ID}(?:\s*(?:,|&|\band\b|\bor\b)\s*{REFERENCE_ID})*)"
    );
    Regex::new(&pattern).ok()
}

fn section_pattern() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| reference_list(r"sections?|secs?\.?|u/s")).as_ref()
}

fn rule_pattern() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| reference_list(r"rules?\s")).as_ref()
}

fn id_pattern() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)(\d+[a-z]*)(?:\([0-9a-z]+\))*").ok())
        .as_ref()
}

fn captures(re: Option<&Regex>, text: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let (Some(re), Some(ids)) = (re, id_pattern()) else {
        return out;
    };
    for cap in re.captures_iter(text) {
        let Some(list) = cap.get(1) else {
            continue;
        };
        for id in ids.captures_iter(list.as_str()).filter_map(|c| c.get(1)) {
            let id = id.as_str().to_uppercase();
            if !out.contains(&id) {
                out.push(id);
            }
        }
    }
    out
}

/// Recognise `Section 80C`, `Sec. 80CCD(1B)`, `u/s 24(b)` and `Rule 11DD`,
/// plus lists such as `sections 80C, 80D and 80E`.
///
/// Parenthesised sub-clauses are not part of the corpus tag:
/// `80CCD(1B)` is tagged `80CCD` and `24(b)` is tagged `24`.
pub fn analyze_query(query: &str) -> LegalReferences {
    LegalReferences {
        sections: captures(section_pattern(), query),
        rules: captures(rule_pattern(), query),
    }
}

/// Retrieval over the legal corpus.
#[derive(Clone)]
pub struct RetrievalAdapter {
    search: Arc<dyn SearchService>,
}

struct PlannedSearch {
    collection: &'static str,
    k: usize,
    filter: Option<SearchFilter>,
}

impl RetrievalAdapter {
    pub fn new(search: Arc<dyn SearchService>) -> Self {
        RetrievalAdapter { search }
    }

    /// Passages for `query`, deduplicated, in first-seen order.
    pub async fn retrieve(&self, query: &str) -> Vec<String> {
        let refs = analyze_query(query);
        let plan = plan_searches(&refs);
        debug!(
            query,
            sections = ?refs.sections,
            rules = ?refs.rules,
            searches = plan.len(),
            "retrieving legal passages"
        );

        let results = join_all(plan.iter().map(|s| async move {
            match self
                .search
                .search(s.collection, query, s.k, s.filter.as_ref())
                .await
            {
                Ok(hits) => hits,
                Err(e) => {
                    warn!(collection = s.collection, error = %e, "legal search failed");
                    Vec::new()
                }
            }
        }))
        .await;

        dedupe(results.into_iter().flatten())
    }
}

fn plan_searches(refs: &LegalReferences) -> Vec<PlannedSearch> {
    let mut plan = Vec::new();
    if !refs.is_empty() {
        let filter = refs.reference_filter();
        for collection in PRIMARY_COLLECTIONS {
            plan.push(PlannedSearch {
                collection,
                k: PRECISION_K,
                filter: Some(filter.clone()),
            });
        }
    }
    for collection in PRIMARY_COLLECTIONS {
        plan.push(PlannedSearch {
            collection,
            k: FALLBACK_K,
            filter: None,
        });
    }
    let supporting = (!refs.sections.is_empty()).then(|| refs.section_filter());
    for collection in SUPPORTING_COLLECTIONS {
        plan.push(PlannedSearch {
            collection,
            k: SUPPORTING_K,
            filter: supporting.clone(),
        });
    }
    plan
}

fn dedupe(hits: impl IntoIterator<Item = SearchHit>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for hit in hits {
        if seen.insert(hit.text.clone()) {
            out.push(hit.text);
        }
    }
    out
}
