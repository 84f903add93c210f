//! Reasoner: one [`ReasoningResult`] per planned deduction.
//!
//! A deduction with gaps is `N/A`. One with a calculator is computed.
//! Anything else is inferred from retrieved legal passages.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::join_all;
use serde_json::{json, Value};
use taxwise_core::facts::value_to_decimal;
use taxwise_core::{
    calculator_for, format_inr, DeductionKind, FactBase, ReasoningResult, ERROR_AMOUNT,
};
use tracing::{debug, warn};

use crate::gaps::GapReport;
use crate::generator::{strip_code_fences, GenerationRequest, TextGenerator};
use crate::plan::{DeductionPlan, DeductionPlanEntry};
use crate::prompts;
use crate::retrieval::RetrievalAdapter;

/// Marker used as the legal context when retrieval found nothing.
const NO_CONTEXT: &str = "No relevant legal passages were found.";

pub struct Reasoner {
    generator: Arc<dyn TextGenerator>,
    retrieval: RetrievalAdapter,
}

impl Reasoner {
    pub fn new(generator: Arc<dyn TextGenerator>, retrieval: RetrievalAdapter) -> Self {
        Reasoner {
            generator,
            retrieval,
        }
    }

    /// Results for every deduction in `plan`, judged against `gaps`.
    ///
    /// `gaps` must be the report for the current `facts`.
    pub async fn reason(
        &self,
        plan: &DeductionPlan,
        facts: &FactBase,
        gaps: &GapReport,
    ) -> BTreeMap<DeductionKind, ReasoningResult> {
        let mut results = BTreeMap::new();
        let mut inferred: Vec<(&DeductionKind, &DeductionPlanEntry)> = Vec::new();

        for (kind, entry) in plan.iter() {
            let missing = gaps.missing_for(kind);
            if !missing.is_empty() {
                results.insert(
                    kind.clone(),
                    ReasoningResult::not_applicable(missing, &entry.eligibility_criteria),
                );
            } else if let Some(calc) = calculator_for(kind) {
                results.insert(kind.clone(), calc(facts));
            } else {
                inferred.push((kind, entry));
            }
        }

        if inferred.is_empty() {
            return results;
        }

        let contexts = join_all(
            inferred
                .iter()
                .map(|(_, entry)| self.retrieval.retrieve(&entry.query)),
        )
        .await;

        let facts_json =
            serde_json::to_string_pretty(&facts.to_json()).unwrap_or_else(|_| "{}".to_string());
        for ((kind, entry), passages) in inferred.into_iter().zip(contexts) {
            debug!(deduction = %kind, passages = passages.len(), "inferring deduction");
            let result = self.infer(kind, entry, &facts_json, &passages).await;
            results.insert(kind.clone(), result);
        }
        results
    }

    async fn infer(
        &self,
        kind: &DeductionKind,
        entry: &DeductionPlanEntry,
        facts_json: &str,
        passages: &[String],
    ) -> ReasoningResult {
        let context = if passages.is_empty() {
            NO_CONTEXT.to_string()
        } else {
            passages.join("\n\n---\n\n")
        };
        let request = GenerationRequest::json(
            prompts::reason_system(),
            prompts::reason_user(
                &kind.display_name(),
                &entry.eligibility_criteria,
                facts_json,
                &context,
            ),
            inference_schema(),
        );
        match self.generator.generate(request).await {
            Ok(raw) => parse_inference(&raw),
            Err(e) => {
                warn!(deduction = %kind, error = %e, "legal inference failed");
                ReasoningResult {
                    amount: ERROR_AMOUNT.to_string(),
                    summary: format!("Legal reasoning failed: {e}"),
                    citations: Vec::new(),
                }
            }
        }
    }
}

pub fn inference_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "amount": { "type": ["string", "number"] },
            "summary": { "type": "string" },
            "citations": { "type": "array", "items": { "type": "string" } }
        },
        "required": ["amount", "summary", "citations"]
    })
}

/// Parse inference output; anything unusable becomes an `Error` result
/// carrying the raw text.
pub fn parse_inference(raw: &str) -> ReasoningResult {
    let value: Value = match serde_json::from_str(strip_code_fences(raw)) {
        Ok(v) => v,
        Err(_) => return ReasoningResult::parse_error(raw),
    };
    let amount = match value.get("amount") {
        Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
        Some(n @ Value::Number(_)) => match value_to_decimal(n) {
            Some(d) => format_inr(d),
            None => return ReasoningResult::parse_error(raw),
        },
        _ => return ReasoningResult::parse_error(raw),
    };
    let summary = match value.get("summary").and_then(Value::as_str) {
        Some(s) => s.to_string(),
        None => return ReasoningResult::parse_error(raw),
    };
    let citations = value
        .get("citations")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    ReasoningResult {
        amount,
        summary,
        citations,
    }
}
