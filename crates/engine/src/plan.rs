//! Planner: which deductions to consider and which facts each one needs.
//!
//! A plan always covers every known deduction, whether or not its facts
//! are known yet; a deduction left out of the plan could never be asked
//! about. Required fields are restricted to the field catalog.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use taxwise_core::catalog::{self, DEDUCTIONS, FIELDS};
use taxwise_core::{DeductionKind, FactBase};
use tracing::{debug, warn};

use crate::error::{EngineError, GenerationError};
use crate::generator::{generate_json, GenerationRequest, TextGenerator};
use crate::prompts;

/// One candidate deduction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeductionPlanEntry {
    pub eligibility_criteria: String,
    /// Dotted fact paths, in asking order, without duplicates.
    pub required_fields: Vec<String>,
    pub query: String,
}

/// The per-session plan, keyed by deduction in report order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeductionPlan {
    pub entries: BTreeMap<DeductionKind, DeductionPlanEntry>,
}

impl DeductionPlan {
    /// The default plan: every catalog deduction with its catalog fields.
    pub fn from_catalog() -> Self {
        let entries = DEDUCTIONS
            .iter()
            .map(|spec| {
                (
                    spec.kind(),
                    DeductionPlanEntry {
                        eligibility_criteria: spec.eligibility.to_string(),
                        required_fields: spec.required_fields.iter().map(|f| f.to_string()).collect(),
                        query: spec.query.to_string(),
                    },
                )
            })
            .collect();
        DeductionPlan { entries }
    }

    pub fn get(&self, kind: &DeductionKind) -> Option<&DeductionPlanEntry> {
        self.entries.get(kind)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&DeductionKind, &DeductionPlanEntry)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
pub trait Planner: Send + Sync {
    async fn plan(&self, facts: &FactBase) -> Result<DeductionPlan, EngineError>;
}

/// Deterministic planner that always returns the catalog plan.
#[derive(Debug, Clone, Copy, Default)]
pub struct CatalogPlanner;

#[async_trait]
impl Planner for CatalogPlanner {
    async fn plan(&self, _facts: &FactBase) -> Result<DeductionPlan, EngineError> {
        Ok(DeductionPlan::from_catalog())
    }
}

/// Planner that lets a generator classify the taxpayer's deductions.
///
/// The generated plan is normalised against the catalogs: unknown field
/// paths are dropped, catalog fields a known deduction needs are added
/// back, and known deductions the generator skipped are filled in from the
/// catalog plan. Output that is not a usable plan falls back to the
/// catalog plan.
pub struct GenerativePlanner {
    generator: Arc<dyn TextGenerator>,
}

impl GenerativePlanner {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        GenerativePlanner { generator }
    }

    fn request(facts: &FactBase) -> GenerationRequest {
        let keys: Vec<&str> = DEDUCTIONS.iter().map(|d| d.key).collect();
        let paths: Vec<&str> = FIELDS.iter().map(|f| f.path).collect();
        let facts_json =
            serde_json::to_string_pretty(&facts.to_json()).unwrap_or_else(|_| "{}".to_string());
        GenerationRequest::json(
            prompts::plan_system(),
            prompts::plan_user(&facts_json, &keys, &paths),
            plan_schema(),
        )
    }
}

#[async_trait]
impl Planner for GenerativePlanner {
    async fn plan(&self, facts: &FactBase) -> Result<DeductionPlan, EngineError> {
        let value = match generate_json(self.generator.as_ref(), Self::request(facts)).await {
            Ok(value) => value,
            Err(GenerationError::Malformed { reason, .. }) => {
                warn!(%reason, "plan output is not JSON, using catalog plan");
                return Ok(DeductionPlan::from_catalog());
            }
            Err(e) => return Err(e.into()),
        };
        match normalise_plan(&value) {
            Some(plan) => Ok(plan),
            None => {
                warn!("plan output has the wrong shape, using catalog plan");
                Ok(DeductionPlan::from_catalog())
            }
        }
    }
}

/// JSON Schema for a generated plan.
pub fn plan_schema() -> Value {
    json!({
        "type": "object",
        "additionalProperties": {
            "type": "object",
            "properties": {
                "eligibility_criteria": { "type": "string" },
                "required_fields": { "type": "array", "items": { "type": "string" } },
                "query": { "type": "string" }
            },
            "required": ["eligibility_criteria", "required_fields", "query"]
        }
    })
}

/// Reconcile generated plan JSON with the catalogs. `None` if `value` is
/// not an object of entries.
fn normalise_plan(value: &Value) -> Option<DeductionPlan> {
    let object = value.as_object()?;
    let mut entries = BTreeMap::new();

    for (key, raw) in object {
        let kind = DeductionKind::parse(key);
        let entry = raw.as_object()?;
        let text = |name: &str| entry.get(name).and_then(Value::as_str).map(str::to_string);
        let spec = catalog::deduction(key);

        let mut required_fields: Vec<String> = Vec::new();
        for path in entry
            .get("required_fields")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(Value::as_str)
        {
            if catalog::field(path).is_none() {
                warn!(deduction = %kind, field = path, "dropping field outside the catalog");
                continue;
            }
            if !required_fields.iter().any(|f| f == path) {
                required_fields.push(path.to_string());
            }
        }
        if let Some(spec) = spec {
            for path in spec.required_fields {
                if !required_fields.iter().any(|f| f == path) {
                    required_fields.push(path.to_string());
                }
            }
        }

        entries.insert(
            kind,
            DeductionPlanEntry {
                eligibility_criteria: text("eligibility_criteria")
                    .or_else(|| spec.map(|s| s.eligibility.to_string()))
                    .unwrap_or_default(),
                required_fields,
                query: text("query")
                    .or_else(|| spec.map(|s| s.query.to_string()))
                    .unwrap_or_else(|| key.replace('_', " ")),
            },
        );
    }

    let catalog_plan = DeductionPlan::from_catalog();
    for (kind, entry) in catalog_plan.entries {
        if !entries.contains_key(&kind) {
            debug!(deduction = %kind, "plan omitted a known deduction, adding it");
            entries.insert(kind, entry);
        }
    }
    Some(DeductionPlan { entries })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_plan_covers_every_known_deduction() {
        let plan = DeductionPlan::from_catalog();
        assert_eq!(plan.len(), DeductionKind::KNOWN.len());
        for kind in DeductionKind::KNOWN.iter() {
            assert!(plan.get(kind).is_some(), "missing {kind}");
        }
        let d = plan.get(&DeductionKind::Section80D).unwrap();
        assert_eq!(
            d.required_fields,
            vec![
                "age_self",
                "health_insurance_premium",
                "parents_age",
                "parents_health_insurance_premium"
            ]
        );
    }

    #[test]
    fn plan_serialises_by_deduction_key() {
        let plan = DeductionPlan::from_catalog();
        let value = serde_json::to_value(&plan).unwrap();
        assert!(value.get("section_80CCD1B_deduction").is_some());
        let back: DeductionPlan = serde_json::from_value(value).unwrap();
        assert_eq!(back, plan);
    }

    #[test]
    fn normalise_drops_unknown_fields_and_backfills() {
        let value = json!({
            "section_80C_deduction": {
                "eligibility_criteria": "LIC, PPF, ELSS",
                "required_fields": ["investments.80C_investments", "favourite_colour"],
                "query": "Section 80C limit"
            },
            "section_80U_deduction": {
                "eligibility_criteria": "Taxpayer with a disability",
                "required_fields": ["disability_details.is_disabled"],
                "query": "Section 80U"
            }
        });
        let plan = normalise_plan(&value).unwrap();
        let c = plan.get(&DeductionKind::Section80C).unwrap();
        assert_eq!(c.required_fields, vec!["investments.80C_investments"]);
        assert_eq!(c.eligibility_criteria, "LIC, PPF, ELSS");

        let other = DeductionKind::Other("section_80U_deduction".into());
        assert!(plan.get(&other).is_some());
        assert_eq!(plan.len(), DeductionKind::KNOWN.len() + 1);
    }

    #[test]
    fn normalise_restores_catalog_fields_for_known_deductions() {
        let value = json!({
            "section_80D_deduction": {
                "eligibility_criteria": "Health insurance",
                "required_fields": ["health_insurance_premium"],
                "query": "80D"
            }
        });
        let plan = normalise_plan(&value).unwrap();
        let d = plan.get(&DeductionKind::Section80D).unwrap();
        assert_eq!(d.required_fields[0], "health_insurance_premium");
        assert!(d.required_fields.contains(&"parents_age".to_string()));
        assert_eq!(d.required_fields.len(), 4);
    }

    #[test]
    fn normalise_rejects_non_object() {
        assert!(normalise_plan(&json!(["standard_deduction"])).is_none());
        assert!(normalise_plan(&json!({ "standard_deduction": "yes" })).is_none());
    }
}
