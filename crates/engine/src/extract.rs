//! Free-text fact extraction.
//!
//! A reply is turned into a [`FactPatch`] by a structured generation call,
//! validated against [`patch_schema`], then merged into the fact base.
//! `None` in a patch means "not mentioned"; it never overwrites a fact.
//! An explicit zero is a value like any other.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use taxwise_core::{CoreError, FactBase};
use tracing::debug;

use crate::error::{ExtractionError, GenerationError};
use crate::generator::{strip_code_fences, GenerationRequest, TextGenerator};
use crate::prompts;

/// Structured facts read from one reply.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FactPatch {
    pub user_age: Option<u32>,
    pub parents_age: Option<Vec<u32>>,
    pub health_insurance_premium: Option<u64>,
    pub medical_expenses: Option<u64>,
    pub parents_health_insurance_premium: Option<u64>,
    pub parents_medical_expenses: Option<u64>,
    pub housing_loan_interest: Option<u64>,
    pub property_status: Option<String>,
    #[serde(rename = "investments_80C")]
    pub investments_80c: Option<u64>,
    pub nps_contribution: Option<u64>,
    pub education_loan_interest: Option<u64>,
    pub donation_amount: Option<u64>,
    pub interest_from_deposits: Option<u64>,
    pub interest_from_savings: Option<u64>,
    pub is_disabled: Option<bool>,
    pub disability_type: Option<String>,
    pub salary: Option<u64>,
    pub tax_regime: Option<String>,
    pub residential_status: Option<String>,
    pub filing_status: Option<String>,
    pub employment_status: Option<String>,
}

impl FactPatch {
    /// `(fact path, value)` for every field the reply stated.
    pub fn assignments(&self) -> Vec<(&'static str, Value)> {
        let mut out: Vec<(&'static str, Value)> = Vec::new();
        let mut put = |path: &'static str, value: Option<Value>| {
            if let Some(v) = value {
                out.push((path, v));
            }
        };
        let money = |v: Option<u64>| v.map(Value::from);
        let text = |v: &Option<String>| {
            v.as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(Value::from)
        };

        put("age_self", self.user_age.map(Value::from));
        // Several parents collapse to the eldest; no ages at all is unknown.
        put(
            "parents_age",
            self.parents_age
                .as_ref()
                .and_then(|ages| ages.iter().max().copied())
                .map(Value::from),
        );
        put("health_insurance_premium", money(self.health_insurance_premium));
        put("medical_expenses", money(self.medical_expenses));
        put(
            "parents_health_insurance_premium",
            money(self.parents_health_insurance_premium),
        );
        put("parents_medical_expenses", money(self.parents_medical_expenses));
        put("housing_loan_interest", money(self.housing_loan_interest));
        put("property_status", text(&self.property_status));
        put("investments.80C_investments", money(self.investments_80c));
        put("investments.nps_contribution", money(self.nps_contribution));
        put("education_loan_interest", money(self.education_loan_interest));
        put("donation_amount", money(self.donation_amount));
        put(
            "other_income.fixed_deposit_interest",
            money(self.interest_from_deposits),
        );
        put(
            "other_income.interest_from_savings",
            money(self.interest_from_savings),
        );
        put("disability_details.is_disabled", self.is_disabled.map(Value::Bool));
        put("disability_details.type", text(&self.disability_type));
        put("salary", money(self.salary));
        put("tax_regime", text(&self.tax_regime));
        put("residential_status", text(&self.residential_status));
        put("filing_status", text(&self.filing_status));
        put("employment_status", text(&self.employment_status));
        out
    }

    pub fn is_empty(&self) -> bool {
        self.assignments().is_empty()
    }

    /// Overwrite every stated fact, then refresh derived flags. Returns the
    /// paths written.
    pub fn apply(&self, facts: &mut FactBase) -> Result<Vec<String>, CoreError> {
        let mut written = Vec::new();
        for (path, value) in self.assignments() {
            facts.set(path, value)?;
            written.push(path.to_string());
        }
        facts.refresh_derived();
        Ok(written)
    }
}

/// JSON Schema every extraction output must satisfy.
pub fn patch_schema() -> Value {
    let amount = json!({ "type": ["integer", "null"], "minimum": 0 });
    let age = json!({ "type": ["integer", "null"], "minimum": 0, "maximum": 130 });
    let text = json!({ "type": ["string", "null"] });
    json!({
        "type": "object",
        "additionalProperties": false,
        "properties": {
            "user_age": age,
            "parents_age": {
                "type": ["array", "null"],
                "items": { "type": "integer", "minimum": 0, "maximum": 130 }
            },
            "health_insurance_premium": amount,
            "medical_expenses": amount,
            "parents_health_insurance_premium": amount,
            "parents_medical_expenses": amount,
            "housing_loan_interest": amount,
            "property_status": {
                "enum": ["self_occupied", "let_out", "deemed_let_out", null]
            },
            "investments_80C": amount,
            "nps_contribution": amount,
            "education_loan_interest": amount,
            "donation_amount": amount,
            "interest_from_deposits": amount,
            "interest_from_savings": amount,
            "is_disabled": { "type": ["boolean", "null"] },
            "disability_type": {
                "enum": ["normal_disability", "severe_disability", null]
            },
            "salary": amount,
            "tax_regime": { "enum": ["old", "new", null] },
            "residential_status": text,
            "filing_status": text,
            "employment_status": text
        }
    })
}

const ENUM_FIELDS: [&str; 3] = ["property_status", "disability_type", "tax_regime"];

/// Parse and validate raw extraction output.
pub fn parse_patch(raw: &str) -> Result<FactPatch, ExtractionError> {
    let mut doc: Value =
        serde_json::from_str(strip_code_fences(raw)).map_err(|_| ExtractionError::Malformed {
            raw: raw.to_string(),
        })?;

    // Enumerations are matched case-insensitively.
    if let Some(object) = doc.as_object_mut() {
        for key in ENUM_FIELDS {
            if let Some(Value::String(s)) = object.get_mut(key) {
                *s = s.trim().to_lowercase();
            }
        }
    }

    let validator = jsonschema::validator_for(&patch_schema()).map_err(|e| {
        ExtractionError::Invalid {
            errors: vec![format!("failed to compile fact schema: {e}")],
        }
    })?;
    let errors: Vec<String> = validator.iter_errors(&doc).map(|e| format!("{}", e)).collect();
    if !errors.is_empty() {
        return Err(ExtractionError::Invalid { errors });
    }

    serde_json::from_value(doc).map_err(|e| ExtractionError::Invalid {
        errors: vec![e.to_string()],
    })
}

/// Reply-to-patch extraction through a generator.
pub struct Extractor {
    generator: Arc<dyn TextGenerator>,
}

impl Extractor {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Extractor { generator }
    }

    /// Extract a patch from `reply`, given the questions it answers.
    pub async fn extract(
        &self,
        questions: &[String],
        reply: &str,
    ) -> Result<FactPatch, ExtractionError> {
        let request = GenerationRequest::json(
            prompts::EXTRACTION_SYSTEM,
            prompts::extraction_user(questions, reply),
            patch_schema(),
        );
        let raw = match self.generator.generate(request).await {
            Ok(raw) => raw,
            Err(GenerationError::Malformed { raw, .. }) => {
                return Err(ExtractionError::Malformed { raw })
            }
            Err(e) => return Err(e.into()),
        };
        let patch = parse_patch(&raw)?;
        debug!(fields = patch.assignments().len(), "extracted fact patch");
        Ok(patch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_patch_parses() {
        let patch = parse_patch(
            r#"{"user_age": 42, "investments_80C": 120000, "property_status": "Self_Occupied",
                "parents_age": null, "donation_amount": 0}"#,
        )
        .unwrap();
        assert_eq!(patch.user_age, Some(42));
        assert_eq!(patch.investments_80c, Some(120000));
        assert_eq!(patch.property_status.as_deref(), Some("self_occupied"));
        assert_eq!(patch.parents_age, None);
        assert_eq!(patch.donation_amount, Some(0));
    }

    #[test]
    fn unknown_key_is_rejected() {
        let err = parse_patch(r#"{"shoe_size": 9}"#).unwrap_err();
        assert!(matches!(err, ExtractionError::Invalid { .. }));
    }

    #[test]
    fn negative_amount_is_rejected() {
        let err = parse_patch(r#"{"salary": -5}"#).unwrap_err();
        assert!(matches!(err, ExtractionError::Invalid { .. }));
    }

    #[test]
    fn out_of_range_age_is_rejected() {
        assert!(parse_patch(r#"{"user_age": 200}"#).is_err());
        assert!(parse_patch(r#"{"parents_age": [60, 131]}"#).is_err());
    }

    #[test]
    fn bad_enum_is_rejected() {
        let err = parse_patch(r#"{"disability_type": "mild"}"#).unwrap_err();
        assert!(matches!(err, ExtractionError::Invalid { .. }));
    }

    #[test]
    fn prose_is_malformed() {
        let err = parse_patch("Sorry, I could not find any facts.").unwrap_err();
        assert!(matches!(err, ExtractionError::Malformed { .. }));
    }

    #[test]
    fn all_null_patch_is_empty() {
        let patch = parse_patch(r#"{"salary": null, "is_disabled": null}"#).unwrap();
        assert!(patch.is_empty());
    }

    #[test]
    fn apply_maps_paths_and_takes_eldest_parent() {
        let patch = FactPatch {
            user_age: Some(61),
            parents_age: Some(vec![82, 79]),
            investments_80c: Some(90000),
            interest_from_deposits: Some(40000),
            is_disabled: Some(false),
            ..FactPatch::default()
        };
        let mut facts = FactBase::new();
        let written = patch.apply(&mut facts).unwrap();
        assert_eq!(written.len(), 5);
        assert_eq!(facts.age("age_self"), 61);
        assert_eq!(facts.age("parents_age"), 82);
        assert_eq!(facts.get("is_senior_citizen"), Some(&Value::Bool(true)));
        assert_eq!(facts.get("investments.80C_investments"), Some(&json!(90000)));
        assert_eq!(
            facts.get("other_income.fixed_deposit_interest"),
            Some(&json!(40000))
        );
        assert_eq!(facts.flag("disability_details.is_disabled"), Some(false));
    }

    #[test]
    fn apply_keeps_unmentioned_facts() {
        let mut facts = FactBase::from_json(json!({ "salary": 900000, "age_self": 30 })).unwrap();
        let patch = FactPatch {
            salary: Some(950000),
            parents_age: Some(vec![]),
            ..FactPatch::default()
        };
        patch.apply(&mut facts).unwrap();
        assert_eq!(facts.get("salary"), Some(&json!(950000)));
        assert_eq!(facts.age("age_self"), 30);
        assert!(!facts.contains("parents_age"));
    }

    #[test]
    fn disability_type_is_never_defaulted() {
        let patch = FactPatch {
            is_disabled: Some(true),
            ..FactPatch::default()
        };
        let mut facts = FactBase::new();
        patch.apply(&mut facts).unwrap();
        assert!(!facts.contains("disability_details.type"));
    }
}
