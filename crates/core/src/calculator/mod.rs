//! Deterministic deduction calculator.
//!
//! Every function here is a pure function of a [`FactBase`]: no I/O, no
//! shared state. Absent numeric facts read as zero and absent categorical
//! facts as "unknown", so a calculator never fails; it reports the
//! arithmetic it did in the summary instead.
//!
//! Dispatch from a [`DeductionKind`] to its function is a static table
//! (`calculator_for`). `DeductionKind::Other` has no entry and is left to
//! retrieval-backed reasoning.

mod deductions;
mod liability;

pub use liability::{compute_tax, AgeBand, Bracket, BracketTable, Regime, TaxComputation, CESS_RATE};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::catalog::{readable_name, DeductionKind};
use crate::facts::{value_to_decimal, FactBase};
use crate::money::format_inr;

/// Amount marker for a deduction that could not be reasoned about yet.
pub const NOT_APPLICABLE: &str = "N/A";

/// Amount marker for an inference response that could not be parsed.
pub const ERROR_AMOUNT: &str = "Error";

/// Uniform per-deduction outcome, whichever path produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReasoningResult {
    /// Formatted rupee amount, a free-text range, `"N/A"` or `"Error"`.
    pub amount: String,
    pub summary: String,
    pub citations: Vec<String>,
}

impl ReasoningResult {
    pub fn computed(amount: Decimal, summary: impl Into<String>, citations: &[&str]) -> Self {
        ReasoningResult {
            amount: format_inr(amount),
            summary: summary.into(),
            citations: citations.iter().map(|c| c.to_string()).collect(),
        }
    }

    /// Result for a deduction whose required facts are still missing.
    pub fn not_applicable(missing: &[String], eligibility: &str) -> Self {
        let names: Vec<&str> = missing.iter().map(|p| readable_name(p)).collect();
        ReasoningResult {
            amount: NOT_APPLICABLE.to_string(),
            summary: format!("Missing required data: {}", names.join(", ")),
            citations: vec![eligibility.to_string()],
        }
    }

    /// Result for an inference response that was not well-formed.
    pub fn parse_error(raw: &str) -> Self {
        ReasoningResult {
            amount: ERROR_AMOUNT.to_string(),
            summary: format!("Failed to parse legal reasoning response: {raw}"),
            citations: Vec::new(),
        }
    }

    pub fn is_not_applicable(&self) -> bool {
        self.amount == NOT_APPLICABLE
    }
}

/// Signature shared by every closed-form calculator.
pub type CalcFn = fn(&FactBase) -> ReasoningResult;

/// The calculator for a deduction kind, if it has one.
pub fn calculator_for(kind: &DeductionKind) -> Option<CalcFn> {
    let calc: CalcFn = match kind {
        DeductionKind::Standard => deductions::standard,
        DeductionKind::Section80C => deductions::section_80c,
        DeductionKind::Section80D => deductions::section_80d,
        DeductionKind::Section24B => deductions::section_24b,
        DeductionKind::Section80G => deductions::section_80g,
        DeductionKind::Section80CCD1B => deductions::section_80ccd1b,
        DeductionKind::Section80E => deductions::section_80e,
        DeductionKind::Section80DD => deductions::section_80dd,
        DeductionKind::Section80TTA => deductions::section_80tta,
        DeductionKind::Section80TTB => deductions::section_80ttb,
        DeductionKind::Other(_) => return None,
    };
    Some(calc)
}

/// Gross income: salary plus every numeric leaf under `other_income`.
///
/// Savings and fixed-deposit interest are the documented components;
/// further numeric entries under `other_income` are included as they
/// appear.
pub fn gross_income(facts: &FactBase) -> Decimal {
    let mut total = facts.decimal("salary");
    if let Some(other) = facts.get("other_income").and_then(|v| v.as_object()) {
        total += other
            .values()
            .filter_map(value_to_decimal)
            .filter(|v| !v.is_sign_negative())
            .sum::<Decimal>();
    }
    total
}

/// Tax liability on a taxable income, using the regime and age in `facts`.
pub fn tax_liability(facts: &FactBase, taxable_income: Decimal) -> TaxComputation {
    let regime = Regime::from_facts(facts);
    let band = AgeBand::from_age(facts.age("age_self"));
    compute_tax(taxable_income, regime, band)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn every_known_kind_dispatches() {
        for kind in DeductionKind::KNOWN.iter() {
            assert!(calculator_for(kind).is_some(), "no calculator for {kind}");
        }
        assert!(calculator_for(&DeductionKind::Other("section_80U_deduction".into())).is_none());
    }

    #[test]
    fn gross_income_sums_other_income_leaves() {
        let facts = FactBase::from_json(json!({
            "salary": 800000,
            "other_income": {
                "interest_from_savings": 12000,
                "fixed_deposit_interest": 30000,
                "rental": "₹60,000",
                "note": "ignored"
            }
        }))
        .unwrap();
        assert_eq!(gross_income(&facts), Decimal::from(902_000));
    }

    #[test]
    fn gross_income_without_facts_is_zero() {
        assert_eq!(gross_income(&FactBase::new()), Decimal::ZERO);
    }

    #[test]
    fn not_applicable_lists_readable_names() {
        let result = ReasoningResult::not_applicable(
            &["investments.nps_contribution".to_string(), "salary".to_string()],
            "NPS contribution",
        );
        assert!(result.is_not_applicable());
        assert_eq!(result.summary, "Missing required data: nps_contribution, salary");
        assert_eq!(result.citations, vec!["NPS contribution".to_string()]);
    }
}
