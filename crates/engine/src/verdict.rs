//! Aggregation and the final report.
//!
//! The verdict is a pure function of the reasoning results and the facts;
//! rendering it twice gives the same text.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use taxwise_core::{
    first_integer, format_inr_fixed, gross_income, tax_liability, DeductionKind, FactBase,
    ReasoningResult, TaxComputation, FINANCIAL_YEAR,
};

const DISCLAIMER: &str = "*This is an estimate based on the information provided. \
Please consult a qualified tax professional before filing.*";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub lines: BTreeMap<DeductionKind, ReasoningResult>,
    pub gross_income: Decimal,
    pub total_deductions: Decimal,
    pub total_taxable_income: Decimal,
    pub tax_liability: TaxComputation,
    /// Citations per deduction, rendered.
    pub legal_basis: String,
    /// The full markdown report.
    pub report: String,
}

/// Sum of the positive leading integers of every non-`N/A` amount.
///
/// A free-text range such as `"₹40,000 - ₹75,000"` counts its first figure.
pub fn total_deductions(results: &BTreeMap<DeductionKind, ReasoningResult>) -> Decimal {
    results
        .values()
        .filter(|r| !r.is_not_applicable())
        .filter_map(|r| first_integer(&r.amount))
        .filter(|amount| *amount > Decimal::ZERO)
        .sum()
}

pub fn compose_verdict(
    results: BTreeMap<DeductionKind, ReasoningResult>,
    facts: &FactBase,
) -> Verdict {
    let gross = gross_income(facts);
    let total = total_deductions(&results);
    let taxable = (gross - total).max(Decimal::ZERO);
    let liability = tax_liability(facts, taxable);
    let legal_basis = render_legal_basis(&results);
    let report = render_report(&results, total, taxable, &liability, &legal_basis);
    Verdict {
        lines: results,
        gross_income: gross,
        total_deductions: total,
        total_taxable_income: taxable,
        tax_liability: liability,
        legal_basis,
        report,
    }
}

fn render_legal_basis(results: &BTreeMap<DeductionKind, ReasoningResult>) -> String {
    let mut out = String::new();
    for (kind, result) in results {
        let _ = writeln!(out, "### {}", kind.display_name());
        if result.citations.is_empty() {
            out.push_str("No specific citations available.\n");
        } else {
            for citation in &result.citations {
                let _ = writeln!(out, "- {citation}");
            }
        }
        out.push('\n');
    }
    out.trim_end().to_string()
}

fn render_report(
    results: &BTreeMap<DeductionKind, ReasoningResult>,
    total: Decimal,
    taxable: Decimal,
    liability: &TaxComputation,
    legal_basis: &str,
) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# Tax Deduction Report ({FINANCIAL_YEAR})\n");
    out.push_str("## Deduction Summary\n\n");
    for (kind, result) in results {
        let _ = writeln!(
            out,
            "- **{}**: {} ({})",
            kind.display_name(),
            result.amount,
            result.summary
        );
    }
    let _ = writeln!(
        out,
        "\n**Estimated Total Deductions**: {}",
        format_inr_fixed(total)
    );
    let _ = writeln!(
        out,
        "**Estimated Taxable Income**: {}",
        format_inr_fixed(taxable)
    );
    let _ = writeln!(
        out,
        "**Estimated Tax Liability**: {} (slab tax {}, rebate {}, cess {})",
        format_inr_fixed(liability.total),
        format_inr_fixed(liability.slab_tax),
        format_inr_fixed(liability.rebate),
        format_inr_fixed(liability.cess),
    );
    let _ = writeln!(out, "\n## Legal Basis\n\n{legal_basis}\n");
    out.push_str(DISCLAIMER);
    out.push('\n');
    out
}
