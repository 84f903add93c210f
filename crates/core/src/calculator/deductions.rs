//! Per-section calculators (FY 2024-25, AY 2025-26 limits).

use rust_decimal::Decimal;

use super::ReasoningResult;
use crate::facts::{FactBase, SENIOR_AGE};
use crate::money::format_inr;

pub const STANDARD_DEDUCTION_LIMIT: i64 = 50_000;
pub const SECTION_80C_LIMIT: i64 = 150_000;
pub const SECTION_80CCD1B_LIMIT: i64 = 50_000;
pub const SECTION_80D_LIMIT: i64 = 25_000;
pub const SECTION_80D_SENIOR_LIMIT: i64 = 50_000;
pub const SECTION_80D_PREVENTIVE_LIMIT: i64 = 5_000;
pub const SECTION_24B_SELF_OCCUPIED_LIMIT: i64 = 200_000;
pub const SECTION_80DD_NORMAL: i64 = 75_000;
pub const SECTION_80DD_SEVERE: i64 = 125_000;
pub const SECTION_80TTA_LIMIT: i64 = 10_000;
pub const SECTION_80TTB_LIMIT: i64 = 50_000;

fn inr(v: i64) -> String {
    format_inr(Decimal::from(v))
}

pub(super) fn standard(facts: &FactBase) -> ReasoningResult {
    let salary = facts.decimal("salary");
    let amount = salary.min(Decimal::from(STANDARD_DEDUCTION_LIMIT));
    ReasoningResult::computed(
        amount,
        format!(
            "The standard deduction is {} or the salary, whichever is lower. \
             With a salary of {}, the standard deduction is {}.",
            inr(STANDARD_DEDUCTION_LIMIT),
            format_inr(salary),
            format_inr(amount)
        ),
        &["Section 16(ia)"],
    )
}

pub(super) fn section_80c(facts: &FactBase) -> ReasoningResult {
    let invested = facts.decimal("investments.80C_investments");
    let amount = invested.min(Decimal::from(SECTION_80C_LIMIT));
    ReasoningResult::computed(
        amount,
        format!(
            "Investments under Section 80C (EPF, PPF, ELSS, life insurance premium, home loan principal) \
             are deductible up to {}. Reported 80C investments are {}, so the deductible amount is {}.",
            inr(SECTION_80C_LIMIT),
            format_inr(invested),
            format_inr(amount)
        ),
        &["Section 80C"],
    )
}

/// One 80D bucket (self/family or parents).
struct HealthBucket {
    limit: Decimal,
    total: Decimal,
    /// Medical spend this bucket did not absorb.
    medical_left: Decimal,
}

fn health_bucket(premium: Decimal, medical: Decimal, age: u32) -> HealthBucket {
    let senior = age >= SENIOR_AGE;
    let limit = Decimal::from(if senior {
        SECTION_80D_SENIOR_LIMIT
    } else {
        SECTION_80D_LIMIT
    });
    let premium_part = premium.min(limit);
    let room = limit - premium_part;
    let medical_part = if senior {
        medical.min(room)
    } else {
        medical
            .min(Decimal::from(SECTION_80D_PREVENTIVE_LIMIT))
            .min(room)
    };
    HealthBucket {
        limit,
        total: (premium_part + medical_part).min(limit),
        medical_left: medical - medical_part,
    }
}

pub(super) fn section_80d(facts: &FactBase) -> ReasoningResult {
    let own = health_bucket(
        facts.decimal("health_insurance_premium"),
        facts.decimal("medical_expenses"),
        facts.age("age_self"),
    );
    let parents = health_bucket(
        facts.decimal("parents_health_insurance_premium"),
        own.medical_left + facts.decimal("parents_medical_expenses"),
        facts.age("parents_age"),
    );

    let mut parts = Vec::new();
    if own.total > Decimal::ZERO {
        parts.push(format!(
            "Health insurance premium and medical expenses for self/family: {} (max {})",
            format_inr(own.total),
            format_inr(own.limit)
        ));
    }
    if parents.total > Decimal::ZERO {
        parts.push(format!(
            "Health insurance premium and medical expenses for parents: {} (max {})",
            format_inr(parents.total),
            format_inr(parents.limit)
        ));
    }
    let summary = if parts.is_empty() {
        "No deduction under Section 80D.".to_string()
    } else {
        format!("{}.", parts.join(". "))
    };
    ReasoningResult::computed(own.total + parents.total, summary, &["Section 80D"])
}

pub(super) fn section_24b(facts: &FactBase) -> ReasoningResult {
    let interest = facts.decimal("housing_loan_interest");
    let status = facts.category("property_status");
    match status.as_deref() {
        Some("self_occupied") => {
            let amount = interest.min(Decimal::from(SECTION_24B_SELF_OCCUPIED_LIMIT));
            ReasoningResult::computed(
                amount,
                format!(
                    "For a self-occupied property, housing loan interest ({}) is deductible up to {}. \
                     The deductible amount is {}.",
                    format_inr(interest),
                    inr(SECTION_24B_SELF_OCCUPIED_LIMIT),
                    format_inr(amount)
                ),
                &["Section 24(b)"],
            )
        }
        Some(s @ ("let_out" | "deemed_let_out")) => ReasoningResult::computed(
            interest,
            format!(
                "For a {} property, the entire housing loan interest ({}) is deductible under Section 24(b).",
                s.replace('_', " "),
                format_inr(interest)
            ),
            &["Section 24(b)"],
        ),
        _ => ReasoningResult::computed(
            Decimal::ZERO,
            "Property status not specified or not recognised, so no deduction under Section 24(b).",
            &["Section 24(b)"],
        ),
    }
}

/// Donations pass through in full. Cash-payment limits and the 10% of
/// adjusted gross total income cap are not applied; the summary says so.
pub(super) fn section_80g(facts: &FactBase) -> ReasoningResult {
    let donated = facts.decimal("donation_amount");
    if donated <= Decimal::ZERO {
        return ReasoningResult::computed(
            Decimal::ZERO,
            "No deduction under Section 80G.",
            &["Section 80G"],
        );
    }
    ReasoningResult::computed(
        donated,
        format!(
            "Donated {}. This assumes a qualifying institution and a non-cash payment (cash above ₹2,000 \
             is not deductible), so the full amount is potentially deductible. Simplified: some 80G donations \
             are limited to 10% of adjusted gross total income, which is not applied here.",
            format_inr(donated)
        ),
        &["Section 80G", "Section 80G(4)", "Section 80G(5)"],
    )
}

pub(super) fn section_80ccd1b(facts: &FactBase) -> ReasoningResult {
    let contributed = facts.decimal("investments.nps_contribution");
    let amount = contributed.min(Decimal::from(SECTION_80CCD1B_LIMIT));
    ReasoningResult::computed(
        amount,
        format!(
            "Own NPS contributions are deductible under Section 80CCD(1B) up to {}, in addition to \
             Section 80C. Reported contribution is {}, so the deductible amount is {}.",
            inr(SECTION_80CCD1B_LIMIT),
            format_inr(contributed),
            format_inr(amount)
        ),
        &["Section 80CCD(1B)"],
    )
}

pub(super) fn section_80e(facts: &FactBase) -> ReasoningResult {
    let interest = facts.decimal("education_loan_interest");
    ReasoningResult::computed(
        interest,
        format!(
            "Education loan interest ({}) is fully deductible under Section 80E for up to 8 \
             consecutive assessment years. The deductible amount is {}.",
            format_inr(interest),
            format_inr(interest)
        ),
        &["Section 80E"],
    )
}

pub(super) fn section_80dd(facts: &FactBase) -> ReasoningResult {
    if facts.flag("disability_details.is_disabled") != Some(true) {
        return ReasoningResult::computed(
            Decimal::ZERO,
            "No deduction under Section 80DD: no dependant with a disability is indicated.",
            &["Section 80DD"],
        );
    }
    match facts.category("disability_details.type").as_deref() {
        Some("normal_disability") => ReasoningResult::computed(
            Decimal::from(SECTION_80DD_NORMAL),
            format!(
                "Deduction for a dependant with normal disability (40% or more, below 80%) is {}.",
                inr(SECTION_80DD_NORMAL)
            ),
            &["Section 80DD", "Section 80DD(1)"],
        ),
        Some("severe_disability") => ReasoningResult::computed(
            Decimal::from(SECTION_80DD_SEVERE),
            format!(
                "Deduction for a dependant with severe disability (80% or more) is {}.",
                inr(SECTION_80DD_SEVERE)
            ),
            &["Section 80DD", "Section 80DD(2)"],
        ),
        _ => ReasoningResult::computed(
            Decimal::ZERO,
            "Disability type not specified or not recognised for Section 80DD.",
            &["Section 80DD"],
        ),
    }
}

pub(super) fn section_80tta(facts: &FactBase) -> ReasoningResult {
    if facts.age("age_self") >= SENIOR_AGE {
        return ReasoningResult::computed(
            Decimal::ZERO,
            "Section 80TTA does not apply to senior citizens; see Section 80TTB.",
            &["Section 80TTA"],
        );
    }
    let interest = facts.decimal("other_income.interest_from_savings");
    let amount = interest.min(Decimal::from(SECTION_80TTA_LIMIT));
    ReasoningResult::computed(
        amount,
        format!(
            "Savings account interest ({}) is deductible under Section 80TTA up to {} for \
             individuals below 60. The deductible amount is {}.",
            format_inr(interest),
            inr(SECTION_80TTA_LIMIT),
            format_inr(amount)
        ),
        &["Section 80TTA"],
    )
}

pub(super) fn section_80ttb(facts: &FactBase) -> ReasoningResult {
    if facts.age("age_self") < SENIOR_AGE {
        return ReasoningResult::computed(
            Decimal::ZERO,
            "Section 80TTB applies only to senior citizens; see Section 80TTA.",
            &["Section 80TTB"],
        );
    }
    let interest = facts.decimal("other_income.interest_from_savings")
        + facts.decimal("other_income.fixed_deposit_interest");
    let amount = interest.min(Decimal::from(SECTION_80TTB_LIMIT));
    ReasoningResult::computed(
        amount,
        format!(
            "As a senior citizen, deposit interest ({}) is deductible under Section 80TTB up to {}. \
             The deductible amount is {}.",
            format_inr(interest),
            inr(SECTION_80TTB_LIMIT),
            format_inr(amount)
        ),
        &["Section 80TTB"],
    )
}
