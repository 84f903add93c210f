//! Closed catalogs: the deduction types and the fact fields the rest of
//! the system understands.
//!
//! Planners may only name fields listed in [`FIELDS`]; the extractor can
//! only fill paths in this catalog, so a plan naming anything else could
//! never be satisfied.

use std::fmt;

use serde::{Deserialize, Serialize};

// ──────────────────────────────────────────────
// Deduction kinds
// ──────────────────────────────────────────────

/// A statutory deduction category.
///
/// Serialized as its plan key (`"section_80C_deduction"`). Unrecognised
/// keys become [`DeductionKind::Other`], which has no closed-form
/// calculator and is reasoned about from retrieved legal text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum DeductionKind {
    Standard,
    Section80C,
    Section80D,
    Section24B,
    Section80G,
    Section80CCD1B,
    Section80E,
    Section80DD,
    Section80TTA,
    Section80TTB,
    Other(String),
}

impl DeductionKind {
    /// Every deduction with a calculator, in report order.
    pub const KNOWN: [DeductionKind; 10] = [
        DeductionKind::Standard,
        DeductionKind::Section80C,
        DeductionKind::Section80D,
        DeductionKind::Section24B,
        DeductionKind::Section80G,
        DeductionKind::Section80CCD1B,
        DeductionKind::Section80E,
        DeductionKind::Section80DD,
        DeductionKind::Section80TTA,
        DeductionKind::Section80TTB,
    ];

    pub fn parse(key: &str) -> Self {
        match key {
            "standard_deduction" => DeductionKind::Standard,
            "section_80C_deduction" => DeductionKind::Section80C,
            "section_80D_deduction" => DeductionKind::Section80D,
            "section_24B_deduction" => DeductionKind::Section24B,
            "section_80G_deduction" => DeductionKind::Section80G,
            "section_80CCD1B_deduction" => DeductionKind::Section80CCD1B,
            "section_80E_deduction" => DeductionKind::Section80E,
            "section_80DD_deduction" => DeductionKind::Section80DD,
            "section_80TTA_deduction" => DeductionKind::Section80TTA,
            "section_80TTB_deduction" => DeductionKind::Section80TTB,
            other => DeductionKind::Other(other.to_string()),
        }
    }

    /// The plan key for this deduction.
    pub fn key(&self) -> &str {
        match self {
            DeductionKind::Standard => "standard_deduction",
            DeductionKind::Section80C => "section_80C_deduction",
            DeductionKind::Section80D => "section_80D_deduction",
            DeductionKind::Section24B => "section_24B_deduction",
            DeductionKind::Section80G => "section_80G_deduction",
            DeductionKind::Section80CCD1B => "section_80CCD1B_deduction",
            DeductionKind::Section80E => "section_80E_deduction",
            DeductionKind::Section80DD => "section_80DD_deduction",
            DeductionKind::Section80TTA => "section_80TTA_deduction",
            DeductionKind::Section80TTB => "section_80TTB_deduction",
            DeductionKind::Other(key) => key,
        }
    }

    /// Human-readable name used in reports.
    pub fn display_name(&self) -> String {
        match self {
            DeductionKind::Standard => "Standard Deduction".to_string(),
            DeductionKind::Section80C => "Section 80C".to_string(),
            DeductionKind::Section80D => "Section 80D".to_string(),
            DeductionKind::Section24B => "Section 24(b)".to_string(),
            DeductionKind::Section80G => "Section 80G".to_string(),
            DeductionKind::Section80CCD1B => "Section 80CCD(1B)".to_string(),
            DeductionKind::Section80E => "Section 80E".to_string(),
            DeductionKind::Section80DD => "Section 80DD".to_string(),
            DeductionKind::Section80TTA => "Section 80TTA".to_string(),
            DeductionKind::Section80TTB => "Section 80TTB".to_string(),
            DeductionKind::Other(key) => key.replace('_', " "),
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, DeductionKind::Other(_))
    }
}

impl fmt::Display for DeductionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl From<String> for DeductionKind {
    fn from(key: String) -> Self {
        DeductionKind::parse(&key)
    }
}

impl From<DeductionKind> for String {
    fn from(kind: DeductionKind) -> Self {
        kind.key().to_string()
    }
}

// ──────────────────────────────────────────────
// Field catalog
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Money,
    Age,
    Flag,
    Category,
}

/// One fact the system knows how to ask for and store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub path: &'static str,
    pub kind: FieldKind,
    /// Fallback question used when question generation is unavailable.
    pub question: &'static str,
}

pub const FIELDS: &[FieldSpec] = &[
    FieldSpec {
        path: "salary",
        kind: FieldKind::Money,
        question: "What is your total annual salary income (in ₹)?",
    },
    FieldSpec {
        path: "tax_regime",
        kind: FieldKind::Category,
        question: "Are you filing under the old tax regime or the new tax regime?",
    },
    FieldSpec {
        path: "age_self",
        kind: FieldKind::Age,
        question: "What is your age in years?",
    },
    FieldSpec {
        path: "parents_age",
        kind: FieldKind::Age,
        question: "What are the ages of your parents?",
    },
    FieldSpec {
        path: "health_insurance_premium",
        kind: FieldKind::Money,
        question: "What health insurance premium did you pay for yourself and your family (not including parents)?",
    },
    FieldSpec {
        path: "parents_health_insurance_premium",
        kind: FieldKind::Money,
        question: "What health insurance premium did you pay for your parents?",
    },
    FieldSpec {
        path: "medical_expenses",
        kind: FieldKind::Money,
        question: "How much did you spend on medical expenses or preventive check-ups for yourself and your family that insurance did not cover?",
    },
    FieldSpec {
        path: "parents_medical_expenses",
        kind: FieldKind::Money,
        question: "How much did you spend on medical expenses for your parents that insurance did not cover?",
    },
    FieldSpec {
        path: "housing_loan_interest",
        kind: FieldKind::Money,
        question: "How much interest did you pay on your housing loan this year?",
    },
    FieldSpec {
        path: "property_status",
        kind: FieldKind::Category,
        question: "Is the property on your housing loan self-occupied, let out, or deemed let out?",
    },
    FieldSpec {
        path: "donation_amount",
        kind: FieldKind::Money,
        question: "How much did you donate to qualifying charities or funds?",
    },
    FieldSpec {
        path: "investments.80C_investments",
        kind: FieldKind::Money,
        question: "What is the total of your Section 80C investments (EPF, PPF, ELSS, life insurance premium, home loan principal)?",
    },
    FieldSpec {
        path: "investments.nps_contribution",
        kind: FieldKind::Money,
        question: "How much did you contribute to the National Pension System (NPS) on your own account?",
    },
    FieldSpec {
        path: "education_loan_interest",
        kind: FieldKind::Money,
        question: "How much interest did you pay on an education loan?",
    },
    FieldSpec {
        path: "disability_details.is_disabled",
        kind: FieldKind::Flag,
        question: "Do you have a dependant with a certified disability whom you support?",
    },
    FieldSpec {
        path: "disability_details.type",
        kind: FieldKind::Category,
        question: "Is the dependant's disability normal (40% or more) or severe (80% or more)?",
    },
    FieldSpec {
        path: "other_income.interest_from_savings",
        kind: FieldKind::Money,
        question: "How much interest did you earn from savings bank accounts?",
    },
    FieldSpec {
        path: "other_income.fixed_deposit_interest",
        kind: FieldKind::Money,
        question: "How much interest did you earn from fixed or recurring deposits?",
    },
    FieldSpec {
        path: "residential_status",
        kind: FieldKind::Category,
        question: "What is your residential status for tax purposes (for example resident, non-resident)?",
    },
    FieldSpec {
        path: "filing_status",
        kind: FieldKind::Category,
        question: "What is your filing status (for example individual, HUF)?",
    },
    FieldSpec {
        path: "employment_status",
        kind: FieldKind::Category,
        question: "What is your employment status (salaried, self-employed, retired)?",
    },
];

/// Look up a catalog field by its dotted path.
pub fn field(path: &str) -> Option<&'static FieldSpec> {
    FIELDS.iter().find(|f| f.path == path)
}

/// The user-facing identity of a field: its last path segment.
pub fn readable_name(path: &str) -> &str {
    path.rsplit('.').next().unwrap_or(path)
}

/// The fallback question for a field, or a generic one for unknown paths.
pub fn default_question(path: &str) -> String {
    match field(path) {
        Some(spec) => spec.question.to_string(),
        None => format!("Please provide your {}.", readable_name(path).replace('_', " ")),
    }
}

// ──────────────────────────────────────────────
// Default plan
// ──────────────────────────────────────────────

/// Catalog entry for one deduction: what the default planner emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeductionSpec {
    pub key: &'static str,
    pub eligibility: &'static str,
    pub required_fields: &'static [&'static str],
    pub query: &'static str,
}

impl DeductionSpec {
    pub fn kind(&self) -> DeductionKind {
        DeductionKind::parse(self.key)
    }
}

pub const DEDUCTIONS: &[DeductionSpec] = &[
    DeductionSpec {
        key: "standard_deduction",
        eligibility: "Available to every salaried individual and pensioner, capped at ₹50,000.",
        required_fields: &["salary"],
        query: "Standard deduction for salaried employees under Section 16(ia)",
    },
    DeductionSpec {
        key: "section_80C_deduction",
        eligibility: "Investments in EPF, PPF, ELSS, life insurance, tuition fees or home loan principal, up to ₹1,50,000.",
        required_fields: &["investments.80C_investments"],
        query: "Section 80C deduction limit for specified investments and payments",
    },
    DeductionSpec {
        key: "section_80D_deduction",
        eligibility: "Health insurance premiums and preventive check-ups for self, family and parents, with higher limits for senior citizens.",
        required_fields: &[
            "age_self",
            "health_insurance_premium",
            "parents_age",
            "parents_health_insurance_premium",
        ],
        query: "Section 80D deduction for medical insurance premium and preventive health check-up",
    },
    DeductionSpec {
        key: "section_24B_deduction",
        eligibility: "Interest on a housing loan; capped at ₹2,00,000 for a self-occupied property.",
        required_fields: &["housing_loan_interest", "property_status"],
        query: "Section 24(b) deduction for interest on borrowed capital for house property",
    },
    DeductionSpec {
        key: "section_80G_deduction",
        eligibility: "Donations to notified funds and charitable institutions.",
        required_fields: &["donation_amount"],
        query: "Section 80G deduction for donations to charitable institutions",
    },
    DeductionSpec {
        key: "section_80CCD1B_deduction",
        eligibility: "Own contribution to the National Pension System, up to ₹50,000 over and above Section 80C.",
        required_fields: &["investments.nps_contribution"],
        query: "Section 80CCD(1B) additional deduction for NPS contribution",
    },
    DeductionSpec {
        key: "section_80E_deduction",
        eligibility: "Interest on a loan taken for higher education, with no upper limit.",
        required_fields: &["education_loan_interest"],
        query: "Section 80E deduction for interest on education loan",
    },
    DeductionSpec {
        key: "section_80DD_deduction",
        eligibility: "Maintenance or medical treatment of a dependant with a disability; flat amount by severity.",
        required_fields: &["disability_details.is_disabled", "disability_details.type"],
        query: "Section 80DD deduction for maintenance of a dependant with disability",
    },
    DeductionSpec {
        key: "section_80TTA_deduction",
        eligibility: "Savings account interest for individuals below 60, up to ₹10,000.",
        required_fields: &["age_self", "other_income.interest_from_savings"],
        query: "Section 80TTA deduction for interest on savings account",
    },
    DeductionSpec {
        key: "section_80TTB_deduction",
        eligibility: "Deposit interest for senior citizens aged 60 or above, up to ₹50,000.",
        required_fields: &[
            "age_self",
            "other_income.interest_from_savings",
            "other_income.fixed_deposit_interest",
        ],
        query: "Section 80TTB deduction for interest on deposits for senior citizens",
    },
];

/// Catalog entry for a deduction key.
pub fn deduction(key: &str) -> Option<&'static DeductionSpec> {
    DEDUCTIONS.iter().find(|d| d.key == key)
}
