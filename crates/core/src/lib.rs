//! taxwise-core: pure tax-domain library.
//!
//! Everything here is deterministic and free of I/O: the fact base, the
//! closed field and deduction catalogs, rupee formatting, and the
//! deduction calculator with its bracket tables.
//!
//! # Public API
//!
//! - [`FactBase`] -- nested user facts with dotted-path access
//! - [`DeductionKind`], [`catalog::FIELDS`], [`catalog::DEDUCTIONS`] -- closed catalogs
//! - [`calculator_for`] -- static dispatch to a deduction's calculator
//! - [`gross_income`], [`tax_liability`] -- income and liability
//! - [`ReasoningResult`] -- the uniform per-deduction result shape

/// Financial year the limits and brackets apply to.
pub const FINANCIAL_YEAR: &str = "FY 2024-25 (AY 2025-26)";

pub mod calculator;
pub mod catalog;
pub mod error;
pub mod facts;
pub mod money;

// ── Convenience re-exports ───────────────────────────────────────────

pub use calculator::{
    calculator_for, compute_tax, gross_income, tax_liability, AgeBand, CalcFn, ReasoningResult,
    Regime, TaxComputation, ERROR_AMOUNT, NOT_APPLICABLE,
};
pub use catalog::{DeductionKind, DeductionSpec, FieldKind, FieldSpec};
pub use error::CoreError;
pub use facts::FactBase;
pub use money::{first_integer, format_inr, format_inr_fixed};
