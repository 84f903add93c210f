//! Progressive tax liability.
//!
//! Brackets are cumulative: each slice of income is taxed at its own
//! rate and the slices are summed. A Section 87A rebate applies below a
//! per-table threshold, then 4% health and education cess is added.
//! Surcharge is not modelled.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::facts::{FactBase, SENIOR_AGE, SUPER_SENIOR_AGE};

/// Health and education cess, in percent.
pub const CESS_RATE: i64 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Regime {
    Old,
    New,
}

impl Regime {
    /// `tax_regime` from the facts; anything other than `"new"` is the old regime.
    pub fn from_facts(facts: &FactBase) -> Self {
        match facts.category("tax_regime").as_deref() {
            Some("new") => Regime::New,
            _ => Regime::Old,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgeBand {
    BelowSixty,
    Senior,
    SuperSenior,
}

impl AgeBand {
    pub fn from_age(age: u32) -> Self {
        if age >= SUPER_SENIOR_AGE {
            AgeBand::SuperSenior
        } else if age >= SENIOR_AGE {
            AgeBand::Senior
        } else {
            AgeBand::BelowSixty
        }
    }
}

/// One slab: income up to `upper` (or unbounded) taxed at `rate_pct`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bracket {
    pub upper: Option<i64>,
    pub rate_pct: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BracketTable {
    pub brackets: &'static [Bracket],
    /// `(income threshold, rebate)`: taxable income at or below the
    /// threshold gets the rebate.
    pub rebate: Option<(i64, i64)>,
}

const fn slab(upper: i64, rate_pct: i64) -> Bracket {
    Bracket {
        upper: Some(upper),
        rate_pct,
    }
}

const fn top(rate_pct: i64) -> Bracket {
    Bracket {
        upper: None,
        rate_pct,
    }
}

pub const NEW_REGIME: BracketTable = BracketTable {
    brackets: &[
        slab(300_000, 0),
        slab(600_000, 5),
        slab(900_000, 10),
        slab(1_200_000, 15),
        slab(1_500_000, 20),
        top(30),
    ],
    rebate: Some((700_000, 25_000)),
};

pub const OLD_REGIME_BELOW_SIXTY: BracketTable = BracketTable {
    brackets: &[slab(250_000, 0), slab(500_000, 5), slab(1_000_000, 20), top(30)],
    rebate: Some((500_000, 12_500)),
};

pub const OLD_REGIME_SENIOR: BracketTable = BracketTable {
    brackets: &[slab(300_000, 0), slab(500_000, 5), slab(1_000_000, 20), top(30)],
    rebate: Some((500_000, 12_500)),
};

pub const OLD_REGIME_SUPER_SENIOR: BracketTable = BracketTable {
    brackets: &[slab(500_000, 0), slab(1_000_000, 20), top(30)],
    rebate: None,
};

impl BracketTable {
    pub fn for_taxpayer(regime: Regime, band: AgeBand) -> &'static BracketTable {
        match (regime, band) {
            (Regime::New, _) => &NEW_REGIME,
            (Regime::Old, AgeBand::BelowSixty) => &OLD_REGIME_BELOW_SIXTY,
            (Regime::Old, AgeBand::Senior) => &OLD_REGIME_SENIOR,
            (Regime::Old, AgeBand::SuperSenior) => &OLD_REGIME_SUPER_SENIOR,
        }
    }

    /// Tax before rebate and cess.
    pub fn slab_tax(&self, income: Decimal) -> Decimal {
        let mut tax = Decimal::ZERO;
        let mut lower = Decimal::ZERO;
        for bracket in self.brackets {
            if income <= lower {
                break;
            }
            let upper = bracket.upper.map(Decimal::from);
            let slice_top = match upper {
                Some(u) if income > u => u,
                _ => income,
            };
            tax += (slice_top - lower) * Decimal::new(bracket.rate_pct, 2);
            match upper {
                Some(u) => lower = u,
                None => break,
            }
        }
        tax
    }
}

/// Breakdown of a liability computation; all figures rounded to paise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxComputation {
    pub regime: Regime,
    pub age_band: AgeBand,
    pub slab_tax: Decimal,
    pub rebate: Decimal,
    pub cess: Decimal,
    pub total: Decimal,
}

pub fn compute_tax(taxable_income: Decimal, regime: Regime, band: AgeBand) -> TaxComputation {
    let income = taxable_income.max(Decimal::ZERO);
    let table = BracketTable::for_taxpayer(regime, band);
    let slab_tax = table.slab_tax(income);
    let rebate = match table.rebate {
        Some((threshold, amount)) if income <= Decimal::from(threshold) => {
            Decimal::from(amount).min(slab_tax)
        }
        _ => Decimal::ZERO,
    };
    let after_rebate = slab_tax - rebate;
    let cess = after_rebate * Decimal::new(CESS_RATE, 2);
    let round = |d: Decimal| d.round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven);
    TaxComputation {
        regime,
        age_band: band,
        slab_tax: round(slab_tax),
        rebate: round(rebate),
        cess: round(cess),
        total: round(after_rebate + cess),
    }
}
