//! Gap analysis: which required facts are still missing.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use taxwise_core::catalog::readable_name;
use taxwise_core::{DeductionKind, FactBase};

use crate::plan::{DeductionPlan, DeductionPlanEntry};

const IS_DISABLED: &str = "disability_details.is_disabled";
const DISABILITY_TYPE: &str = "disability_details.type";

/// Missing fields per deduction. Deductions with nothing missing have no
/// entry. Always computed from scratch; never merged with a prior report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GapReport {
    pub missing: BTreeMap<DeductionKind, Vec<String>>,
}

impl GapReport {
    pub fn is_empty(&self) -> bool {
        self.missing.is_empty()
    }

    /// Missing fields for one deduction; empty if none.
    pub fn missing_for(&self, kind: &DeductionKind) -> &[String] {
        self.missing.get(kind).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Total number of (deduction, field) gaps.
    pub fn field_count(&self) -> usize {
        self.missing.values().map(Vec::len).sum()
    }

    /// The fields to ask the user about, one per readable name.
    ///
    /// Two paths sharing a last segment are the same question to the
    /// user; the first path seen (in deduction order) is kept. Sorted by
    /// readable name so the same gaps always produce the same request.
    pub fn unique_fields(&self) -> Vec<String> {
        let mut by_name: BTreeMap<&str, &str> = BTreeMap::new();
        for path in self.missing.values().flatten() {
            by_name.entry(readable_name(path)).or_insert(path.as_str());
        }
        by_name.into_values().map(str::to_string).collect()
    }
}

/// Compute the gap report for `plan` against `facts`.
pub fn analyze_gaps(plan: &DeductionPlan, facts: &FactBase) -> GapReport {
    let missing = plan
        .iter()
        .filter_map(|(kind, entry)| {
            let fields = missing_fields(kind, entry, facts);
            (!fields.is_empty()).then(|| (kind.clone(), fields))
        })
        .collect();
    GapReport { missing }
}

fn missing_fields(kind: &DeductionKind, entry: &DeductionPlanEntry, facts: &FactBase) -> Vec<String> {
    let absent = |path: &String| !facts.contains(path);
    if *kind != DeductionKind::Section80DD {
        return entry.required_fields.iter().filter(|p| absent(p)).cloned().collect();
    }

    // The disability type is only asked once the taxpayer says they (or a
    // dependant) have a disability.
    let mut fields = Vec::new();
    for path in entry.required_fields.iter().filter(|p| absent(p)) {
        match path.as_str() {
            IS_DISABLED => fields.push(path.clone()),
            DISABILITY_TYPE => match facts.flag(IS_DISABLED) {
                Some(true) => fields.push(path.clone()),
                Some(false) | None => {}
            },
            _ => {
                if facts.flag(IS_DISABLED) != Some(false) {
                    fields.push(path.clone());
                }
            }
        }
    }
    fields
}
