use std::collections::BTreeMap;
use std::path::Path;

use serde_json::json;
use taxwise_core::calculator_for;
use taxwise_engine::{analyze_gaps, compose_verdict, DeductionPlan};

use super::{print_json, read_facts, render_gaps};
use crate::OutputFormat;

/// Deterministic run over the catalog plan: the gap report while facts
/// are missing, the verdict once they are all present.
pub(crate) fn cmd_calc(facts_path: &Path, output: OutputFormat, quiet: bool) {
    let facts = read_facts(facts_path, output, quiet);
    let plan = DeductionPlan::from_catalog();
    let gaps = analyze_gaps(&plan, &facts);

    if !gaps.is_empty() {
        if quiet {
            return;
        }
        match output {
            OutputFormat::Json => print_json(&json!({
                "status": "needs_input",
                "missing": gaps,
                "fields": gaps.unique_fields(),
            })),
            OutputFormat::Text => print!("{}", render_gaps(&gaps)),
        }
        return;
    }

    let results: BTreeMap<_, _> = plan
        .iter()
        .filter_map(|(kind, _)| calculator_for(kind).map(|calc| (kind.clone(), calc(&facts))))
        .collect();
    let verdict = compose_verdict(results, &facts);

    if quiet {
        return;
    }
    match output {
        OutputFormat::Json => print_json(&json!({
            "status": "complete",
            "verdict": verdict,
        })),
        OutputFormat::Text => print!("{}", verdict.report),
    }
}
