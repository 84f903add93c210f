use std::path::Path;

use serde_json::json;
use taxwise_core::catalog::readable_name;
use taxwise_engine::{analyze_gaps, DeductionPlan};

use super::{print_json, read_facts};
use crate::OutputFormat;

pub(crate) fn cmd_plan(facts_path: &Path, output: OutputFormat, quiet: bool) {
    let facts = read_facts(facts_path, output, quiet);
    let plan = DeductionPlan::from_catalog();
    let gaps = analyze_gaps(&plan, &facts);

    if quiet {
        return;
    }
    match output {
        OutputFormat::Json => print_json(&json!({
            "plan": plan,
            "missing": gaps,
            "fields": gaps.unique_fields(),
        })),
        OutputFormat::Text => {
            println!("Deduction plan ({} deductions):", plan.len());
            for (kind, entry) in plan.iter() {
                let missing = gaps.missing_for(kind);
                println!();
                println!("{}", kind.display_name());
                println!("  eligibility: {}", entry.eligibility_criteria);
                for field in &entry.required_fields {
                    let marker = if missing.contains(field) {
                        " [missing]"
                    } else {
                        ""
                    };
                    println!("  requires: {}{}", readable_name(field), marker);
                }
            }
            println!();
            if gaps.is_empty() {
                println!("All required facts are present.");
            } else {
                println!(
                    "{} fact(s) still needed.",
                    gaps.unique_fields().len()
                );
            }
        }
    }
}
