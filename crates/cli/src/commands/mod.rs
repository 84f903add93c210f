pub(crate) mod calc;
pub(crate) mod plan;
pub(crate) mod session;

use std::path::Path;
use std::process;

use serde_json::{json, Value};
use taxwise_core::catalog::readable_name;
use taxwise_core::FactBase;
use taxwise_engine::{GapReport, TurnOutcome};

use crate::{report_error, OutputFormat};

/// Read and parse a user details JSON file, exiting on failure.
pub(crate) fn read_facts(path: &Path, output: OutputFormat, quiet: bool) -> FactBase {
    let content = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(_) => {
            let msg = format!("error: facts file not found: {}", path.display());
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    };
    let details: Value = match serde_json::from_str(&content) {
        Ok(v) => v,
        Err(e) => {
            let msg = format!("error: invalid JSON in {}: {}", path.display(), e);
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    };
    match FactBase::from_json(details) {
        Ok(facts) => facts,
        Err(e) => {
            let msg = format!("error: {}: {}", path.display(), e);
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    }
}

pub(crate) fn runtime(output: OutputFormat, quiet: bool) -> tokio::runtime::Runtime {
    match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            report_error(&format!("error: failed to start runtime: {e}"), output, quiet);
            process::exit(1);
        }
    }
}

/// The wire shape of a turn: `status` plus either `request` or `verdict`.
pub(crate) fn outcome_json(session_id: &str, outcome: &TurnOutcome) -> Value {
    match outcome {
        TurnOutcome::NeedsInput(request) => json!({
            "session_id": session_id,
            "status": "needs_input",
            "request": {
                "request_id": request.request_id,
                "fields": request.fields,
                "questions": request.questions,
                "notice": request.notice,
                "message": request.message(),
            },
        }),
        TurnOutcome::Completed(verdict) => json!({
            "session_id": session_id,
            "status": "complete",
            "verdict": verdict,
        }),
    }
}

pub(crate) fn print_json(value: &Value) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{}", s),
        Err(e) => eprintln!("error: could not serialize output: {}", e),
    }
}

/// Missing facts per deduction, one line each.
pub(crate) fn render_gaps(gaps: &GapReport) -> String {
    let mut out = String::from("Missing facts:\n");
    for (kind, fields) in &gaps.missing {
        let names: Vec<&str> = fields.iter().map(|f| readable_name(f)).collect();
        out.push_str(&format!("  {}: {}\n", kind.display_name(), names.join(", ")));
    }
    out
}
