//! CLI integration tests for the `taxwise` binary.
//!
//! Every test runs in its own temporary directory so sessions and any
//! `taxwise.toml` are isolated. Session commands point the generation and
//! search clients at a closed local port: every outbound call fails fast,
//! which exercises the catalog fallbacks without any network.

use std::fs;
use std::path::Path;

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::{json, Value};
use tempfile::TempDir;

const UNREACHABLE: &str = "http://127.0.0.1:9";

const CONFIG_KEYS: &[&str] = &[
    "ANTHROPIC_API_KEY",
    "TAXWISE_ANTHROPIC_URL",
    "TAXWISE_MODEL",
    "TAXWISE_SEARCH_URL",
    "TAXWISE_SEARCH_API_KEY",
    "TAXWISE_STATE_DIR",
    "TAXWISE_PORT",
    "TAXWISE_PLANNER",
    "TAXWISE_API_KEY",
    "TAXWISE_RATE_LIMIT",
];

/// A `taxwise` command rooted at `dir` with no inherited configuration.
fn taxwise(dir: &Path) -> Command {
    let mut cmd = cargo_bin_cmd!("taxwise");
    cmd.current_dir(dir);
    for key in CONFIG_KEYS {
        cmd.env_remove(key);
    }
    cmd.env_remove("RUST_LOG");
    cmd
}

/// A `taxwise` command configured for offline session runs.
fn offline(dir: &Path) -> Command {
    let mut cmd = taxwise(dir);
    cmd.env("ANTHROPIC_API_KEY", "test-key")
        .env("TAXWISE_ANTHROPIC_URL", UNREACHABLE)
        .env("TAXWISE_SEARCH_URL", UNREACHABLE)
        .env("TAXWISE_PLANNER", "catalog")
        .env("TAXWISE_STATE_DIR", dir.join("sessions"));
    cmd
}

fn write_facts(dir: &Path, name: &str, facts: &Value) -> std::path::PathBuf {
    let path = dir.join(name);
    fs::write(&path, serde_json::to_string_pretty(facts).unwrap()).unwrap();
    path
}

fn full_profile() -> Value {
    json!({
        "salary": 1200000,
        "age_self": 35,
        "parents_age": 62,
        "health_insurance_premium": 20000,
        "parents_health_insurance_premium": 30000,
        "housing_loan_interest": 0,
        "property_status": "self_occupied",
        "donation_amount": 0,
        "education_loan_interest": 0,
        "investments": { "80C_investments": 150000, "nps_contribution": 50000 },
        "disability_details": { "is_disabled": false },
        "other_income": { "interest_from_savings": 8000, "fixed_deposit_interest": 20000 }
    })
}

fn stdout_json(cmd: &mut Command) -> Value {
    let output = cmd.output().unwrap();
    assert!(
        output.status.success(),
        "command failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).unwrap()
}

// ──────────────────────────────────────────────
// 1. Help and version
// ──────────────────────────────────────────────

#[test]
fn help_exits_0_with_description() {
    let dir = TempDir::new().unwrap();
    taxwise(dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Income-tax deduction assistant"));
}

#[test]
fn version_exits_0() {
    let dir = TempDir::new().unwrap();
    taxwise(dir.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("taxwise"));
}

#[test]
fn unknown_subcommand_fails() {
    let dir = TempDir::new().unwrap();
    taxwise(dir.path()).arg("refund").assert().failure();
}

// ──────────────────────────────────────────────
// 2. calc
// ──────────────────────────────────────────────

#[test]
fn calc_full_profile_prints_report() {
    let dir = TempDir::new().unwrap();
    let facts = write_facts(dir.path(), "facts.json", &full_profile());
    taxwise(dir.path())
        .args(["calc", "--facts"])
        .arg(&facts)
        .assert()
        .success()
        .stdout(predicate::str::contains("# Tax Deduction Report"))
        .stdout(predicate::str::contains(
            "**Estimated Total Deductions**: ₹3,08,000.00",
        ))
        .stdout(predicate::str::contains(
            "**Estimated Taxable Income**: ₹9,20,000.00",
        ))
        .stdout(predicate::str::contains("₹1,00,360.00"));
}

#[test]
fn calc_full_profile_json() {
    let dir = TempDir::new().unwrap();
    let facts = write_facts(dir.path(), "facts.json", &full_profile());
    let out = stdout_json(
        taxwise(dir.path())
            .args(["--output", "json", "calc", "--facts"])
            .arg(&facts),
    );
    assert_eq!(out["status"], "complete");
    assert_eq!(out["verdict"]["total_deductions"], "308000");
    assert_eq!(out["verdict"]["total_taxable_income"], "920000");
    assert_eq!(
        out["verdict"]["lines"]["section_80C_deduction"]["amount"],
        "₹1,50,000"
    );
}

#[test]
fn calc_partial_profile_lists_missing_facts() {
    let dir = TempDir::new().unwrap();
    let facts = write_facts(dir.path(), "facts.json", &json!({ "salary": 900000 }));
    taxwise(dir.path())
        .args(["calc", "--facts"])
        .arg(&facts)
        .assert()
        .success()
        .stdout(predicate::str::contains("Missing facts:"))
        .stdout(predicate::str::contains("Section 80C"))
        .stdout(predicate::str::contains("Standard Deduction").not());
}

#[test]
fn calc_partial_profile_json_asks_disability_flag_only() {
    let dir = TempDir::new().unwrap();
    let facts = write_facts(dir.path(), "facts.json", &json!({ "salary": 900000 }));
    let out = stdout_json(
        taxwise(dir.path())
            .args(["--output", "json", "calc", "--facts"])
            .arg(&facts),
    );
    assert_eq!(out["status"], "needs_input");
    assert_eq!(
        out["missing"]["section_80DD_deduction"],
        json!(["disability_details.is_disabled"])
    );
    assert!(out["missing"].get("standard_deduction").is_none());
}

#[test]
fn calc_missing_file_fails() {
    let dir = TempDir::new().unwrap();
    taxwise(dir.path())
        .args(["calc", "--facts", "nope.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("facts file not found"));
}

#[test]
fn calc_non_object_facts_fails_with_json_error() {
    let dir = TempDir::new().unwrap();
    let facts = write_facts(dir.path(), "facts.json", &json!([1, 2, 3]));
    let output = taxwise(dir.path())
        .args(["--output", "json", "calc", "--facts"])
        .arg(&facts)
        .output()
        .unwrap();
    assert!(!output.status.success());
    let err: Value = serde_json::from_slice(&output.stderr).unwrap();
    assert!(err["error"].as_str().unwrap().contains("JSON object"));
}

// ──────────────────────────────────────────────
// 3. plan
// ──────────────────────────────────────────────

#[test]
fn plan_marks_missing_fields() {
    let dir = TempDir::new().unwrap();
    let facts = write_facts(dir.path(), "facts.json", &json!({ "salary": 900000 }));
    taxwise(dir.path())
        .args(["plan", "--facts"])
        .arg(&facts)
        .assert()
        .success()
        .stdout(predicate::str::contains("Deduction plan (10 deductions)"))
        .stdout(predicate::str::contains("requires: salary\n"))
        .stdout(predicate::str::contains("requires: 80C_investments [missing]"));
}

#[test]
fn plan_json_has_catalog_entries() {
    let dir = TempDir::new().unwrap();
    let facts = write_facts(dir.path(), "facts.json", &full_profile());
    let out = stdout_json(
        taxwise(dir.path())
            .args(["--output", "json", "plan", "--facts"])
            .arg(&facts),
    );
    assert_eq!(out["plan"].as_object().unwrap().len(), 10);
    assert_eq!(
        out["plan"]["section_24B_deduction"]["required_fields"],
        json!(["housing_loan_interest", "property_status"])
    );
    assert_eq!(out["missing"], json!({}));
}

// ──────────────────────────────────────────────
// 4. Configuration
// ──────────────────────────────────────────────

#[test]
fn start_without_api_key_names_the_key() {
    let dir = TempDir::new().unwrap();
    let facts = write_facts(dir.path(), "facts.json", &full_profile());
    taxwise(dir.path())
        .env("TAXWISE_SEARCH_URL", UNREACHABLE)
        .args(["start", "--facts"])
        .arg(&facts)
        .assert()
        .failure()
        .stderr(predicate::str::contains("ANTHROPIC_API_KEY"));
}

#[test]
fn start_without_search_url_names_the_key() {
    let dir = TempDir::new().unwrap();
    let facts = write_facts(dir.path(), "facts.json", &full_profile());
    taxwise(dir.path())
        .env("ANTHROPIC_API_KEY", "test-key")
        .args(["start", "--facts"])
        .arg(&facts)
        .assert()
        .failure()
        .stderr(predicate::str::contains("TAXWISE_SEARCH_URL"));
}

#[test]
fn config_file_supplies_settings() {
    let dir = TempDir::new().unwrap();
    let facts = write_facts(dir.path(), "facts.json", &full_profile());
    let state_dir = dir.path().join("from-file");
    fs::write(
        dir.path().join("taxwise.toml"),
        format!(
            "anthropic_api_key = \"test-key\"\nanthropic_url = \"{UNREACHABLE}\"\n\
             search_url = \"{UNREACHABLE}\"\nplanner = \"catalog\"\nstate_dir = \"{}\"\n",
            state_dir.display()
        ),
    )
    .unwrap();
    taxwise(dir.path())
        .args(["start", "--facts"])
        .arg(&facts)
        .assert()
        .success()
        .stdout(predicate::str::contains("# Tax Deduction Report"));
    assert_eq!(fs::read_dir(&state_dir).unwrap().count(), 1);
}

#[test]
fn malformed_config_file_fails() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("custom.toml");
    fs::write(&config, "port = \"not a number\"").unwrap();
    taxwise(dir.path())
        .arg("--config")
        .arg(&config)
        .args(["sessions"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("could not parse"));
}

// ──────────────────────────────────────────────
// 5. Sessions
// ──────────────────────────────────────────────

#[test]
fn start_with_full_profile_completes() {
    let dir = TempDir::new().unwrap();
    let facts = write_facts(dir.path(), "facts.json", &full_profile());
    let out = stdout_json(
        offline(dir.path())
            .args(["--output", "json", "start", "--facts"])
            .arg(&facts),
    );
    assert_eq!(out["status"], "complete");
    assert_eq!(out["verdict"]["total_deductions"], "308000");

    let session_id = out["session_id"].as_str().unwrap();
    let state = stdout_json(
        offline(dir.path())
            .args(["--output", "json", "show", session_id]),
    );
    assert_eq!(state["phase"], "done");
    assert_eq!(state["suspensions"], 0);
}

#[test]
fn start_with_partial_profile_asks_questions() {
    let dir = TempDir::new().unwrap();
    let facts = write_facts(dir.path(), "facts.json", &json!({ "salary": 900000 }));
    offline(dir.path())
        .args(["start", "--facts"])
        .arg(&facts)
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "To give you the most accurate tax advice, I need a few more details:",
        ))
        .stdout(predicate::str::contains("Request: req-"))
        .stdout(predicate::str::contains("taxwise reply"));
}

#[test]
fn suspended_session_round_trip() {
    let dir = TempDir::new().unwrap();
    let facts = write_facts(dir.path(), "facts.json", &json!({ "salary": 900000 }));
    let started = stdout_json(
        offline(dir.path())
            .args(["--output", "json", "start", "--facts"])
            .arg(&facts),
    );
    assert_eq!(started["status"], "needs_input");
    let session_id = started["session_id"].as_str().unwrap().to_string();
    let request_id = started["request"]["request_id"].as_str().unwrap().to_string();
    let fields = started["request"]["fields"].clone();
    assert!(fields
        .as_array()
        .unwrap()
        .contains(&json!("disability_details.is_disabled")));
    assert!(!fields
        .as_array()
        .unwrap()
        .contains(&json!("disability_details.type")));

    // Wrong request id: rejected, state untouched.
    offline(dir.path())
        .args(["reply", &session_id, "req-0000000000000000", "I am 40"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("waiting on"));

    // Extraction cannot reach the generator: the same questions come back
    // under a new request id.
    let again = stdout_json(offline(dir.path()).args([
        "--output",
        "json",
        "reply",
        &session_id,
        &request_id,
        "I am 40 and invest 1.5 lakh in PPF",
    ]));
    assert_eq!(again["status"], "needs_input");
    assert_eq!(again["request"]["fields"], fields);
    assert!(started["request"]["notice"].is_null());
    assert!(again["request"]["notice"]
        .as_str()
        .unwrap()
        .contains("couldn't understand"));
    assert!(again["request"]["message"]
        .as_str()
        .unwrap()
        .starts_with("Sorry, I couldn't understand that reply."));
    let second_id = again["request"]["request_id"].as_str().unwrap().to_string();
    assert_ne!(second_id, request_id);

    let state = stdout_json(
        offline(dir.path())
            .args(["--output", "json", "show", &session_id]),
    );
    assert_eq!(state["phase"], "awaiting_reply");
    assert_eq!(state["suspensions"], 2);
    assert_eq!(state["pending"]["request_id"], second_id.as_str());

    offline(dir.path())
        .args(["sessions"])
        .assert()
        .success()
        .stdout(predicate::str::contains(session_id.as_str()));

    offline(dir.path())
        .args(["cancel", &session_id])
        .assert()
        .success()
        .stdout(predicate::str::contains("cancelled"));

    offline(dir.path())
        .args(["reply", &session_id, &second_id, "hello"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("session is closed"));
}

#[test]
fn show_unknown_session_fails() {
    let dir = TempDir::new().unwrap();
    offline(dir.path())
        .args(["show", "0123456789abcdef"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("session not found"));
}

#[test]
fn show_needs_no_generation_settings() {
    let dir = TempDir::new().unwrap();
    taxwise(dir.path())
        .env("TAXWISE_STATE_DIR", dir.path().join("sessions"))
        .args(["sessions"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No sessions."));
}

#[test]
fn chat_before_verdict_fails() {
    let dir = TempDir::new().unwrap();
    let facts = write_facts(dir.path(), "facts.json", &json!({ "salary": 900000 }));
    let started = stdout_json(
        offline(dir.path())
            .args(["--output", "json", "start", "--facts"])
            .arg(&facts),
    );
    let session_id = started["session_id"].as_str().unwrap();
    offline(dir.path())
        .args(["chat", session_id, "Can I claim HRA?"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("chat is not available"));
}
