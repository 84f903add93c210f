//! Session commands, backed by the file session store.

use std::path::Path;
use std::process;

use serde_json::json;
use taxwise_engine::{EntryKind, SessionService, SessionState, TurnOutcome};
use taxwise_storage::{FileSessionStore, SessionStore};

use super::{outcome_json, print_json, read_facts, runtime};
use crate::config::Config;
use crate::services::{open_service, open_store};
use crate::{report_error, OutputFormat};

fn config(config_path: Option<&Path>, output: OutputFormat, quiet: bool) -> Config {
    match Config::load(config_path) {
        Ok(c) => c,
        Err(e) => {
            report_error(&format!("error: {e}"), output, quiet);
            process::exit(1);
        }
    }
}

/// Load configuration and open the session service, exiting on failure.
fn service(
    config_path: Option<&Path>,
    rt: &tokio::runtime::Runtime,
    output: OutputFormat,
    quiet: bool,
) -> SessionService<FileSessionStore> {
    let config = config(config_path, output, quiet);
    match rt.block_on(open_service(&config)) {
        Ok(s) => s,
        Err(msg) => {
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    }
}

/// Open just the store; reading sessions needs no generation settings.
fn store(
    config_path: Option<&Path>,
    rt: &tokio::runtime::Runtime,
    output: OutputFormat,
    quiet: bool,
) -> FileSessionStore {
    let config = config(config_path, output, quiet);
    match rt.block_on(open_store(&config)) {
        Ok(s) => s,
        Err(msg) => {
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    }
}

fn fail(err: impl std::fmt::Display, output: OutputFormat, quiet: bool) -> ! {
    report_error(&format!("error: {err}"), output, quiet);
    process::exit(1);
}

fn print_outcome(session_id: &str, outcome: &TurnOutcome, output: OutputFormat) {
    match output {
        OutputFormat::Json => print_json(&outcome_json(session_id, outcome)),
        OutputFormat::Text => match outcome {
            TurnOutcome::NeedsInput(request) => {
                println!("Session: {}", session_id);
                println!("Request: {}", request.request_id);
                println!();
                println!("{}", request.message());
                println!();
                println!(
                    "Answer with: taxwise reply {} {} \"<your answer>\"",
                    session_id, request.request_id
                );
            }
            TurnOutcome::Completed(verdict) => {
                println!("Session: {}", session_id);
                println!();
                print!("{}", verdict.report);
            }
        },
    }
}

pub(crate) fn cmd_start(
    config_path: Option<&Path>,
    facts_path: &Path,
    output: OutputFormat,
    quiet: bool,
) {
    let facts = read_facts(facts_path, output, quiet);
    let rt = runtime(output, quiet);
    let service = service(config_path, &rt, output, quiet);

    match rt.block_on(service.start(facts.to_json())) {
        Ok((session_id, outcome)) => {
            if !quiet {
                print_outcome(&session_id, &outcome, output);
            }
        }
        Err(e) => fail(e, output, quiet),
    }
}

pub(crate) fn cmd_reply(
    config_path: Option<&Path>,
    session_id: &str,
    request_id: &str,
    message: &str,
    output: OutputFormat,
    quiet: bool,
) {
    let rt = runtime(output, quiet);
    let service = service(config_path, &rt, output, quiet);

    match rt.block_on(service.reply(session_id, request_id, message)) {
        Ok(outcome) => {
            if !quiet {
                print_outcome(session_id, &outcome, output);
            }
        }
        Err(e) => fail(e, output, quiet),
    }
}

pub(crate) fn cmd_show(
    config_path: Option<&Path>,
    session_id: &str,
    output: OutputFormat,
    quiet: bool,
) {
    let rt = runtime(output, quiet);
    let store = store(config_path, &rt, output, quiet);

    let record = match rt.block_on(store.load_session(session_id)) {
        Ok(r) => r,
        Err(e) => fail(e, output, quiet),
    };
    let state: SessionState = match serde_json::from_value(record.state) {
        Ok(s) => s,
        Err(e) => fail(format!("corrupt session state: {e}"), output, quiet),
    };
    if quiet {
        return;
    }
    match output {
        OutputFormat::Json => match serde_json::to_value(&state) {
            Ok(v) => print_json(&v),
            Err(e) => fail(e, output, quiet),
        },
        OutputFormat::Text => {
            println!("Session: {}", state.session_id);
            println!("Phase: {}", state.phase);
            println!("Suspensions: {}", state.suspensions);
            if let Some(request) = &state.pending {
                println!();
                println!("Waiting on request {}:", request.request_id);
                println!("{}", request.message());
            }
            if let Some(verdict) = &state.verdict {
                println!();
                print!("{}", verdict.report);
            }
            let chats = state
                .transcript
                .iter()
                .filter(|e| e.kind == EntryKind::Chat)
                .count();
            if chats > 0 {
                println!();
                println!("Follow-up messages: {}", chats);
            }
        }
    }
}

pub(crate) fn cmd_chat(
    config_path: Option<&Path>,
    session_id: &str,
    message: &str,
    output: OutputFormat,
    quiet: bool,
) {
    let rt = runtime(output, quiet);
    let service = service(config_path, &rt, output, quiet);

    match rt.block_on(service.chat(session_id, message)) {
        Ok(reply) => {
            if quiet {
                return;
            }
            match output {
                OutputFormat::Json => print_json(&json!({
                    "session_id": session_id,
                    "reply": reply,
                })),
                OutputFormat::Text => println!("{}", reply),
            }
        }
        Err(e) => fail(e, output, quiet),
    }
}

pub(crate) fn cmd_cancel(
    config_path: Option<&Path>,
    session_id: &str,
    output: OutputFormat,
    quiet: bool,
) {
    let rt = runtime(output, quiet);
    let service = service(config_path, &rt, output, quiet);

    match rt.block_on(service.cancel(session_id)) {
        Ok(()) => {
            if quiet {
                return;
            }
            match output {
                OutputFormat::Json => print_json(&json!({
                    "session_id": session_id,
                    "status": "cancelled",
                })),
                OutputFormat::Text => println!("Session {} cancelled.", session_id),
            }
        }
        Err(e) => fail(e, output, quiet),
    }
}

pub(crate) fn cmd_sessions(
    config_path: Option<&Path>,
    limit: usize,
    output: OutputFormat,
    quiet: bool,
) {
    let rt = runtime(output, quiet);
    let store = store(config_path, &rt, output, quiet);

    let sessions = match rt.block_on(store.list_sessions(limit)) {
        Ok(s) => s,
        Err(e) => fail(e, output, quiet),
    };
    if quiet {
        return;
    }
    match output {
        OutputFormat::Json => print_json(&json!({ "sessions": sessions })),
        OutputFormat::Text => {
            if sessions.is_empty() {
                println!("No sessions.");
            }
            for s in &sessions {
                println!("{}  v{}  {}", s.session_id, s.version, s.updated_at);
            }
        }
    }
}
