//! The tax-reasoning state machine.
//!
//! ```text
//! Planning -> CheckingGaps -> Asking -> AwaitingReply
//!                  ^                          |
//!                  +------- Extracting <------+   (resume)
//!             CheckingGaps -> Reasoning -> Aggregating -> Done
//! ```
//!
//! Everything the machine needs to continue lives in [`SessionState`], so
//! a suspended session can be persisted, dropped and resumed later. The
//! only way out of `AwaitingReply` is [`TaxEngine::resume`] with the
//! outstanding request id, or [`TaxEngine::cancel`].

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use taxwise_core::catalog::{default_question, readable_name};
use taxwise_core::{DeductionKind, FactBase, ReasoningResult};
use taxwise_storage::now_rfc3339;
use tracing::{debug, info, warn};

use crate::error::EngineError;
use crate::extract::Extractor;
use crate::gaps::{analyze_gaps, GapReport};
use crate::generator::{GenerationRequest, Message, OutputMode, TextGenerator};
use crate::plan::{DeductionPlan, Planner};
use crate::prompts;
use crate::reason::Reasoner;
use crate::retrieval::RetrievalAdapter;
use crate::search::SearchService;
use crate::verdict::{compose_verdict, Verdict};

// ──────────────────────────────────────────────
// State
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Planning,
    CheckingGaps,
    Asking,
    AwaitingReply,
    Extracting,
    Reasoning,
    Aggregating,
    Done,
    Cancelled,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Planning => "planning",
            Phase::CheckingGaps => "checking_gaps",
            Phase::Asking => "asking",
            Phase::AwaitingReply => "awaiting_reply",
            Phase::Extracting => "extracting",
            Phase::Reasoning => "reasoning",
            Phase::Aggregating => "aggregating",
            Phase::Done => "done",
            Phase::Cancelled => "cancelled",
        }
    }

    /// No further reasoning happens in a terminal phase.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Done | Phase::Cancelled)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Question,
    Reply,
    Notice,
    Verdict,
    Chat,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    /// `"user"` or `"assistant"`.
    pub role: String,
    pub kind: EntryKind,
    pub content: String,
    pub at: String,
}

/// An outstanding request for facts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactRequest {
    pub request_id: String,
    /// Dotted paths being asked for, one per readable name.
    pub fields: Vec<String>,
    /// One question per field, same order.
    pub questions: Vec<String>,
    /// Why the questions are being asked again, when they are.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,
}

impl FactRequest {
    /// The combined message shown to the user.
    pub fn message(&self) -> String {
        let mut out = String::new();
        if let Some(notice) = &self.notice {
            out.push_str(notice);
            out.push_str("\n\n");
        }
        out.push_str(prompts::QUESTION_INTRO);
        for question in &self.questions {
            out.push_str("\n- ");
            out.push_str(question);
        }
        out
    }
}

/// Everything needed to suspend and resume one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub session_id: String,
    pub phase: Phase,
    pub facts: FactBase,
    pub plan: DeductionPlan,
    pub gaps: GapReport,
    pub results: BTreeMap<DeductionKind, ReasoningResult>,
    pub transcript: Vec<TranscriptEntry>,
    pub pending: Option<FactRequest>,
    pub verdict: Option<Verdict>,
    /// How many times the session has suspended for input.
    pub suspensions: u32,
}

impl SessionState {
    pub fn new(session_id: impl Into<String>, facts: FactBase) -> Self {
        SessionState {
            session_id: session_id.into(),
            phase: Phase::Planning,
            facts,
            plan: DeductionPlan::default(),
            gaps: GapReport::default(),
            results: BTreeMap::new(),
            transcript: Vec::new(),
            pending: None,
            verdict: None,
            suspensions: 0,
        }
    }

    fn transition(&mut self, to: Phase) {
        debug!(session_id = %self.session_id, from = %self.phase, to = %to, "phase transition");
        self.phase = to;
    }

    fn record(&mut self, role: &str, kind: EntryKind, content: impl Into<String>) {
        self.transcript.push(TranscriptEntry {
            role: role.to_string(),
            kind,
            content: content.into(),
            at: now_rfc3339(),
        });
    }
}

/// What a turn ended with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnOutcome {
    NeedsInput(FactRequest),
    Completed(Verdict),
}

pub fn new_session_id() -> String {
    format!("{:016x}{:016x}", rand::random::<u64>(), rand::random::<u64>())
}

fn new_request_id() -> String {
    format!("req-{:016x}", rand::random::<u64>())
}

// ──────────────────────────────────────────────
// Engine
// ──────────────────────────────────────────────

/// Drives sessions through the machine. Holds no per-session state.
pub struct TaxEngine {
    planner: Arc<dyn Planner>,
    generator: Arc<dyn TextGenerator>,
    extractor: Extractor,
    reasoner: Reasoner,
}

impl TaxEngine {
    pub fn new(
        planner: Arc<dyn Planner>,
        generator: Arc<dyn TextGenerator>,
        search: Arc<dyn SearchService>,
    ) -> Self {
        TaxEngine {
            planner,
            extractor: Extractor::new(generator.clone()),
            reasoner: Reasoner::new(generator.clone(), RetrievalAdapter::new(search)),
            generator,
        }
    }

    /// Start a session from the user's initial details.
    pub async fn start(&self, details: Value) -> Result<(SessionState, TurnOutcome), EngineError> {
        self.start_with_id(new_session_id(), details).await
    }

    pub async fn start_with_id(
        &self,
        session_id: String,
        details: Value,
    ) -> Result<(SessionState, TurnOutcome), EngineError> {
        let facts = FactBase::from_json(details)?;
        let mut state = SessionState::new(session_id, facts);
        info!(session_id = %state.session_id, "session started");
        let outcome = self.run(&mut state, None).await?;
        Ok((state, outcome))
    }

    /// Feed the reply to the outstanding fact request and continue.
    ///
    /// The request id must match the pending request. A reply that cannot
    /// be turned into valid facts leaves the facts untouched and re-asks
    /// the same questions under a new request id.
    pub async fn resume(
        &self,
        state: &mut SessionState,
        request_id: &str,
        reply: &str,
    ) -> Result<TurnOutcome, EngineError> {
        if state.phase.is_terminal() {
            return Err(EngineError::SessionClosed { phase: state.phase });
        }
        let pending = match (&state.pending, state.phase) {
            (Some(pending), Phase::AwaitingReply) => pending.clone(),
            _ => return Err(EngineError::NoPendingRequest { phase: state.phase }),
        };
        if pending.request_id != request_id {
            return Err(EngineError::RequestMismatch {
                expected: pending.request_id,
                received: request_id.to_string(),
            });
        }

        state.record("user", EntryKind::Reply, reply);
        state.pending = None;
        state.transition(Phase::Extracting);

        match self.extractor.extract(&pending.questions, reply).await {
            Ok(patch) => {
                let written = patch.apply(&mut state.facts)?;
                info!(
                    session_id = %state.session_id,
                    request_id,
                    facts = written.len(),
                    "reply merged"
                );
                let notice = written.is_empty().then(|| prompts::REPLY_HAD_NO_FACTS.to_string());
                if let Some(notice) = &notice {
                    state.record("assistant", EntryKind::Notice, notice.clone());
                }
                state.transition(Phase::CheckingGaps);
                self.run(state, notice).await
            }
            Err(e) => {
                warn!(session_id = %state.session_id, request_id, error = %e, "reply extraction failed");
                state.record("assistant", EntryKind::Notice, prompts::REPLY_NOT_UNDERSTOOD);
                let request = FactRequest {
                    request_id: new_request_id(),
                    notice: Some(prompts::REPLY_NOT_UNDERSTOOD.to_string()),
                    ..pending
                };
                Ok(self.suspend(state, request))
            }
        }
    }

    /// Abandon a session. Only a session that has not finished can be
    /// cancelled.
    pub fn cancel(&self, state: &mut SessionState) -> Result<(), EngineError> {
        if state.phase.is_terminal() {
            return Err(EngineError::SessionClosed { phase: state.phase });
        }
        state.pending = None;
        state.transition(Phase::Cancelled);
        info!(session_id = %state.session_id, "session cancelled");
        Ok(())
    }

    /// Free-form follow-up chat about a finished session's report.
    pub async fn chat(&self, state: &mut SessionState, message: &str) -> Result<String, EngineError> {
        let report = match (&state.verdict, state.phase) {
            (Some(verdict), Phase::Done) => verdict.report.clone(),
            _ => return Err(EngineError::ChatUnavailable { phase: state.phase }),
        };

        let mut messages = vec![
            Message::user(prompts::chat_context(&report)),
            Message::assistant("I have your report. What would you like to know?"),
        ];
        for entry in state.transcript.iter().filter(|e| e.kind == EntryKind::Chat) {
            messages.push(Message {
                role: entry.role.clone(),
                content: entry.content.clone(),
            });
        }
        messages.push(Message::user(message));

        let reply = self
            .generator
            .generate(GenerationRequest {
                system: prompts::CHAT_SYSTEM.to_string(),
                messages,
                mode: OutputMode::Text,
            })
            .await?;
        state.record("user", EntryKind::Chat, message);
        state.record("assistant", EntryKind::Chat, reply.clone());
        Ok(reply)
    }

    /// Advance until the session suspends or finishes. `notice` is attached
    /// to the fact request if this turn ends by asking again.
    async fn run(
        &self,
        state: &mut SessionState,
        mut notice: Option<String>,
    ) -> Result<TurnOutcome, EngineError> {
        loop {
            match state.phase {
                Phase::Planning => {
                    state.plan = self.planner.plan(&state.facts).await?;
                    debug!(session_id = %state.session_id, deductions = state.plan.len(), "plan ready");
                    state.transition(Phase::CheckingGaps);
                }
                Phase::CheckingGaps => {
                    state.gaps = analyze_gaps(&state.plan, &state.facts);
                    if state.gaps.is_empty() {
                        state.transition(Phase::Reasoning);
                    } else {
                        debug!(
                            session_id = %state.session_id,
                            missing = state.gaps.field_count(),
                            "facts missing"
                        );
                        state.transition(Phase::Asking);
                    }
                }
                Phase::Asking => {
                    let fields = state.gaps.unique_fields();
                    let questions = self.questions_for(&fields).await;
                    let request = FactRequest {
                        request_id: new_request_id(),
                        fields,
                        questions,
                        notice: notice.take(),
                    };
                    return Ok(self.suspend(state, request));
                }
                Phase::AwaitingReply => {
                    return match &state.pending {
                        Some(pending) => Ok(TurnOutcome::NeedsInput(pending.clone())),
                        None => Err(EngineError::NoPendingRequest { phase: state.phase }),
                    };
                }
                Phase::Extracting => {
                    return Err(EngineError::NoPendingRequest { phase: state.phase });
                }
                Phase::Reasoning => {
                    state.results = self
                        .reasoner
                        .reason(&state.plan, &state.facts, &state.gaps)
                        .await;
                    state.transition(Phase::Aggregating);
                }
                Phase::Aggregating => {
                    let verdict = compose_verdict(state.results.clone(), &state.facts);
                    state.record("assistant", EntryKind::Verdict, verdict.report.clone());
                    state.verdict = Some(verdict.clone());
                    state.transition(Phase::Done);
                    info!(
                        session_id = %state.session_id,
                        suspensions = state.suspensions,
                        total_deductions = %verdict.total_deductions,
                        "verdict ready"
                    );
                    return Ok(TurnOutcome::Completed(verdict));
                }
                Phase::Done => {
                    return match &state.verdict {
                        Some(verdict) => Ok(TurnOutcome::Completed(verdict.clone())),
                        None => Err(EngineError::SessionClosed { phase: state.phase }),
                    };
                }
                Phase::Cancelled => {
                    return Err(EngineError::SessionClosed { phase: state.phase });
                }
            }
        }
    }

    fn suspend(&self, state: &mut SessionState, request: FactRequest) -> TurnOutcome {
        state.record("assistant", EntryKind::Question, request.message());
        state.pending = Some(request.clone());
        state.suspensions += 1;
        if state.phase != Phase::Asking {
            state.transition(Phase::Asking);
        }
        state.transition(Phase::AwaitingReply);
        info!(
            session_id = %state.session_id,
            request_id = %request.request_id,
            fields = request.fields.len(),
            "waiting for facts"
        );
        TurnOutcome::NeedsInput(request)
    }

    /// One question per field: generated when possible, catalog text
    /// otherwise.
    async fn questions_for(&self, fields: &[String]) -> Vec<String> {
        let names: Vec<String> = fields
            .iter()
            .map(|f| readable_name(f).replace('_', " "))
            .collect();
        let request = GenerationRequest::text(prompts::QUESTION_SYSTEM, prompts::question_user(&names));
        match self.generator.generate(request).await {
            Ok(text) => {
                let lines = question_lines(&text);
                if lines.len() == fields.len() {
                    return lines;
                }
                debug!(
                    expected = fields.len(),
                    got = lines.len(),
                    "generated questions do not line up with fields, using defaults"
                );
            }
            Err(e) => warn!(error = %e, "question generation failed, using defaults"),
        }
        fields.iter().map(|f| default_question(f)).collect()
    }
}

/// Non-empty lines with list markers removed.
fn question_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(|line| {
            let line = line.trim();
            let unnumbered = line.trim_start_matches(|c: char| c.is_ascii_digit());
            let line = match unnumbered.strip_prefix(['.', ')']) {
                Some(rest) if unnumbered.len() < line.len() => rest,
                _ => line,
            };
            line.trim_start_matches(['-', '*']).trim().to_string()
        })
        .filter(|line| !line.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn question_lines_strip_markers() {
        let lines = question_lines(
            "1. What is your salary?\n\n- How old are you?\n* Any donations?\n80C investments?\n",
        );
        assert_eq!(
            lines,
            vec![
                "What is your salary?",
                "How old are you?",
                "Any donations?",
                "80C investments?"
            ]
        );
    }

    #[test]
    fn request_message_lists_questions() {
        let request = FactRequest {
            request_id: "req-1".into(),
            fields: vec!["salary".into(), "age_self".into()],
            questions: vec!["Salary?".into(), "Age?".into()],
            notice: None,
        };
        assert_eq!(
            request.message(),
            format!("{}\n- Salary?\n- Age?", prompts::QUESTION_INTRO)
        );
    }

    #[test]
    fn request_message_leads_with_notice() {
        let request = FactRequest {
            request_id: "req-2".into(),
            fields: vec!["salary".into()],
            questions: vec!["Salary?".into()],
            notice: Some(prompts::REPLY_NOT_UNDERSTOOD.into()),
        };
        assert_eq!(
            request.message(),
            format!(
                "{}\n\n{}\n- Salary?",
                prompts::REPLY_NOT_UNDERSTOOD,
                prompts::QUESTION_INTRO
            )
        );
    }

    #[test]
    fn ids_have_expected_shape() {
        let session = new_session_id();
        assert_eq!(session.len(), 32);
        assert!(session.chars().all(|c| c.is_ascii_hexdigit()));
        let request = new_request_id();
        assert!(request.starts_with("req-"));
        assert_ne!(new_request_id(), request);
    }

    #[test]
    fn phase_serialises_snake_case() {
        assert_eq!(
            serde_json::to_value(Phase::AwaitingReply).unwrap(),
            serde_json::json!("awaiting_reply")
        );
        assert_eq!(Phase::CheckingGaps.to_string(), "checking_gaps");
        assert!(Phase::Cancelled.is_terminal());
        assert!(!Phase::AwaitingReply.is_terminal());
    }

    #[test]
    fn state_round_trips_through_json() {
        let facts = FactBase::from_json(serde_json::json!({ "salary": 100 })).unwrap();
        let mut state = SessionState::new("abc", facts);
        state.plan = DeductionPlan::from_catalog();
        state.gaps = analyze_gaps(&state.plan, &state.facts);
        let value = serde_json::to_value(&state).unwrap();
        let back: SessionState = serde_json::from_value(value).unwrap();
        assert_eq!(back, state);
    }
}
