//! End-to-end flows through the state machine with scripted collaborators.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use taxwise_core::{DeductionKind, FactBase};
use taxwise_engine::prompts;
use taxwise_engine::{
    analyze_gaps, CatalogPlanner, DeductionPlan, EngineError, EntryKind, GenerationError,
    GenerationRequest, GenerativePlanner, Phase, Reasoner, RetrievalAdapter, SearchError,
    SearchFilter, SearchHit, SearchService, SessionService, TaxEngine, TextGenerator, TurnOutcome,
};
use taxwise_storage::InMemorySessionStore;

// ──────────────────────────────────────────────
// Scripted collaborators
// ──────────────────────────────────────────────

/// Replies from per-step queues, chosen by the request's system prompt.
/// Question generation is never scripted, so requests use catalog text.
#[derive(Default)]
struct ScriptedGenerator {
    plans: Mutex<VecDeque<String>>,
    extractions: Mutex<VecDeque<String>>,
    inferences: Mutex<VecDeque<String>>,
    chats: Mutex<VecDeque<String>>,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedGenerator {
    fn extraction(self, reply: Value) -> Self {
        self.extractions.lock().unwrap().push_back(reply.to_string());
        self
    }

    fn raw_extraction(self, reply: &str) -> Self {
        self.extractions.lock().unwrap().push_back(reply.to_string());
        self
    }

    fn plan(self, plan: Value) -> Self {
        self.plans.lock().unwrap().push_back(plan.to_string());
        self
    }

    fn inference(self, reply: Value) -> Self {
        self.inferences.lock().unwrap().push_back(reply.to_string());
        self
    }

    fn chat(self, reply: &str) -> Self {
        self.chats.lock().unwrap().push_back(reply.to_string());
        self
    }

    fn requests_with_system(&self, system: &str) -> Vec<GenerationRequest> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.system == system)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, request: GenerationRequest) -> Result<String, GenerationError> {
        let queue = if request.system == prompts::EXTRACTION_SYSTEM {
            Some(&self.extractions)
        } else if request.system == prompts::plan_system() {
            Some(&self.plans)
        } else if request.system == prompts::reason_system() {
            Some(&self.inferences)
        } else if request.system == prompts::CHAT_SYSTEM {
            Some(&self.chats)
        } else {
            None
        };
        self.requests.lock().unwrap().push(request);
        queue
            .and_then(|q| q.lock().unwrap().pop_front())
            .ok_or_else(|| GenerationError::Network("no scripted response".to_string()))
    }
}

/// Returns the same passages from every collection, failing one of them.
#[derive(Default)]
struct StaticSearch {
    hits: HashMap<String, Vec<&'static str>>,
    calls: Mutex<Vec<(String, bool)>>,
}

#[async_trait]
impl SearchService for StaticSearch {
    async fn search(
        &self,
        collection: &str,
        _query: &str,
        _k: usize,
        filter: Option<&SearchFilter>,
    ) -> Result<Vec<SearchHit>, SearchError> {
        self.calls
            .lock()
            .unwrap()
            .push((collection.to_string(), filter.is_some()));
        match self.hits.get(collection) {
            Some(texts) => Ok(texts
                .iter()
                .map(|t| SearchHit {
                    text: t.to_string(),
                    score: 0.8,
                })
                .collect()),
            None => Err(SearchError::Network("collection offline".to_string())),
        }
    }
}

fn engine(generator: Arc<ScriptedGenerator>) -> TaxEngine {
    TaxEngine::new(
        Arc::new(CatalogPlanner),
        generator,
        Arc::new(StaticSearch::default()),
    )
}

/// Every catalog field for a 35-year-old salaried taxpayer.
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

fn expect_request(outcome: TurnOutcome) -> taxwise_engine::FactRequest {
    match outcome {
        TurnOutcome::NeedsInput(request) => request,
        TurnOutcome::Completed(_) => panic!("expected a fact request, got a verdict"),
    }
}

fn expect_verdict(outcome: TurnOutcome) -> taxwise_engine::Verdict {
    match outcome {
        TurnOutcome::Completed(verdict) => verdict,
        TurnOutcome::NeedsInput(r) => panic!("expected a verdict, got request for {:?}", r.fields),
    }
}

// ──────────────────────────────────────────────
// Machine
// ──────────────────────────────────────────────

#[tokio::test]
async fn full_facts_reach_verdict_without_suspension() {
    let generator = Arc::new(ScriptedGenerator::default());
    let engine = engine(generator.clone());

    let (state, outcome) = engine.start(full_profile()).await.unwrap();
    let verdict = expect_verdict(outcome);

    assert_eq!(state.suspensions, 0);
    assert_eq!(state.phase, Phase::Done);
    assert!(state.pending.is_none());
    assert!(generator.requests.lock().unwrap().is_empty());

    assert_eq!(verdict.lines.len(), DeductionKind::KNOWN.len());
    assert!(verdict.lines.values().all(|r| !r.is_not_applicable()));
    assert_eq!(verdict.gross_income, Decimal::from(1_228_000));
    assert_eq!(verdict.total_deductions, Decimal::from(308_000));
    assert_eq!(verdict.total_taxable_income, Decimal::from(920_000));
    assert_eq!(verdict.tax_liability.slab_tax, Decimal::from(96_500));
    assert_eq!(verdict.tax_liability.total, Decimal::from(100_360));
    assert!(verdict.report.contains("**Estimated Total Deductions**: ₹3,08,000.00"));

    let verdict_entries = state
        .transcript
        .iter()
        .filter(|e| e.kind == EntryKind::Verdict)
        .count();
    assert_eq!(verdict_entries, 1);
}

#[tokio::test]
async fn disability_flag_is_asked_before_type() {
    let generator = Arc::new(
        ScriptedGenerator::default()
            .extraction(json!({ "is_disabled": true }))
            .extraction(json!({ "disability_type": "severe_disability" })),
    );
    let engine = engine(generator.clone());
    let mut profile = full_profile();
    profile.as_object_mut().unwrap().remove("disability_details");

    let (mut state, outcome) = engine.start(profile).await.unwrap();
    let first = expect_request(outcome);
    assert_eq!(first.fields, vec!["disability_details.is_disabled"]);
    assert_eq!(state.phase, Phase::AwaitingReply);

    let second = expect_request(
        engine
            .resume(&mut state, &first.request_id, "Yes, my brother is disabled.")
            .await
            .unwrap(),
    );
    assert_eq!(second.fields, vec!["disability_details.type"]);
    assert_ne!(second.request_id, first.request_id);
    assert_eq!(second.notice, None);

    let verdict = expect_verdict(
        engine
            .resume(&mut state, &second.request_id, "It is severe, over 80%.")
            .await
            .unwrap(),
    );
    assert_eq!(verdict.lines[&DeductionKind::Section80DD].amount, "₹1,25,000");
    assert_eq!(state.suspensions, 2);
}

#[tokio::test]
async fn request_bundles_each_field_once() {
    let generator = Arc::new(ScriptedGenerator::default());
    let engine = engine(generator);

    let (state, outcome) = engine.start(json!({})).await.unwrap();
    let request = expect_request(outcome);

    let names: Vec<&str> = request
        .fields
        .iter()
        .map(|f| f.rsplit('.').next().unwrap())
        .collect();
    let mut unique = names.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(names.len(), unique.len());
    assert_eq!(names.iter().filter(|n| **n == "age_self").count(), 1);
    assert_eq!(request.questions.len(), request.fields.len());
    assert!(!request.fields.contains(&"disability_details.type".to_string()));

    // Question generation is unavailable, so catalog questions are used.
    assert!(request
        .questions
        .iter()
        .any(|q| q == taxwise_core::catalog::field("salary").unwrap().question));

    let question = state.transcript.last().unwrap();
    assert_eq!(question.kind, EntryKind::Question);
    assert!(question.content.starts_with(prompts::QUESTION_INTRO));
}

#[tokio::test]
async fn mismatched_request_id_is_rejected() {
    let generator = Arc::new(ScriptedGenerator::default().extraction(json!({ "salary": 1 })));
    let engine = engine(generator.clone());
    let (mut state, _) = engine.start(json!({})).await.unwrap();
    let before = state.clone();

    let err = engine
        .resume(&mut state, "req-0000000000000000", "salary is 10 lakh")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::RequestMismatch { .. }));
    assert!(err.is_integrity_failure());
    assert_eq!(state, before);
    assert!(generator.requests_with_system(prompts::EXTRACTION_SYSTEM).is_empty());
}

#[tokio::test]
async fn invalid_extraction_reasks_same_questions() {
    let generator = Arc::new(
        ScriptedGenerator::default()
            .extraction(json!({ "shoe_size": 9 }))
            .raw_extraction("I could not find anything."),
    );
    let engine = engine(generator);
    let (mut state, outcome) = engine.start(json!({ "salary": 900000 })).await.unwrap();
    let first = expect_request(outcome);
    let facts_before = state.facts.clone();

    let second = expect_request(engine.resume(&mut state, &first.request_id, "size 9").await.unwrap());
    assert_eq!(second.fields, first.fields);
    assert_eq!(second.questions, first.questions);
    assert_ne!(second.request_id, first.request_id);
    assert_eq!(state.facts, facts_before);
    assert!(state.transcript.iter().any(|e| e.kind == EntryKind::Notice));
    assert_eq!(first.notice, None);
    assert_eq!(second.notice.as_deref(), Some(prompts::REPLY_NOT_UNDERSTOOD));
    assert!(second.message().starts_with(prompts::REPLY_NOT_UNDERSTOOD));
    assert_ne!(second.message(), first.message());
    assert_eq!(
        state.pending.as_ref().and_then(|p| p.notice.as_deref()),
        Some(prompts::REPLY_NOT_UNDERSTOOD)
    );

    // The superseded request id is no longer accepted.
    let err = engine
        .resume(&mut state, &first.request_id, "again")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::RequestMismatch { .. }));

    let third = expect_request(engine.resume(&mut state, &second.request_id, "hmm").await.unwrap());
    assert_eq!(third.fields, first.fields);
    assert!(third.message().contains("couldn't understand"));
    assert_eq!(state.suspensions, 3);
}

#[tokio::test]
async fn reply_without_requested_facts_is_flagged() {
    let generator = Arc::new(ScriptedGenerator::default().extraction(json!({ "salary": null })));
    let engine = engine(generator);
    let (mut state, outcome) = engine.start(json!({ "salary": 900000 })).await.unwrap();
    let first = expect_request(outcome);

    let second = expect_request(
        engine
            .resume(&mut state, &first.request_id, "Nice weather today.")
            .await
            .unwrap(),
    );
    assert_eq!(second.fields, first.fields);
    assert_eq!(second.notice.as_deref(), Some(prompts::REPLY_HAD_NO_FACTS));
    assert!(second.message().starts_with(prompts::REPLY_HAD_NO_FACTS));
}

#[tokio::test]
async fn merging_a_patch_never_adds_gaps() {
    let generator = Arc::new(
        ScriptedGenerator::default()
            .extraction(json!({ "salary": 800000, "user_age": 64, "parents_age": [88, 90] }))
            .extraction(json!({ "is_disabled": true }))
            .extraction(json!({ "donation_amount": 0, "nps_contribution": null })),
    );
    let engine = engine(generator);
    let (mut state, outcome) = engine.start(json!({})).await.unwrap();
    let mut request = expect_request(outcome);
    let mut missing = state.gaps.field_count();

    for reply in ["first", "second", "third"] {
        request = expect_request(
            engine
                .resume(&mut state, &request.request_id, reply)
                .await
                .unwrap(),
        );
        let now = state.gaps.field_count();
        assert!(now <= missing, "{reply}: gaps grew from {missing} to {now}");
        missing = now;
    }
    assert_eq!(state.facts.age("parents_age"), 90);
    assert_eq!(state.facts.get("is_senior_citizen"), Some(&json!(true)));
    assert!(!state.facts.contains("investments.nps_contribution"));
}

#[tokio::test]
async fn not_applicable_exactly_when_gaps_remain() {
    let facts = FactBase::from_json(json!({
        "salary": 700000,
        "age_self": 40,
        "investments": { "80C_investments": 20000 },
        "disability_details": { "is_disabled": true }
    }))
    .unwrap();
    let plan = DeductionPlan::from_catalog();
    let gaps = analyze_gaps(&plan, &facts);
    let reasoner = Reasoner::new(
        Arc::new(ScriptedGenerator::default()),
        RetrievalAdapter::new(Arc::new(StaticSearch::default())),
    );

    let results = reasoner.reason(&plan, &facts, &gaps).await;
    assert_eq!(results.len(), plan.len());
    for (kind, result) in &results {
        assert_eq!(
            result.is_not_applicable(),
            !gaps.missing_for(kind).is_empty(),
            "{kind}"
        );
    }
    let dd = &results[&DeductionKind::Section80DD];
    assert_eq!(dd.summary, "Missing required data: type");
}

#[tokio::test]
async fn unrecognised_deduction_is_reasoned_from_retrieval() {
    let plan = json!({
        "section_80U_deduction": {
            "eligibility_criteria": "Resident individual with a certified disability",
            "required_fields": ["disability_details.is_disabled"],
            "query": "Section 80U deduction per Rule 11A"
        }
    });
    let generator = Arc::new(
        ScriptedGenerator::default()
            .plan(plan)
            .inference(json!({
                "amount": "₹75,000",
                "summary": "Flat deduction for a person with disability.",
                "citations": ["Section 80U"]
            })),
    );
    let mut hits = HashMap::new();
    hits.insert("tax_law_chunks".to_string(), vec!["80U passage", "shared passage"]);
    hits.insert("tax_rules_chunks".to_string(), vec!["shared passage", "Rule 11A passage"]);
    hits.insert("capital_gain_cases".to_string(), vec!["shared passage"]);
    let search = Arc::new(StaticSearch {
        hits,
        calls: Mutex::new(Vec::new()),
    });
    let engine = TaxEngine::new(
        Arc::new(GenerativePlanner::new(generator.clone())),
        generator.clone(),
        search.clone(),
    );

    let (_, outcome) = engine.start(full_profile()).await.unwrap();
    let verdict = expect_verdict(outcome);

    let other = DeductionKind::Other("section_80U_deduction".to_string());
    assert_eq!(verdict.lines[&other].amount, "₹75,000");
    assert_eq!(verdict.lines.len(), DeductionKind::KNOWN.len() + 1);
    assert_eq!(verdict.total_deductions, Decimal::from(383_000));

    // Precision, fallback and supporting searches; one supporting collection fails.
    let calls = search.calls.lock().unwrap();
    assert_eq!(calls.len(), 6);
    assert_eq!(calls.iter().filter(|(_, filtered)| *filtered).count(), 4);

    let inference = generator.requests_with_system(&prompts::reason_system());
    assert_eq!(inference.len(), 1);
    let context = &inference[0].messages[0].content;
    assert_eq!(context.matches("shared passage").count(), 1);
    let first = context.find("80U passage").unwrap();
    let shared = context.find("shared passage").unwrap();
    let rule = context.find("Rule 11A passage").unwrap();
    assert!(first < shared && shared < rule);
}

#[tokio::test]
async fn unusable_plan_output_falls_back_to_catalog() {
    let generator = Arc::new(ScriptedGenerator::default());
    generator
        .plans
        .lock()
        .unwrap()
        .push_back("Here are some deductions you might like".to_string());
    let engine = TaxEngine::new(
        Arc::new(GenerativePlanner::new(generator.clone())),
        generator,
        Arc::new(StaticSearch::default()),
    );
    let (state, outcome) = engine.start(full_profile()).await.unwrap();
    expect_verdict(outcome);
    assert_eq!(state.plan, DeductionPlan::from_catalog());
}

// ──────────────────────────────────────────────
// Session service
// ──────────────────────────────────────────────

#[tokio::test]
async fn service_persists_each_turn() {
    let generator = Arc::new(
        ScriptedGenerator::default()
            .extraction(json!({ "is_disabled": false }))
            .chat("Your 80C investments are already at the limit."),
    );
    let service = SessionService::new(
        Arc::new(engine(generator)),
        Arc::new(InMemorySessionStore::new()),
    );
    let mut profile = full_profile();
    profile.as_object_mut().unwrap().remove("disability_details");

    let (session_id, outcome) = service.start(profile).await.unwrap();
    let request = expect_request(outcome);
    let stored = service.get(&session_id).await.unwrap();
    assert_eq!(stored.phase, Phase::AwaitingReply);
    assert_eq!(stored.pending.as_ref().unwrap().request_id, request.request_id);

    let err = service.chat(&session_id, "too early").await.unwrap_err();
    assert!(matches!(err, EngineError::ChatUnavailable { .. }));

    let verdict = expect_verdict(
        service
            .reply(&session_id, &request.request_id, "No disabilities.")
            .await
            .unwrap(),
    );
    let stored = service.get(&session_id).await.unwrap();
    assert_eq!(stored.phase, Phase::Done);
    assert_eq!(stored.verdict.as_ref(), Some(&verdict));

    let answer = service
        .chat(&session_id, "Can I invest more in 80C?")
        .await
        .unwrap();
    assert!(answer.contains("limit"));
    let stored = service.get(&session_id).await.unwrap();
    let chats: Vec<_> = stored
        .transcript
        .iter()
        .filter(|e| e.kind == EntryKind::Chat)
        .collect();
    assert_eq!(chats.len(), 2);
    assert_eq!(chats[0].role, "user");

    let summaries = service.list(0).await.unwrap();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].session_id, session_id);
}

#[tokio::test]
async fn cancelled_session_rejects_replies() {
    let generator = Arc::new(ScriptedGenerator::default());
    let service = SessionService::new(
        Arc::new(engine(generator)),
        Arc::new(InMemorySessionStore::new()),
    );
    let (session_id, outcome) = service.start(json!({})).await.unwrap();
    let request = expect_request(outcome);

    service.cancel(&session_id).await.unwrap();
    let err = service
        .reply(&session_id, &request.request_id, "salary 10 lakh")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::SessionClosed { phase: Phase::Cancelled }));
    assert!(matches!(
        service.cancel(&session_id).await.unwrap_err(),
        EngineError::SessionClosed { .. }
    ));
}

#[tokio::test]
async fn unknown_session_is_not_found() {
    let service = SessionService::new(
        Arc::new(engine(Arc::new(ScriptedGenerator::default()))),
        Arc::new(InMemorySessionStore::new()),
    );
    let err = service.get("does-not-exist").await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn suspended_session_survives_reload() {
    let generator = Arc::new(ScriptedGenerator::default().extraction(json!({ "salary": 500000 })));
    let engine = engine(generator);
    let (state, outcome) = engine.start(json!({})).await.unwrap();
    let request = expect_request(outcome);

    let persisted = serde_json::to_value(&state).unwrap();
    let mut reloaded: taxwise_engine::SessionState = serde_json::from_value(persisted).unwrap();
    assert_eq!(reloaded, state);

    let next = expect_request(
        engine
            .resume(&mut reloaded, &request.request_id, "I earn 5 lakh")
            .await
            .unwrap(),
    );
    assert!(!next.fields.contains(&"salary".to_string()));
}
