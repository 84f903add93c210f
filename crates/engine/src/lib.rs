//! taxwise-engine: the tax-reasoning state machine.
//!
//! A session moves from planning through gap analysis to either a request
//! for more facts (and a suspension) or reasoning and a verdict. The
//! text-generation and legal-search services are collaborators behind the
//! [`TextGenerator`] and [`SearchService`] traits; storage is any
//! [`taxwise_storage::SessionStore`].
//!
//! # Public API
//!
//! - [`TaxEngine`] -- start, resume, cancel and chat on a [`SessionState`]
//! - [`SessionService`] -- the same operations over a persistent store
//! - [`CatalogPlanner`], [`GenerativePlanner`] -- deduction planning
//! - [`analyze_gaps`] -- missing facts per deduction
//! - [`Extractor`], [`FactPatch`] -- reply-to-facts extraction and merge
//! - [`RetrievalAdapter`] -- filtered and fallback legal search
//! - [`Reasoner`], [`compose_verdict`] -- results and the final report

pub mod error;
pub mod extract;
pub mod gaps;
pub mod generator;
pub mod machine;
pub mod plan;
pub mod prompts;
pub mod reason;
pub mod retrieval;
pub mod search;
pub mod session;
pub mod verdict;

pub use error::{EngineError, ExtractionError, GenerationError, SearchError};
pub use extract::{Extractor, FactPatch};
pub use gaps::{analyze_gaps, GapReport};
#[cfg(feature = "anthropic")]
pub use generator::AnthropicClient;
pub use generator::{GenerationRequest, Message, OutputMode, TextGenerator};
pub use machine::{
    EntryKind, FactRequest, Phase, SessionState, TaxEngine, TranscriptEntry, TurnOutcome,
};
pub use plan::{CatalogPlanner, DeductionPlan, DeductionPlanEntry, GenerativePlanner, Planner};
pub use reason::Reasoner;
pub use retrieval::{analyze_query, LegalReferences, RetrievalAdapter};
#[cfg(feature = "http-search")]
pub use search::HttpSearchClient;
pub use search::{FieldMatch, SearchFilter, SearchHit, SearchService};
pub use session::SessionService;
pub use verdict::{compose_verdict, Verdict};
