//! flow-core: motor de orquestación de patterns y dispatch de capabilities.
pub mod cache;
pub mod config;
pub mod constants;
pub mod engine;
pub mod errors;
pub mod event;
pub mod hashing;
pub mod model;
pub mod pattern;
pub mod registry;
pub mod validate;

pub use cache::{CacheKey, CacheStats, Clock, ManualClock, ProvenanceCache, SystemClock};
pub use config::EngineConfig;
pub use engine::{Orchestrator, PatternResponse, SkipReason, SkippedStep};
pub use errors::{classify_error, CapabilityError, ErrorClass, FlowError, StoreError};
pub use event::{EventStore, ExecutionEvent, ExecutionEventKind, InMemoryEventStore};
pub use model::{CapabilityResult, ExecutionState, Provenance, ProvenanceReport, RequestCtx, StepOutcome, StepProvenance};
pub use pattern::{Condition, PatternSpec, PatternStore, StepSpec};
pub use registry::{capability_fn, Args, Capability, CapabilityRegistry, CapabilitySignature, ProviderModule, ValueType};
pub use validate::{AggregateReport, IssueCode, PatternValidator, ValidationIssue, ValidationReport};
