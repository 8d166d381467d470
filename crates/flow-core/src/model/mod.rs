//! Modelos neutrales del motor (RequestCtx, ExecutionState, Provenance,
//! CapabilityResult, StepOutcome).

pub mod context;
pub mod provenance;
pub mod result;
pub mod state;

pub use context::RequestCtx;
pub use provenance::{Provenance, ProvenanceReport, StepProvenance};
pub use result::{CapabilityResult, StepOutcome};
pub use state::ExecutionState;
