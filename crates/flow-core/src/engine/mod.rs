//! Motor de ejecución de patterns.

mod core;
mod invoke;
mod response;

pub use self::core::Orchestrator;
pub use response::{PatternResponse, SkipReason, SkippedStep};
