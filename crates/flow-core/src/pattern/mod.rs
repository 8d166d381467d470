//! Patterns: forma declarativa, referencias, condiciones, grafo de
//! dependencias y store.

pub mod condition;
pub mod graph;
pub mod reference;
pub mod spec;
pub mod store;

pub use condition::{Condition, EqualsCondition};
pub use graph::DependencyGraph;
pub use reference::{parse_arg_string, parse_reference, resolve_value, scan_references, Reference, ReferenceError};
pub use spec::{PatternSpec, StepSpec};
pub use store::PatternStore;
