//! Errores del motor de patterns.
//!
//! `FlowError` es la taxonomía que ve el llamador de `Orchestrator::execute`.
//! Las variantes se agrupan en tres clases (`ErrorClass`): defectos de
//! cableado (siempre fatales), fallos del proveedor upstream (recuperables vía
//! cache) y outputs insatisfechos. `CapabilityError` es lo que devuelve un
//! handler; el motor lo traduce añadiendo el step y la capability.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::registry::ValueType;
use crate::validate::ValidationIssue;

#[derive(Debug, Error, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "error", rename_all = "snake_case")]
pub enum FlowError {
    #[error("pattern not found: {pattern_id}")]
    PatternNotFound { pattern_id: String },
    #[error("pattern '{pattern_id}' failed validation: {}", join_issues(.issues))]
    Validation { pattern_id: String, issues: Vec<ValidationIssue> },
    #[error("unknown capability: {name}")]
    UnknownCapability { name: String },
    #[error("capability already registered: {name}")]
    DuplicateCapability { name: String },
    #[error("invalid capability name '{name}' (expected 'namespace.action')")]
    InvalidCapabilityName { name: String },
    #[error("pattern '{pattern_id}' requires input '{input}'")]
    MissingInput { pattern_id: String, input: String },
    #[error("step '{step}' ({capability}): invalid arguments: {reason}")]
    InvalidArguments { step: String, capability: String, reason: String },
    #[error("step '{step}' ({capability}): output type mismatch, expected {expected}, found {found}")]
    OutputTypeMismatch {
        step: String,
        capability: String,
        expected: ValueType,
        found: ValueType,
    },
    #[error("step '{step}' ({capability}): provider failed: {cause}")]
    Provider { step: String, capability: String, cause: String },
    #[error("step '{step}' ({capability}): fresh data required but only cached data of age {age_secs}s is available ({cause})")]
    FreshnessViolation {
        step: String,
        capability: String,
        age_secs: i64,
        cause: String,
    },
    #[error("pattern '{pattern_id}' stalled with outputs missing: {}", .missing.join(", "))]
    UnsatisfiedOutput { pattern_id: String, missing: Vec<String> },
    #[error("internal: {message}")]
    Internal { message: String },
}

/// Clasificación gruesa de un `FlowError`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorClass {
    /// Error de cableado del pattern o del registry. Nunca transitorio.
    Defect,
    /// La fuente de datos upstream falló (con o sin cache disponible).
    Upstream,
    /// El DAG se detuvo con outputs declarados sin producir.
    Unsatisfied,
}

/// Clasifica un error; equivalente a `err.class()`.
pub fn classify_error(err: &FlowError) -> ErrorClass {
    match err {
        FlowError::Provider { .. } | FlowError::FreshnessViolation { .. } => ErrorClass::Upstream,
        FlowError::UnsatisfiedOutput { .. } => ErrorClass::Unsatisfied,
        _ => ErrorClass::Defect,
    }
}

impl FlowError {
    pub fn class(&self) -> ErrorClass {
        classify_error(self)
    }

    /// Step al que se atribuye el error, si aplica.
    pub fn step(&self) -> Option<&str> {
        match self {
            FlowError::InvalidArguments { step, .. }
            | FlowError::OutputTypeMismatch { step, .. }
            | FlowError::Provider { step, .. }
            | FlowError::FreshnessViolation { step, .. } => Some(step),
            _ => None,
        }
    }

    /// Capability involucrada en el error, si aplica.
    pub fn capability(&self) -> Option<&str> {
        match self {
            FlowError::InvalidArguments { capability, .. }
            | FlowError::OutputTypeMismatch { capability, .. }
            | FlowError::Provider { capability, .. }
            | FlowError::FreshnessViolation { capability, .. } => Some(capability),
            FlowError::UnknownCapability { name }
            | FlowError::DuplicateCapability { name }
            | FlowError::InvalidCapabilityName { name } => Some(name),
            _ => None,
        }
    }
}

fn join_issues(issues: &[ValidationIssue]) -> String {
    issues.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

/// Error devuelto por `Capability::invoke`.
///
/// Separa explícitamente el fallo de la fuente de datos (degradable) del
/// defecto de uso (fatal), en lugar de usar el mismo canal para ambos.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CapabilityError {
    #[error("upstream failure: {0}")]
    Upstream(String),
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),
}

impl CapabilityError {
    pub fn upstream(cause: impl Into<String>) -> Self {
        Self::Upstream(cause.into())
    }

    pub fn invalid_arguments(reason: impl Into<String>) -> Self {
        Self::InvalidArguments(reason.into())
    }

    /// Atribuye el error a un step concreto.
    pub fn into_flow_error(self, step: &str, capability: &str) -> FlowError {
        match self {
            CapabilityError::Upstream(cause) => FlowError::Provider { step: step.to_string(),
                                                                      capability: capability.to_string(),
                                                                      cause },
            CapabilityError::InvalidArguments(reason) => FlowError::InvalidArguments { step: step.to_string(),
                                                                                       capability: capability.to_string(),
                                                                                       reason },
        }
    }
}

/// Errores al cargar el Pattern Store desde disco.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid pattern document {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("duplicate pattern id '{id}' in {path}")]
    DuplicateId { id: String, path: PathBuf },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_names_step_and_capability() {
        let err = CapabilityError::upstream("timeout").into_flow_error("y", "b.double");
        assert_eq!(err.to_string(), "step 'y' (b.double): provider failed: timeout");
        assert_eq!(err.step(), Some("y"));
        assert_eq!(err.capability(), Some("b.double"));
        assert_eq!(err.class(), ErrorClass::Upstream);
    }

    #[test]
    fn invalid_arguments_is_a_defect() {
        let err = CapabilityError::invalid_arguments("value must be a number").into_flow_error("y", "b.double");
        assert!(matches!(err, FlowError::InvalidArguments { .. }));
        assert_eq!(classify_error(&err), ErrorClass::Defect);
    }

    #[test]
    fn unsatisfied_output_lists_missing_keys() {
        let err = FlowError::UnsatisfiedOutput { pattern_id: "p".into(),
                                                 missing: vec!["a".into(), "b".into()] };
        assert_eq!(err.to_string(), "pattern 'p' stalled with outputs missing: a, b");
        assert_eq!(err.class(), ErrorClass::Unsatisfied);
    }

    #[test]
    fn errors_serialize_with_a_tag() {
        let err = FlowError::UnknownCapability { name: "x.y".into() };
        let v = serde_json::to_value(&err).expect("serialize");
        assert_eq!(v["error"], "unknown_capability");
        assert_eq!(v["name"], "x.y");
        let back: FlowError = serde_json::from_value(v).expect("deserialize");
        assert_eq!(back, err);
    }
}
