//! Resultado de una capability y desenlace de un step.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::Provenance;
use crate::errors::FlowError;

/// Valor devuelto por `Capability::invoke`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityResult {
    pub payload: Value,
    pub provenance: Provenance,
    /// Error no fatal reportado por el handler junto a un payload utilizable
    /// (p.ej. datos parciales). El motor lo trata como degradación.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CapabilityResult {
    pub fn new(payload: Value, provenance: Provenance) -> Self {
        Self { payload,
               provenance,
               error: None }
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

/// Desenlace de invocar un step.
///
/// Tres casos explícitos para que "degradar y seguir" no se confunda con un
/// fallo duro, ni al revés.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    /// Resultado vivo o hit de cache fresco.
    Ok(CapabilityResult),
    /// Resultado utilizable pero de confianza reducida.
    Degraded { result: CapabilityResult, reason: String },
    /// Sin resultado utilizable.
    Fatal(FlowError),
}

impl StepOutcome {
    pub fn is_fatal(&self) -> bool {
        matches!(self, StepOutcome::Fatal(_))
    }

    pub fn result(&self) -> Option<&CapabilityResult> {
        match self {
            StepOutcome::Ok(result) | StepOutcome::Degraded { result, .. } => Some(result),
            StepOutcome::Fatal(_) => None,
        }
    }
}
