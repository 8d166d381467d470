use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::model::ProvenanceReport;

/// Motivo por el que un step no produjo su clave.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    ConditionFalse,
    /// Un productor upstream terminó sin dejar la clave en el estado.
    DependencyUnavailable { missing: Vec<String> },
    /// Step opcional cuyo live call falló sin cache disponible.
    ProviderFailed { cause: String },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::ConditionFalse => f.write_str("condition evaluated false"),
            SkipReason::DependencyUnavailable { missing } => write!(f, "dependency unavailable: {}", missing.join(", ")),
            SkipReason::ProviderFailed { cause } => write!(f, "optional step failed upstream: {cause}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedStep {
    pub step: String,
    pub capability: String,
    pub reason: SkipReason,
}

/// Respuesta de una ejecución exitosa (posiblemente degradada).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternResponse {
    pub pattern_id: String,
    pub execution_id: Uuid,
    /// Outputs declarados, en el orden del pattern.
    pub outputs: IndexMap<String, Value>,
    pub provenance: ProvenanceReport,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<SkippedStep>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl PatternResponse {
    pub fn output(&self, key: &str) -> Option<&Value> {
        self.outputs.get(key)
    }

    pub fn min_confidence(&self) -> f64 {
        self.provenance.min_confidence
    }

    pub fn is_degraded(&self) -> bool {
        self.provenance.degraded
    }
}
