//! Tipos de evento de una ejecución y estructura `ExecutionEvent`.
//!
//! Rol en el flujo:
//! - Cada ejecución del `Orchestrator` emite eventos a un `EventStore`
//!   append-only, correlacionados por `execution_id`.
//! - El orden (`seq`) refleja el orden real de observación: si un step B
//!   depende de A, el `StepCompleted` de A siempre precede al `StepStarted`
//!   de B.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::FlowError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExecutionEventKind {
    /// Primer evento de toda ejecución.
    ExecutionStarted { pattern_id: String, subject_id: String },
    /// Se despacha un ready set.
    RoundStarted { round: usize, steps: Vec<String> },
    StepStarted { step: String, capability: String },
    /// Resultado mergeado en el estado.
    StepCompleted { step: String, capability: String, cache_hit: bool },
    /// Resultado mergeado con confianza reducida.
    StepDegraded { step: String, capability: String, reason: String },
    /// El step no corrió (condición falsa, dependencia ausente o fallo
    /// upstream de un step opcional).
    StepSkipped { step: String, reason: String },
    StepFailed { step: String, capability: String, error: FlowError },
    ExecutionCompleted { pattern_id: String, min_confidence: f64, degraded: bool },
    ExecutionFailed { pattern_id: String, error: FlowError },
}

impl ExecutionEventKind {
    /// Código compacto de una letra (útil en tests y logs).
    pub fn code(&self) -> &'static str {
        match self {
            ExecutionEventKind::ExecutionStarted { .. } => "I",
            ExecutionEventKind::RoundStarted { .. } => "R",
            ExecutionEventKind::StepStarted { .. } => "S",
            ExecutionEventKind::StepCompleted { .. } => "F",
            ExecutionEventKind::StepDegraded { .. } => "D",
            ExecutionEventKind::StepSkipped { .. } => "K",
            ExecutionEventKind::StepFailed { .. } => "X",
            ExecutionEventKind::ExecutionCompleted { .. } => "C",
            ExecutionEventKind::ExecutionFailed { .. } => "E",
        }
    }

    /// Step al que se refiere el evento, si aplica.
    pub fn step(&self) -> Option<&str> {
        match self {
            ExecutionEventKind::StepStarted { step, .. }
            | ExecutionEventKind::StepCompleted { step, .. }
            | ExecutionEventKind::StepDegraded { step, .. }
            | ExecutionEventKind::StepSkipped { step, .. }
            | ExecutionEventKind::StepFailed { step, .. } => Some(step),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionEvent {
    pub seq: u64, // asignado por el EventStore (orden append)
    pub execution_id: Uuid,
    pub kind: ExecutionEventKind,
    pub ts: DateTime<Utc>,
}
