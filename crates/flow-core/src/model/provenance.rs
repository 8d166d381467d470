//! Envelope de procedencia y reporte agregado de una ejecución.
//!
//! Invariante: un valor stub o servido como fallback lleva `confidence = 0`,
//! y eso tiene que ser visible en el reporte final (`min_confidence`,
//! `stale`, `degraded`). Nunca se "limpia" un envelope degradado.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    /// Identificador de la fuente (proveedor, modelo, etc.).
    pub source: String,
    pub asof: NaiveDate,
    /// TTL en segundos con el que se cacheó (0 = no cacheable).
    pub ttl_secs: u64,
    pub is_stub: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    /// 0.0 ..= 1.0
    pub confidence: f64,
    #[serde(default)]
    pub stale: bool,
    #[serde(default)]
    pub cache_hit: bool,
}

impl Provenance {
    pub fn new(source: impl Into<String>, asof: NaiveDate) -> Self {
        Self { source: source.into(),
               asof,
               ttl_secs: 0,
               is_stub: false,
               warnings: Vec::new(),
               confidence: 1.0,
               stale: false,
               cache_hit: false }
    }

    pub fn with_ttl(mut self, ttl_secs: u64) -> Self {
        self.ttl_secs = ttl_secs;
        self
    }

    /// Marca el valor como stub: siempre con confianza cero.
    pub fn stub(mut self) -> Self {
        self.is_stub = true;
        self.confidence = 0.0;
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = if self.is_stub { 0.0 } else { confidence.clamp(0.0, 1.0) };
        self
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }

    /// Sustitución por datos cacheados tras un fallo del live call.
    pub(crate) fn degrade(&mut self, warning: String) {
        self.stale = true;
        self.confidence = 0.0;
        self.warnings.push(warning);
    }

    /// Resultado parcial (`CapabilityResult.error`): confianza cero, no stale.
    pub(crate) fn mark_partial(&mut self, warning: String) {
        self.confidence = 0.0;
        self.warnings.push(warning);
    }

    pub fn is_degraded(&self) -> bool {
        self.stale || self.is_stub || self.confidence <= 0.0
    }
}

/// Procedencia atribuida a un step concreto.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepProvenance {
    pub step: String,
    pub capability: String,
    #[serde(flatten)]
    pub provenance: Provenance,
}

/// Resumen de procedencia de toda la ejecución.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvenanceReport {
    pub entries: Vec<StepProvenance>,
    /// Mínimo de `confidence` entre todos los envelopes (1.0 si no hay).
    pub min_confidence: f64,
    /// Algún valor se sirvió desde cache stale.
    pub stale: bool,
    /// Algún valor es stub o stale.
    pub degraded: bool,
}

impl ProvenanceReport {
    pub fn from_entries(entries: Vec<StepProvenance>) -> Self {
        let min_confidence = entries.iter().map(|e| e.provenance.confidence).fold(1.0_f64, f64::min);
        let stale = entries.iter().any(|e| e.provenance.stale);
        let degraded = entries.iter().any(|e| e.provenance.is_degraded());
        Self { entries,
               min_confidence,
               stale,
               degraded }
    }

    pub fn entry(&self, step: &str) -> Option<&StepProvenance> {
        self.entries.iter().find(|e| e.step == step)
    }

    /// Steps cuyo valor no es de plena confianza.
    pub fn degraded_steps(&self) -> Vec<&str> {
        self.entries.iter().filter(|e| e.provenance.is_degraded()).map(|e| e.step.as_str()).collect()
    }
}
