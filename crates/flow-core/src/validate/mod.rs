//! Validador estático de patterns ("linter").
//!
//! Puro: no invoca capabilities ni toca la cache. Se usa desde el CLI (CI) y
//! al inicio de cada ejecución del motor.

mod checks;
pub mod report;

use log::debug;

pub use report::{AggregateReport, IssueCode, ValidationIssue, ValidationReport};

use crate::errors::FlowError;
use crate::pattern::{PatternSpec, PatternStore};
use crate::registry::CapabilityRegistry;

#[derive(Debug, Clone, Copy)]
pub struct PatternValidator<'a> {
    registry: &'a CapabilityRegistry,
}

impl<'a> PatternValidator<'a> {
    pub fn new(registry: &'a CapabilityRegistry) -> Self {
        Self { registry }
    }

    pub fn validate_spec(&self, spec: &PatternSpec) -> ValidationReport {
        let mut findings = checks::Findings::default();
        checks::check_keys(spec, &mut findings);
        checks::check_capabilities(spec, self.registry, &mut findings);
        checks::check_outputs(spec, &mut findings);
        checks::check_references(spec, &mut findings);
        checks::check_cycles(spec, &mut findings);
        checks::check_signatures(spec, self.registry, &mut findings);
        let report = ValidationReport::new(spec.id.clone(), findings.errors, findings.warnings);
        debug!("[validate] '{}': {} error(s), {} warning(s)", report.pattern_id, report.errors.len(), report.warnings.len());
        report
    }

    pub fn validate(&self, store: &PatternStore, pattern_id: &str) -> Result<ValidationReport, FlowError> {
        let spec = store.get(pattern_id)
                        .ok_or_else(|| FlowError::PatternNotFound { pattern_id: pattern_id.to_string() })?;
        Ok(self.validate_spec(&spec))
    }

    pub fn validate_all(&self, store: &PatternStore) -> AggregateReport {
        AggregateReport::from_reports(store.ids().into_iter().filter_map(|id| store.get(&id)).map(|spec| self.validate_spec(&spec)))
    }
}
