//! Reportes estructurados del validador.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueCode {
    EmptyPattern,
    UnknownCapability,
    MissingOutput,
    UnlistedOutput,
    DuplicateOutput,
    OptionalOutput,
    DanglingReference,
    MalformedReference,
    ForwardReference,
    Cycle,
    DuplicateStepKey,
    ShadowedInput,
    ReservedKey,
    MissingArgument,
    UnknownArgument,
    TypeMismatch,
    UnusedInput,
}

impl IssueCode {
    pub fn as_str(self) -> &'static str {
        match self {
            IssueCode::EmptyPattern => "empty_pattern",
            IssueCode::UnknownCapability => "unknown_capability",
            IssueCode::MissingOutput => "missing_output",
            IssueCode::UnlistedOutput => "unlisted_output",
            IssueCode::DuplicateOutput => "duplicate_output",
            IssueCode::OptionalOutput => "optional_output",
            IssueCode::DanglingReference => "dangling_reference",
            IssueCode::MalformedReference => "malformed_reference",
            IssueCode::ForwardReference => "forward_reference",
            IssueCode::Cycle => "cycle",
            IssueCode::DuplicateStepKey => "duplicate_step_key",
            IssueCode::ShadowedInput => "shadowed_input",
            IssueCode::ReservedKey => "reserved_key",
            IssueCode::MissingArgument => "missing_argument",
            IssueCode::UnknownArgument => "unknown_argument",
            IssueCode::TypeMismatch => "type_mismatch",
            IssueCode::UnusedInput => "unused_input",
        }
    }
}

impl fmt::Display for IssueCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error o warning de validación, atribuido a un step cuando aplica.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub code: IssueCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<String>,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(code: IssueCode, message: impl Into<String>) -> Self {
        Self { code,
               step: None,
               message: message.into() }
    }

    pub fn at_step(code: IssueCode, step: impl Into<String>, message: impl Into<String>) -> Self {
        Self { code,
               step: Some(step.into()),
               message: message.into() }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.step {
            Some(step) => write!(f, "[{}] step '{}': {}", self.code, step, self.message),
            None => write!(f, "[{}] {}", self.code, self.message),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub pattern_id: String,
    pub valid: bool,
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn new(pattern_id: impl Into<String>, errors: Vec<ValidationIssue>, warnings: Vec<ValidationIssue>) -> Self {
        Self { pattern_id: pattern_id.into(),
               valid: errors.is_empty(),
               errors,
               warnings }
    }

    pub fn has_error(&self, code: IssueCode) -> bool {
        self.errors.iter().any(|i| i.code == code)
    }

    pub fn has_warning(&self, code: IssueCode) -> bool {
        self.warnings.iter().any(|i| i.code == code)
    }
}

/// Resultado de `validate_all`, indexado por id de pattern.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateReport {
    pub valid: bool,
    pub reports: BTreeMap<String, ValidationReport>,
}

impl AggregateReport {
    pub fn from_reports(reports: impl IntoIterator<Item = ValidationReport>) -> Self {
        let reports: BTreeMap<String, ValidationReport> = reports.into_iter().map(|r| (r.pattern_id.clone(), r)).collect();
        Self { valid: reports.values().all(|r| r.valid),
               reports }
    }

    pub fn invalid_ids(&self) -> Vec<&str> {
        self.reports.values().filter(|r| !r.valid).map(|r| r.pattern_id.as_str()).collect()
    }

    pub fn error_count(&self) -> usize {
        self.reports.values().map(|r| r.errors.len()).sum()
    }

    pub fn warning_count(&self) -> usize {
        self.reports.values().map(|r| r.warnings.len()).sum()
    }
}
