//! Chequeos individuales. Cada uno empuja issues a un `Findings`; ninguno
//! tiene efectos fuera de él.

use std::collections::{HashMap, HashSet};

use serde_json::Value;

use super::report::{IssueCode, ValidationIssue};
use crate::constants::CTX_KEY;
use crate::pattern::{parse_arg_string, DependencyGraph, PatternSpec, Reference, ReferenceError, StepSpec};
use crate::registry::{CapabilityRegistry, ValueType};

#[derive(Debug, Default)]
pub(super) struct Findings {
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
}

impl Findings {
    fn error(&mut self, issue: ValidationIssue) {
        self.errors.push(issue);
    }

    fn warn(&mut self, issue: ValidationIssue) {
        self.warnings.push(issue);
    }
}

pub(super) fn check_keys(spec: &PatternSpec, out: &mut Findings) {
    if spec.steps.is_empty() {
        out.warn(ValidationIssue::new(IssueCode::EmptyPattern, "pattern declares no steps"));
    }
    let mut seen_inputs = HashSet::new();
    for input in &spec.inputs {
        if input == CTX_KEY {
            out.error(ValidationIssue::new(IssueCode::ReservedKey, format!("'{CTX_KEY}' is reserved and cannot be an input")));
        }
        seen_inputs.insert(input.as_str());
    }
    let mut seen_keys = HashSet::new();
    for step in &spec.steps {
        let key = step.output_key.as_str();
        if key == CTX_KEY {
            out.error(ValidationIssue::at_step(IssueCode::ReservedKey, key, format!("'{CTX_KEY}' is reserved and cannot be a step key")));
        }
        if !seen_keys.insert(key) {
            out.error(ValidationIssue::at_step(IssueCode::DuplicateStepKey, key, format!("key '{key}' is produced by more than one step")));
        }
        if seen_inputs.contains(key) {
            out.error(ValidationIssue::at_step(IssueCode::ShadowedInput, key, format!("key '{key}' shadows a declared input")));
        }
    }
}

pub(super) fn check_capabilities(spec: &PatternSpec, registry: &CapabilityRegistry, out: &mut Findings) {
    for step in &spec.steps {
        if !registry.contains(&step.capability) {
            out.error(ValidationIssue::at_step(IssueCode::UnknownCapability,
                                               step.id(),
                                               format!("unknown capability '{}'", step.capability)));
        }
    }
}

pub(super) fn check_outputs(spec: &PatternSpec, out: &mut Findings) {
    let mut listed = HashSet::new();
    for key in &spec.outputs {
        if !listed.insert(key.as_str()) {
            out.warn(ValidationIssue::new(IssueCode::DuplicateOutput, format!("output '{key}' is listed twice")));
            continue;
        }
        match spec.step_for(key) {
            None => out.error(ValidationIssue::new(IssueCode::MissingOutput, format!("output '{key}' is not produced by any step"))),
            Some(step) if step.optional => out.warn(ValidationIssue::at_step(IssueCode::OptionalOutput,
                                                                             key.as_str(),
                                                                             "declared output is produced by an optional step")),
            Some(_) => {}
        }
    }
    for step in &spec.steps {
        if !listed.contains(step.id()) {
            out.warn(ValidationIssue::at_step(IssueCode::UnlistedOutput, step.id(), "produced key is not a declared output"));
        }
    }
}

/// Referencias en args y condiciones: sintaxis, resolución y orden.
pub(super) fn check_references(spec: &PatternSpec, out: &mut Findings) {
    let inputs: HashSet<&str> = spec.inputs.iter().map(String::as_str).collect();
    let positions: HashMap<&str, usize> = spec.steps.iter().enumerate().rev().map(|(i, s)| (s.id(), i)).collect();
    let mut used_inputs: HashSet<&str> = HashSet::new();

    for (idx, step) in spec.steps.iter().enumerate() {
        for reference in step_references(step) {
            let reference = match reference {
                Ok(r) => r,
                Err(err) => {
                    out.error(ValidationIssue::at_step(IssueCode::MalformedReference, step.id(), err.to_string()));
                    continue;
                }
            };
            let Some(key) = reference.state_key() else {
                continue;
            };
            if let Some(&producer) = positions.get(key) {
                if producer > idx {
                    out.warn(ValidationIssue::at_step(IssueCode::ForwardReference,
                                                      step.id(),
                                                      format!("'{reference}' refers to a step declared later")));
                }
            } else if let Some(&input) = inputs.get(key) {
                used_inputs.insert(input);
            } else {
                out.error(ValidationIssue::at_step(IssueCode::DanglingReference,
                                                   step.id(),
                                                   format!("'{reference}' does not match any input or step key")));
            }
        }
    }

    for input in &spec.inputs {
        if !used_inputs.contains(input.as_str()) && input != CTX_KEY {
            out.warn(ValidationIssue::new(IssueCode::UnusedInput, format!("input '{input}' is never referenced")));
        }
    }
}

fn step_references(step: &StepSpec) -> Vec<Result<Reference, ReferenceError>> {
    let mut refs: Vec<_> = step.args.values().flat_map(crate::pattern::scan_references).collect();
    if let Some(condition) = &step.condition {
        refs.extend(condition.references());
    }
    refs
}

pub(super) fn check_cycles(spec: &PatternSpec, out: &mut Findings) {
    for cycle in DependencyGraph::build(spec).find_cycles() {
        out.error(ValidationIssue::new(IssueCode::Cycle, format!("cycle between steps: {}", cycle.join(", "))));
    }
}

/// Argumentos contra la firma declarada de cada capability.
pub(super) fn check_signatures(spec: &PatternSpec, registry: &CapabilityRegistry, out: &mut Findings) {
    for step in &spec.steps {
        let Some(signature) = registry.signature(&step.capability) else {
            continue;
        };
        for (name, arg) in &signature.args {
            if arg.required && !step.args.contains_key(name) {
                out.error(ValidationIssue::at_step(IssueCode::MissingArgument,
                                                   step.id(),
                                                   format!("'{}' requires argument '{name}' ({})", step.capability, arg.ty)));
            }
        }
        for (name, value) in &step.args {
            let Some(arg) = signature.args.get(name) else {
                out.warn(ValidationIssue::at_step(IssueCode::UnknownArgument,
                                                  step.id(),
                                                  format!("'{}' does not declare argument '{name}'", step.capability)));
                continue;
            };
            let offered = static_type(spec, registry, value);
            if !arg.ty.accepts(offered) {
                out.error(ValidationIssue::at_step(IssueCode::TypeMismatch,
                                                   step.id(),
                                                   format!("argument '{name}' expects {}, got {offered}", arg.ty)));
            }
        }
    }
}

/// Tipo conocido estáticamente de un valor de `args`.
fn static_type(spec: &PatternSpec, registry: &CapabilityRegistry, value: &Value) -> ValueType {
    let Value::String(raw) = value else {
        return ValueType::of(value);
    };
    match parse_arg_string(raw) {
        Ok(None) => ValueType::String,
        Ok(Some(reference)) if reference.is_whole_value() => reference.state_key()
                                                                      .and_then(|key| spec.step_for(key))
                                                                      .and_then(|producer| registry.signature(&producer.capability))
                                                                      .map(|sig| sig.output)
                                                                      .unwrap_or(ValueType::Any),
        _ => ValueType::Any,
    }
}
