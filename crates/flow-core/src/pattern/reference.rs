//! Referencias dentro de `args` y condiciones.
//!
//! - `"$clave"`: valor completo de una clave del estado.
//! - `"$clave.a.0"`: ruta dentro de ese valor (la dependencia sigue siendo `clave`).
//! - `"$ctx.<campo>"`: campo del `RequestCtx`; no es dependencia de estado.
//! - `"$$texto"`: literal `"$texto"`.
//!
//! Cualquier otro string es un literal.

use std::fmt;

use serde_json::Value;
use thiserror::Error;

use crate::constants::{CTX_KEY, REF_PREFIX};
use crate::model::{ExecutionState, RequestCtx};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Reference {
    State { key: String, path: Vec<String> },
    Ctx { field: String },
}

impl Reference {
    /// Clave de estado de la que depende, si la hay.
    pub fn state_key(&self) -> Option<&str> {
        match self {
            Reference::State { key, .. } => Some(key),
            Reference::Ctx { .. } => None,
        }
    }

    /// Referencia al valor completo (sin ruta) de una clave de estado.
    pub fn is_whole_value(&self) -> bool {
        matches!(self, Reference::State { path, .. } if path.is_empty())
    }

    pub fn resolve(&self, state: &ExecutionState, ctx: &RequestCtx) -> Option<Value> {
        match self {
            Reference::State { key, path } => state.lookup(key, path).cloned(),
            Reference::Ctx { field } => ctx.field(field),
        }
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reference::State { key, path } => {
                write!(f, "{REF_PREFIX}{key}")?;
                for segment in path {
                    write!(f, ".{segment}")?;
                }
                Ok(())
            }
            Reference::Ctx { field } => write!(f, "{REF_PREFIX}{CTX_KEY}.{field}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReferenceError {
    #[error("malformed reference '{raw}': {reason}")]
    Malformed { raw: String, reason: String },
    #[error("reference '{reference}' did not resolve")]
    Unresolved { reference: String },
}

fn malformed(raw: &str, reason: &str) -> ReferenceError {
    ReferenceError::Malformed { raw: raw.to_string(),
                                reason: reason.to_string() }
}

fn valid_segment(segment: &str) -> bool {
    !segment.is_empty() && segment.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Interpreta un string de `args`.
///
/// `Ok(None)` si es un literal (incluido el escape `$$`).
pub fn parse_arg_string(raw: &str) -> Result<Option<Reference>, ReferenceError> {
    let Some(body) = raw.strip_prefix(REF_PREFIX) else {
        return Ok(None);
    };
    if body.starts_with(REF_PREFIX) {
        return Ok(None);
    }
    let mut segments = body.split('.');
    let key = segments.next().unwrap_or_default();
    if !valid_segment(key) {
        return Err(malformed(raw, "empty or invalid key"));
    }
    let path: Vec<String> = segments.map(str::to_string).collect();
    if path.iter().any(|s| !valid_segment(s)) {
        return Err(malformed(raw, "empty or invalid path segment"));
    }
    if key == CTX_KEY {
        return match path.as_slice() {
            [field] if RequestCtx::FIELDS.contains(&field.as_str()) => Ok(Some(Reference::Ctx { field: field.clone() })),
            _ => Err(malformed(raw, &format!("expected one of {}", RequestCtx::FIELDS.map(|f| format!("{CTX_KEY}.{f}")).join(", ")))),
        };
    }
    Ok(Some(Reference::State { key: key.to_string(),
                               path }))
}

/// Como `parse_arg_string` pero exige que el string sea una referencia
/// (condiciones).
pub fn parse_reference(raw: &str) -> Result<Reference, ReferenceError> {
    parse_arg_string(raw)?.ok_or_else(|| malformed(raw, "expected a '$' reference"))
}

/// Todas las referencias (o errores de sintaxis) de un valor de `args`, a
/// cualquier profundidad.
pub fn scan_references(value: &Value) -> Vec<Result<Reference, ReferenceError>> {
    let mut found = Vec::new();
    scan_into(value, &mut found);
    found
}

fn scan_into(value: &Value, found: &mut Vec<Result<Reference, ReferenceError>>) {
    match value {
        Value::String(s) => {
            if let Some(r) = parse_arg_string(s).transpose() {
                found.push(r);
            }
        }
        Value::Array(items) => items.iter().for_each(|v| scan_into(v, found)),
        Value::Object(map) => map.values().for_each(|v| scan_into(v, found)),
        _ => {}
    }
}

/// Sustituye referencias por sus valores. Devuelve un valor nuevo; el estado
/// no se toca.
pub fn resolve_value(value: &Value, state: &ExecutionState, ctx: &RequestCtx) -> Result<Value, ReferenceError> {
    match value {
        Value::String(s) => match parse_arg_string(s)? {
            Some(reference) => reference.resolve(state, ctx)
                                        .ok_or_else(|| ReferenceError::Unresolved { reference: reference.to_string() }),
            None => match s.strip_prefix(REF_PREFIX) {
                Some(escaped) => Ok(Value::String(escaped.to_string())),
                None => Ok(value.clone()),
            },
        },
        Value::Array(items) => items.iter().map(|v| resolve_value(v, state, ctx)).collect::<Result<Vec<_>, _>>().map(Value::Array),
        Value::Object(map) => {
            let mut out = serde_json::Map::with_capacity(map.len());
            for (k, v) in map {
                out.insert(k.clone(), resolve_value(v, state, ctx)?);
            }
            Ok(Value::Object(out))
        }
        _ => Ok(value.clone()),
    }
}
