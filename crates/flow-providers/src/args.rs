//! Extracción tipada de argumentos ya resueltos.

use serde_json::{Map, Value};

use flow_core::{Args, CapabilityError};

pub(crate) fn array<'a>(args: &'a Args, name: &str) -> Result<&'a Vec<Value>, CapabilityError> {
    args.get(name)
        .and_then(Value::as_array)
        .ok_or_else(|| CapabilityError::invalid_arguments(format!("'{name}' must be an array")))
}

pub(crate) fn object<'a>(args: &'a Args, name: &str) -> Result<&'a Map<String, Value>, CapabilityError> {
    args.get(name)
        .and_then(Value::as_object)
        .ok_or_else(|| CapabilityError::invalid_arguments(format!("'{name}' must be an object")))
}

pub(crate) fn number_or(args: &Args, name: &str, default: f64) -> Result<f64, CapabilityError> {
    match args.get(name) {
        None | Some(Value::Null) => Ok(default),
        Some(v) => v.as_f64().ok_or_else(|| CapabilityError::invalid_arguments(format!("'{name}' must be a number"))),
    }
}

/// Campo numérico de un objeto (posición, indicador).
pub(crate) fn field_f64(item: &Value, field: &str) -> Option<f64> {
    item.get(field).and_then(Value::as_f64)
}

/// Redondeo a centavos para payloads estables.
pub(crate) fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}
