//! Firma declarada por una capability al registrarse.
//!
//! Declara el tipo semántico del output y de cada argumento. Con esto el
//! validador puede comprobar referencias `$clave` entre steps antes de
//! ejecutar, y el motor puede verificar el payload en runtime.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Tipo JSON de un valor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    Any,
    Null,
    Bool,
    Number,
    String,
    Array,
    Object,
}

impl ValueType {
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Null => ValueType::Null,
            Value::Bool(_) => ValueType::Bool,
            Value::Number(_) => ValueType::Number,
            Value::String(_) => ValueType::String,
            Value::Array(_) => ValueType::Array,
            Value::Object(_) => ValueType::Object,
        }
    }

    /// Compatibilidad entre un tipo esperado (`self`) y uno ofrecido.
    pub fn accepts(self, offered: ValueType) -> bool {
        self == ValueType::Any || offered == ValueType::Any || self == offered
    }

    pub fn matches(self, value: &Value) -> bool {
        self.accepts(ValueType::of(value))
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ValueType::Any => "any",
            ValueType::Null => "null",
            ValueType::Bool => "bool",
            ValueType::Number => "number",
            ValueType::String => "string",
            ValueType::Array => "array",
            ValueType::Object => "object",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArgSpec {
    #[serde(rename = "type")]
    pub ty: ValueType,
    pub required: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilitySignature {
    pub output: ValueType,
    pub args: IndexMap<String, ArgSpec>,
    /// `None` usa el TTL por defecto del motor; `Some(0)` desactiva la cache.
    pub ttl_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

impl CapabilitySignature {
    pub fn returns(output: ValueType) -> Self {
        Self { output,
               args: IndexMap::new(),
               ttl_secs: None,
               description: String::new() }
    }

    /// Argumento obligatorio.
    pub fn arg(mut self, name: impl Into<String>, ty: ValueType) -> Self {
        self.args.insert(name.into(), ArgSpec { ty, required: true });
        self
    }

    pub fn optional_arg(mut self, name: impl Into<String>, ty: ValueType) -> Self {
        self.args.insert(name.into(), ArgSpec { ty, required: false });
        self
    }

    pub fn ttl(mut self, ttl_secs: u64) -> Self {
        self.ttl_secs = Some(ttl_secs);
        self
    }

    /// Capability pura: nunca se cachea.
    pub fn uncached(self) -> Self {
        self.ttl(0)
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn effective_ttl(&self, default_ttl_secs: u64) -> u64 {
        self.ttl_secs.unwrap_or(default_ttl_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn any_is_compatible_with_everything() {
        assert!(ValueType::Any.accepts(ValueType::Number));
        assert!(ValueType::Object.accepts(ValueType::Any));
        assert!(!ValueType::String.accepts(ValueType::Number));
        assert!(ValueType::Array.matches(&json!([1])));
        assert!(!ValueType::Array.matches(&json!({})));
    }

    #[test]
    fn builder_collects_args_and_ttl() {
        let sig = CapabilitySignature::returns(ValueType::Number).arg("value", ValueType::Number)
                                                                 .optional_arg("scale", ValueType::Number)
                                                                 .uncached();
        assert_eq!(sig.args.len(), 2);
        assert!(sig.args["value"].required);
        assert!(!sig.args["scale"].required);
        assert_eq!(sig.effective_ttl(300), 0);
        assert_eq!(CapabilitySignature::returns(ValueType::Any).effective_ttl(300), 300);
    }
}
