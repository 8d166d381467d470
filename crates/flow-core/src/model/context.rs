//! Contexto inmutable de una ejecución.
//!
//! Se construye antes de llamar al motor y se comparte por referencia con
//! todos los steps. No expone setters: los métodos `with_*` consumen el valor
//! y sólo sirven durante la construcción.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestCtx {
    subject_id: String,
    asof: NaiveDate,
    pricing_pack_id: Option<String>,
    require_fresh: bool,
    execution_id: Uuid,
}

impl RequestCtx {
    /// Campos accesibles vía `$ctx.<campo>`.
    pub const FIELDS: [&'static str; 5] = ["subject_id", "asof", "pricing_pack_id", "require_fresh", "execution_id"];

    pub fn new(subject_id: impl Into<String>, asof: NaiveDate) -> Self {
        Self { subject_id: subject_id.into(),
               asof,
               pricing_pack_id: None,
               require_fresh: false,
               execution_id: Uuid::new_v4() }
    }

    pub fn with_pricing_pack(mut self, pack_id: impl Into<String>) -> Self {
        self.pricing_pack_id = Some(pack_id.into());
        self
    }

    pub fn with_require_fresh(mut self, require_fresh: bool) -> Self {
        self.require_fresh = require_fresh;
        self
    }

    pub fn with_execution_id(mut self, execution_id: Uuid) -> Self {
        self.execution_id = execution_id;
        self
    }

    pub fn subject_id(&self) -> &str {
        &self.subject_id
    }

    pub fn asof(&self) -> NaiveDate {
        self.asof
    }

    pub fn pricing_pack_id(&self) -> Option<&str> {
        self.pricing_pack_id.as_deref()
    }

    /// Si es `true`, la ejecución no acepta datos stale de la cache.
    pub fn require_fresh(&self) -> bool {
        self.require_fresh
    }

    pub fn execution_id(&self) -> Uuid {
        self.execution_id
    }

    /// Valor JSON de un campo del contexto (para referencias `$ctx.*`).
    pub fn field(&self, name: &str) -> Option<Value> {
        match name {
            "subject_id" => Some(Value::String(self.subject_id.clone())),
            "asof" => Some(Value::String(self.asof.format("%Y-%m-%d").to_string())),
            "pricing_pack_id" => Some(self.pricing_pack_id.clone().map(Value::String).unwrap_or(Value::Null)),
            "require_fresh" => Some(Value::Bool(self.require_fresh)),
            "execution_id" => Some(Value::String(self.execution_id.to_string())),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn exposes_fields_as_json() {
        let asof = NaiveDate::from_ymd_opt(2024, 3, 29).expect("date");
        let ctx = RequestCtx::new("P-001", asof).with_pricing_pack("PP_2024-03-29");
        assert_eq!(ctx.field("subject_id"), Some(json!("P-001")));
        assert_eq!(ctx.field("asof"), Some(json!("2024-03-29")));
        assert_eq!(ctx.field("pricing_pack_id"), Some(json!("PP_2024-03-29")));
        assert_eq!(ctx.field("require_fresh"), Some(json!(false)));
        assert_eq!(ctx.field("nope"), None);
        for f in RequestCtx::FIELDS {
            assert!(ctx.field(f).is_some(), "field {f} should resolve");
        }
    }

    #[test]
    fn each_context_gets_its_own_execution_id() {
        let asof = NaiveDate::from_ymd_opt(2024, 1, 2).expect("date");
        let a = RequestCtx::new("P", asof);
        let b = RequestCtx::new("P", asof);
        assert_ne!(a.execution_id(), b.execution_id());
        assert!(!a.require_fresh());
        assert!(a.clone().with_require_fresh(true).require_fresh());
    }
}
