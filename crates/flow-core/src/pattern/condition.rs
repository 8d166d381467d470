//! Condiciones de ejecución de un step.
//!
//! `{"exists": "$k"}`, `{"truthy": "$r"}`,
//! `{"equals": {"ref": "$r", "value": ...}}`, `{"not": c}`, `{"all": [..]}`,
//! `{"any": [..]}`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::reference::{parse_reference, Reference, ReferenceError};
use crate::model::{ExecutionState, RequestCtx};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    /// La referencia resuelve a un valor (aunque sea `null`).
    Exists(String),
    Truthy(String),
    Equals(EqualsCondition),
    Not(Box<Condition>),
    All(Vec<Condition>),
    Any(Vec<Condition>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EqualsCondition {
    #[serde(rename = "ref")]
    pub reference: String,
    pub value: Value,
}

impl Condition {
    pub fn exists(reference: impl Into<String>) -> Self {
        Condition::Exists(reference.into())
    }

    pub fn truthy(reference: impl Into<String>) -> Self {
        Condition::Truthy(reference.into())
    }

    pub fn equals(reference: impl Into<String>, value: Value) -> Self {
        Condition::Equals(EqualsCondition { reference: reference.into(),
                                            value })
    }

    /// Referencias mencionadas por la condición (en orden de aparición).
    pub fn references(&self) -> Vec<Result<Reference, ReferenceError>> {
        let mut raw = Vec::new();
        self.collect_raw(&mut raw);
        raw.into_iter().map(parse_reference).collect()
    }

    fn collect_raw<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Condition::Exists(r) | Condition::Truthy(r) => out.push(r),
            Condition::Equals(eq) => out.push(&eq.reference),
            Condition::Not(inner) => inner.collect_raw(out),
            Condition::All(items) | Condition::Any(items) => items.iter().for_each(|c| c.collect_raw(out)),
        }
    }

    /// Evalúa contra el estado actual. Una referencia mal formada o no
    /// resuelta cuenta como ausente.
    pub fn evaluate(&self, state: &ExecutionState, ctx: &RequestCtx) -> bool {
        let lookup = |raw: &str| parse_reference(raw).ok().and_then(|r| r.resolve(state, ctx));
        match self {
            Condition::Exists(r) => lookup(r).is_some(),
            Condition::Truthy(r) => lookup(r).is_some_and(|v| is_truthy(&v)),
            Condition::Equals(eq) => lookup(&eq.reference).is_some_and(|v| v == eq.value),
            Condition::Not(inner) => !inner.evaluate(state, ctx),
            Condition::All(items) => items.iter().all(|c| c.evaluate(state, ctx)),
            Condition::Any(items) => items.iter().any(|c| c.evaluate(state, ctx)),
        }
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;

    fn ctx() -> RequestCtx {
        RequestCtx::new("P-1", NaiveDate::from_ymd_opt(2024, 6, 28).expect("date")).with_require_fresh(true)
    }

    #[test]
    fn parses_nested_condition() {
        let c: Condition = serde_json::from_value(json!({
            "all": [
                {"exists": "$regime"},
                {"not": {"equals": {"ref": "$regime.label", "value": "calm"}}}
            ]
        })).expect("parse");
        let refs: Vec<_> = c.references().into_iter().map(|r| r.expect("ok").to_string()).collect();
        assert_eq!(refs, vec!["$regime", "$regime.label"]);
    }

    #[test]
    fn evaluates_against_state_and_ctx() {
        let state: ExecutionState = [("regime".to_string(), json!({"label": "stress", "score": 0}))].into_iter().collect();
        assert!(Condition::exists("$regime").evaluate(&state, &ctx()));
        assert!(!Condition::exists("$missing").evaluate(&state, &ctx()));
        assert!(!Condition::truthy("$regime.score").evaluate(&state, &ctx()));
        assert!(Condition::truthy("$ctx.require_fresh").evaluate(&state, &ctx()));
        assert!(Condition::equals("$regime.label", json!("stress")).evaluate(&state, &ctx()));
        let any = Condition::Any(vec![Condition::exists("$missing"), Condition::Not(Box::new(Condition::exists("$missing")))]);
        assert!(any.evaluate(&state, &ctx()));
        assert!(Condition::All(vec![]).evaluate(&state, &ctx()));
    }

    #[test]
    fn malformed_reference_is_reported_and_evaluates_false() {
        let c = Condition::exists("regime");
        assert!(c.references()[0].is_err());
        assert!(!c.evaluate(&ExecutionState::new(), &ctx()));
    }
}
