use std::fmt;

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::{json, Value};

use crate::constants::ENGINE_VERSION;
use crate::hashing::hash_value;
use crate::registry::Args;

/// Clave de cache: (capability, argumentos normalizados, as-of).
///
/// Los argumentos se normalizan como JSON canónico (claves ordenadas) y se
/// hashean junto a `ENGINE_VERSION`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct CacheKey {
    pub capability: String,
    pub args_hash: String,
    pub asof: NaiveDate,
}

impl CacheKey {
    pub fn new(capability: impl Into<String>, args: &Args, asof: NaiveDate) -> Self {
        let args_value: Value = Value::Object(args.iter().map(|(k, v)| (k.clone(), v.clone())).collect());
        let args_hash = hash_value(&json!({
            "engine_version": ENGINE_VERSION,
            "args": args_value,
        }));
        Self { capability: capability.into(),
               args_hash,
               asof }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let short = self.args_hash.get(..12).unwrap_or(&self.args_hash);
        write!(f, "{}@{}#{short}", self.capability, self.asof)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(pairs: &[(&str, Value)]) -> Args {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn argument_order_is_normalized() {
        let asof = NaiveDate::from_ymd_opt(2024, 5, 31).expect("date");
        let a = CacheKey::new("pricing.get_positions", &args(&[("a", json!(1)), ("b", json!({"y": 2, "x": 1}))]), asof);
        let b = CacheKey::new("pricing.get_positions", &args(&[("b", json!({"x": 1, "y": 2})), ("a", json!(1))]), asof);
        assert_eq!(a, b);
    }

    #[test]
    fn asof_and_capability_are_part_of_the_key() {
        let d1 = NaiveDate::from_ymd_opt(2024, 5, 31).expect("date");
        let d2 = NaiveDate::from_ymd_opt(2024, 6, 28).expect("date");
        let a = args(&[("p", json!("P1"))]);
        assert_ne!(CacheKey::new("x.y", &a, d1), CacheKey::new("x.y", &a, d2));
        assert_ne!(CacheKey::new("x.y", &a, d1), CacheKey::new("x.z", &a, d1));
    }

    #[test]
    fn display_shortens_the_hash_without_splitting_chars() {
        let asof = NaiveDate::from_ymd_opt(2024, 5, 31).expect("date");
        let key = CacheKey::new("x.y", &Args::new(), asof);
        assert_eq!(key.to_string(), format!("x.y@2024-05-31#{}", &key.args_hash[..12]));

        let odd = CacheKey { capability: "x.y".into(),
                             args_hash: "aaaaaaaaaaaé-tail".into(),
                             asof };
        assert_eq!(odd.to_string(), "x.y@2024-05-31#aaaaaaaaaaaé-tail");
        let short = CacheKey { capability: "x.y".into(),
                               args_hash: "abc".into(),
                               asof };
        assert_eq!(short.to_string(), "x.y@2024-05-31#abc");
    }
}
