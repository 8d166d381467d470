//! Hash helpers sobre blake3 (hex).

use blake3::Hasher;
use serde_json::Value;

use super::to_canonical_json;

/// Hashea un string y devuelve hex.
pub fn hash_str(input: &str) -> String {
    let mut h = Hasher::new();
    h.update(input.as_bytes());
    h.finalize().to_hex().to_string()
}

/// Hash del JSON canónico de `value`.
pub fn hash_value(value: &Value) -> String {
    hash_str(&to_canonical_json(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn hash_value_is_stable_across_key_order() {
        let h1 = hash_value(&json!({"portfolio": "P1", "shock": -0.2}));
        let h2 = hash_value(&json!({"shock": -0.2, "portfolio": "P1"}));
        assert_eq!(h1, h2);
        assert_eq!(h1.len(), 64);
        assert_ne!(h1, hash_value(&json!({"portfolio": "P2", "shock": -0.2})));
    }
}
