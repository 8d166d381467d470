//! Estado compartido de una ejecución: clave de output → valor.
//!
//! Pertenece en exclusiva a una invocación del motor. Los handlers sólo
//! reciben `&ExecutionState` (un snapshot de la ronda); la escritura
//! (`merge`) queda restringida al crate.

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ExecutionState {
    values: IndexMap<String, Value>,
}

impl ExecutionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Estado inicial sembrado con los inputs del llamador.
    pub fn seeded(inputs: IndexMap<String, Value>) -> Self {
        Self { values: inputs }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Navega `path` (claves de objeto o índices de array) dentro de `key`.
    pub fn lookup(&self, key: &str, path: &[String]) -> Option<&Value> {
        let mut current = self.values.get(key)?;
        for segment in path {
            current = match current {
                Value::Object(map) => map.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub(crate) fn merge(&mut self, key: impl Into<String>, value: Value) {
        self.values.insert(key.into(), value);
    }
}

impl FromIterator<(String, Value)> for ExecutionState {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self { values: iter.into_iter().collect() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn lookup_walks_objects_and_arrays() {
        let state: ExecutionState = [("positions".to_string(), json!({"items": [{"qty": 3}, {"qty": 4}]}))].into_iter()
                                                                                                       .collect();
        let path = vec!["items".to_string(), "1".to_string(), "qty".to_string()];
        assert_eq!(state.lookup("positions", &path), Some(&json!(4)));
        assert_eq!(state.lookup("positions", &["items".to_string(), "9".to_string()]), None);
        assert_eq!(state.lookup("missing", &[]), None);
    }

    #[test]
    fn merge_overwrites_and_keeps_insertion_order() {
        let mut state = ExecutionState::new();
        state.merge("b", json!(1));
        state.merge("a", json!(2));
        state.merge("b", json!(3));
        assert_eq!(state.keys().collect::<Vec<_>>(), vec!["b", "a"]);
        assert_eq!(state.get("b"), Some(&json!(3)));
    }
}
