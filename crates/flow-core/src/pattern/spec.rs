//! Forma declarativa de un pattern.
//!
//! ```json
//! {
//!   "id": "two_step",
//!   "inputs": ["seed"],
//!   "steps": [
//!     { "capability": "a.fetch",  "args": { "value": "$seed" }, "as": "x" },
//!     { "capability": "b.double", "args": { "value": "$x" },    "as": "y" }
//!   ],
//!   "outputs": ["y"]
//! }
//! ```

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::Condition;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternSpec {
    pub id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default)]
    pub inputs: Vec<String>,
    #[serde(default)]
    pub steps: Vec<StepSpec>,
    #[serde(default)]
    pub outputs: Vec<String>,
}

impl PatternSpec {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into(),
               description: String::new(),
               inputs: Vec::new(),
               steps: Vec::new(),
               outputs: Vec::new() }
    }

    pub fn from_json_str(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn input(mut self, name: impl Into<String>) -> Self {
        self.inputs.push(name.into());
        self
    }

    pub fn step(mut self, step: StepSpec) -> Self {
        self.steps.push(step);
        self
    }

    pub fn output(mut self, key: impl Into<String>) -> Self {
        self.outputs.push(key.into());
        self
    }

    /// Step que produce `key`, si existe (el primero en orden de declaración).
    pub fn step_for(&self, key: &str) -> Option<&StepSpec> {
        self.steps.iter().find(|s| s.output_key == key)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepSpec {
    pub capability: String,
    #[serde(default)]
    pub args: IndexMap<String, Value>,
    /// Clave bajo la que se guarda el output; también identifica al step.
    #[serde(rename = "as")]
    pub output_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Condition>,
    /// Un step opcional que falla upstream sin cache se salta en vez de
    /// abortar la ejecución.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub optional: bool,
}

impl StepSpec {
    pub fn new(capability: impl Into<String>, output_key: impl Into<String>) -> Self {
        Self { capability: capability.into(),
               args: IndexMap::new(),
               output_key: output_key.into(),
               condition: None,
               optional: false }
    }

    pub fn arg(mut self, name: impl Into<String>, value: Value) -> Self {
        self.args.insert(name.into(), value);
        self
    }

    pub fn when(mut self, condition: Condition) -> Self {
        self.condition = Some(condition);
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn id(&self) -> &str {
        &self.output_key
    }
}
