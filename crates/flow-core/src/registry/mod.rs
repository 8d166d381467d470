//! Capability Registry: nombre de capability → handler.
//!
//! Se construye una vez al arrancar (cada `ProviderModule` registra sus
//! nombres explícitamente) y luego se comparte como `Arc<CapabilityRegistry>`
//! de sólo lectura; no hay mutación durante la ejecución.

mod capability;
mod signature;

use std::collections::BTreeMap;
use std::sync::Arc;

use log::debug;

pub use capability::{capability_fn, Args, Capability, FnCapability};
pub use signature::{ArgSpec, CapabilitySignature, ValueType};

use crate::errors::FlowError;

/// Módulo proveedor que registra un conjunto de capabilities.
pub trait ProviderModule {
    fn name(&self) -> &str;
    fn register_capabilities(&self, registry: &mut CapabilityRegistry) -> Result<(), FlowError>;
}

#[derive(Clone)]
struct RegisteredCapability {
    handler: Arc<dyn Capability>,
    signature: CapabilitySignature,
}

#[derive(Clone, Default)]
pub struct CapabilityRegistry {
    entries: BTreeMap<String, RegisteredCapability>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registra `handler` bajo `name`. Los nombres son únicos en todo el
    /// proceso y deben tener la forma `namespace.action`.
    pub fn register(&mut self, name: impl Into<String>, handler: Arc<dyn Capability>) -> Result<(), FlowError> {
        let name = name.into();
        if !is_valid_name(&name) {
            return Err(FlowError::InvalidCapabilityName { name });
        }
        if self.entries.contains_key(&name) {
            return Err(FlowError::DuplicateCapability { name });
        }
        let signature = handler.signature();
        debug!("[registry] registrada {name} -> {}", signature.output);
        self.entries.insert(name, RegisteredCapability { handler, signature });
        Ok(())
    }

    pub fn register_module(&mut self, module: &dyn ProviderModule) -> Result<(), FlowError> {
        let before = self.entries.len();
        module.register_capabilities(self)?;
        debug!("[registry] módulo {} aportó {} capabilities", module.name(), self.entries.len() - before);
        Ok(())
    }

    pub fn resolve(&self, name: &str) -> Result<Arc<dyn Capability>, FlowError> {
        self.entries
            .get(name)
            .map(|e| Arc::clone(&e.handler))
            .ok_or_else(|| FlowError::UnknownCapability { name: name.to_string() })
    }

    /// Firma registrada (capturada una vez en `register`).
    pub fn signature(&self, name: &str) -> Option<&CapabilitySignature> {
        self.entries.get(name).map(|e| &e.signature)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Nombres registrados, en orden lexicográfico.
    pub fn list_capabilities(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Debug for CapabilityRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilityRegistry").field("capabilities", &self.entries.keys().collect::<Vec<_>>()).finish()
    }
}

fn is_valid_name(name: &str) -> bool {
    let segments: Vec<&str> = name.split('.').collect();
    segments.len() >= 2
    && segments.iter()
               .all(|s| !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CapabilityResult, Provenance};
    use serde_json::json;

    fn constant(v: i64) -> Arc<dyn Capability> {
        capability_fn(CapabilitySignature::returns(ValueType::Number), move |ctx, _state, _args| {
            Ok(CapabilityResult::new(json!(v), Provenance::new("test", ctx.asof())))
        })
    }

    #[test]
    fn register_and_resolve() {
        let mut reg = CapabilityRegistry::new();
        reg.register("a.fetch", constant(5)).expect("register");
        assert!(reg.contains("a.fetch"));
        assert!(reg.resolve("a.fetch").is_ok());
        assert_eq!(reg.signature("a.fetch").map(|s| s.output), Some(ValueType::Number));
        assert_eq!(reg.list_capabilities(), vec!["a.fetch".to_string()]);
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut reg = CapabilityRegistry::new();
        reg.register("a.fetch", constant(1)).expect("first");
        let err = reg.register("a.fetch", constant(2)).expect_err("duplicate");
        assert_eq!(err, FlowError::DuplicateCapability { name: "a.fetch".into() });
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn unknown_capability_fails_to_resolve() {
        let reg = CapabilityRegistry::new();
        let err = reg.resolve("macro.detect_regime").err().expect("should fail");
        assert_eq!(err, FlowError::UnknownCapability { name: "macro.detect_regime".into() });
    }

    #[test]
    fn names_must_be_dotted() {
        let mut reg = CapabilityRegistry::new();
        for bad in ["fetch", "a.", ".b", "a..b", "a.b-c"] {
            assert!(matches!(reg.register(bad, constant(0)), Err(FlowError::InvalidCapabilityName { .. })), "{bad}");
        }
        assert!(reg.register("macro.detect_regime", constant(0)).is_ok());
    }

    struct TwoCaps;

    impl ProviderModule for TwoCaps {
        fn name(&self) -> &str {
            "two"
        }

        fn register_capabilities(&self, registry: &mut CapabilityRegistry) -> Result<(), FlowError> {
            registry.register("two.one", constant(1))?;
            registry.register("two.two", constant(2))
        }
    }

    #[test]
    fn modules_register_explicitly() {
        let mut reg = CapabilityRegistry::new();
        reg.register_module(&TwoCaps).expect("module");
        assert_eq!(reg.list_capabilities(), vec!["two.one".to_string(), "two.two".to_string()]);
        assert!(matches!(reg.register_module(&TwoCaps), Err(FlowError::DuplicateCapability { .. })));
    }
}
