//! patternflow
//!
//! Raíz de composición del workspace:
//! - Arma el `Orchestrator` con la configuración de entorno, el Pattern Store
//!   cargado desde disco y el registry de los módulos proveedores.
//! - Re-exporta `flow_core` y `flow_providers` para clientes (CLI, tests).

use std::sync::Arc;

use indexmap::IndexMap;
use log::info;
use serde_json::Value;
use thiserror::Error;

pub use flow_core;
pub use flow_providers;

use flow_core::{AggregateReport, EngineConfig, FlowError, Orchestrator, PatternResponse, PatternStore, RequestCtx, StoreError,
                ValidationReport};
use flow_providers::{demo_facade, demo_registry, ProviderFacade};

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("pattern store: {0}")]
    Store(#[from] StoreError),
    #[error("capability registry: {0}")]
    Registry(#[from] FlowError),
}

/// Motor listo para usar más la configuración con la que se armó.
pub struct Runtime {
    engine: Orchestrator,
}

impl Runtime {
    /// Carga patterns desde `config.patterns_dir` y registra los módulos
    /// proveedores sobre `facade`.
    pub fn from_config(config: EngineConfig, facade: Arc<dyn ProviderFacade>) -> Result<Self, RuntimeError> {
        let patterns = PatternStore::from_dir(&config.patterns_dir)?;
        let registry = demo_registry(facade)?;
        info!("[runtime] {} pattern(s), {} capabilities", patterns.len(), registry.len());
        let engine = Orchestrator::new(Arc::new(registry), Arc::new(patterns)).with_config(config);
        Ok(Self { engine })
    }

    /// Configuración de entorno (`PATTERNFLOW_*`, `.env`) y fachada de demo.
    pub fn from_env() -> Result<Self, RuntimeError> {
        Self::from_config(EngineConfig::from_env(), Arc::new(demo_facade()))
    }

    pub fn engine(&self) -> &Orchestrator {
        &self.engine
    }

    pub async fn run(&self, pattern_id: &str, inputs: IndexMap<String, Value>, ctx: &RequestCtx) -> Result<PatternResponse, FlowError> {
        self.engine.execute(pattern_id, inputs, ctx).await
    }

    pub fn validate(&self, pattern_id: &str) -> Result<ValidationReport, FlowError> {
        self.engine.validator().validate(self.engine.patterns(), pattern_id)
    }

    pub fn validate_all(&self) -> AggregateReport {
        self.engine.validator().validate_all(self.engine.patterns())
    }

    /// Relee el directorio de patterns (reemplazo atómico por id).
    pub fn reload_patterns(&self) -> Result<Vec<String>, RuntimeError> {
        Ok(self.engine.patterns().reload_dir(&self.engine.config().patterns_dir)?)
    }

    /// Purga entradas de cache expiradas más allá de la retención configurada.
    pub fn evict_stale_cache(&self) -> usize {
        self.engine.evict_stale_cache()
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime").field("engine", &self.engine).finish()
    }
}
