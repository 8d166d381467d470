//! Fachada hacia los proveedores de datos externos.
//!
//! Los clientes HTTP reales (rate limiting, circuit breaking, reintentos)
//! viven detrás de `ProviderFacade`. El motor sólo ve capabilities:
//! `FacadeCapability` adapta un endpoint de la fachada y convierte cualquier
//! fallo en `CapabilityError`.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use dashmap::{DashMap, DashSet};
use indexmap::IndexMap;
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use flow_core::{Args, Capability, CapabilityError, CapabilityResult, CapabilitySignature, ExecutionState, Provenance, RequestCtx};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderRequest {
    pub endpoint: String,
    pub params: IndexMap<String, Value>,
    pub asof: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderResponse {
    pub payload: Value,
    pub source: String,
    /// Fecha efectiva de los datos; `None` = la pedida.
    #[serde(default)]
    pub asof: Option<NaiveDate>,
    #[serde(default = "full_confidence")]
    pub confidence: f64,
    #[serde(default)]
    pub is_stub: bool,
}

fn full_confidence() -> f64 {
    1.0
}

impl ProviderResponse {
    pub fn new(payload: Value, source: impl Into<String>) -> Self {
        Self { payload,
               source: source.into(),
               asof: None,
               confidence: 1.0,
               is_stub: false }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProviderFailure {
    #[error("provider '{endpoint}' unavailable: {reason}")]
    Unavailable { endpoint: String, reason: String },
    #[error("provider '{endpoint}' rate limited")]
    RateLimited { endpoint: String },
    #[error("unknown endpoint '{endpoint}'")]
    UnknownEndpoint { endpoint: String },
    #[error("invalid request to '{endpoint}': {reason}")]
    InvalidRequest { endpoint: String, reason: String },
}

impl From<ProviderFailure> for CapabilityError {
    fn from(failure: ProviderFailure) -> Self {
        match failure {
            ProviderFailure::InvalidRequest { .. } => CapabilityError::invalid_arguments(failure.to_string()),
            other => CapabilityError::upstream(other.to_string()),
        }
    }
}

#[async_trait]
pub trait ProviderFacade: Send + Sync {
    fn name(&self) -> &str;

    async fn fetch(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderFailure>;
}

type Responder = Arc<dyn Fn(&ProviderRequest) -> Value + Send + Sync>;

/// Fachada en memoria con respuestas programadas e inyección de fallos.
pub struct StaticFacade {
    name: String,
    responders: DashMap<String, Responder>,
    failing: DashSet<String>,
    calls: DashMap<String, AtomicUsize>,
}

impl StaticFacade {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(),
               responders: DashMap::new(),
               failing: DashSet::new(),
               calls: DashMap::new() }
    }

    /// Respuesta fija para `endpoint`.
    pub fn with_endpoint(self, endpoint: impl Into<String>, payload: Value) -> Self {
        self.respond_with(endpoint, move |_| payload.clone())
    }

    /// Respuesta calculada a partir del request.
    pub fn respond_with<F>(self, endpoint: impl Into<String>, responder: F) -> Self
        where F: Fn(&ProviderRequest) -> Value + Send + Sync + 'static
    {
        self.responders.insert(endpoint.into(), Arc::new(responder));
        self
    }

    /// Activa o desactiva el fallo simulado de `endpoint`.
    pub fn set_failing(&self, endpoint: &str, failing: bool) {
        if failing {
            self.failing.insert(endpoint.to_string());
        } else {
            self.failing.remove(endpoint);
        }
    }

    pub fn calls(&self, endpoint: &str) -> usize {
        self.calls.get(endpoint).map(|c| c.load(Ordering::SeqCst)).unwrap_or(0)
    }
}

impl std::fmt::Debug for StaticFacade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut endpoints: Vec<String> = self.responders.iter().map(|e| e.key().clone()).collect();
        endpoints.sort();
        f.debug_struct("StaticFacade").field("name", &self.name).field("endpoints", &endpoints).finish()
    }
}

#[async_trait]
impl ProviderFacade for StaticFacade {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderFailure> {
        self.calls.entry(request.endpoint.clone()).or_default().fetch_add(1, Ordering::SeqCst);
        if self.failing.contains(&request.endpoint) {
            return Err(ProviderFailure::Unavailable { endpoint: request.endpoint,
                                                      reason: "simulated outage".into() });
        }
        let responder = self.responders
                            .get(&request.endpoint)
                            .map(|r| Arc::clone(r.value()))
                            .ok_or_else(|| ProviderFailure::UnknownEndpoint { endpoint: request.endpoint.clone() })?;
        Ok(ProviderResponse::new(responder(&request), format!("{}:{}", self.name, request.endpoint)))
    }
}

/// Capability que delega en un endpoint de la fachada. Los args resueltos
/// se envían como parámetros del request.
pub struct FacadeCapability {
    facade: Arc<dyn ProviderFacade>,
    endpoint: String,
    signature: CapabilitySignature,
}

impl FacadeCapability {
    pub fn new(facade: Arc<dyn ProviderFacade>, endpoint: impl Into<String>, signature: CapabilitySignature) -> Self {
        Self { facade,
               endpoint: endpoint.into(),
               signature }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Capability for FacadeCapability {
    fn signature(&self) -> CapabilitySignature {
        self.signature.clone()
    }

    async fn invoke(&self, ctx: &RequestCtx, _state: &ExecutionState, args: &Args) -> Result<CapabilityResult, CapabilityError> {
        let request = ProviderRequest { endpoint: self.endpoint.clone(),
                                        params: args.clone(),
                                        asof: ctx.asof() };
        debug!("[providers] {} -> {}", self.facade.name(), self.endpoint);
        let response = self.facade.fetch(request).await?;
        let mut provenance = Provenance::new(response.source, response.asof.unwrap_or(ctx.asof())).with_confidence(response.confidence);
        if response.is_stub {
            provenance = provenance.stub().with_warning(format!("{} returned stub data", self.endpoint));
        }
        Ok(CapabilityResult::new(response.payload, provenance))
    }
}
