//! Contrato de invocación de capabilities.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::Value;

use super::CapabilitySignature;
use crate::errors::CapabilityError;
use crate::model::{CapabilityResult, ExecutionState, RequestCtx};

/// Argumentos ya resueltos (referencias sustituidas por valores).
pub type Args = IndexMap<String, Value>;

/// Unidad de lógica invocable por el motor.
///
/// Los handlers leen `state` pero nunca lo mutan: devuelven su resultado y el
/// motor hace el merge. Esto permite correr steps independientes en paralelo.
#[async_trait]
pub trait Capability: Send + Sync {
    /// Tipos declarados de output/args y TTL.
    fn signature(&self) -> CapabilitySignature;

    async fn invoke(&self, ctx: &RequestCtx, state: &ExecutionState, args: &Args) -> Result<CapabilityResult, CapabilityError>;
}

/// Capability síncrona a partir de una closure (cómputos puros y tests).
pub struct FnCapability<F> {
    signature: CapabilitySignature,
    f: F,
}

impl<F> FnCapability<F>
    where F: Fn(&RequestCtx, &ExecutionState, &Args) -> Result<CapabilityResult, CapabilityError> + Send + Sync
{
    pub fn new(signature: CapabilitySignature, f: F) -> Self {
        Self { signature, f }
    }
}

impl<F> fmt::Debug for FnCapability<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnCapability").field("signature", &self.signature).finish()
    }
}

#[async_trait]
impl<F> Capability for FnCapability<F>
    where F: Fn(&RequestCtx, &ExecutionState, &Args) -> Result<CapabilityResult, CapabilityError> + Send + Sync
{
    fn signature(&self) -> CapabilitySignature {
        self.signature.clone()
    }

    async fn invoke(&self, ctx: &RequestCtx, state: &ExecutionState, args: &Args) -> Result<CapabilityResult, CapabilityError> {
        (self.f)(ctx, state, args)
    }
}

/// Atajo: `FnCapability` ya envuelta en `Arc<dyn Capability>`.
pub fn capability_fn<F>(signature: CapabilitySignature, f: F) -> Arc<dyn Capability>
    where F: Fn(&RequestCtx, &ExecutionState, &Args) -> Result<CapabilityResult, CapabilityError> + Send + Sync + 'static
{
    Arc::new(FnCapability::new(signature, f))
}
