//! Invocación de un step con la política de cache y fallback.
//!
//! 1. Entrada fresca: se devuelve sin llamar upstream.
//! 2. Ausente o stale: live call.
//! 3. Éxito: se guarda (reemplazando la stale) y se devuelve.
//! 4. Fallo upstream con entrada: se sirve degradada (`stale`, confianza 0),
//!    salvo que el contexto exija datos frescos.
//! 5. Fallo upstream sin entrada: fatal; el motor decide según `optional`.

use log::{debug, warn};

use crate::cache::{CacheKey, ProvenanceCache};
use crate::errors::{CapabilityError, FlowError};
use crate::model::{CapabilityResult, ExecutionState, RequestCtx, StepOutcome};
use crate::registry::{Args, Capability, ValueType};

pub(crate) struct StepCall<'a> {
    pub step: &'a str,
    pub capability: &'a str,
    pub ctx: &'a RequestCtx,
    pub state: &'a ExecutionState,
    pub args: &'a Args,
}

pub(crate) async fn invoke_with_cache(cache: &ProvenanceCache, default_ttl_secs: u64, handler: &dyn Capability, call: StepCall<'_>) -> StepOutcome {
    let StepCall { step,
                   capability,
                   ctx,
                   state,
                   args } = call;
    let signature = handler.signature();
    let signature_ttl = signature.effective_ttl(default_ttl_secs);
    let key = (signature_ttl > 0).then(|| CacheKey::new(capability, args, ctx.asof()));
    let cached = key.as_ref().and_then(|k| cache.get(k));

    if let Some(hit) = cached.as_ref().filter(|l| l.fresh) {
        cache.record_hit();
        debug!("[cache] hit {capability} for step '{step}' (age {}s)", hit.age_secs);
        let mut provenance = hit.entry.provenance.clone();
        provenance.cache_hit = true;
        return StepOutcome::Ok(CapabilityResult::new(hit.entry.payload.clone(), provenance));
    }
    if key.is_some() {
        cache.record_miss();
    }

    match handler.invoke(ctx, state, args).await {
        Ok(mut result) => {
            let found = ValueType::of(&result.payload);
            if !signature.output.accepts(found) {
                return StepOutcome::Fatal(FlowError::OutputTypeMismatch { step: step.to_string(),
                                                                          capability: capability.to_string(),
                                                                          expected: signature.output,
                                                                          found });
            }
            if result.provenance.is_stub {
                result.provenance.confidence = 0.0;
            }
            if let Some(error) = result.error.clone() {
                let reason = format!("{capability} returned a partial result: {error}");
                warn!("[engine] step '{step}': {reason}");
                result.provenance.mark_partial(reason.clone());
                return StepOutcome::Degraded { result, reason };
            }
            match key {
                Some(key) => {
                    let ttl = if result.provenance.ttl_secs > 0 { result.provenance.ttl_secs } else { signature_ttl };
                    result.provenance.ttl_secs = ttl;
                    cache.put(key, result.payload.clone(), result.provenance.clone(), ttl);
                }
                None => result.provenance.ttl_secs = 0,
            }
            StepOutcome::Ok(result)
        }
        Err(err @ CapabilityError::InvalidArguments(_)) => StepOutcome::Fatal(err.into_flow_error(step, capability)),
        Err(CapabilityError::Upstream(cause)) => match cached {
            Some(stale) if ctx.require_fresh() => StepOutcome::Fatal(FlowError::FreshnessViolation { step: step.to_string(),
                                                                                                     capability: capability.to_string(),
                                                                                                     age_secs: stale.age_secs,
                                                                                                     cause }),
            Some(stale) => {
                cache.record_stale_fallback();
                let warning = format!("live call failed, serving cached data of age {}s", stale.age_secs);
                warn!("[cache] step '{step}' ({capability}): {warning}: {cause}");
                let mut provenance = stale.entry.provenance;
                provenance.cache_hit = true;
                provenance.degrade(warning.clone());
                StepOutcome::Degraded { result: CapabilityResult::new(stale.entry.payload, provenance),
                                        reason: format!("{warning} ({cause})") }
            }
            None => StepOutcome::Fatal(CapabilityError::Upstream(cause).into_flow_error(step, capability)),
        },
    }
}
