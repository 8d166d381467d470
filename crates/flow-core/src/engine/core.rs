//! Orchestrator: ejecuta un pattern por rondas sobre el grafo de
//! dependencias.
//!
//! Cada ronda:
//! 1. Clasifica los steps pendientes: listos, a la espera o saltados.
//! 2. Despacha el ready set completo en paralelo contra un snapshot del
//!    estado (acotado por `max_concurrency` sólo si se configura).
//! 3. Espera a todos y aplica los desenlaces en orden de declaración.
//!
//! El primer desenlace fatal (en orden de declaración) aborta la ejecución y
//! el estado parcial se descarta.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use indexmap::IndexMap;
use log::{debug, info, warn};
use serde_json::Value;

use super::invoke::{invoke_with_cache, StepCall};
use super::response::{PatternResponse, SkipReason, SkippedStep};
use crate::cache::{seconds, ProvenanceCache};
use crate::config::EngineConfig;
use crate::errors::FlowError;
use crate::event::{EventStore, ExecutionEventKind, InMemoryEventStore};
use crate::model::{ExecutionState, Provenance, ProvenanceReport, RequestCtx, StepOutcome, StepProvenance};
use crate::pattern::{resolve_value, DependencyGraph, PatternSpec, PatternStore, StepSpec};
use crate::registry::{Args, CapabilityRegistry};
use crate::validate::PatternValidator;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StepStatus {
    Pending,
    Done,
    Skipped,
}

#[derive(Debug, Default)]
struct RoundPlan {
    ready: Vec<usize>,
    skipped: Vec<(usize, SkipReason)>,
}

/// Acumulado de una ejecución en curso.
struct Run<'a> {
    spec: &'a PatternSpec,
    state: ExecutionState,
    status: Vec<StepStatus>,
    provenance: Vec<StepProvenance>,
    skipped: Vec<SkippedStep>,
    warnings: Vec<String>,
}

pub struct Orchestrator {
    registry: Arc<CapabilityRegistry>,
    patterns: Arc<PatternStore>,
    cache: Arc<ProvenanceCache>,
    events: Arc<dyn EventStore>,
    config: EngineConfig,
}

impl Orchestrator {
    pub fn new(registry: Arc<CapabilityRegistry>, patterns: Arc<PatternStore>) -> Self {
        Self { registry,
               patterns,
               cache: Arc::new(ProvenanceCache::new()),
               events: Arc::new(InMemoryEventStore::new()),
               config: EngineConfig::default() }
    }

    pub fn with_cache(mut self, cache: Arc<ProvenanceCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_event_store(mut self, events: Arc<dyn EventStore>) -> Self {
        self.events = events;
        self
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn registry(&self) -> &CapabilityRegistry {
        &self.registry
    }

    pub fn patterns(&self) -> &PatternStore {
        &self.patterns
    }

    pub fn cache(&self) -> &ProvenanceCache {
        &self.cache
    }

    pub fn events(&self) -> &dyn EventStore {
        self.events.as_ref()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn validator(&self) -> PatternValidator<'_> {
        PatternValidator::new(&self.registry)
    }

    /// Purga entradas de cache expiradas hace más de `stale_retention_secs`.
    pub fn evict_stale_cache(&self) -> usize {
        self.cache.evict_expired(seconds(self.config.stale_retention_secs))
    }

    /// Ejecuta `pattern_id` con los inputs del llamador.
    pub async fn execute(&self, pattern_id: &str, inputs: IndexMap<String, Value>, ctx: &RequestCtx) -> Result<PatternResponse, FlowError> {
        let spec = self.patterns
                       .get(pattern_id)
                       .ok_or_else(|| FlowError::PatternNotFound { pattern_id: pattern_id.to_string() })?;
        let execution_id = ctx.execution_id();
        info!("[engine] executing '{pattern_id}' for '{}' asof {} ({execution_id})", ctx.subject_id(), ctx.asof());
        self.events.append_kind(execution_id,
                                ExecutionEventKind::ExecutionStarted { pattern_id: pattern_id.to_string(),
                                                                       subject_id: ctx.subject_id().to_string() });

        let outcome = self.run(&spec, inputs, ctx).await;
        match &outcome {
            Ok(response) => {
                self.events.append_kind(execution_id,
                                        ExecutionEventKind::ExecutionCompleted { pattern_id: pattern_id.to_string(),
                                                                                 min_confidence: response.provenance.min_confidence,
                                                                                 degraded: response.provenance.degraded });
                info!("[engine] '{pattern_id}' completed (min confidence {:.2})", response.provenance.min_confidence);
            }
            Err(err) => {
                self.events.append_kind(execution_id,
                                        ExecutionEventKind::ExecutionFailed { pattern_id: pattern_id.to_string(),
                                                                              error: err.clone() });
                warn!("[engine] '{pattern_id}' failed: {err}");
            }
        }
        outcome
    }

    async fn run(&self, spec: &PatternSpec, inputs: IndexMap<String, Value>, ctx: &RequestCtx) -> Result<PatternResponse, FlowError> {
        let report = self.validator().validate_spec(spec);
        if !report.valid {
            return Err(FlowError::Validation { pattern_id: spec.id.clone(),
                                               issues: report.errors });
        }
        let graph = DependencyGraph::build(spec);
        let mut run = Run { spec,
                            state: seed_state(spec, inputs)?,
                            status: vec![StepStatus::Pending; spec.steps.len()],
                            provenance: Vec::new(),
                            skipped: Vec::new(),
                            warnings: Vec::new() };

        let mut round = 0usize;
        loop {
            let plan = plan_round(spec, &graph, &run.status, &run.state, ctx);
            let any_skipped = !plan.skipped.is_empty();
            for (idx, reason) in plan.skipped {
                self.skip(&mut run, idx, reason, ctx);
            }
            if plan.ready.is_empty() {
                if any_skipped {
                    continue;
                }
                break;
            }

            round += 1;
            let names: Vec<String> = plan.ready.iter().map(|&i| spec.steps[i].output_key.clone()).collect();
            debug!("[engine] round {round}: {}", names.join(", "));
            self.events.append_kind(ctx.execution_id(), ExecutionEventKind::RoundStarted { round, steps: names });

            let outcomes = self.dispatch(spec, &plan.ready, &run.state, ctx).await;
            let mut fatal: Option<FlowError> = None;
            for (idx, outcome) in outcomes {
                let err = self.apply(&mut run, idx, outcome, ctx);
                if fatal.is_none() {
                    fatal = err;
                }
            }
            if let Some(err) = fatal {
                return Err(err);
            }
        }

        let mut outputs = IndexMap::new();
        let mut missing = Vec::new();
        for key in &spec.outputs {
            match run.state.get(key) {
                Some(value) => {
                    outputs.insert(key.clone(), value.clone());
                }
                None if !missing.contains(key) => missing.push(key.clone()),
                None => {}
            }
        }
        if !missing.is_empty() {
            return Err(FlowError::UnsatisfiedOutput { pattern_id: spec.id.clone(),
                                                      missing });
        }

        Ok(PatternResponse { pattern_id: spec.id.clone(),
                             execution_id: ctx.execution_id(),
                             outputs,
                             provenance: ProvenanceReport::from_entries(run.provenance),
                             skipped: run.skipped,
                             warnings: run.warnings })
    }

    /// Corre el ready set y devuelve los desenlaces ordenados por índice de
    /// step.
    async fn dispatch(&self, spec: &PatternSpec, ready: &[usize], state: &ExecutionState, ctx: &RequestCtx) -> Vec<(usize, StepOutcome)> {
        let width = self.config.max_concurrency.unwrap_or(ready.len()).max(1);
        let calls = ready.iter().map(|&idx| async move { (idx, self.run_step(&spec.steps[idx], state, ctx).await) });
        let mut outcomes: Vec<(usize, StepOutcome)> = stream::iter(calls).buffer_unordered(width)
                                                                         .collect()
                                                                         .await;
        outcomes.sort_by_key(|(idx, _)| *idx);
        outcomes
    }

    async fn run_step(&self, step: &StepSpec, state: &ExecutionState, ctx: &RequestCtx) -> StepOutcome {
        self.events.append_kind(ctx.execution_id(),
                                ExecutionEventKind::StepStarted { step: step.output_key.clone(),
                                                                  capability: step.capability.clone() });
        let handler = match self.registry.resolve(&step.capability) {
            Ok(handler) => handler,
            Err(err) => return StepOutcome::Fatal(err),
        };
        let args = match resolve_args(step, state, ctx) {
            Ok(args) => args,
            Err(err) => return StepOutcome::Fatal(err),
        };
        let call = StepCall { step: &step.output_key,
                              capability: &step.capability,
                              ctx,
                              state,
                              args: &args };
        invoke_with_cache(&self.cache, self.config.default_ttl_secs, handler.as_ref(), call).await
    }

    /// Aplica un desenlace. Devuelve el error si es fatal para la ejecución.
    fn apply(&self, run: &mut Run<'_>, idx: usize, outcome: StepOutcome, ctx: &RequestCtx) -> Option<FlowError> {
        let spec = run.spec;
        let step = &spec.steps[idx];
        let execution_id = ctx.execution_id();
        match outcome {
            StepOutcome::Ok(result) => {
                self.events.append_kind(execution_id,
                                        ExecutionEventKind::StepCompleted { step: step.output_key.clone(),
                                                                            capability: step.capability.clone(),
                                                                            cache_hit: result.provenance.cache_hit });
                run.record(idx, result.payload, result.provenance);
                None
            }
            StepOutcome::Degraded { result, reason } => {
                self.events.append_kind(execution_id,
                                        ExecutionEventKind::StepDegraded { step: step.output_key.clone(),
                                                                           capability: step.capability.clone(),
                                                                           reason: reason.clone() });
                run.warnings.push(format!("step '{}': {reason}", step.output_key));
                run.record(idx, result.payload, result.provenance);
                None
            }
            StepOutcome::Fatal(FlowError::Provider { cause, .. }) if step.optional => {
                self.skip(run, idx, SkipReason::ProviderFailed { cause }, ctx);
                None
            }
            StepOutcome::Fatal(err) => {
                self.events.append_kind(execution_id,
                                        ExecutionEventKind::StepFailed { step: step.output_key.clone(),
                                                                         capability: step.capability.clone(),
                                                                         error: err.clone() });
                Some(err)
            }
        }
    }

    fn skip(&self, run: &mut Run<'_>, idx: usize, reason: SkipReason, ctx: &RequestCtx) {
        let spec = run.spec;
        let step = &spec.steps[idx];
        debug!("[engine] skipping '{}': {reason}", step.output_key);
        self.events.append_kind(ctx.execution_id(),
                                ExecutionEventKind::StepSkipped { step: step.output_key.clone(),
                                                                  reason: reason.to_string() });
        if matches!(reason, SkipReason::ProviderFailed { .. }) {
            run.warnings.push(format!("step '{}': {reason}", step.output_key));
        }
        run.status[idx] = StepStatus::Skipped;
        run.skipped.push(SkippedStep { step: step.output_key.clone(),
                                       capability: step.capability.clone(),
                                       reason });
    }
}

impl Run<'_> {
    fn record(&mut self, idx: usize, payload: Value, provenance: Provenance) {
        let spec = self.spec;
        let step = &spec.steps[idx];
        self.state.merge(step.output_key.clone(), payload);
        self.provenance.push(StepProvenance { step: step.output_key.clone(),
                                              capability: step.capability.clone(),
                                              provenance });
        self.status[idx] = StepStatus::Done;
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
         .field("registry", &self.registry)
         .field("patterns", &self.patterns.ids())
         .field("cache", &self.cache)
         .field("config", &self.config)
         .finish()
    }
}

/// Sólo los inputs declarados entran al estado; faltar uno es error.
fn seed_state(spec: &PatternSpec, mut inputs: IndexMap<String, Value>) -> Result<ExecutionState, FlowError> {
    let mut seeded = IndexMap::with_capacity(spec.inputs.len());
    for name in &spec.inputs {
        let value = inputs.shift_remove(name)
                          .ok_or_else(|| FlowError::MissingInput { pattern_id: spec.id.clone(),
                                                                   input: name.clone() })?;
        seeded.insert(name.clone(), value);
    }
    for extra in inputs.keys() {
        warn!("[engine] '{}': ignoring undeclared input '{extra}'", spec.id);
    }
    Ok(ExecutionState::seeded(seeded))
}

fn resolve_args(step: &StepSpec, state: &ExecutionState, ctx: &RequestCtx) -> Result<Args, FlowError> {
    step.args
        .iter()
        .map(|(name, value)| {
            resolve_value(value, state, ctx).map(|v| (name.clone(), v))
                                            .map_err(|err| FlowError::InvalidArguments { step: step.output_key.clone(),
                                                                                         capability: step.capability.clone(),
                                                                                         reason: format!("argument '{name}': {err}") })
        })
        .collect()
}

/// Clasifica los steps pendientes.
///
/// - Espera mientras algún productor de una clave de la condición siga
///   pendiente.
/// - Espera mientras falte una clave de args cuyo productor siga pendiente; si
///   el productor ya terminó sin dejarla, el step se salta.
/// - Condición falsa: se salta. En otro caso queda listo.
fn plan_round(spec: &PatternSpec, graph: &DependencyGraph, status: &[StepStatus], state: &ExecutionState, ctx: &RequestCtx) -> RoundPlan {
    let pending = |key: &str| graph.producer(key).is_some_and(|p| status[p] == StepStatus::Pending);
    let mut plan = RoundPlan::default();
    for (idx, step) in spec.steps.iter().enumerate() {
        if status[idx] != StepStatus::Pending {
            continue;
        }
        if graph.condition_keys(idx).iter().any(|k| pending(k.as_str())) {
            continue;
        }
        let mut waiting = false;
        let mut missing = Vec::new();
        for key in graph.arg_keys(idx) {
            if state.contains(key) {
                continue;
            }
            if pending(key.as_str()) {
                waiting = true;
            } else {
                missing.push(key.clone());
            }
        }
        if waiting {
            continue;
        }
        if !missing.is_empty() {
            plan.skipped.push((idx, SkipReason::DependencyUnavailable { missing }));
            continue;
        }
        if let Some(condition) = &step.condition {
            if !condition.evaluate(state, ctx) {
                plan.skipped.push((idx, SkipReason::ConditionFalse));
                continue;
            }
        }
        plan.ready.push(idx);
    }
    plan
}
