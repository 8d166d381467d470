#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use flow_core::{Args, Capability, CapabilityError, CapabilityRegistry, CapabilityResult, CapabilitySignature, EngineConfig,
                ExecutionState, ManualClock, Orchestrator, PatternSpec, PatternStore, Provenance, ProvenanceCache, RequestCtx,
                StepSpec, ValueType};
use serde_json::{json, Value};

type Compute = Box<dyn Fn(&Args) -> Value + Send + Sync>;

/// Capability de prueba: cuenta llamadas, puede fallar a demanda y registra
/// las claves de estado visibles en cada invocación.
pub struct Scripted {
    signature: CapabilitySignature,
    compute: Compute,
    delay: Option<Duration>,
    pub calls: AtomicUsize,
    pub failing: AtomicBool,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub seen_keys: Mutex<Vec<Vec<String>>>,
}

impl Scripted {
    pub fn new(signature: CapabilitySignature, compute: impl Fn(&Args) -> Value + Send + Sync + 'static) -> Self {
        Self { signature,
               compute: Box::new(compute),
               delay: None,
               calls: AtomicUsize::new(0),
               failing: AtomicBool::new(false),
               in_flight: AtomicUsize::new(0),
               max_in_flight: AtomicUsize::new(0),
               seen_keys: Mutex::new(Vec::new()) }
    }

    pub fn with_delay(mut self, millis: u64) -> Self {
        self.delay = Some(Duration::from_millis(millis));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn fail(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl Capability for Scripted {
    fn signature(&self) -> CapabilitySignature {
        self.signature.clone()
    }

    async fn invoke(&self, ctx: &RequestCtx, state: &ExecutionState, args: &Args) -> Result<CapabilityResult, CapabilityError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen_keys.lock().expect("seen keys").push(state.keys().map(str::to_string).collect());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(CapabilityError::upstream("provider unavailable"));
        }
        Ok(CapabilityResult::new((self.compute)(args), Provenance::new("scripted", ctx.asof())))
    }
}

pub fn fetch() -> Arc<Scripted> {
    Arc::new(Scripted::new(CapabilitySignature::returns(ValueType::Number).optional_arg("value", ValueType::Any).ttl(60),
                           |_| json!(5)))
}

pub fn double() -> Arc<Scripted> {
    Arc::new(Scripted::new(CapabilitySignature::returns(ValueType::Number).arg("value", ValueType::Number).ttl(60),
                           |args| json!(args.get("value").and_then(Value::as_i64).unwrap_or_default() * 2)))
}

pub fn two_step() -> PatternSpec {
    PatternSpec::new("two_step").step(StepSpec::new("a.fetch", "x"))
                                .step(StepSpec::new("b.double", "y").arg("value", json!("$x")))
                                .output("y")
}

pub fn asof() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 28).expect("date")
}

pub fn ctx() -> RequestCtx {
    RequestCtx::new("P-001", asof())
}

pub struct Fixture {
    pub fetch: Arc<Scripted>,
    pub double: Arc<Scripted>,
    pub clock: Arc<ManualClock>,
    pub engine: Orchestrator,
}

/// Registry con `a.fetch` y `b.double` más las capabilities extra dadas.
pub fn fixture_with(patterns: Vec<PatternSpec>, extra: Vec<(&str, Arc<dyn Capability>)>, config: EngineConfig) -> Fixture {
    let fetch = fetch();
    let double = double();
    let mut registry = CapabilityRegistry::new();
    registry.register("a.fetch", fetch.clone()).expect("register a.fetch");
    registry.register("b.double", double.clone()).expect("register b.double");
    for (name, handler) in extra {
        registry.register(name, handler).expect("register extra");
    }
    let store = PatternStore::new();
    for spec in patterns {
        store.insert(spec);
    }
    let clock = Arc::new(ManualClock::default());
    let engine = Orchestrator::new(Arc::new(registry), Arc::new(store)).with_cache(Arc::new(ProvenanceCache::with_clock(clock.clone())))
                                                                       .with_config(config);
    Fixture { fetch,
              double,
              clock,
              engine }
}

pub fn fixture(patterns: Vec<PatternSpec>) -> Fixture {
    fixture_with(patterns, Vec::new(), EngineConfig::default())
}
