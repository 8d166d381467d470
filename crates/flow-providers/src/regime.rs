//! `macro.*`: indicadores macro vía fachada y clasificación de régimen.
//!
//! La regla de clasificación es un placeholder (umbral sobre crecimiento e
//! inflación); el modelo real queda fuera de este crate.

use std::sync::Arc;

use serde_json::{json, Value};

use flow_core::{capability_fn, Args, CapabilityError, CapabilityRegistry, CapabilityResult, CapabilitySignature, ExecutionState, FlowError,
                Provenance, ProviderModule, RequestCtx, ValueType};

use crate::args::{object, round2};
use crate::facade::{FacadeCapability, ProviderFacade};

pub const GET_INDICATORS: &str = "macro.get_indicators";
pub const DETECT_REGIME: &str = "macro.detect_regime";

pub struct MacroModule {
    facade: Arc<dyn ProviderFacade>,
}

impl MacroModule {
    pub fn new(facade: Arc<dyn ProviderFacade>) -> Self {
        Self { facade }
    }
}

impl ProviderModule for MacroModule {
    fn name(&self) -> &str {
        "macro"
    }

    fn register_capabilities(&self, registry: &mut CapabilityRegistry) -> Result<(), FlowError> {
        let indicators = CapabilitySignature::returns(ValueType::Object).optional_arg("series", ValueType::Array)
                                                                        .ttl(3_600)
                                                                        .describe("Latest macro indicators (gdp_growth, inflation, unemployment)");
        registry.register(GET_INDICATORS, Arc::new(FacadeCapability::new(Arc::clone(&self.facade), "indicators", indicators)))?;

        let regime = CapabilitySignature::returns(ValueType::Object).arg("indicators", ValueType::Object)
                                                                    .uncached()
                                                                    .describe("Classify the macro regime from indicators");
        registry.register(DETECT_REGIME, capability_fn(regime, detect_regime))
    }
}

fn detect_regime(ctx: &RequestCtx, _state: &ExecutionState, args: &Args) -> Result<CapabilityResult, CapabilityError> {
    let indicators = object(args, "indicators")?;
    let value = |name: &str| indicators.get(name).and_then(Value::as_f64);
    let growth = value("gdp_growth").ok_or_else(|| CapabilityError::invalid_arguments("indicators.gdp_growth is required"))?;
    let inflation = value("inflation").ok_or_else(|| CapabilityError::invalid_arguments("indicators.inflation is required"))?;

    let label = match (growth >= 1.0, inflation >= 4.0) {
        (true, false) => "expansion",
        (true, true) => "overheating",
        (false, true) => "stagflation",
        (false, false) => "contraction",
    };
    let score = round2(growth - inflation / 2.0);
    let mut provenance = Provenance::new("macro.regime_rules", ctx.asof());
    let missing: Vec<&str> = ["gdp_growth", "inflation", "unemployment"].into_iter().filter(|k| !indicators.contains_key(*k)).collect();
    if !missing.is_empty() {
        provenance = provenance.with_confidence(0.5).with_warning(format!("missing indicators: {}", missing.join(", ")));
    }
    Ok(CapabilityResult::new(json!({"label": label, "score": score}), provenance))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn run(indicators: serde_json::Value) -> Result<CapabilityResult, CapabilityError> {
        let ctx = RequestCtx::new("P-1", NaiveDate::from_ymd_opt(2024, 6, 28).expect("date"));
        let args: Args = [("indicators".to_string(), indicators)].into_iter().collect();
        detect_regime(&ctx, &ExecutionState::new(), &args)
    }

    #[test]
    fn classifies_regimes() {
        let r = run(json!({"gdp_growth": 2.4, "inflation": 3.1, "unemployment": 3.9})).expect("regime");
        assert_eq!(r.payload["label"], "expansion");
        assert_eq!(r.provenance.confidence, 1.0);
        let r = run(json!({"gdp_growth": -0.5, "inflation": 6.0, "unemployment": 5.0})).expect("regime");
        assert_eq!(r.payload["label"], "stagflation");
    }

    #[test]
    fn partial_indicators_lower_confidence() {
        let r = run(json!({"gdp_growth": 0.2, "inflation": 2.0})).expect("regime");
        assert_eq!(r.payload["label"], "contraction");
        assert_eq!(r.provenance.confidence, 0.5);
        assert_eq!(r.provenance.warnings, vec!["missing indicators: unemployment".to_string()]);
    }

    #[test]
    fn missing_growth_is_invalid() {
        assert!(matches!(run(json!({"inflation": 2.0})), Err(CapabilityError::InvalidArguments(_))));
    }
}
