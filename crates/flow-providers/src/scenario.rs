//! `scenario.*`: definición de shocks vía fachada y aplicación sobre
//! posiciones.

use std::sync::Arc;

use serde_json::{json, Map, Value};

use flow_core::{capability_fn, Args, CapabilityError, CapabilityRegistry, CapabilityResult, CapabilitySignature, ExecutionState, FlowError,
                Provenance, ProviderModule, RequestCtx, ValueType};

use crate::args::{array, field_f64, number_or, object, round2};
use crate::facade::{FacadeCapability, ProviderFacade};

pub const GET_SHOCKS: &str = "scenario.get_shocks";
pub const APPLY_SHOCK: &str = "scenario.apply_shock";

pub struct ScenarioModule {
    facade: Arc<dyn ProviderFacade>,
}

impl ScenarioModule {
    pub fn new(facade: Arc<dyn ProviderFacade>) -> Self {
        Self { facade }
    }
}

impl ProviderModule for ScenarioModule {
    fn name(&self) -> &str {
        "scenario"
    }

    fn register_capabilities(&self, registry: &mut CapabilityRegistry) -> Result<(), FlowError> {
        let shocks = CapabilitySignature::returns(ValueType::Object).arg("name", ValueType::String)
                                                                    .ttl(86_400)
                                                                    .describe("Per-symbol shocks (fraction) of a named scenario");
        registry.register(GET_SHOCKS, Arc::new(FacadeCapability::new(Arc::clone(&self.facade), "scenarios", shocks)))?;

        let apply = CapabilitySignature::returns(ValueType::Object).arg("positions", ValueType::Array)
                                                                   .arg("shocks", ValueType::Object)
                                                                   .optional_arg("multiplier", ValueType::Number)
                                                                   .uncached()
                                                                   .describe("Revalue positions under a shock map");
        registry.register(APPLY_SHOCK, capability_fn(apply, apply_shock))
    }
}

/// Cada posición se revalúa con `price × (1 + shock × multiplier)`. Los
/// símbolos sin shock propio usan `shocks.default` (0 si no hay).
fn apply_shock(ctx: &RequestCtx, _state: &ExecutionState, args: &Args) -> Result<CapabilityResult, CapabilityError> {
    let positions = array(args, "positions")?;
    let shocks = object(args, "shocks")?;
    let multiplier = number_or(args, "multiplier", 1.0)?;
    let default_shock = shocks.get("default").and_then(Value::as_f64).unwrap_or(0.0);

    let mut base = 0.0;
    let mut shocked = 0.0;
    let mut by_symbol = Map::new();
    for position in positions {
        let symbol = position.get("symbol").and_then(Value::as_str).unwrap_or("?");
        let quantity = field_f64(position, "quantity").unwrap_or(0.0);
        let price = field_f64(position, "price").unwrap_or(0.0);
        let shock = shocks.get(symbol).and_then(Value::as_f64).unwrap_or(default_shock) * multiplier;
        let before = quantity * price;
        let after = before * (1.0 + shock);
        base += before;
        shocked += after;
        by_symbol.insert(symbol.to_string(), json!({"shock": round2(shock), "pnl": round2(after - before)}));
    }
    let payload = json!({
        "base_value": round2(base),
        "shocked_value": round2(shocked),
        "pnl": round2(shocked - base),
        "by_symbol": by_symbol,
    });
    Ok(CapabilityResult::new(payload, Provenance::new("scenario.shock_engine", ctx.asof())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn applies_symbol_and_default_shocks() {
        let ctx = RequestCtx::new("P-1", NaiveDate::from_ymd_opt(2024, 6, 28).expect("date"));
        let args: Args = [("positions".to_string(),
                           json!([{"symbol": "AAPL", "quantity": 10, "price": 100.0}, {"symbol": "TLT", "quantity": 10, "price": 50.0}])),
                          ("shocks".to_string(), json!({"AAPL": -0.2, "default": 0.1})),
                          ("multiplier".to_string(), json!(2))].into_iter()
                                                                .collect();
        let result = apply_shock(&ctx, &ExecutionState::new(), &args).expect("apply");
        assert_eq!(result.payload["base_value"], json!(1500.0));
        assert_eq!(result.payload["shocked_value"], json!(1200.0));
        assert_eq!(result.payload["pnl"], json!(-300.0));
        assert_eq!(result.payload["by_symbol"]["TLT"]["shock"], json!(0.2));
    }
}
