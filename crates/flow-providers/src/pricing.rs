//! `pricing.*`: posiciones vía fachada y valoración de la cartera.

use std::sync::Arc;

use serde_json::{json, Map, Value};

use flow_core::{capability_fn, Args, CapabilityError, CapabilityRegistry, CapabilityResult, CapabilitySignature, ExecutionState, FlowError,
                Provenance, ProviderModule, RequestCtx, ValueType};

use crate::args::{array, field_f64, round2};
use crate::facade::{FacadeCapability, ProviderFacade};

pub const GET_POSITIONS: &str = "pricing.get_positions";
pub const VALUE_PORTFOLIO: &str = "pricing.value_portfolio";

pub struct PricingModule {
    facade: Arc<dyn ProviderFacade>,
}

impl PricingModule {
    pub fn new(facade: Arc<dyn ProviderFacade>) -> Self {
        Self { facade }
    }
}

impl ProviderModule for PricingModule {
    fn name(&self) -> &str {
        "pricing"
    }

    fn register_capabilities(&self, registry: &mut CapabilityRegistry) -> Result<(), FlowError> {
        let positions = CapabilitySignature::returns(ValueType::Array).arg("portfolio_id", ValueType::String)
                                                                      .optional_arg("pricing_pack_id", ValueType::Any)
                                                                      .ttl(300)
                                                                      .describe("Positions (symbol, quantity, price) of a portfolio");
        registry.register(GET_POSITIONS, Arc::new(FacadeCapability::new(Arc::clone(&self.facade), "positions", positions)))?;

        let valuation = CapabilitySignature::returns(ValueType::Object).arg("positions", ValueType::Array)
                                                                       .uncached()
                                                                       .describe("Market value of a list of positions");
        registry.register(VALUE_PORTFOLIO, capability_fn(valuation, value_portfolio))
    }
}

/// Valor de mercado: Σ quantity × price.
fn value_portfolio(ctx: &RequestCtx, _state: &ExecutionState, args: &Args) -> Result<CapabilityResult, CapabilityError> {
    let positions = array(args, "positions")?;
    let mut by_symbol = Map::new();
    let mut total = 0.0;
    for (i, position) in positions.iter().enumerate() {
        let symbol = position.get("symbol")
                             .and_then(Value::as_str)
                             .ok_or_else(|| CapabilityError::invalid_arguments(format!("position {i} has no symbol")))?;
        let quantity = field_f64(position, "quantity").unwrap_or(0.0);
        let price = field_f64(position, "price").ok_or_else(|| CapabilityError::invalid_arguments(format!("position '{symbol}' has no price")))?;
        let value = quantity * price;
        total += value;
        by_symbol.insert(symbol.to_string(), json!(round2(value)));
    }
    let payload = json!({
        "total_value": round2(total),
        "positions_count": positions.len(),
        "by_symbol": by_symbol,
    });
    Ok(CapabilityResult::new(payload, Provenance::new("pricing.valuation", ctx.asof())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ctx() -> RequestCtx {
        RequestCtx::new("P-1", NaiveDate::from_ymd_opt(2024, 6, 28).expect("date"))
    }

    #[test]
    fn values_positions() {
        let args: Args = [("positions".to_string(),
                           json!([{"symbol": "AAPL", "quantity": 10, "price": 190.5}, {"symbol": "TLT", "quantity": 4, "price": 92.25}]))].into_iter()
                                                                                                                                     .collect();
        let result = value_portfolio(&ctx(), &ExecutionState::new(), &args).expect("value");
        assert_eq!(result.payload["total_value"], json!(2274.0));
        assert_eq!(result.payload["positions_count"], json!(2));
        assert_eq!(result.payload["by_symbol"]["TLT"], json!(369.0));
    }

    #[test]
    fn rejects_positions_without_price() {
        let args: Args = [("positions".to_string(), json!([{"symbol": "AAPL", "quantity": 1}]))].into_iter().collect();
        let err = value_portfolio(&ctx(), &ExecutionState::new(), &args).expect_err("no price");
        assert!(matches!(err, CapabilityError::InvalidArguments(_)));
    }
}
