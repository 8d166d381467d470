//! flow-providers: fachada de proveedores y módulos de capabilities de demo.
//!
//! - `ProviderFacade` / `StaticFacade`: frontera hacia los proveedores de
//!   datos externos.
//! - `pricing.*`, `macro.*`, `scenario.*`: módulos registrados de forma
//!   explícita con `ProviderModule`. Las fórmulas son placeholders.

mod args;
pub mod facade;
pub mod pricing;
pub mod regime;
pub mod scenario;

use std::sync::Arc;

use serde_json::{json, Value};

use flow_core::{CapabilityRegistry, FlowError, ProviderModule};

pub use facade::{FacadeCapability, ProviderFacade, ProviderFailure, ProviderRequest, ProviderResponse, StaticFacade};
pub use pricing::PricingModule;
pub use regime::MacroModule;
pub use scenario::ScenarioModule;

/// Módulos de demo sobre una misma fachada.
pub fn demo_modules(facade: Arc<dyn ProviderFacade>) -> Vec<Box<dyn ProviderModule>> {
    vec![Box::new(PricingModule::new(Arc::clone(&facade))),
         Box::new(MacroModule::new(Arc::clone(&facade))),
         Box::new(ScenarioModule::new(facade))]
}

/// Registry con todas las capabilities de demo.
pub fn demo_registry(facade: Arc<dyn ProviderFacade>) -> Result<CapabilityRegistry, FlowError> {
    let mut registry = CapabilityRegistry::new();
    for module in demo_modules(facade) {
        registry.register_module(module.as_ref())?;
    }
    Ok(registry)
}

/// Fachada en memoria con datos sintéticos deterministas para
/// `positions`, `indicators` y `scenarios`.
pub fn demo_facade() -> StaticFacade {
    StaticFacade::new("demo").respond_with("positions", |req| {
                                 let portfolio = req.params.get("portfolio_id").and_then(Value::as_str).unwrap_or_default();
                                 demo_positions(portfolio)
                             })
                             .with_endpoint("indicators", json!({"gdp_growth": 1.8, "inflation": 3.2, "unemployment": 4.1}))
                             .respond_with("scenarios", |req| {
                                 match req.params.get("name").and_then(Value::as_str) {
                                     Some("equity_crash") => json!({"AAPL": -0.35, "MSFT": -0.3, "TLT": 0.05, "default": -0.25}),
                                     Some("rates_up") => json!({"TLT": -0.12, "default": -0.03}),
                                     _ => json!({"default": 0.0}),
                                 }
                             })
}

fn demo_positions(portfolio_id: &str) -> Value {
    // Cantidades derivadas del id: carteras distintas, resultados estables.
    let seed = portfolio_id.bytes().fold(0u64, |acc, b| acc.wrapping_mul(31).wrapping_add(u64::from(b)));
    let qty = |offset: u64| 5 + (seed.wrapping_add(offset) % 20);
    json!([
        {"symbol": "AAPL", "quantity": qty(1), "price": 190.5},
        {"symbol": "MSFT", "quantity": qty(2), "price": 415.25},
        {"symbol": "TLT",  "quantity": qty(3), "price": 92.1},
    ])
}
