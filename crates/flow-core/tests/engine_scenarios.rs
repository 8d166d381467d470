mod support;

use chrono::Duration;
use flow_core::{capability_fn, Args, CapabilityError, CapabilityResult, CapabilitySignature, EngineConfig, ErrorClass, ExecutionState,
                FlowError, IssueCode, PatternSpec, Provenance, RequestCtx, SkipReason, StepSpec, ValueType};
use indexmap::IndexMap;
use serde_json::json;
use support::{ctx, fixture, fixture_with, two_step};

#[tokio::test]
async fn two_step_produces_doubled_value_with_clean_provenance() {
    let fx = fixture(vec![two_step()]);
    let response = fx.engine.execute("two_step", IndexMap::new(), &ctx()).await.expect("execute");

    assert_eq!(serde_json::to_value(&response.outputs).expect("json"), json!({"y": 10}));
    assert_eq!(response.provenance.entries.len(), 2);
    assert!(response.provenance.entries.iter().all(|e| !e.provenance.stale));
    assert_eq!(response.min_confidence(), 1.0);
    assert!(!response.is_degraded());
    assert!(response.skipped.is_empty());
}

#[tokio::test]
async fn failing_step_without_cache_is_attributed() {
    let fx = fixture(vec![two_step()]);
    fx.double.fail(true);
    let err = fx.engine.execute("two_step", IndexMap::new(), &ctx()).await.expect_err("must fail");
    match &err {
        FlowError::Provider { step, capability, .. } => {
            assert_eq!(step, "y");
            assert_eq!(capability, "b.double");
        }
        other => panic!("expected provider error, got {other:?}"),
    }
    assert_eq!(err.class(), ErrorClass::Upstream);
    assert_eq!(fx.fetch.calls(), 1);
}

#[tokio::test]
async fn repeated_execution_within_ttl_hits_the_cache() {
    let fx = fixture(vec![two_step()]);
    fx.engine.execute("two_step", IndexMap::new(), &ctx()).await.expect("first");
    let second = fx.engine.execute("two_step", IndexMap::new(), &ctx()).await.expect("second");

    assert_eq!(fx.fetch.calls(), 1);
    assert_eq!(fx.double.calls(), 1);
    assert!(second.provenance.entry("x").expect("x").provenance.cache_hit);
    let stats = fx.engine.cache().stats();
    assert_eq!(stats.hits, 2);
    assert_eq!(stats.misses, 2);
}

#[tokio::test]
async fn stale_fallback_degrades_and_freshness_requirement_fails() {
    let fx = fixture(vec![two_step()]);
    fx.engine.execute("two_step", IndexMap::new(), &ctx()).await.expect("warm cache");
    fx.clock.advance(Duration::seconds(120));
    fx.double.fail(true);

    let degraded = fx.engine.execute("two_step", IndexMap::new(), &ctx()).await.expect("fallback");
    assert_eq!(degraded.output("y"), Some(&json!(10)));
    let y = &degraded.provenance.entry("y").expect("y").provenance;
    assert!(y.stale);
    assert_eq!(y.confidence, 0.0);
    assert!(y.warnings.iter().any(|w| w.starts_with("live call failed, serving cached data of age 120")));
    assert_eq!(degraded.min_confidence(), 0.0);
    assert!(degraded.provenance.stale);
    assert_eq!(degraded.provenance.degraded_steps(), vec!["y"]);
    assert_eq!(degraded.warnings.len(), 1);

    let strict = ctx().with_require_fresh(true);
    let err = fx.engine.execute("two_step", IndexMap::new(), &strict).await.expect_err("fresh required");
    assert!(matches!(err, FlowError::FreshnessViolation { ref step, .. } if step == "y"));
}

#[tokio::test]
async fn cyclic_pattern_is_rejected_before_any_call() {
    let cyclic = PatternSpec::new("cyclic").step(StepSpec::new("b.double", "a").arg("value", json!("$b")))
                                           .step(StepSpec::new("b.double", "b").arg("value", json!("$a")))
                                           .output("a");
    let fx = fixture(vec![cyclic]);
    let err = fx.engine.execute("cyclic", IndexMap::new(), &ctx()).await.expect_err("cycle");
    match err {
        FlowError::Validation { issues, .. } => assert!(issues.iter().any(|i| i.code == IssueCode::Cycle)),
        other => panic!("expected validation error, got {other:?}"),
    }
    assert_eq!(fx.double.calls(), 0);
}

#[tokio::test]
async fn unknown_pattern_and_missing_input() {
    let with_input = PatternSpec::new("needs_seed").input("seed")
                                                   .step(StepSpec::new("b.double", "y").arg("value", json!("$seed")))
                                                   .output("y");
    let fx = fixture(vec![with_input]);

    let err = fx.engine.execute("ghost", IndexMap::new(), &ctx()).await.expect_err("unknown");
    assert!(matches!(err, FlowError::PatternNotFound { .. }));

    let err = fx.engine.execute("needs_seed", IndexMap::new(), &ctx()).await.expect_err("missing input");
    assert!(matches!(err, FlowError::MissingInput { ref input, .. } if input == "seed"));

    let inputs: IndexMap<String, serde_json::Value> = [("seed".to_string(), json!(21)), ("extra".to_string(), json!(true))].into_iter().collect();
    let response = fx.engine.execute("needs_seed", inputs, &ctx()).await.expect("seeded");
    assert_eq!(response.output("y"), Some(&json!(42)));
}

#[tokio::test]
async fn optional_step_failure_is_skipped_and_starves_downstream() {
    let spec = PatternSpec::new("optional").step(StepSpec::new("a.fetch", "x").optional())
                                           .step(StepSpec::new("b.double", "y").arg("value", json!("$x")))
                                           .step(StepSpec::new("a.fetch", "z").arg("value", json!("independent")))
                                           .output("z");
    let fx = fixture(vec![spec]);
    fx.fetch.fail(true);
    let err = fx.engine.execute("optional", IndexMap::new(), &ctx()).await.expect_err("z also fails");
    assert!(matches!(err, FlowError::Provider { ref step, .. } if step == "z"));

    fx.fetch.fail(false);
    let spec = PatternSpec::new("optional_ok").step(StepSpec::new("b.double", "x").arg("value", json!(2)).optional())
                                              .step(StepSpec::new("b.double", "y").arg("value", json!("$x")))
                                              .step(StepSpec::new("a.fetch", "z"))
                                              .output("z");
    fx.engine.patterns().insert(spec);
    fx.double.fail(true);
    let response = fx.engine.execute("optional_ok", IndexMap::new(), &ctx()).await.expect("degraded run");
    assert_eq!(response.output("z"), Some(&json!(5)));
    let reasons: Vec<_> = response.skipped.iter().map(|s| (s.step.as_str(), &s.reason)).collect();
    assert!(matches!(reasons[0], ("x", SkipReason::ProviderFailed { .. })));
    assert_eq!(reasons[1], ("y", &SkipReason::DependencyUnavailable { missing: vec!["x".into()] }));
}

#[tokio::test]
async fn stalled_output_is_unsatisfied() {
    let spec = PatternSpec::new("stall").step(StepSpec::new("b.double", "x").arg("value", json!(1)).optional())
                                        .step(StepSpec::new("b.double", "y").arg("value", json!("$x")))
                                        .output("y");
    let fx = fixture(vec![spec]);
    fx.double.fail(true);
    let err = fx.engine.execute("stall", IndexMap::new(), &ctx()).await.expect_err("stall");
    match err {
        FlowError::UnsatisfiedOutput { missing, .. } => assert_eq!(missing, vec!["y".to_string()]),
        other => panic!("expected unsatisfied output, got {other:?}"),
    }
}

#[tokio::test]
async fn conditions_gate_steps() {
    let spec = PatternSpec::new("gated").input("mode")
                                        .step(StepSpec::new("a.fetch", "x"))
                                        .step(StepSpec::new("b.double", "stress").arg("value", json!("$x"))
                                                                                 .when(flow_core::Condition::equals("$mode", json!("stress"))))
                                        .step(StepSpec::new("b.double", "after").arg("value", json!("$stress")))
                                        .output("x");
    let fx = fixture(vec![spec]);

    let calm: IndexMap<String, serde_json::Value> = [("mode".to_string(), json!("calm"))].into_iter().collect();
    let response = fx.engine.execute("gated", calm, &ctx()).await.expect("calm");
    let skipped: Vec<_> = response.skipped.iter().map(|s| (s.step.as_str(), s.reason.clone())).collect();
    assert_eq!(skipped,
               vec![("stress", SkipReason::ConditionFalse),
                    ("after", SkipReason::DependencyUnavailable { missing: vec!["stress".into()] })]);
    assert_eq!(fx.double.calls(), 0);

    let stress: IndexMap<String, serde_json::Value> = [("mode".to_string(), json!("stress"))].into_iter().collect();
    let response = fx.engine.execute("gated", stress, &ctx()).await.expect("stress");
    assert!(response.skipped.is_empty());
    assert_eq!(fx.double.calls(), 2);
}

fn partial_series(ctx: &RequestCtx, _: &ExecutionState, _: &Args) -> Result<CapabilityResult, CapabilityError> {
    Ok(CapabilityResult::new(json!(1), Provenance::new("partial", ctx.asof())).with_error("half the series missing"))
}

#[tokio::test]
async fn partial_result_is_visible_in_the_provenance_report() {
    let spec = PatternSpec::new("partial").step(StepSpec::new("c.partial", "x")).output("x");
    let fx = fixture_with(vec![spec],
                          vec![("c.partial", capability_fn(CapabilitySignature::returns(ValueType::Number).ttl(60), partial_series))],
                          EngineConfig::default());
    let response = fx.engine.execute("partial", IndexMap::new(), &ctx()).await.expect("degraded success");

    assert_eq!(response.output("x"), Some(&json!(1)));
    assert_eq!(response.min_confidence(), 0.0);
    assert!(response.provenance.degraded);
    assert!(!response.provenance.stale);
    assert_eq!(response.provenance.degraded_steps(), vec!["x"]);
    assert!(fx.engine.cache().is_empty());
}
