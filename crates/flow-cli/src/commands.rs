use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use chrono::NaiveDate;
use flow_core::{AggregateReport, EngineConfig, FlowError, RequestCtx, ValidationReport};
use flow_providers::{demo_facade, demo_registry};
use indexmap::IndexMap;
use log::error;
use patternflow::{Runtime, RuntimeError};
use serde_json::Value;

const EXIT_INVALID: u8 = 1;
const EXIT_USAGE: u8 = 2;
const EXIT_STORE: u8 = 3;
const EXIT_EXECUTION: u8 = 4;

pub struct RunRequest {
    pub pattern: String,
    pub subject: String,
    pub asof: NaiveDate,
    pub pricing_pack: Option<String>,
    pub require_fresh: bool,
    pub inputs: Vec<(String, Value)>,
    pub patterns_dir: Option<PathBuf>,
}

fn load_runtime(patterns_dir: Option<PathBuf>) -> Result<Runtime, ExitCode> {
    let mut config = EngineConfig::from_env();
    if let Some(dir) = patterns_dir {
        config = config.with_patterns_dir(dir);
    }
    Runtime::from_config(config, Arc::new(demo_facade())).map_err(|e| {
        eprintln!("error: {e}");
        match e {
            RuntimeError::Store(_) => ExitCode::from(EXIT_STORE),
            RuntimeError::Registry(_) => ExitCode::FAILURE,
        }
    })
}

fn print_json(value: &impl serde::Serialize) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{s}"),
        Err(e) => error!("[cli] cannot serialize output: {e}"),
    }
}

fn print_report(report: &ValidationReport) {
    let status = if report.valid { "valid" } else { "INVALID" };
    println!("{}: {status} ({} error(s), {} warning(s))",
             report.pattern_id,
             report.errors.len(),
             report.warnings.len());
    for issue in &report.errors {
        println!("  error   {issue}");
    }
    for issue in &report.warnings {
        println!("  warning {issue}");
    }
}

pub fn validate(pattern: Option<&str>, json: bool, strict: bool, patterns_dir: Option<PathBuf>) -> ExitCode {
    let runtime = match load_runtime(patterns_dir) {
        Ok(r) => r,
        Err(code) => return code,
    };
    let aggregate = match pattern {
        Some(id) => match runtime.validate(id) {
            Ok(report) => AggregateReport::from_reports([report]),
            Err(e @ FlowError::PatternNotFound { .. }) => {
                eprintln!("error: {e}");
                return ExitCode::from(EXIT_USAGE);
            }
            Err(e) => {
                eprintln!("error: {e}");
                return ExitCode::FAILURE;
            }
        },
        None => runtime.validate_all(),
    };
    if json {
        print_json(&aggregate);
    } else {
        for report in aggregate.reports.values() {
            print_report(report);
        }
        println!("{} pattern(s), {} invalid", aggregate.reports.len(), aggregate.invalid_ids().len());
    }
    if strict && !aggregate.valid {
        ExitCode::from(EXIT_INVALID)
    } else {
        ExitCode::SUCCESS
    }
}

pub fn capabilities(json: bool) -> ExitCode {
    let registry = match demo_registry(Arc::new(demo_facade())) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };
    let names = registry.list_capabilities();
    if json {
        let listing: IndexMap<&str, _> = names.iter()
                                              .filter_map(|n| registry.signature(n).map(|s| (n.as_str(), s)))
                                              .collect();
        print_json(&listing);
        return ExitCode::SUCCESS;
    }
    for name in &names {
        let Some(sig) = registry.signature(name) else { continue };
        let args: Vec<String> = sig.args
                                   .iter()
                                   .map(|(arg, spec)| if spec.required { format!("{arg}: {}", spec.ty) } else { format!("{arg}?: {}", spec.ty) })
                                   .collect();
        let ttl = match sig.ttl_secs {
            Some(0) => "uncached".to_string(),
            Some(secs) => format!("ttl {secs}s"),
            None => "default ttl".to_string(),
        };
        println!("{name}({}) -> {} [{ttl}]", args.join(", "), sig.output);
        if !sig.description.is_empty() {
            println!("    {}", sig.description);
        }
    }
    ExitCode::SUCCESS
}

pub async fn run(request: RunRequest) -> ExitCode {
    let runtime = match load_runtime(request.patterns_dir) {
        Ok(r) => r,
        Err(code) => return code,
    };
    let mut ctx = RequestCtx::new(request.subject, request.asof).with_require_fresh(request.require_fresh);
    if let Some(pack) = request.pricing_pack {
        ctx = ctx.with_pricing_pack(pack);
    }
    let inputs: IndexMap<String, Value> = request.inputs.into_iter().collect();
    match runtime.run(&request.pattern, inputs, &ctx).await {
        Ok(response) => {
            print_json(&response);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            print_json(&e);
            ExitCode::from(EXIT_EXECUTION)
        }
    }
}
