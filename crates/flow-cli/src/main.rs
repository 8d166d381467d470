//! `patternflow`: validación de patterns, listado de capabilities y ejecución
//! contra los proveedores de demo.

mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use chrono::NaiveDate;
use clap::{ArgGroup, Parser, Subcommand};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "patternflow", version, about = "Pattern orchestration and capability dispatch")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Valida uno o todos los patterns del directorio.
    #[command(group(ArgGroup::new("target").required(true).args(["pattern", "all"])))]
    Validate {
        #[arg(long)]
        pattern: Option<String>,
        #[arg(long)]
        all: bool,
        /// Imprime el reporte como JSON.
        #[arg(long)]
        json: bool,
        /// Termina con código 1 si algún pattern es inválido.
        #[arg(long)]
        strict: bool,
        /// Reemplaza PATTERNFLOW_PATTERNS_DIR.
        #[arg(long)]
        patterns_dir: Option<PathBuf>,
    },
    /// Lista las capabilities registradas con su firma.
    Capabilities {
        #[arg(long)]
        json: bool,
    },
    /// Ejecuta un pattern e imprime la respuesta como JSON.
    Run {
        #[arg(long)]
        pattern: String,
        #[arg(long)]
        subject: String,
        /// Fecha as-of (YYYY-MM-DD).
        #[arg(long)]
        asof: NaiveDate,
        #[arg(long)]
        pricing_pack: Option<String>,
        /// Rechaza datos servidos desde cache stale.
        #[arg(long)]
        require_fresh: bool,
        /// Input del pattern como `clave=valor` (valor JSON o texto).
        #[arg(long = "input", value_parser = parse_input)]
        inputs: Vec<(String, Value)>,
        #[arg(long)]
        patterns_dir: Option<PathBuf>,
    },
}

/// `k=v`: el valor se interpreta como JSON y, si no lo es, como string.
fn parse_input(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw.split_once('=')
                          .ok_or_else(|| format!("expected key=value, got '{raw}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty input name in '{raw}'"));
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();
    match cli.command {
        Command::Validate { pattern,
                            all: _,
                            json,
                            strict,
                            patterns_dir, } => commands::validate(pattern.as_deref(), json, strict, patterns_dir),
        Command::Capabilities { json } => commands::capabilities(json),
        Command::Run { pattern,
                       subject,
                       asof,
                       pricing_pack,
                       require_fresh,
                       inputs,
                       patterns_dir, } => {
            let request = commands::RunRequest { pattern,
                                                 subject,
                                                 asof,
                                                 pricing_pack,
                                                 require_fresh,
                                                 inputs,
                                                 patterns_dir };
            commands::run(request).await
        }
    }
}
