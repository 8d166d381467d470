//! Configuración del motor desde variables de entorno.
//!
//! Convención `PATTERNFLOW_*`; el archivo `.env` (si existe) se carga una sola
//! vez de forma perezosa. Valores inválidos no abortan: se registra un warning
//! y se usa el default.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use dotenvy::dotenv;
use log::warn;
use once_cell::sync::Lazy;

use crate::constants::{DEFAULT_PATTERNS_DIR, DEFAULT_STALE_RETENTION_SECS, DEFAULT_TTL_SECS};

// Carga perezosa del archivo .env una sola vez.
static DOTENV_LOADED: Lazy<()> = Lazy::new(|| {
    let _ = dotenv(); // ignora error si no existe .env
});

pub const ENV_PATTERNS_DIR: &str = "PATTERNFLOW_PATTERNS_DIR";
pub const ENV_MAX_CONCURRENCY: &str = "PATTERNFLOW_MAX_CONCURRENCY";
pub const ENV_DEFAULT_TTL_SECS: &str = "PATTERNFLOW_DEFAULT_TTL_SECS";
pub const ENV_STALE_RETENTION_SECS: &str = "PATTERNFLOW_STALE_RETENTION_SECS";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Directorio con los documentos `*.json` de patterns.
    pub patterns_dir: PathBuf,
    /// Tope opcional de steps concurrentes por ronda (mínimo 1). `None`
    /// despacha el ready set completo.
    pub max_concurrency: Option<usize>,
    /// TTL aplicado cuando la capability no declara uno.
    pub default_ttl_secs: u64,
    /// Retención de entradas expiradas antes de purgarlas.
    pub stale_retention_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { patterns_dir: PathBuf::from(DEFAULT_PATTERNS_DIR),
               max_concurrency: None,
               default_ttl_secs: DEFAULT_TTL_SECS,
               stale_retention_secs: DEFAULT_STALE_RETENTION_SECS }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        // asegura que .env se haya cargado
        Lazy::force(&DOTENV_LOADED);
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Construye la configuración a partir de una función de búsqueda
    /// arbitraria (permite testear sin tocar el entorno del proceso).
    pub fn from_lookup<F>(lookup: F) -> Self
        where F: Fn(&str) -> Option<String>
    {
        let defaults = Self::default();
        let patterns_dir = lookup(ENV_PATTERNS_DIR).filter(|v| !v.trim().is_empty())
                                                   .map(PathBuf::from)
                                                   .unwrap_or(defaults.patterns_dir);
        let max_concurrency = parse_cap(&lookup, ENV_MAX_CONCURRENCY);
        let default_ttl_secs = parse_or(&lookup, ENV_DEFAULT_TTL_SECS, defaults.default_ttl_secs);
        let stale_retention_secs = parse_or(&lookup, ENV_STALE_RETENTION_SECS, defaults.stale_retention_secs);
        Self { patterns_dir,
               max_concurrency,
               default_ttl_secs,
               stale_retention_secs }
    }

    pub fn with_patterns_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.patterns_dir = dir.into();
        self
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
    where F: Fn(&str) -> Option<String>,
          T: FromStr + std::fmt::Display
{
    match lookup(key) {
        None => default,
        Some(raw) => match raw.trim().parse::<T>() {
            Ok(v) => v,
            Err(_) => {
                warn!("[config] {key}='{raw}' no es válido, usando {default}");
                default
            }
        },
    }
}

fn parse_cap<F>(lookup: &F, key: &str) -> Option<usize>
    where F: Fn(&str) -> Option<String>
{
    let raw = lookup(key).filter(|v| !v.trim().is_empty())?;
    match raw.trim().parse::<usize>() {
        Ok(v) => Some(v.max(1)),
        Err(_) => {
            warn!("[config] {key}='{raw}' no es válido, sin tope de concurrencia");
            None
        }
    }
}

/// Forzar carga temprana de .env desde aplicaciones externas si se desea.
pub fn init_dotenv() {
    Lazy::force(&DOTENV_LOADED);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let cfg = EngineConfig::from_lookup(|_| None);
        assert_eq!(cfg, EngineConfig::default());
        assert_eq!(cfg.max_concurrency, None);
    }

    #[test]
    fn reads_every_variable() {
        let cfg = EngineConfig::from_lookup(lookup_from(&[(ENV_PATTERNS_DIR, "/srv/patterns"),
                                                          (ENV_MAX_CONCURRENCY, "3"),
                                                          (ENV_DEFAULT_TTL_SECS, "60"),
                                                          (ENV_STALE_RETENTION_SECS, "120")]));
        assert_eq!(cfg.patterns_dir, PathBuf::from("/srv/patterns"));
        assert_eq!(cfg.max_concurrency, Some(3));
        assert_eq!(cfg.default_ttl_secs, 60);
        assert_eq!(cfg.stale_retention_secs, 120);
    }

    #[test]
    fn invalid_values_fall_back_and_concurrency_is_at_least_one() {
        let uncapped = EngineConfig::from_lookup(lookup_from(&[(ENV_MAX_CONCURRENCY, "many")]));
        assert_eq!(uncapped.max_concurrency, None);
        let cfg = EngineConfig::from_lookup(lookup_from(&[(ENV_MAX_CONCURRENCY, "0"), (ENV_DEFAULT_TTL_SECS, "soon")]));
        assert_eq!(cfg.max_concurrency, Some(1));
        assert_eq!(cfg.default_ttl_secs, DEFAULT_TTL_SECS);
    }
}
