//! Constantes del motor de orquestación.
//!
//! Algunas participan en el cálculo de claves de cache (`ENGINE_VERSION`), por
//! lo que cambiarlas invalida de forma determinista las entradas existentes.

/// Versión lógica del motor. Forma parte del hash de argumentos de cada
/// `CacheKey`; subirla cuando cambie la normalización de argumentos.
pub const ENGINE_VERSION: &str = "P1.0";

/// Prefijo que marca una referencia dentro de `args` (`"$clave.ruta"`).
pub const REF_PREFIX: char = '$';

/// Clave reservada para acceder al `RequestCtx` desde una referencia.
pub const CTX_KEY: &str = "ctx";

/// TTL por defecto (segundos) para capabilities que no declaran uno propio.
pub const DEFAULT_TTL_SECS: u64 = 300;

/// Tiempo que una entrada expirada se conserva (como stale) para fallback.
pub const DEFAULT_STALE_RETENTION_SECS: u64 = 86_400;

/// Directorio por defecto del Pattern Store.
pub const DEFAULT_PATTERNS_DIR: &str = "patterns";
