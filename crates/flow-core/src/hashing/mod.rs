//! Módulo de hashing y canonicalización JSON.
//!
//! Se usa para normalizar los argumentos de una invocación antes de construir
//! su `CacheKey`: dos objetos con las mismas claves en distinto orden producen
//! el mismo hash.

pub mod canonical_json;
pub mod hash;

pub use canonical_json::to_canonical_json;
pub use hash::{hash_str, hash_value};
