//! Provenance Cache: store de resultados compartido por todas las ejecuciones.
//!
//! - Un `DashMap` particionado: cada entrada se reemplaza entera bajo el lock
//!   de su shard, así que ningún lector observa una entrada a medio escribir.
//! - Las entradas expiradas NO se borran en el acto: quedan marcadas como
//!   stale (`fresh = false` en `get`) para servir de fallback si el live call
//!   falla. `evict_expired` las purga pasada la retención.
//! - El protocolo "lookup → live call → store/fallback" vive en
//!   `engine::invoke`; aquí sólo hay almacenamiento y contadores.

mod clock;
mod key;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use log::debug;
use serde::Serialize;
use serde_json::Value;

pub use clock::{Clock, ManualClock, SystemClock};
pub use key::CacheKey;

use crate::model::Provenance;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheEntry {
    pub payload: Value,
    pub provenance: Provenance,
    pub inserted_at: DateTime<Utc>,
    pub ttl_secs: u64,
}

impl CacheEntry {
    pub fn age_secs(&self, now: DateTime<Utc>) -> i64 {
        (now - self.inserted_at).num_seconds().max(0)
    }

    /// Fresca sii edad < TTL.
    pub fn is_fresh_at(&self, now: DateTime<Utc>) -> bool {
        now - self.inserted_at < ttl_duration(self.ttl_secs)
    }
}

/// Resultado de `get`: copia de la entrada más su frescura al momento de leer.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheLookup {
    pub entry: CacheEntry,
    pub fresh: bool,
    pub age_secs: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub stale_fallbacks: u64,
    pub stores: u64,
    pub entries: usize,
}

pub struct ProvenanceCache {
    entries: DashMap<CacheKey, CacheEntry>,
    clock: Arc<dyn Clock>,
    hits: AtomicU64,
    misses: AtomicU64,
    stale_fallbacks: AtomicU64,
    stores: AtomicU64,
}

impl ProvenanceCache {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self { entries: DashMap::new(),
               clock,
               hits: AtomicU64::new(0),
               misses: AtomicU64::new(0),
               stale_fallbacks: AtomicU64::new(0),
               stores: AtomicU64::new(0) }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Lectura pura (no toca contadores).
    pub fn get(&self, key: &CacheKey) -> Option<CacheLookup> {
        let now = self.clock.now();
        self.entries.get(key).map(|e| {
                                 let entry = e.value().clone();
                                 CacheLookup { fresh: entry.is_fresh_at(now),
                                               age_secs: entry.age_secs(now),
                                               entry }
                             })
    }

    /// Inserta (o reemplaza, incluida una entrada stale).
    pub fn put(&self, key: CacheKey, payload: Value, provenance: Provenance, ttl_secs: u64) {
        let entry = CacheEntry { payload,
                                 provenance,
                                 inserted_at: self.clock.now(),
                                 ttl_secs };
        debug!("[cache] put {key} ttl={ttl_secs}s");
        self.entries.insert(key, entry);
        self.stores.fetch_add(1, Ordering::Relaxed);
    }

    /// Purga las entradas cuya edad supera TTL + `retention`. Devuelve cuántas
    /// se eliminaron.
    pub fn evict_expired(&self, retention: Duration) -> usize {
        let now = self.clock.now();
        let before = self.entries.len();
        self.entries.retain(|_, e| now - e.inserted_at < ttl_duration(e.ttl_secs) + retention);
        let evicted = before.saturating_sub(self.entries.len());
        if evicted > 0 {
            debug!("[cache] evicted {evicted} expired entries");
        }
        evicted
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats { hits: self.hits.load(Ordering::Relaxed),
                     misses: self.misses.load(Ordering::Relaxed),
                     stale_fallbacks: self.stale_fallbacks.load(Ordering::Relaxed),
                     stores: self.stores.load(Ordering::Relaxed),
                     entries: self.entries.len() }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub(crate) fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_stale_fallback(&self) {
        self.stale_fallbacks.fetch_add(1, Ordering::Relaxed);
    }
}

impl Default for ProvenanceCache {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ProvenanceCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProvenanceCache").field("stats", &self.stats()).finish()
    }
}

// Tope de ~100 años: evita overflow al sumar TTL + retención.
const MAX_SECS: u64 = 100 * 365 * 86_400;

/// Segundos como `Duration`, saturando en `MAX_SECS`.
pub(crate) fn seconds(secs: u64) -> Duration {
    Duration::seconds(secs.min(MAX_SECS) as i64)
}

fn ttl_duration(ttl_secs: u64) -> Duration {
    seconds(ttl_secs)
}
