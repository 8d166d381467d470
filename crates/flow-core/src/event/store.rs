use chrono::Utc;
use dashmap::DashMap;
use uuid::Uuid;

use super::{ExecutionEvent, ExecutionEventKind};

/// Almacenamiento de eventos append-only.
///
/// `&self` en ambos métodos: la store se comparte entre ejecuciones
/// concurrentes y entre los steps de una misma ronda.
pub trait EventStore: Send + Sync {
    /// Agrega un evento a partir de su kind y devuelve el evento completo (con seq y ts).
    fn append_kind(&self, execution_id: Uuid, kind: ExecutionEventKind) -> ExecutionEvent;
    /// Lista eventos de una ejecución (orden ascendente por seq).
    fn list(&self, execution_id: Uuid) -> Vec<ExecutionEvent>;
}

#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    inner: DashMap<Uuid, Vec<ExecutionEvent>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ejecuciones registradas.
    pub fn executions(&self) -> Vec<Uuid> {
        self.inner.iter().map(|e| *e.key()).collect()
    }
}

impl EventStore for InMemoryEventStore {
    fn append_kind(&self, execution_id: Uuid, kind: ExecutionEventKind) -> ExecutionEvent {
        // El entry mantiene el lock del shard: seq y push son atómicos.
        let mut events = self.inner.entry(execution_id).or_default();
        let ev = ExecutionEvent { seq: events.len() as u64,
                                  execution_id,
                                  kind,
                                  ts: Utc::now() };
        events.push(ev.clone());
        ev
    }

    fn list(&self, execution_id: Uuid) -> Vec<ExecutionEvent> {
        self.inner.get(&execution_id).map(|e| e.value().clone()).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequences_are_per_execution() {
        let store = InMemoryEventStore::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let e0 = store.append_kind(a, ExecutionEventKind::ExecutionStarted { pattern_id: "p".into(),
                                                                             subject_id: "s".into() });
        let e1 = store.append_kind(a, ExecutionEventKind::StepSkipped { step: "x".into(),
                                                                        reason: "condition evaluated false".into() });
        let f0 = store.append_kind(b, ExecutionEventKind::RoundStarted { round: 1, steps: vec![] });
        assert_eq!((e0.seq, e1.seq, f0.seq), (0, 1, 0));
        let codes: Vec<&str> = store.list(a).iter().map(|e| e.kind.code()).collect();
        assert_eq!(codes, vec!["I", "K"]);
        assert!(store.list(Uuid::new_v4()).is_empty());
        assert_eq!(store.executions().len(), 2);
    }
}
