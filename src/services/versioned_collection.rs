//! Snapshot versionado de una colección
//!
//! Cada fetch toma un ticket al empezar y su resultado solo se aplica si el
//! ticket es más nuevo que el último aplicado. Una actualización optimista
//! toma su propio ticket, así un poll lanzado antes que ella y resuelto
//! después se descarta.

use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

use crate::utils::errors::AppError;

pub type Ticket = u64;

/// Resultado de aplicar un fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied,
    /// Llegó un resultado más nuevo antes que este
    Superseded,
}

struct Snapshot<T> {
    items: Vec<T>,
    applied: Ticket,
    last_error: Option<AppError>,
}

pub struct VersionedCollection<T> {
    name: &'static str,
    next_ticket: AtomicU64,
    snapshot: RwLock<Snapshot<T>>,
}

impl<T: Clone> VersionedCollection<T> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            next_ticket: AtomicU64::new(0),
            snapshot: RwLock::new(Snapshot {
                items: Vec::new(),
                applied: 0,
                last_error: None,
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Emitir un ticket nuevo (estrictamente creciente)
    pub fn issue(&self) -> Ticket {
        self.next_ticket.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Reemplazar el snapshot completo si el ticket es más nuevo
    pub async fn apply(&self, ticket: Ticket, items: Vec<T>) -> ApplyOutcome {
        let mut snapshot = self.snapshot.write().await;
        if ticket <= snapshot.applied {
            log::debug!(
                "⏭️ {}: resultado del ticket {} descartado (aplicado: {})",
                self.name,
                ticket,
                snapshot.applied
            );
            return ApplyOutcome::Superseded;
        }

        snapshot.items = items;
        snapshot.applied = ticket;
        snapshot.last_error = None;
        ApplyOutcome::Applied
    }

    /// Mutación local inmediata; invalida los fetches en vuelo
    pub async fn mutate_optimistic<F>(&self, mutate: F) -> Ticket
    where
        F: FnOnce(&mut Vec<T>),
    {
        let ticket = self.issue();
        let mut snapshot = self.snapshot.write().await;
        mutate(&mut snapshot.items);
        snapshot.applied = snapshot.applied.max(ticket);
        ticket
    }

    /// El fetch falló: el snapshot queda como estaba (stale)
    pub async fn record_failure(&self, error: AppError) {
        self.snapshot.write().await.last_error = Some(error);
    }

    pub async fn items(&self) -> Vec<T> {
        self.snapshot.read().await.items.clone()
    }

    pub async fn applied_version(&self) -> Ticket {
        self.snapshot.read().await.applied
    }

    /// Error del último fetch si el snapshot quedó desactualizado
    pub async fn last_error(&self) -> Option<AppError> {
        self.snapshot.read().await.last_error.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_newer_ticket_wins() {
        let collection = VersionedCollection::new("jobs");
        let first = collection.issue();
        let second = collection.issue();

        assert_eq!(collection.apply(second, vec![2]).await, ApplyOutcome::Applied);
        assert_eq!(collection.apply(first, vec![1]).await, ApplyOutcome::Superseded);
        assert_eq!(collection.items().await, vec![2]);
        assert_eq!(collection.applied_version().await, second);
    }

    #[tokio::test]
    async fn test_optimistic_update_discards_older_poll() {
        let collection = VersionedCollection::new("jobs");
        let poll = collection.issue();

        collection.mutate_optimistic(|items| items.insert(0, "new")).await;

        assert_eq!(collection.apply(poll, vec![]).await, ApplyOutcome::Superseded);
        assert_eq!(collection.items().await, vec!["new"]);
    }

    #[tokio::test]
    async fn test_failure_keeps_stale_snapshot() {
        let collection = VersionedCollection::new("vehicles");
        let ticket = collection.issue();
        collection.apply(ticket, vec!["v1"]).await;

        collection
            .record_failure(AppError::Network("connection refused".to_string()))
            .await;

        assert_eq!(collection.items().await, vec!["v1"]);
        assert!(collection.last_error().await.is_some());

        let ticket = collection.issue();
        collection.apply(ticket, vec!["v1", "v2"]).await;
        assert_eq!(collection.last_error().await, None);
    }
}
