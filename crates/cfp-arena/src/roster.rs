//! The observer pool.
//!
//! Reader/writer discipline around a single lock: broadcasts take the
//! shared side, connection churn takes the exclusive side. Sink sends
//! happen outside the lock so a slow observer never blocks roster
//! mutation.

use std::collections::HashMap;

use parking_lot::RwLock;
use tokio::sync::mpsc;

use cfp_types::ObserverId;

use crate::event::ServerEvent;
use crate::hub::HubError;

struct RosterInner {
    next_id: u64,
    sinks: HashMap<ObserverId, mpsc::Sender<String>>,
}

/// Pool of connected observers.
///
/// Each observer is a bounded text sink; the transport drains it into
/// the actual connection. The pool refuses connections over its cap.
pub struct Roster {
    max_observers: usize,
    inner: RwLock<RosterInner>,
}

impl Roster {
    /// Creates an empty roster with the given connection cap.
    #[must_use]
    pub fn new(max_observers: usize) -> Self {
        Self {
            max_observers,
            inner: RwLock::new(RosterInner {
                next_id: 0,
                sinks: HashMap::new(),
            }),
        }
    }

    /// Registers an observer sink and assigns it an id.
    ///
    /// # Errors
    ///
    /// [`HubError::ConnectionCap`] when the pool is full.
    pub fn add(&self, sink: mpsc::Sender<String>) -> Result<ObserverId, HubError> {
        let mut inner = self.inner.write();
        if inner.sinks.len() >= self.max_observers {
            return Err(HubError::ConnectionCap(self.max_observers));
        }
        let id = ObserverId::new(inner.next_id);
        inner.next_id += 1;
        inner.sinks.insert(id, sink);
        Ok(id)
    }

    /// Drops an observer. Returns whether it was present.
    pub fn remove(&self, id: ObserverId) -> bool {
        self.inner.write().sinks.remove(&id).is_some()
    }

    /// Number of connected observers.
    #[must_use]
    pub fn count(&self) -> usize {
        self.inner.read().sinks.len()
    }

    /// Sends a line to every observer.
    ///
    /// Sink order is unspecified, but each observer sees the hub's
    /// broadcasts in emission order. Closed sinks are skipped; the
    /// transport removes them when it notices.
    pub async fn broadcast(&self, event: ServerEvent) {
        let sinks: Vec<mpsc::Sender<String>> =
            self.inner.read().sinks.values().cloned().collect();
        for sink in sinks {
            let _ = sink.send(event.0.clone()).await;
        }
    }

    /// Sends a line to one observer.
    ///
    /// # Errors
    ///
    /// [`HubError::NoSuchObserver`] when the id is unknown.
    pub async fn respond(
        &self,
        id: ObserverId,
        line: impl Into<String>,
    ) -> Result<(), HubError> {
        let sink = self
            .inner
            .read()
            .sinks
            .get(&id)
            .cloned()
            .ok_or(HubError::NoSuchObserver(id))?;
        let _ = sink.send(line.into()).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn add_respects_the_cap() {
        let roster = Roster::new(2);
        let (tx, _rx1) = mpsc::channel(4);
        roster.add(tx).unwrap();
        let (tx, _rx2) = mpsc::channel(4);
        roster.add(tx).unwrap();

        let (tx, _rx3) = mpsc::channel(4);
        assert!(matches!(roster.add(tx), Err(HubError::ConnectionCap(2))));
        assert_eq!(roster.count(), 2);
    }

    #[tokio::test]
    async fn broadcast_reaches_every_observer() {
        let roster = Roster::new(8);
        let (tx_a, mut rx_a) = mpsc::channel(4);
        let (tx_b, mut rx_b) = mpsc::channel(4);
        roster.add(tx_a).unwrap();
        roster.add(tx_b).unwrap();

        roster.broadcast(ServerEvent::new("newgame")).await;
        assert_eq!(rx_a.recv().await.unwrap(), "newgame");
        assert_eq!(rx_b.recv().await.unwrap(), "newgame");
    }

    #[tokio::test]
    async fn broadcasts_preserve_emission_order() {
        let roster = Roster::new(8);
        let (tx, mut rx) = mpsc::channel(8);
        roster.add(tx).unwrap();

        roster.broadcast(ServerEvent::new("one")).await;
        roster.broadcast(ServerEvent::new("two")).await;
        roster.broadcast(ServerEvent::new("three")).await;

        assert_eq!(rx.recv().await.unwrap(), "one");
        assert_eq!(rx.recv().await.unwrap(), "two");
        assert_eq!(rx.recv().await.unwrap(), "three");
    }

    #[tokio::test]
    async fn respond_targets_one_observer() {
        let roster = Roster::new(8);
        let (tx_a, mut rx_a) = mpsc::channel(4);
        let (tx_b, mut rx_b) = mpsc::channel(4);
        let a = roster.add(tx_a).unwrap();
        roster.add(tx_b).unwrap();

        roster.respond(a, "hello").await.unwrap();
        assert_eq!(rx_a.recv().await.unwrap(), "hello");
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn respond_to_unknown_observer_fails() {
        let roster = Roster::new(8);
        let missing = ObserverId::new(99);
        assert!(matches!(
            roster.respond(missing, "hello").await,
            Err(HubError::NoSuchObserver(_))
        ));
    }

    #[tokio::test]
    async fn removed_observers_stop_receiving() {
        let roster = Roster::new(8);
        let (tx, mut rx) = mpsc::channel(4);
        let id = roster.add(tx).unwrap();

        assert!(roster.remove(id));
        assert!(!roster.remove(id));

        roster.broadcast(ServerEvent::new("gone")).await;
        assert!(rx.try_recv().is_err());
    }
}
