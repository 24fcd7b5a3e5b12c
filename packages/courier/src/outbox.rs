//! Per-connection outbound queues.
//!
//! Kept apart from the relay's registry so that pushing a frame to a slow
//! connection never holds the lock other connections need for routing.

use courier_relay::{ConnectionId, Delivery};
use std::collections::HashMap;
use std::sync::RwLock;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::metrics::RelayMetrics;

pub type OutboxReceiver = mpsc::Receiver<String>;

#[derive(Debug, Default)]
pub struct Outboxes {
    senders: RwLock<HashMap<ConnectionId, mpsc::Sender<String>>>,
}

impl Outboxes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the outbox for `conn` and returns its receiving end.
    pub fn register(&self, conn: ConnectionId, capacity: usize) -> OutboxReceiver {
        let (tx, rx) = mpsc::channel(capacity);
        self.write().insert(conn, tx);
        rx
    }

    pub fn remove(&self, conn: ConnectionId) {
        self.write().remove(&conn);
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Queues each delivery without waiting. Frames for full or missing
    /// outboxes are dropped.
    pub fn dispatch(&self, deliveries: Vec<Delivery>, metrics: &RelayMetrics) {
        for Delivery { target, frame } in deliveries {
            let sender = self.read().get(&target).cloned();
            let Some(sender) = sender else {
                debug!(conn = %target, "no outbox for delivery target");
                metrics.delivery_dropped();
                continue;
            };

            match sender.try_send(frame) {
                Ok(()) => metrics.delivery_sent(),
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(conn = %target, "outbox full, dropping frame");
                    metrics.delivery_dropped();
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    debug!(conn = %target, "outbox closed, dropping frame");
                    metrics.delivery_dropped();
                }
            }
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<ConnectionId, mpsc::Sender<String>>> {
        self.senders
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn write(
        &self,
    ) -> std::sync::RwLockWriteGuard<'_, HashMap<ConnectionId, mpsc::Sender<String>>> {
        self.senders
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}
