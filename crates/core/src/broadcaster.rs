// SPDX-License-Identifier: MIT

//! Multi-subscriber fan-out of typed events.
//!
//! Built on `tokio::sync::broadcast`, which already provides exactly the
//! contract this component needs: every subscriber sees every event
//! published after it subscribes, in publish order; a slow subscriber
//! never blocks the publisher or other subscribers (its oldest buffered
//! events are dropped and the next `recv()` surfaces a lost-event count
//! instead); subscribe/unsubscribe and concurrent publish are all
//! lock-free from the caller's perspective. One `Broadcaster` instance
//! backs the process event channel, a separate instance backs the engine
//! event channel.

use tokio::sync::broadcast;

/// Default per-subscriber buffer depth before the oldest unread event for
/// that subscriber is dropped.
pub const DEFAULT_CAPACITY: usize = 1024;

#[derive(Clone)]
pub struct Broadcaster<T: Clone + Send + 'static> {
    tx: broadcast::Sender<T>,
}

impl<T: Clone + Send + 'static> Broadcaster<T> {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Registers a new subscriber. Only events published after this call
    /// are observable through the returned handle.
    pub fn subscribe(&self) -> Subscription<T> {
        Subscription {
            rx: self.tx.subscribe(),
        }
    }

    /// Publishes `event` to every current subscriber. A publish with zero
    /// subscribers is a harmless no-op (mirrors `broadcast::Sender::send`,
    /// whose `SendError` in that case carries no useful information here).
    pub fn publish(&self, event: T) {
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl<T: Clone + Send + 'static> Default for Broadcaster<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// A single subscriber's receive handle. Dropping it unsubscribes promptly.
pub struct Subscription<T: Clone + Send + 'static> {
    rx: broadcast::Receiver<T>,
}

#[derive(Debug, thiserror::Error)]
pub enum RecvError {
    #[error("broadcaster closed")]
    Closed,
    #[error("subscriber lagged, {0} events dropped")]
    Lagged(u64),
}

impl<T: Clone + Send + 'static> Subscription<T> {
    /// Awaits the next event. Returns `Lagged(n)` if this subscriber fell
    /// behind and `n` events were dropped before the oldest surviving one;
    /// callers that need strict ordering should treat `Lagged` as "resync
    /// from a fresh snapshot," not as fatal.
    pub async fn recv(&mut self) -> Result<T, RecvError> {
        match self.rx.recv().await {
            Ok(event) => Ok(event),
            Err(broadcast::error::RecvError::Closed) => Err(RecvError::Closed),
            Err(broadcast::error::RecvError::Lagged(n)) => Err(RecvError::Lagged(n)),
        }
    }
}
