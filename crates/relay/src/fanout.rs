//! Live subscriber set for the signal stream.
//!
//! A subscriber is Connecting until `open` registers it, Open while it sits in
//! the set, and Closed once removed (explicit `close`, or its receiver was
//! dropped and the next broadcast noticed). Delivery is at-most-once: no acks,
//! no retries, and a subscriber whose queue is full misses that signal.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use common::models::Signal;
use serde::Serialize;
use tokio::sync::{RwLock, mpsc};
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};

pub const SUBSCRIBER_QUEUE: usize = 256;

pub type SubscriberId = u64;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeedMessage {
    Snapshot { signals: Vec<Signal> },
    Signal { signal: Signal },
}

/// Receiving end handed to a connection. The snapshot is always the first message.
pub struct Subscription {
    pub id: SubscriberId,
    pub rx: mpsc::Receiver<Arc<FeedMessage>>,
}

pub struct SubscriberHub {
    subscribers: RwLock<HashMap<SubscriberId, mpsc::Sender<Arc<FeedMessage>>>>,
    next_id: AtomicU64,
    queue_size: usize,
}

impl SubscriberHub {
    pub fn new() -> Self {
        Self::with_queue_size(SUBSCRIBER_QUEUE)
    }

    pub fn with_queue_size(queue_size: usize) -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            queue_size: queue_size.max(1),
        }
    }

    /// Registers a subscriber with `snapshot` already queued.
    pub async fn open(&self, snapshot: Vec<Signal>) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.queue_size);

        // Fresh channel with capacity >= 1: this cannot fail.
        let _ = tx.try_send(Arc::new(FeedMessage::Snapshot { signals: snapshot }));

        self.subscribers.write().await.insert(id, tx);
        debug!("Subscriber {} opened", id);
        Subscription { id, rx }
    }

    pub async fn close(&self, id: SubscriberId) -> bool {
        let removed = self.subscribers.write().await.remove(&id).is_some();
        if removed {
            debug!("Subscriber {} closed", id);
        }
        removed
    }

    /// Pushes `signal` to every open subscriber without waiting on any of
    /// them. Returns how many subscribers accepted it.
    pub async fn broadcast(&self, signal: &Signal) -> usize {
        let message = Arc::new(FeedMessage::Signal {
            signal: signal.clone(),
        });
        let mut delivered = 0;
        let mut closed = Vec::new();

        {
            let subscribers = self.subscribers.read().await;
            for (id, tx) in subscribers.iter() {
                match tx.try_send(message.clone()) {
                    Ok(()) => delivered += 1,
                    Err(TrySendError::Full(_)) => {
                        warn!("Subscriber {} is lagging, dropped signal {}", id, signal.id);
                    }
                    Err(TrySendError::Closed(_)) => closed.push(*id),
                }
            }
        }

        if !closed.is_empty() {
            let mut subscribers = self.subscribers.write().await;
            for id in closed {
                subscribers.remove(&id);
                debug!("Subscriber {} went away, removed", id);
            }
        }

        delivered
    }

    pub async fn len(&self) -> usize {
        self.subscribers.read().await.len()
    }
}

impl Default for SubscriberHub {
    fn default() -> Self {
        Self::new()
    }
}
