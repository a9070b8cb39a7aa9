use std::sync::Arc;

use chrono::Utc;
use common::RelayResult;
use common::models::{NewSignal, Signal};
use storage::RecordStore;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::fanout::{SubscriberHub, SubscriberId, Subscription};
use crate::signal_log::{SignalDraft, SignalLog};

/// Signals a newly opened subscriber receives before live pushes start.
pub const SNAPSHOT_SIZE: usize = 20;

/// The signal log and its subscribers.
///
/// Append+broadcast and snapshot+register both run under the log lock, so
/// every subscriber sees each signal exactly once: in its snapshot or as a push.
pub struct SignalFeed {
    log: RwLock<SignalLog>,
    hub: SubscriberHub,
    store: Arc<dyn RecordStore>,
}

impl SignalFeed {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            log: RwLock::new(SignalLog::new()),
            hub: SubscriberHub::new(),
            store,
        }
    }

    pub fn with_hub(mut self, hub: SubscriberHub) -> Self {
        self.hub = hub;
        self
    }

    pub async fn restore(&self, signals: Vec<Signal>) {
        self.log.write().await.restore(signals);
    }

    pub async fn ingest(&self, mentor_id: &str, input: NewSignal) -> RelayResult<Signal> {
        let draft = SignalDraft::parse(input)?;

        let (signal, delivered) = {
            let mut log = self.log.write().await;
            let signal = log.append(mentor_id, draft, Utc::now());
            let delivered = self.hub.broadcast(&signal).await;
            (signal, delivered)
        };

        info!(
            "Signal {} {} {} from mentor {} pushed to {} subscribers",
            signal.id, signal.direction, signal.symbol, signal.mentor_id, delivered
        );

        // The log is the source of truth for the stream; persistence is best-effort.
        if let Err(e) = self.store.insert_signal(&signal).await {
            warn!("Failed to persist signal {}: {}", signal.id, e);
        }

        Ok(signal)
    }

    pub async fn subscribe(&self) -> Subscription {
        let log = self.log.read().await;
        self.hub.open(log.recent(SNAPSHOT_SIZE)).await
    }

    pub async fn unsubscribe(&self, id: SubscriberId) -> bool {
        self.hub.close(id).await
    }

    pub async fn recent(&self, n: usize) -> Vec<Signal> {
        self.log.read().await.recent(n)
    }

    pub async fn all(&self) -> Vec<Signal> {
        self.log.read().await.all()
    }

    pub async fn by_ea(&self, ea_id: &str) -> Vec<Signal> {
        self.log.read().await.by_ea(ea_id)
    }

    pub async fn by_mentor(&self, mentor_id: &str) -> Vec<Signal> {
        self.log.read().await.by_mentor(mentor_id)
    }

    pub async fn since(&self, after_id: &str) -> RelayResult<Vec<Signal>> {
        self.log.read().await.since(after_id)
    }

    pub async fn subscriber_count(&self) -> usize {
        self.hub.len().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fanout::FeedMessage;
    use common::RelayError;
    use storage::{MockRecordStore, NullStore, StoreError};
    use tokio::sync::mpsc::error::TryRecvError;

    fn feed() -> SignalFeed {
        SignalFeed::new(Arc::new(NullStore))
    }

    fn input(symbol: &str) -> NewSignal {
        NewSignal {
            ea_id: Some("EA1".into()),
            direction: Some("sell".into()),
            symbol: Some(symbol.into()),
            stop_loss: Some(1.2710),
            take_profit: Some(1.2550),
            ..Default::default()
        }
    }

    fn drain(sub: &mut Subscription) -> (Vec<String>, Vec<String>) {
        let mut snapshot = Vec::new();
        let mut pushes = Vec::new();
        loop {
            match sub.rx.try_recv() {
                Ok(message) => match message.as_ref() {
                    FeedMessage::Snapshot { signals } => {
                        snapshot = signals.iter().map(|s| s.id.clone()).collect()
                    }
                    FeedMessage::Signal { signal } => pushes.push(signal.id.clone()),
                },
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        (snapshot, pushes)
    }

    #[tokio::test]
    async fn late_subscriber_gets_newest_twenty() {
        let feed = feed();
        let mut ids = Vec::new();
        for i in 1..=50 {
            ids.push(feed.ingest("M1", input(&format!("S{}", i))).await.unwrap().id);
        }

        let mut sub = feed.subscribe().await;
        let s51 = feed.ingest("M1", input("S51")).await.unwrap();

        let (snapshot, pushes) = drain(&mut sub);
        let expected: Vec<_> = ids.iter().rev().take(20).cloned().collect();
        assert_eq!(snapshot, expected);
        assert_eq!(pushes, vec![s51.id]);
    }

    #[tokio::test]
    async fn invalid_signal_is_neither_logged_nor_pushed() {
        let feed = feed();
        let mut sub = feed.subscribe().await;

        let mut bad = input("EURUSD");
        bad.symbol = None;
        bad.stop_loss = None;
        assert_eq!(
            feed.ingest("M1", bad).await,
            Err(RelayError::validation(["symbol", "stop_loss"]))
        );

        assert!(feed.all().await.is_empty());
        let (snapshot, pushes) = drain(&mut sub);
        assert!(snapshot.is_empty());
        assert!(pushes.is_empty());
    }

    #[tokio::test]
    async fn store_failure_does_not_fail_ingest() {
        let mut store = MockRecordStore::new();
        store.expect_insert_signal().times(1).returning(|_| {
            Err(StoreError::Corrupt {
                table: "signals",
                detail: "locked".into(),
            })
        });
        let feed = SignalFeed::new(Arc::new(store));

        let signal = feed.ingest("M1", input("xauusd")).await.unwrap();
        assert_eq!(signal.symbol, "XAUUSD");
        assert_eq!(feed.recent(5).await.len(), 1);
    }

    #[tokio::test]
    async fn joiners_during_ingestion_see_every_signal_once() {
        let feed = Arc::new(feed());

        let producer = {
            let feed = feed.clone();
            tokio::spawn(async move {
                for i in 0..60 {
                    feed.ingest("M1", input(&format!("P{}", i))).await.unwrap();
                    tokio::task::yield_now().await;
                }
            })
        };

        let mut subs = Vec::new();
        for _ in 0..12 {
            subs.push(feed.subscribe().await);
            tokio::task::yield_now().await;
        }
        producer.await.unwrap();

        // Oldest first, for comparison with push order.
        let mut log: Vec<String> = feed.all().await.into_iter().map(|s| s.id).collect();
        log.reverse();

        for sub in subs.iter_mut() {
            let (snapshot, pushes) = drain(sub);
            let start = match snapshot.first() {
                Some(newest) => log.iter().position(|id| id == newest).unwrap() + 1,
                None => 0,
            };
            assert_eq!(pushes, log[start..].to_vec());
        }
    }

    #[tokio::test]
    async fn unsubscribed_connection_gets_nothing_more() {
        let feed = feed();
        let mut sub = feed.subscribe().await;
        assert!(feed.unsubscribe(sub.id).await);
        feed.ingest("M1", input("EURUSD")).await.unwrap();

        let (_, pushes) = drain(&mut sub);
        assert!(pushes.is_empty());
        assert_eq!(feed.subscriber_count().await, 0);
    }
}
