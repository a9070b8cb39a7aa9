use std::sync::Arc;

use anyhow::bail;
use async_trait::async_trait;
use common::actors::{Actor, ActorType, ControlMessage};
use common::models::Signal;
use relay::{FeedMessage, Relay};
use teloxide::prelude::*;
use tokio::sync::mpsc;
use tracing::{debug, error, info};
use uuid::Uuid;

/// Posts every new signal to a Telegram chat. Subscribes to the feed like any
/// stream client and skips the snapshot each new instance receives.
pub struct SignalNotifier {
    id: Uuid,
    bot: Bot,
    chat_id: ChatId,
    relay: Arc<Relay>,
}

#[async_trait]
impl Actor for SignalNotifier {
    fn id(&self) -> Uuid {
        self.id
    }

    fn name(&self) -> ActorType {
        ActorType::SignalNotifier
    }

    async fn run(&mut self, supervisor_tx: mpsc::Sender<ControlMessage>) -> anyhow::Result<()> {
        let heartbeat = self.spawn_heartbeat(supervisor_tx.clone());

        info!("Starting Telegram Signal Notifier");

        let mut subscription = self.relay.subscribe().await;

        loop {
            match subscription.rx.recv().await {
                Some(message) => match message.as_ref() {
                    FeedMessage::Snapshot { signals } => {
                        debug!("Notifier skipping snapshot of {} signals", signals.len());
                    }
                    FeedMessage::Signal { signal } => {
                        // Send message and log error if it fails, but don't crash
                        if let Err(e) = self
                            .bot
                            .send_message(self.chat_id, format_signal(signal))
                            .await
                        {
                            error!("Failed to send Telegram message: {}", e);
                        }
                    }
                },
                None => {
                    let err_msg = "Signal feed closed the notifier subscription".to_string();
                    heartbeat.stop();
                    supervisor_tx
                        .send(ControlMessage::Error(self.name(), self.id, err_msg.clone()))
                        .await?;
                    bail!(err_msg);
                }
            }
        }
    }
}

impl SignalNotifier {
    pub fn new(bot: Bot, chat_id: i64, relay: Arc<Relay>) -> Self {
        Self {
            id: Uuid::new_v4(),
            bot,
            chat_id: ChatId(chat_id),
            relay,
        }
    }
}

pub fn format_signal(signal: &Signal) -> String {
    let mut text = format!(
        "{} {} [{}]\nSL {} | TP {}",
        signal.direction, signal.symbol, signal.ea_id, signal.stop_loss, signal.take_profit
    );
    if let Some(entry) = signal.entry_price {
        text.push_str(&format!("\nEntry {}", entry));
    }
    if let Some(size) = signal.size {
        text.push_str(&format!("\nSize {}", size));
    }
    if let Some(comment) = &signal.comment {
        text.push_str(&format!("\n{}", comment));
    }
    text.push_str(&format!("\nMentor {} | #{}", signal.mentor_id, signal.id));
    text
}
