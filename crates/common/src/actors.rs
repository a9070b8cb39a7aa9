use std::time::Duration;

use async_trait::async_trait;
use tokio::{sync::mpsc, task::JoinHandle};
use uuid::Uuid;

pub const HEARTBEAT_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActorType {
    TradeCopier,
    SignalNotifier,
}

/// Messages sent from Actors to the Supervisor.
///
/// Every message carries the instance id so pulses from a replaced
/// instance can be told apart from the live one.
#[derive(Debug)]
pub enum ControlMessage {
    Heartbeat(ActorType, Uuid),
    Shutdown(ActorType, Uuid),
    Error(ActorType, Uuid, String),
}

/// Pulse task of a running actor. Dropping it stops the pulses, so an actor
/// that returns, fails or panics goes silent and gets restarted.
#[derive(Debug)]
pub struct Heartbeat(JoinHandle<()>);

impl Heartbeat {
    pub fn stop(self) {}
}

impl Drop for Heartbeat {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// The trait that all restartable services must implement
#[async_trait]
pub trait Actor: Send + Sync {
    fn name(&self) -> ActorType;

    fn id(&self) -> Uuid;

    /// The main loop of the actor.
    /// It must hold the `spawn_heartbeat` guard for as long as it is healthy.
    async fn run(&mut self, supervisor_tx: mpsc::Sender<ControlMessage>) -> anyhow::Result<()>;

    fn spawn_heartbeat(&self, supervisor_tx: mpsc::Sender<ControlMessage>) -> Heartbeat {
        let name = self.name();
        let id = self.id();
        Heartbeat(tokio::spawn(async move {
            loop {
                if supervisor_tx
                    .send(ControlMessage::Heartbeat(name, id))
                    .await
                    .is_err()
                {
                    break;
                }
                tokio::time::sleep(HEARTBEAT_INTERVAL).await;
            }
        }))
    }
}
