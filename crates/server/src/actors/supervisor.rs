use std::{collections::HashMap, time::Duration};
use tracing::{error, info, warn};

use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time::{self, Instant},
};
use uuid::Uuid;

use common::actors::{Actor, ActorType, ControlMessage};

pub type ActorFactory = Box<dyn Fn() -> Box<dyn Actor> + Send + Sync>;

/// Keeps one live instance per registered actor type, replacing any instance
/// that stops pulsing. Messages from replaced instances are ignored.
pub struct Supervisor {
    actor_factories: HashMap<ActorType, ActorFactory>,
    pulses: HashMap<ActorType, Instant>,
    handles: HashMap<ActorType, JoinHandle<()>>,
    instances: HashMap<ActorType, Uuid>,
    check_interval: Duration,
    timeout: Duration,
}

impl Default for Supervisor {
    fn default() -> Self {
        Self::new()
    }
}

impl Supervisor {
    pub fn new() -> Self {
        Self::with_timings(Duration::from_secs(1), Duration::from_secs(3))
    }

    pub fn with_timings(check_interval: Duration, timeout: Duration) -> Self {
        Self {
            actor_factories: HashMap::new(),
            pulses: HashMap::new(),
            handles: HashMap::new(),
            instances: HashMap::new(),
            check_interval,
            timeout,
        }
    }

    pub fn register_actor(&mut self, actor_type: ActorType, factory: ActorFactory) {
        self.actor_factories.insert(actor_type, factory);
    }

    fn is_current(&self, actor_type: ActorType, id: Uuid) -> bool {
        self.instances.get(&actor_type) == Some(&id)
    }

    pub async fn start(&mut self) {
        let mut check_interval = time::interval(self.check_interval);

        let (supervisor_tx, mut supervisor_rx) = mpsc::channel::<ControlMessage>(512);

        let actors: Vec<ActorType> = self.actor_factories.keys().copied().collect();
        for actor in actors {
            self.spawn_actor(actor, supervisor_tx.clone());
        }

        loop {
            tokio::select! {
                Some(msg) = supervisor_rx.recv() => {
                    match msg {
                        ControlMessage::Heartbeat(actor_type, id) => {
                            if self.is_current(actor_type, id) {
                                self.pulses.insert(actor_type, Instant::now());
                            }
                        }
                        ControlMessage::Shutdown(actor_type, id) => {
                            if !self.is_current(actor_type, id) {
                                continue;
                            }
                            warn!("{:?} is shutting down gracefully.", actor_type);
                            self.pulses.remove(&actor_type);
                            self.instances.remove(&actor_type);
                            if let Some(handle) = self.handles.remove(&actor_type) {
                                handle.abort();
                            }
                        },
                        ControlMessage::Error(actor_type, id, error_msg) => {
                            error!("Actor {:?} ({}) reported error: {}", actor_type, id, error_msg);
                            if self.is_current(actor_type, id) {
                                self.pulses.insert(actor_type, Instant::now());
                            }
                        },
                    }
                }

                _ = check_interval.tick() => {
                    let Some(dead_timeout) = Instant::now().checked_sub(self.timeout) else {
                        continue;
                    };

                    let dead_actors: Vec<ActorType> = self
                        .pulses
                        .iter()
                        .filter(|&(_, &last)| last < dead_timeout)
                        .map(|(&actor_type, _)| actor_type)
                        .collect();

                    for actor_type in dead_actors {
                        warn!("{:?} is unresponsive! Restarting.", actor_type);
                        if let Some(handle) = self.handles.remove(&actor_type) {
                            handle.abort();
                        }
                        self.spawn_actor(actor_type, supervisor_tx.clone());
                    }
                }
            }
        }
    }

    fn spawn_actor(&mut self, actor_type: ActorType, tx: mpsc::Sender<ControlMessage>) {
        let Some(factory) = self.actor_factories.get(&actor_type) else {
            error!("No factory registered for {:?}", actor_type);
            return;
        };
        let mut new_actor = factory();
        let id = new_actor.id();

        let new_actor_handle = tokio::spawn(async move {
            if let Err(e) = new_actor.run(tx).await {
                error!("Actor {:?} crashed: {}", actor_type, e);
            }
        });
        info!("Spawned {:?} ({})", actor_type, id);

        self.handles.insert(actor_type, new_actor_handle);
        self.pulses.insert(actor_type, Instant::now());
        self.instances.insert(actor_type, id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    enum Behaviour {
        Silent,
        Healthy,
        Quits,
    }

    struct TestActor {
        id: Uuid,
        behaviour: Behaviour,
    }

    #[async_trait]
    impl Actor for TestActor {
        fn name(&self) -> ActorType {
            ActorType::TradeCopier
        }

        fn id(&self) -> Uuid {
            self.id
        }

        async fn run(&mut self, supervisor_tx: mpsc::Sender<ControlMessage>) -> anyhow::Result<()> {
            match self.behaviour {
                Behaviour::Silent => std::future::pending::<()>().await,
                Behaviour::Healthy => {
                    let _heartbeat = self.spawn_heartbeat(supervisor_tx);
                    std::future::pending::<()>().await
                }
                Behaviour::Quits => {
                    supervisor_tx
                        .send(ControlMessage::Shutdown(self.name(), self.id))
                        .await?;
                }
            }
            Ok(())
        }
    }

    async fn spawn_count(
        behaviour: fn() -> Behaviour,
        timeout: Duration,
        run_for: Duration,
    ) -> usize {
        let spawned = Arc::new(AtomicUsize::new(0));
        let mut supervisor = Supervisor::with_timings(Duration::from_millis(20), timeout);
        let counter = spawned.clone();
        supervisor.register_actor(
            ActorType::TradeCopier,
            Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                Box::new(TestActor {
                    id: Uuid::new_v4(),
                    behaviour: behaviour(),
                })
            }),
        );

        let handle = tokio::spawn(async move { supervisor.start().await });
        time::sleep(run_for).await;
        handle.abort();
        spawned.load(Ordering::SeqCst)
    }

    #[tokio::test]
    async fn restarts_silent_actors() {
        let count = spawn_count(
            || Behaviour::Silent,
            Duration::from_millis(100),
            Duration::from_millis(700),
        )
        .await;
        assert!(count >= 3, "only {} spawns", count);
    }

    #[tokio::test]
    async fn keeps_pulsing_actors() {
        let count = spawn_count(
            || Behaviour::Healthy,
            Duration::from_millis(1500),
            Duration::from_millis(1200),
        )
        .await;
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn graceful_shutdown_is_not_restarted() {
        let count = spawn_count(
            || Behaviour::Quits,
            Duration::from_millis(100),
            Duration::from_millis(500),
        )
        .await;
        assert_eq!(count, 1);
    }
}
