use std::sync::Arc;

use async_trait::async_trait;
use common::actors::{Actor, ActorType, ControlMessage};
use common::models::Signal;
use futures_util::future::join_all;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::execution::{self, OrderRequest};
use crate::student_registry::StudentRegistry;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CopyReport {
    pub placed: usize,
    pub failed: usize,
}

/// Places every ingested signal on the accounts of the students it targets.
pub struct TradeCopier {
    id: Uuid,
    students: Arc<StudentRegistry>,
    signal_rx: broadcast::Receiver<Arc<Signal>>,
}

#[async_trait]
impl Actor for TradeCopier {
    fn id(&self) -> Uuid {
        self.id
    }

    fn name(&self) -> ActorType {
        ActorType::TradeCopier
    }

    async fn run(&mut self, supervisor_tx: mpsc::Sender<ControlMessage>) -> anyhow::Result<()> {
        let heartbeat = self.spawn_heartbeat(supervisor_tx.clone());

        info!("Starting Trade Copier");

        loop {
            match self.signal_rx.recv().await {
                Ok(signal) => {
                    let report = Self::copy(&self.students, &signal).await;
                    if report.failed > 0 {
                        let err_msg = format!(
                            "Signal {}: {} of {} copies failed",
                            signal.id,
                            report.failed,
                            report.placed + report.failed
                        );
                        supervisor_tx
                            .send(ControlMessage::Error(self.name(), self.id, err_msg))
                            .await?;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Trade copier lagged: missed {} signals", n);
                }
                Err(broadcast::error::RecvError::Closed) => {
                    info!("Signal channel closed. Stopping trade copier.");
                    heartbeat.stop();
                    supervisor_tx
                        .send(ControlMessage::Shutdown(self.name(), self.id))
                        .await?;
                    return Ok(());
                }
            }
        }
    }
}

impl TradeCopier {
    pub fn new(students: Arc<StudentRegistry>, signal_rx: broadcast::Receiver<Arc<Signal>>) -> Self {
        Self {
            id: Uuid::new_v4(),
            students,
            signal_rx,
        }
    }

    /// Copies `signal` to all of its targets concurrently. Each copy is bounded
    /// by the registry's execution timeout; one failure never affects another.
    pub async fn copy(students: &StudentRegistry, signal: &Signal) -> CopyReport {
        let targets = students.targets(&signal.mentor_id, &signal.ea_id).await;
        if targets.is_empty() {
            debug!("Signal {} has no active students to copy to", signal.id);
            return CopyReport::default();
        }

        let backend = students.backend();
        let timeout = students.timeout();

        let outcomes = join_all(targets.iter().map(|student| {
            let backend = backend.clone();
            let order = OrderRequest::copy_of(signal, student.lot_size);
            async move {
                let outcome =
                    execution::within(timeout, backend.place_order(&student.account_ref, &order))
                        .await;
                (student, outcome)
            }
        }))
        .await;

        let mut report = CopyReport::default();
        for (student, outcome) in outcomes {
            match outcome {
                Ok(receipt) => {
                    report.placed += 1;
                    debug!(
                        "Copied signal {} to {} as order {}",
                        signal.id, student.license_key, receipt.order_id
                    );
                }
                Err(e) => {
                    report.failed += 1;
                    error!(
                        "Failed to copy signal {} to {}: {}",
                        signal.id, student.license_key, e
                    );
                }
            }
        }

        info!(
            "Signal {} copied to {}/{} students",
            signal.id,
            report.placed,
            targets.len()
        );
        report
    }
}
