use std::sync::Arc;
use std::time::Duration;

use common::models::{
    AccountCredentials, LicenseKey, LicenseValidation, Mentor, MentorRegistration, NewSignal,
    Signal, StudentState,
};
use common::{Caller, RelayResult};
use storage::{RecordStore, StoreError};
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::auth::{Authenticator, Credentials};
use crate::execution::ExecutionBackend;
use crate::fanout::{SubscriberId, Subscription};
use crate::feed::SignalFeed;
use crate::license_registry::LicenseRegistry;
use crate::mentor_directory::MentorDirectory;
use crate::signal_log::MAX_SIGNALS;
use crate::student_registry::StudentRegistry;

/// Signals buffered for the trade copier before it starts lagging.
pub const COPY_CHANNEL_CAPACITY: usize = 1024;

/// Counts of what `restore` reloaded.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Restored {
    pub mentors: usize,
    pub licenses: usize,
    pub students: usize,
    pub signals: usize,
}

/// Every relay operation, checked against the capability of the caller.
pub struct Relay {
    pub licenses: Arc<LicenseRegistry>,
    pub mentors: Arc<MentorDirectory>,
    pub students: Arc<StudentRegistry>,
    pub feed: Arc<SignalFeed>,
    auth: Authenticator,
    store: Arc<dyn RecordStore>,
    copy_tx: broadcast::Sender<Arc<Signal>>,
}

impl Relay {
    pub fn new(
        store: Arc<dyn RecordStore>,
        backend: Arc<dyn ExecutionBackend>,
        auth: Authenticator,
        execution_timeout: Duration,
    ) -> Self {
        let licenses = Arc::new(LicenseRegistry::new(store.clone()));
        let students = Arc::new(
            StudentRegistry::new(licenses.clone(), backend, store.clone())
                .with_timeout(execution_timeout),
        );
        let (copy_tx, _) = broadcast::channel(COPY_CHANNEL_CAPACITY);

        let mut mentors = MentorDirectory::new(store.clone());
        if let Some(legacy_id) = auth.legacy_mentor_id() {
            mentors = mentors.reserve_id(legacy_id);
        }

        Self {
            licenses,
            mentors: Arc::new(mentors),
            students,
            feed: Arc::new(SignalFeed::new(store.clone())),
            auth,
            store,
            copy_tx,
        }
    }

    /// Rebuilds every registry from the record store.
    pub async fn restore(&self) -> Result<Restored, StoreError> {
        let snapshot = self.store.load(MAX_SIGNALS).await?;
        let restored = Restored {
            mentors: snapshot.mentors.len(),
            licenses: snapshot.licenses.len(),
            students: snapshot.students.len(),
            signals: snapshot.signals.len(),
        };

        self.mentors.restore(snapshot.mentors).await;
        self.licenses.restore(snapshot.licenses).await;
        self.students.restore(snapshot.students).await;
        self.feed.restore(snapshot.signals).await;

        info!(
            "Restored {} mentors, {} licenses, {} students, {} signals",
            restored.mentors, restored.licenses, restored.students, restored.signals
        );
        Ok(restored)
    }

    pub async fn authenticate(&self, credentials: &Credentials<'_>) -> RelayResult<Caller> {
        self.auth.resolve(credentials, &self.mentors).await
    }

    /// A receiver of every accepted signal, for the trade copier.
    pub fn copy_feed(&self) -> broadcast::Receiver<Arc<Signal>> {
        self.copy_tx.subscribe()
    }

    // Licenses

    pub async fn issue_license(
        &self,
        caller: &Caller,
        ea_id: &str,
        user_id: Option<String>,
    ) -> RelayResult<LicenseKey> {
        let mentor_id = caller.require_mentor()?;
        self.licenses.issue(mentor_id, ea_id, user_id).await
    }

    pub async fn validate_license(&self, key: &str) -> LicenseValidation {
        self.licenses.validate(key).await
    }

    pub async fn deactivate_license(&self, caller: &Caller, key: &str) -> RelayResult<LicenseKey> {
        let mentor_id = caller.require_mentor()?;
        self.licenses.deactivate(mentor_id, key).await
    }

    pub async fn list_licenses(&self, caller: &Caller) -> RelayResult<Vec<LicenseKey>> {
        let mentor_id = caller.require_mentor()?;
        Ok(self.licenses.list(mentor_id).await)
    }

    // Mentors

    pub async fn register_mentor(
        &self,
        name: &str,
        email: &str,
        requested_id: Option<&str>,
    ) -> RelayResult<MentorRegistration> {
        self.mentors.register(name, email, requested_id).await
    }

    pub async fn verify_mentor(&self, mentor_id: &str) -> Option<Mentor> {
        self.mentors.validate(mentor_id.trim()).await
    }

    // Signals

    /// Appends and broadcasts the signal, then hands it to the copier without
    /// waiting on any execution.
    pub async fn submit_signal(&self, caller: &Caller, input: NewSignal) -> RelayResult<Signal> {
        let mentor_id = caller.require_mentor()?;
        let signal = self.feed.ingest(mentor_id, input).await?;

        if self.copy_tx.send(Arc::new(signal.clone())).is_err() {
            debug!("No trade copier listening for signal {}", signal.id);
        }
        Ok(signal)
    }

    /// Newest first. `since` keeps only signals after that id; `limit` caps the count.
    pub async fn signals(&self, limit: Option<usize>, since: Option<&str>) -> RelayResult<Vec<Signal>> {
        let mut signals = match since {
            Some(after) => self.feed.since(after).await?,
            None => self.feed.all().await,
        };
        if let Some(limit) = limit {
            signals.truncate(limit);
        }
        Ok(signals)
    }

    pub async fn signals_for_ea(&self, ea_id: &str) -> Vec<Signal> {
        self.feed.by_ea(ea_id).await
    }

    pub async fn signals_of_mentor(&self, mentor_id: &str) -> Vec<Signal> {
        self.feed.by_mentor(mentor_id).await
    }

    pub async fn subscribe(&self) -> Subscription {
        self.feed.subscribe().await
    }

    pub async fn unsubscribe(&self, id: SubscriberId) -> bool {
        self.feed.unsubscribe(id).await
    }

    // Students

    pub async fn register_student(
        &self,
        license_key: &str,
        credentials: AccountCredentials,
        lot_size: Option<f64>,
    ) -> RelayResult<StudentState> {
        self.students
            .register(license_key, credentials, lot_size)
            .await
    }

    pub async fn start_student(&self, license_key: &str) -> RelayResult<StudentState> {
        self.students.start(license_key).await
    }

    pub async fn stop_student(&self, license_key: &str) -> RelayResult<StudentState> {
        self.students.stop(license_key).await
    }

    pub async fn student_status(&self, license_key: &str) -> RelayResult<StudentState> {
        self.students.status(license_key).await
    }

    // Agent

    pub async fn active_students(
        &self,
        caller: &Caller,
        mentor_id: Option<&str>,
    ) -> RelayResult<Vec<StudentState>> {
        caller.require_agent()?;
        Ok(self.students.active_students(mentor_id).await)
    }

    pub async fn report_heartbeat(
        &self,
        caller: &Caller,
        license_key: &str,
        connected: bool,
    ) -> RelayResult<StudentState> {
        caller.require_agent()?;
        self.students.report_heartbeat(license_key, connected).await
    }
}
