use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use common::models::{AccountCredentials, Student, StudentState, StudentStatus, ValidationReason};
use common::{RelayError, RelayResult};
use storage::RecordStore;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use crate::execution::{self, DEFAULT_EXECUTION_TIMEOUT, ExecutionBackend};
use crate::license_registry::LicenseRegistry;
use crate::liveness;

pub const DEFAULT_LOT_SIZE: f64 = 0.01;

/// Keys whose registration is between reservation and commit.
type InFlight = Arc<Mutex<HashSet<String>>>;

/// Holds a key in the in-flight set; dropping it without committing frees the key.
struct Reservation {
    key: String,
    in_flight: InFlight,
}

impl Drop for Reservation {
    fn drop(&mut self) {
        self.in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(&self.key);
    }
}

pub struct StudentRegistry {
    students: RwLock<HashMap<String, Student>>,
    in_flight: InFlight,
    licenses: Arc<LicenseRegistry>,
    backend: Arc<dyn ExecutionBackend>,
    store: Arc<dyn RecordStore>,
    timeout: Duration,
}

impl StudentRegistry {
    pub fn new(
        licenses: Arc<LicenseRegistry>,
        backend: Arc<dyn ExecutionBackend>,
        store: Arc<dyn RecordStore>,
    ) -> Self {
        Self {
            students: RwLock::new(HashMap::new()),
            in_flight: Arc::new(Mutex::new(HashSet::new())),
            licenses,
            backend,
            store,
            timeout: DEFAULT_EXECUTION_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn backend(&self) -> Arc<dyn ExecutionBackend> {
        self.backend.clone()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn restore(&self, records: Vec<Student>) {
        let mut students = self.students.write().await;
        for student in records {
            students.insert(student.license_key.clone(), student);
        }
    }

    /// Enrolls the account behind `license_key`.
    ///
    /// The key is reserved under the lock, the backend session is opened with
    /// the lock released, and the record is committed only once both the
    /// backend and the store have accepted it.
    pub async fn register(
        &self,
        license_key: &str,
        credentials: AccountCredentials,
        lot_size: Option<f64>,
    ) -> RelayResult<StudentState> {
        let license_key = license_key.trim();

        let mut invalid = Vec::new();
        if credentials.login.trim().is_empty() {
            invalid.push("login");
        }
        if credentials.password.is_empty() {
            invalid.push("password");
        }
        if credentials.server.trim().is_empty() {
            invalid.push("server");
        }
        if lot_size.is_some_and(|lot| !lot.is_finite() || lot <= 0.0) {
            invalid.push("lot_size");
        }
        if !invalid.is_empty() {
            return Err(RelayError::validation(invalid));
        }

        let validation = self.licenses.validate(license_key).await;
        let license = match (validation.reason, validation.license) {
            (ValidationReason::Valid, Some(license)) => license,
            (ValidationReason::Inactive, _) => {
                return Err(RelayError::Forbidden("license is inactive".into()));
            }
            _ => return Err(RelayError::NotFound("license".into())),
        };

        let reservation = self.reserve(license_key).await?;

        let account_ref = match execution::within(
            self.timeout,
            self.backend.open_session(&credentials),
        )
        .await
        {
            Ok(account_ref) => account_ref,
            Err(e) => {
                error!(
                    "Execution backend refused session for {} (login {}): {}",
                    license_key, credentials.login, e
                );
                return Err(RelayError::Backend(
                    "could not open trading account session".into(),
                ));
            }
        };

        let student = Student {
            license_key: license_key.to_string(),
            account_ref,
            login: credentials.login.trim().to_string(),
            broker: credentials.broker.filter(|b| !b.trim().is_empty()),
            server: credentials.server.trim().to_string(),
            lot_size: lot_size.unwrap_or(DEFAULT_LOT_SIZE),
            status: StudentStatus::Active,
            mentor_id: license.mentor_id,
            ea_id: license.ea_id,
            registered_at: Utc::now(),
            last_heartbeat: None,
            last_reported_connected: None,
        };

        if let Err(e) = self.store.insert_student(&student).await {
            error!("Failed to persist student {}: {}", license_key, e);
            self.close_abandoned_session(&student.account_ref).await;
            return Err(RelayError::Backend("student store unavailable".into()));
        }

        let mut students = self.students.write().await;
        students.insert(student.license_key.clone(), student.clone());
        drop(reservation);

        info!(
            "Registered student {} (login {}) for mentor {} / EA {}",
            student.license_key, student.login, student.mentor_id, student.ea_id
        );
        Ok(project(&student, Utc::now()))
    }

    async fn close_abandoned_session(&self, account_ref: &str) {
        if let Err(e) = execution::within(self.timeout, self.backend.close_session(account_ref)).await {
            warn!("Could not close abandoned session {}: {}", account_ref, e);
        }
    }

    async fn reserve(&self, license_key: &str) -> RelayResult<Reservation> {
        let students = self.students.read().await;
        let mut in_flight = self
            .in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if students.contains_key(license_key) {
            return Err(RelayError::Conflict(
                "a student is already registered for this license".into(),
            ));
        }
        if !in_flight.insert(license_key.to_string()) {
            return Err(RelayError::Conflict(
                "a registration for this license is in progress".into(),
            ));
        }

        Ok(Reservation {
            key: license_key.to_string(),
            in_flight: self.in_flight.clone(),
        })
    }

    pub async fn start(&self, license_key: &str) -> RelayResult<StudentState> {
        self.set_status(license_key, StudentStatus::Active).await
    }

    pub async fn stop(&self, license_key: &str) -> RelayResult<StudentState> {
        self.set_status(license_key, StudentStatus::Stopped).await
    }

    async fn set_status(&self, license_key: &str, status: StudentStatus) -> RelayResult<StudentState> {
        let license_key = license_key.trim();
        let mut students = self.students.write().await;
        let student = students
            .get_mut(license_key)
            .ok_or_else(|| RelayError::NotFound("student".into()))?;

        if student.status != status {
            if let Err(e) = self.store.set_student_status(license_key, status).await {
                error!("Failed to persist status {} for {}: {}", status, license_key, e);
                return Err(RelayError::Backend("student store unavailable".into()));
            }
            info!("Student {} is now {}", license_key, status);
            student.status = status;
        }

        Ok(project(student, Utc::now()))
    }

    pub async fn status(&self, license_key: &str) -> RelayResult<StudentState> {
        self.status_at(license_key, Utc::now()).await
    }

    /// Projection as seen at `now`; liveness is evaluated here, not stored.
    pub async fn status_at(&self, license_key: &str, now: DateTime<Utc>) -> RelayResult<StudentState> {
        self.students
            .read()
            .await
            .get(license_key.trim())
            .map(|student| project(student, now))
            .ok_or_else(|| RelayError::NotFound("student".into()))
    }

    /// Active students on a live license, optionally only those of one mentor,
    /// oldest registration first.
    pub async fn active_students(&self, mentor_id: Option<&str>) -> Vec<StudentState> {
        let now = Utc::now();
        let live = self.licenses.active_keys().await;
        let students = self.students.read().await;
        let mut active: Vec<StudentState> = students
            .values()
            .filter(|s| s.status == StudentStatus::Active && live.contains(&s.license_key))
            .filter(|s| mentor_id.is_none_or(|m| s.mentor_id == m))
            .map(|s| project(s, now))
            .collect();
        active.sort_by(|a, b| {
            a.registered_at
                .cmp(&b.registered_at)
                .then(a.license_key.cmp(&b.license_key))
        });
        active
    }

    /// Students a signal from `mentor_id` on `ea_id` is copied to.
    pub async fn targets(&self, mentor_id: &str, ea_id: &str) -> Vec<Student> {
        let live = self.licenses.active_keys().await;
        self.students
            .read()
            .await
            .values()
            .filter(|s| {
                s.status == StudentStatus::Active
                    && s.mentor_id == mentor_id
                    && s.ea_id == ea_id
                    && live.contains(&s.license_key)
            })
            .cloned()
            .collect()
    }

    pub async fn report_heartbeat(&self, license_key: &str, connected: bool) -> RelayResult<StudentState> {
        let license_key = license_key.trim();
        let now = Utc::now();
        let state = {
            let mut students = self.students.write().await;
            let student = students
                .get_mut(license_key)
                .ok_or_else(|| RelayError::NotFound("student".into()))?;
            student.last_heartbeat = Some(now);
            student.last_reported_connected = Some(connected);
            project(student, now)
        };

        if let Err(e) = self.store.record_heartbeat(license_key, now, connected).await {
            warn!("Failed to persist heartbeat for {}: {}", license_key, e);
        }
        Ok(state)
    }

    pub async fn len(&self) -> usize {
        self.students.read().await.len()
    }
}

fn project(student: &Student, now: DateTime<Utc>) -> StudentState {
    StudentState {
        license_key: student.license_key.clone(),
        login: student.login.clone(),
        broker: student.broker.clone(),
        server: student.server.clone(),
        status: student.status,
        mentor_id: student.mentor_id.clone(),
        ea_id: student.ea_id.clone(),
        registered_at: student.registered_at,
        last_heartbeat: student.last_heartbeat,
        connected: liveness::is_connected(
            student.last_heartbeat,
            student.last_reported_connected,
            now,
        ),
    }
}
