use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::models::{LicenseKey, Mentor, Signal, Student, StudentStatus};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error("corrupt row in {table}: {detail}")]
    Corrupt { table: &'static str, detail: String },
}

/// Everything needed to rebuild the in-memory registries on boot.
#[derive(Debug, Default, Clone)]
pub struct StoreSnapshot {
    pub mentors: Vec<Mentor>,
    pub licenses: Vec<LicenseKey>,
    pub students: Vec<Student>,
    /// Newest first.
    pub signals: Vec<Signal>,
}

/// Durable record store behind the registries. One flat table per entity.
#[cfg_attr(any(test, feature = "mocks"), mockall::automock)]
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn insert_mentor(&self, mentor: &Mentor) -> Result<(), StoreError>;

    async fn set_mentor_active(&self, mentor_id: &str, active: bool) -> Result<(), StoreError>;

    async fn insert_license(&self, license: &LicenseKey) -> Result<(), StoreError>;

    async fn set_license_active(&self, key: &str, active: bool) -> Result<(), StoreError>;

    async fn insert_student(&self, student: &Student) -> Result<(), StoreError>;

    async fn set_student_status(
        &self,
        license_key: &str,
        status: StudentStatus,
    ) -> Result<(), StoreError>;

    async fn record_heartbeat(
        &self,
        license_key: &str,
        at: DateTime<Utc>,
        connected: bool,
    ) -> Result<(), StoreError>;

    async fn insert_signal(&self, signal: &Signal) -> Result<(), StoreError>;

    async fn load(&self, signal_limit: usize) -> Result<StoreSnapshot, StoreError>;
}

/// Store used when no database is configured: accepts every write, remembers nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullStore;

#[async_trait]
impl RecordStore for NullStore {
    async fn insert_mentor(&self, _mentor: &Mentor) -> Result<(), StoreError> {
        Ok(())
    }

    async fn set_mentor_active(&self, _mentor_id: &str, _active: bool) -> Result<(), StoreError> {
        Ok(())
    }

    async fn insert_license(&self, _license: &LicenseKey) -> Result<(), StoreError> {
        Ok(())
    }

    async fn set_license_active(&self, _key: &str, _active: bool) -> Result<(), StoreError> {
        Ok(())
    }

    async fn insert_student(&self, _student: &Student) -> Result<(), StoreError> {
        Ok(())
    }

    async fn set_student_status(
        &self,
        _license_key: &str,
        _status: StudentStatus,
    ) -> Result<(), StoreError> {
        Ok(())
    }

    async fn record_heartbeat(
        &self,
        _license_key: &str,
        _at: DateTime<Utc>,
        _connected: bool,
    ) -> Result<(), StoreError> {
        Ok(())
    }

    async fn insert_signal(&self, _signal: &Signal) -> Result<(), StoreError> {
        Ok(())
    }

    async fn load(&self, _signal_limit: usize) -> Result<StoreSnapshot, StoreError> {
        Ok(StoreSnapshot::default())
    }
}
