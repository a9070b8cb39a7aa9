use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::models::{LicenseKey, Mentor, Signal, Student, StudentStatus};
use sqlx::SqlitePool;
use tracing::debug;

use crate::repositories::{LicenseRepository, MentorRepository, SignalRepository, StudentRepository};
use crate::store::{RecordStore, StoreError, StoreSnapshot};

#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecordStore for SqliteStore {
    async fn insert_mentor(&self, mentor: &Mentor) -> Result<(), StoreError> {
        Ok(MentorRepository::insert(&self.pool, mentor).await?)
    }

    async fn set_mentor_active(&self, mentor_id: &str, active: bool) -> Result<(), StoreError> {
        Ok(MentorRepository::set_active(&self.pool, mentor_id, active).await?)
    }

    async fn insert_license(&self, license: &LicenseKey) -> Result<(), StoreError> {
        Ok(LicenseRepository::insert(&self.pool, license).await?)
    }

    async fn set_license_active(&self, key: &str, active: bool) -> Result<(), StoreError> {
        Ok(LicenseRepository::set_active(&self.pool, key, active).await?)
    }

    async fn insert_student(&self, student: &Student) -> Result<(), StoreError> {
        Ok(StudentRepository::insert(&self.pool, student).await?)
    }

    async fn set_student_status(
        &self,
        license_key: &str,
        status: StudentStatus,
    ) -> Result<(), StoreError> {
        Ok(StudentRepository::set_status(&self.pool, license_key, status).await?)
    }

    async fn record_heartbeat(
        &self,
        license_key: &str,
        at: DateTime<Utc>,
        connected: bool,
    ) -> Result<(), StoreError> {
        Ok(StudentRepository::set_heartbeat(&self.pool, license_key, at, connected).await?)
    }

    async fn insert_signal(&self, signal: &Signal) -> Result<(), StoreError> {
        Ok(SignalRepository::insert(&self.pool, signal).await?)
    }

    async fn load(&self, signal_limit: usize) -> Result<StoreSnapshot, StoreError> {
        let snapshot = StoreSnapshot {
            mentors: MentorRepository::fetch_all(&self.pool).await?,
            licenses: LicenseRepository::fetch_all(&self.pool).await?,
            students: StudentRepository::fetch_all(&self.pool).await?,
            signals: SignalRepository::fetch_recent(&self.pool, signal_limit).await?,
        };
        debug!(
            "Loaded {} mentors, {} licenses, {} students, {} signals",
            snapshot.mentors.len(),
            snapshot.licenses.len(),
            snapshot.students.len(),
            snapshot.signals.len()
        );
        Ok(snapshot)
    }
}
