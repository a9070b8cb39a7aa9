use chrono::{DateTime, Utc};
use common::models::{Student, StudentStatus};
use sqlx::{Row, SqlitePool, sqlite::SqliteRow};

use crate::store::StoreError;

pub struct StudentRepository;

impl StudentRepository {
    pub async fn insert(pool: &SqlitePool, student: &Student) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
                INSERT INTO students (
                    license_key, account_ref, login, broker, server, lot_size, status,
                    mentor_id, ea_id, registered_at, last_heartbeat, last_reported_connected
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&student.license_key)
        .bind(&student.account_ref)
        .bind(&student.login)
        .bind(&student.broker)
        .bind(&student.server)
        .bind(student.lot_size)
        .bind(student.status.as_str())
        .bind(&student.mentor_id)
        .bind(&student.ea_id)
        .bind(student.registered_at)
        .bind(student.last_heartbeat)
        .bind(student.last_reported_connected)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn set_status(
        pool: &SqlitePool,
        license_key: &str,
        status: StudentStatus,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE students SET status = ? WHERE license_key = ?")
            .bind(status.as_str())
            .bind(license_key)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn set_heartbeat(
        pool: &SqlitePool,
        license_key: &str,
        at: DateTime<Utc>,
        connected: bool,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE students SET last_heartbeat = ?, last_reported_connected = ? WHERE license_key = ?",
        )
        .bind(at)
        .bind(connected)
        .bind(license_key)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn fetch_all(pool: &SqlitePool) -> Result<Vec<Student>, StoreError> {
        let rows = sqlx::query(
            r#"
                SELECT license_key, account_ref, login, broker, server, lot_size, status,
                       mentor_id, ea_id, registered_at, last_heartbeat, last_reported_connected
                FROM students
            "#,
        )
        .fetch_all(pool)
        .await?;

        rows.iter().map(Self::from_row).collect()
    }

    fn from_row(row: &SqliteRow) -> Result<Student, StoreError> {
        let status: String = row.try_get("status")?;
        let status = status.parse::<StudentStatus>().map_err(|detail| StoreError::Corrupt {
            table: "students",
            detail,
        })?;

        Ok(Student {
            license_key: row.try_get("license_key")?,
            account_ref: row.try_get("account_ref")?,
            login: row.try_get("login")?,
            broker: row.try_get("broker")?,
            server: row.try_get("server")?,
            lot_size: row.try_get("lot_size")?,
            status,
            mentor_id: row.try_get("mentor_id")?,
            ea_id: row.try_get("ea_id")?,
            registered_at: row.try_get("registered_at")?,
            last_heartbeat: row.try_get("last_heartbeat")?,
            last_reported_connected: row.try_get("last_reported_connected")?,
        })
    }
}
