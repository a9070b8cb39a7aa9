use common::models::LicenseKey;
use sqlx::{Row, SqlitePool, sqlite::SqliteRow};

pub struct LicenseRepository;

impl LicenseRepository {
    pub async fn insert(pool: &SqlitePool, license: &LicenseKey) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
                INSERT INTO licenses (key, mentor_id, ea_id, user_id, active, created_at)
                VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&license.key)
        .bind(&license.mentor_id)
        .bind(&license.ea_id)
        .bind(&license.user_id)
        .bind(license.active)
        .bind(license.created_at)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn set_active(pool: &SqlitePool, key: &str, active: bool) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE licenses SET active = ? WHERE key = ?")
            .bind(active)
            .bind(key)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn fetch_all(pool: &SqlitePool) -> Result<Vec<LicenseKey>, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT key, mentor_id, ea_id, user_id, active, created_at FROM licenses ORDER BY created_at",
        )
        .fetch_all(pool)
        .await?;

        rows.iter().map(Self::from_row).collect()
    }

    fn from_row(row: &SqliteRow) -> Result<LicenseKey, sqlx::Error> {
        Ok(LicenseKey {
            key: row.try_get("key")?,
            mentor_id: row.try_get("mentor_id")?,
            ea_id: row.try_get("ea_id")?,
            user_id: row.try_get("user_id")?,
            active: row.try_get("active")?,
            created_at: row.try_get("created_at")?,
        })
    }
}
