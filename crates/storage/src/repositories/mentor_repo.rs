use common::models::Mentor;
use sqlx::{Row, SqlitePool, sqlite::SqliteRow};

pub struct MentorRepository;

impl MentorRepository {
    pub async fn insert(pool: &SqlitePool, mentor: &Mentor) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
                INSERT INTO mentors (mentor_id, name, email, active, created_at)
                VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&mentor.mentor_id)
        .bind(&mentor.name)
        .bind(&mentor.email)
        .bind(mentor.active)
        .bind(mentor.created_at)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn set_active(
        pool: &SqlitePool,
        mentor_id: &str,
        active: bool,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE mentors SET active = ? WHERE mentor_id = ?")
            .bind(active)
            .bind(mentor_id)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn fetch_all(pool: &SqlitePool) -> Result<Vec<Mentor>, sqlx::Error> {
        let rows = sqlx::query("SELECT mentor_id, name, email, active, created_at FROM mentors")
            .fetch_all(pool)
            .await?;

        rows.iter().map(Self::from_row).collect()
    }

    fn from_row(row: &SqliteRow) -> Result<Mentor, sqlx::Error> {
        Ok(Mentor {
            mentor_id: row.try_get("mentor_id")?,
            name: row.try_get("name")?,
            email: row.try_get("email")?,
            active: row.try_get("active")?,
            created_at: row.try_get("created_at")?,
        })
    }
}
