use common::models::{Direction, Signal};
use sqlx::{Row, SqlitePool, sqlite::SqliteRow};

use crate::store::StoreError;

pub struct SignalRepository;

impl SignalRepository {
    pub async fn insert(pool: &SqlitePool, signal: &Signal) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
                INSERT INTO signals (
                    id, mentor_id, ea_id, direction, symbol, entry_price,
                    stop_loss, take_profit, size, comment, created_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&signal.id)
        .bind(&signal.mentor_id)
        .bind(&signal.ea_id)
        .bind(signal.direction.as_str())
        .bind(&signal.symbol)
        .bind(signal.entry_price)
        .bind(signal.stop_loss)
        .bind(signal.take_profit)
        .bind(signal.size)
        .bind(&signal.comment)
        .bind(signal.created_at)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// The `limit` most recent signals, newest first.
    pub async fn fetch_recent(pool: &SqlitePool, limit: usize) -> Result<Vec<Signal>, StoreError> {
        let rows = sqlx::query(
            r#"
                SELECT id, mentor_id, ea_id, direction, symbol, entry_price,
                       stop_loss, take_profit, size, comment, created_at
                FROM signals
                ORDER BY CAST(id AS INTEGER) DESC
                LIMIT ?
            "#,
        )
        .bind(limit as i64)
        .fetch_all(pool)
        .await?;

        rows.iter().map(Self::from_row).collect()
    }

    fn from_row(row: &SqliteRow) -> Result<Signal, StoreError> {
        let direction: String = row.try_get("direction")?;
        let direction = direction.parse::<Direction>().map_err(|detail| StoreError::Corrupt {
            table: "signals",
            detail,
        })?;

        Ok(Signal {
            id: row.try_get("id")?,
            mentor_id: row.try_get("mentor_id")?,
            ea_id: row.try_get("ea_id")?,
            direction,
            symbol: row.try_get("symbol")?,
            entry_price: row.try_get("entry_price")?,
            stop_loss: row.try_get("stop_loss")?,
            take_profit: row.try_get("take_profit")?,
            size: row.try_get("size")?,
            comment: row.try_get("comment")?,
            created_at: row.try_get("created_at")?,
        })
    }
}
