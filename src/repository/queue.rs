//! Queue entries repository

use chrono::NaiveDate;
use sqlx::{PgConnection, Pool, Postgres};

use crate::{
    error::AppResult,
    models::{
        queue::{NewQueueEntry, QueueEntry},
        QueueStatus,
    },
};

#[derive(Clone)]
pub struct QueueRepository {
    pool: Pool<Postgres>,
}

impl QueueRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Entries that joined on `day`, in queue order
    pub async fn for_day(&self, day: NaiveDate) -> AppResult<Vec<QueueEntry>> {
        let rows = sqlx::query_as::<_, QueueEntry>(
            r#"
            SELECT * FROM queue_entries
            WHERE (joined_at AT TIME ZONE 'UTC')::date = $1
            ORDER BY position, joined_at, id
            "#,
        )
        .bind(day)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn insert(conn: &mut PgConnection, entry: &NewQueueEntry) -> AppResult<QueueEntry> {
        let row = sqlx::query_as::<_, QueueEntry>(
            r#"
            INSERT INTO queue_entries (
                visitor_id, visit_id, reference, category, position, status,
                joined_at, estimated_wait_minutes
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(entry.visitor_id)
        .bind(entry.visit_id)
        .bind(&entry.reference)
        .bind(&entry.category)
        .bind(entry.position)
        .bind(QueueStatus::Waiting)
        .bind(entry.joined_at)
        .bind(entry.estimated_wait_minutes)
        .fetch_one(conn)
        .await?;
        Ok(row)
    }
}
