//! Audit log repository

use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use crate::{error::AppResult, models::AuditEntry, services::audit::AuditLog};

#[derive(Clone)]
pub struct AuditRepository {
    pool: Pool<Postgres>,
}

impl AuditRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditLog for AuditRepository {
    async fn record(&self, entry: AuditEntry) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO audit_logs (actor_id, action, entity_type, entity_id, description, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(entry.actor_id)
        .bind(entry.action)
        .bind(&entry.entity_type)
        .bind(entry.entity_id)
        .bind(&entry.description)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
