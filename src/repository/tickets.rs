//! Tickets repository for database operations

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{PgConnection, Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::{
        ticket::{NewTicket, Ticket, TicketRejection},
        TicketStatus,
    },
};

#[derive(Clone)]
pub struct TicketsRepository {
    pool: Pool<Postgres>,
}

impl TicketsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get ticket by its public number
    pub async fn get_by_number(&self, ticket_number: &str) -> AppResult<Option<Ticket>> {
        let ticket = sqlx::query_as::<_, Ticket>("SELECT * FROM tickets WHERE ticket_number = $1")
            .bind(ticket_number)
            .fetch_optional(&self.pool)
            .await?;
        Ok(ticket)
    }

    /// List tickets, optionally filtered by visit date and status
    pub async fn list(
        &self,
        visit_date: Option<NaiveDate>,
        status: Option<TicketStatus>,
    ) -> AppResult<Vec<Ticket>> {
        let mut conditions = Vec::new();
        let mut idx = 1;

        if visit_date.is_some() {
            conditions.push(format!("visit_date = ${}", idx));
            idx += 1;
        }
        if status.is_some() {
            conditions.push(format!("status = ${}", idx));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let query = format!(
            "SELECT * FROM tickets {} ORDER BY issued_at, id",
            where_clause
        );

        let mut builder = sqlx::query_as::<_, Ticket>(&query);
        if let Some(date) = visit_date {
            builder = builder.bind(date);
        }
        if let Some(status) = status {
            builder = builder.bind(status);
        }

        let rows = builder.fetch_all(&self.pool).await?;
        Ok(rows)
    }

    /// Insert an active ticket. A duplicate number is a `Conflict`.
    pub async fn insert(conn: &mut PgConnection, ticket: &NewTicket) -> AppResult<Ticket> {
        sqlx::query_as::<_, Ticket>(
            r#"
            INSERT INTO tickets (
                ticket_number, qr_payload, help_request_id, visitor_id, category,
                visit_date, time_slot, status, issued_at, expires_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *
            "#,
        )
        .bind(&ticket.ticket_number)
        .bind(&ticket.qr_payload)
        .bind(ticket.help_request_id)
        .bind(ticket.visitor_id)
        .bind(&ticket.category)
        .bind(ticket.visit_date)
        .bind(&ticket.time_slot)
        .bind(TicketStatus::Active)
        .bind(ticket.issued_at)
        .bind(ticket.expires_at)
        .fetch_one(conn)
        .await
        .map_err(|e| AppError::from_insert(e, &format!("Ticket number {}", ticket.ticket_number)))
    }

    /// Lock a ticket row by number for the rest of the transaction
    pub async fn lock_by_number(
        conn: &mut PgConnection,
        ticket_number: &str,
    ) -> AppResult<Option<Ticket>> {
        let ticket = sqlx::query_as::<_, Ticket>(
            "SELECT * FROM tickets WHERE ticket_number = $1 FOR UPDATE",
        )
        .bind(ticket_number)
        .fetch_optional(conn)
        .await?;
        Ok(ticket)
    }

    /// Lock a ticket row by id for the rest of the transaction
    pub async fn lock_by_id(conn: &mut PgConnection, id: i32) -> AppResult<Option<Ticket>> {
        let ticket = sqlx::query_as::<_, Ticket>("SELECT * FROM tickets WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(conn)
            .await?;
        Ok(ticket)
    }

    /// Active → Used
    pub async fn mark_used(conn: &mut PgConnection, id: i32, used_at: DateTime<Utc>) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE tickets SET status = $1, used_at = $2 WHERE id = $3 AND status = $4",
        )
        .bind(TicketStatus::Used)
        .bind(used_at)
        .bind(id)
        .bind(TicketStatus::Active)
        .execute(conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::InvalidState(TicketRejection::AlreadyUsed));
        }
        Ok(())
    }

    /// Active → Cancelled
    pub async fn mark_cancelled(
        conn: &mut PgConnection,
        id: i32,
        cancelled_at: DateTime<Utc>,
        reason: &str,
        admin_notes: Option<&str>,
    ) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE tickets
            SET status = $1, cancelled_at = $2, cancel_reason = $3, admin_notes = $4
            WHERE id = $5 AND status = $6
            "#,
        )
        .bind(TicketStatus::Cancelled)
        .bind(cancelled_at)
        .bind(reason)
        .bind(admin_notes)
        .bind(id)
        .bind(TicketStatus::Active)
        .execute(conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Active ticket with id {} not found", id)));
        }
        Ok(())
    }
}
