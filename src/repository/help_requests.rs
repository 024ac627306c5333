//! Help requests repository
//!
//! Help requests are created and approved elsewhere; the ticket lifecycle only
//! locks them, attaches a ticket and reverts that attachment on cancellation.

use sqlx::PgConnection;

use crate::{
    error::{AppError, AppResult},
    models::{
        help_request::{ApprovedRequestFilter, HelpRequest},
        HelpRequestStatus,
    },
};

const SELECT_WITH_VISITOR: &str = r#"
    SELECT hr.id, hr.reference, hr.visitor_id, hr.category, hr.status, hr.visit_day,
           hr.time_slot, hr.ticket_number, hr.qr_payload, hr.created_at,
           NULLIF(TRIM(CONCAT_WS(' ', u.firstname, u.lastname)), '') AS visitor_name,
           u.email AS visitor_email
    FROM help_requests hr
    LEFT JOIN users u ON u.id = hr.visitor_id
"#;

pub struct HelpRequestsRepository;

impl HelpRequestsRepository {
    /// Approved requests for a day, oldest first. Rows already locked by a
    /// concurrent issuance are skipped rather than waited on.
    pub async fn lock_approved(
        conn: &mut PgConnection,
        filter: &ApprovedRequestFilter,
    ) -> AppResult<Vec<HelpRequest>> {
        let category_clause = if filter.category.is_some() {
            "AND hr.category = $4"
        } else {
            ""
        };

        let query = format!(
            r#"
            {}
            WHERE hr.status = $1 AND hr.visit_day = $2 {}
            ORDER BY hr.created_at ASC, hr.id ASC
            LIMIT $3
            FOR UPDATE OF hr SKIP LOCKED
            "#,
            SELECT_WITH_VISITOR, category_clause
        );

        let mut builder = sqlx::query_as::<_, HelpRequest>(&query)
            .bind(HelpRequestStatus::Approved)
            .bind(filter.visit_day)
            .bind(filter.limit);
        if let Some(ref category) = filter.category {
            builder = builder.bind(category);
        }

        let rows = builder.fetch_all(conn).await?;
        Ok(rows)
    }

    pub async fn lock_by_id(conn: &mut PgConnection, id: i32) -> AppResult<Option<HelpRequest>> {
        let query = format!("{} WHERE hr.id = $1 FOR UPDATE OF hr", SELECT_WITH_VISITOR);
        let row = sqlx::query_as::<_, HelpRequest>(&query)
            .bind(id)
            .fetch_optional(conn)
            .await?;
        Ok(row)
    }

    pub async fn attach_ticket(
        conn: &mut PgConnection,
        id: i32,
        ticket_number: &str,
        qr_payload: &str,
    ) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE help_requests
            SET status = $1, ticket_number = $2, qr_payload = $3, updated_at = NOW()
            WHERE id = $4 AND status = $5
            "#,
        )
        .bind(HelpRequestStatus::TicketIssued)
        .bind(ticket_number)
        .bind(qr_payload)
        .bind(id)
        .bind(HelpRequestStatus::Approved)
        .execute(conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "Approved help request with id {} not found",
                id
            )));
        }
        Ok(())
    }

    pub async fn detach_ticket(conn: &mut PgConnection, id: i32) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE help_requests
            SET status = $1, ticket_number = NULL, qr_payload = NULL, updated_at = NOW()
            WHERE id = $2 AND status = $3
            "#,
        )
        .bind(HelpRequestStatus::Approved)
        .bind(id)
        .bind(HelpRequestStatus::TicketIssued)
        .execute(conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "Help request {} does not hold a ticket",
                id
            )));
        }
        Ok(())
    }
}
