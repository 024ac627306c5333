//! Help request model (owned by the approval workflow)

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use super::enums::HelpRequestStatus;

/// Help request as read by the ticket lifecycle, with the visitor's contact
/// details joined from `users`
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct HelpRequest {
    pub id: i32,
    pub reference: String,
    pub visitor_id: i32,
    pub category: String,
    pub status: HelpRequestStatus,
    pub visit_day: NaiveDate,
    pub time_slot: Option<String>,
    pub ticket_number: Option<String>,
    pub qr_payload: Option<String>,
    pub created_at: DateTime<Utc>,
    pub visitor_name: Option<String>,
    pub visitor_email: Option<String>,
}

impl HelpRequest {
    /// True when this request currently holds `ticket_number`
    pub fn holds_ticket(&self, ticket_number: &str) -> bool {
        self.status == HelpRequestStatus::TicketIssued
            && self.ticket_number.as_deref() == Some(ticket_number)
    }
}

/// Selection criteria for a bulk issuance
#[derive(Debug, Clone)]
pub struct ApprovedRequestFilter {
    pub visit_day: NaiveDate,
    pub category: Option<String>,
    pub limit: i64,
}
