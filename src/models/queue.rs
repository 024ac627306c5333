//! Same-day queue entries created at check-in

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};

use super::enums::QueueStatus;

/// Queue entry from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct QueueEntry {
    pub id: i32,
    pub visitor_id: i32,
    pub visit_id: i32,
    /// Ticket number the visitor checked in with
    pub reference: String,
    pub category: String,
    /// 1-based position among the day's check-ins
    pub position: i32,
    pub status: QueueStatus,
    pub joined_at: DateTime<Utc>,
    pub estimated_wait_minutes: i32,
}

#[derive(Debug, Clone)]
pub struct NewQueueEntry {
    pub visitor_id: i32,
    pub visit_id: i32,
    pub reference: String,
    pub category: String,
    pub position: i32,
    pub joined_at: DateTime<Utc>,
    pub estimated_wait_minutes: i32,
}

/// Query parameters for the queue listing
#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct QueueQuery {
    /// Day to list (YYYY-MM-DD), defaults to today
    pub date: Option<String>,
}
