//! Visit model: one row per redeemed ticket

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use super::enums::{CheckInMethod, VisitStatus};

/// Visit model from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Visit {
    pub id: i32,
    pub visitor_id: i32,
    pub ticket_id: i32,
    pub check_in_time: DateTime<Utc>,
    pub check_in_method: CheckInMethod,
    pub staff_id: i32,
    pub status: VisitStatus,
    pub notes: Option<String>,
    pub check_out_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewVisit {
    pub visitor_id: i32,
    pub ticket_id: i32,
    pub check_in_time: DateTime<Utc>,
    pub check_in_method: CheckInMethod,
    pub staff_id: i32,
    pub notes: Option<String>,
}
