//! Visit ticket endpoints

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::ticket::{
        Cancellation, IssuedTicket, Redemption, TicketDetails, TicketQuery, ValidationChecks,
    },
    services::tickets::{BulkIssue, CancelTicket, RedeemTicket},
};

use super::{Actor, ApiJson, OptionalJson};

/// Bulk issuance request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct BulkIssueRequest {
    /// Visit date (YYYY-MM-DD)
    #[validate(length(min = 1, message = "date is required"))]
    pub date: String,
    #[validate(length(min = 1, message = "time_slot is required"))]
    pub time_slot: String,
    /// Maximum number of tickets to issue
    #[validate(range(min = 1, message = "capacity must be at least 1"))]
    pub capacity: i64,
    /// Restrict to one help category
    pub category: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct BulkIssueResponse {
    pub tickets_issued: usize,
    pub tickets: Vec<IssuedTicket>,
    pub message: String,
}

/// Front-desk validation request; both fields are informational
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ValidateTicketRequest {
    pub check_in_time: Option<DateTime<Utc>>,
    pub staff_id: Option<i32>,
}

#[derive(Serialize, ToSchema)]
pub struct ValidateTicketResponse {
    pub valid: bool,
    pub checks: ValidationChecks,
    /// The ticket, when it exists
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<TicketDetails>,
    /// Human-readable rejection
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Machine-readable rejection (not_found, already_used, cancelled, wrong_day, expired, malformed, unavailable)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Redemption request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UseTicketRequest {
    /// Staff member performing the check-in
    #[validate(range(min = 1, message = "staff_id must be positive"))]
    pub staff_id: i32,
    /// Defaults to now
    pub check_in_time: Option<DateTime<Utc>>,
    #[validate(length(max = 2000, message = "notes are too long"))]
    pub notes: Option<String>,
    /// Explicit queue position; computed from today's check-ins when absent
    #[validate(range(min = 1, message = "queue_position must be at least 1"))]
    pub queue_position: Option<i32>,
}

/// Cancellation request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CancelTicketRequest {
    #[validate(length(min = 1, message = "reason is required"))]
    pub reason: String,
    pub admin_notes: Option<String>,
    /// Send the visitor a cancellation notice
    #[serde(default)]
    pub notify_user: bool,
}

/// Issue tickets for approved help requests
#[utoipa::path(
    post,
    path = "/tickets/bulk-issue",
    tag = "tickets",
    params(
        ("X-Actor-Id" = i32, Header, description = "Acting administrator")
    ),
    request_body = BulkIssueRequest,
    responses(
        (status = 200, description = "Tickets issued (possibly none)", body = BulkIssueResponse),
        (status = 400, description = "Invalid request", body = crate::error::ErrorResponse),
        (status = 409, description = "Ticket number collision, nothing issued", body = crate::error::ErrorResponse),
        (status = 500, description = "Issuance rolled back", body = crate::error::ErrorResponse)
    )
)]
pub async fn bulk_issue(
    State(state): State<crate::AppState>,
    Actor(actor_id): Actor,
    ApiJson(request): ApiJson<BulkIssueRequest>,
) -> AppResult<Json<BulkIssueResponse>> {
    request.validate()?;

    let tickets = state
        .services
        .tickets
        .bulk_issue(
            BulkIssue {
                date: request.date,
                time_slot: request.time_slot,
                capacity: request.capacity,
                category: request.category,
            },
            actor_id,
        )
        .await?;

    let message = match tickets.len() {
        0 => "No approved help requests matched".to_string(),
        n => format!("Issued {} tickets", n),
    };

    Ok(Json(BulkIssueResponse {
        tickets_issued: tickets.len(),
        tickets,
        message,
    }))
}

/// Check whether a ticket can be redeemed now
#[utoipa::path(
    post,
    path = "/tickets/{ticket_number}/validate",
    tag = "tickets",
    params(
        ("ticket_number" = String, Path, description = "Ticket number")
    ),
    request_body = ValidateTicketRequest,
    responses(
        (status = 200, description = "Validation result, valid or not", body = ValidateTicketResponse),
        (status = 400, description = "Malformed request", body = crate::error::ErrorResponse)
    )
)]
pub async fn validate_ticket(
    State(state): State<crate::AppState>,
    Path(ticket_number): Path<String>,
    OptionalJson(request): OptionalJson<ValidateTicketRequest>,
) -> AppResult<Json<ValidateTicketResponse>> {
    tracing::debug!(
        %ticket_number,
        staff_id = ?request.staff_id,
        check_in_time = ?request.check_in_time,
        "Validating ticket"
    );

    let validation = state.services.tickets.validate(&ticket_number).await?;

    Ok(Json(ValidateTicketResponse {
        valid: validation.is_valid(),
        checks: validation.checks,
        error: validation.rejection.map(|r| r.to_string()),
        reason: validation.rejection.map(|r| r.code().to_string()),
        data: validation.ticket,
    }))
}

/// Redeem a ticket and join today's queue
#[utoipa::path(
    post,
    path = "/tickets/{ticket_number}/use",
    tag = "tickets",
    params(
        ("ticket_number" = String, Path, description = "Ticket number")
    ),
    request_body = UseTicketRequest,
    responses(
        (status = 200, description = "Ticket redeemed", body = Redemption),
        (status = 400, description = "Ticket cannot be used", body = crate::error::ErrorResponse),
        (status = 404, description = "Ticket not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn use_ticket(
    State(state): State<crate::AppState>,
    Path(ticket_number): Path<String>,
    ApiJson(request): ApiJson<UseTicketRequest>,
) -> AppResult<Json<Redemption>> {
    request.validate()?;

    let redemption = state
        .services
        .tickets
        .redeem(
            &ticket_number,
            RedeemTicket {
                staff_id: request.staff_id,
                check_in_time: request.check_in_time,
                notes: request.notes,
                queue_position: request.queue_position,
            },
        )
        .await?;

    Ok(Json(redemption))
}

/// Cancel an active ticket
#[utoipa::path(
    post,
    path = "/tickets/{id}/cancel",
    tag = "tickets",
    params(
        ("id" = i32, Path, description = "Ticket ID"),
        ("X-Actor-Id" = i32, Header, description = "Acting administrator")
    ),
    request_body = CancelTicketRequest,
    responses(
        (status = 200, description = "Ticket cancelled", body = Cancellation),
        (status = 400, description = "Ticket already used or cancelled", body = crate::error::ErrorResponse),
        (status = 404, description = "Ticket not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn cancel_ticket(
    State(state): State<crate::AppState>,
    Actor(actor_id): Actor,
    Path(id): Path<String>,
    ApiJson(request): ApiJson<CancelTicketRequest>,
) -> AppResult<Json<Cancellation>> {
    request.validate()?;
    let ticket_id: i32 = id
        .parse()
        .map_err(|_| AppError::Validation(format!("Invalid ticket id '{}'", id)))?;

    let cancellation = state
        .services
        .tickets
        .cancel(
            ticket_id,
            CancelTicket {
                reason: request.reason,
                admin_notes: request.admin_notes,
                notify_user: request.notify_user,
            },
            actor_id,
        )
        .await?;

    Ok(Json(cancellation))
}

/// Get a ticket by number
#[utoipa::path(
    get,
    path = "/tickets/{ticket_number}",
    tag = "tickets",
    params(
        ("ticket_number" = String, Path, description = "Ticket number")
    ),
    responses(
        (status = 200, description = "Ticket details", body = TicketDetails),
        (status = 404, description = "Ticket not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_ticket(
    State(state): State<crate::AppState>,
    Path(ticket_number): Path<String>,
) -> AppResult<Json<TicketDetails>> {
    let ticket = state.services.tickets.get_ticket(&ticket_number).await?;
    Ok(Json(ticket))
}

/// List tickets
#[utoipa::path(
    get,
    path = "/tickets",
    tag = "tickets",
    params(TicketQuery),
    responses(
        (status = 200, description = "Tickets ordered by issue time", body = Vec<TicketDetails>),
        (status = 400, description = "Invalid filter", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_tickets(
    State(state): State<crate::AppState>,
    Query(query): Query<TicketQuery>,
) -> AppResult<Json<Vec<TicketDetails>>> {
    let tickets = state.services.tickets.list_tickets(&query).await?;
    Ok(Json(tickets))
}
