//! Ticket model, derived values and validity predicates

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};

use super::enums::TicketStatus;

static TICKET_NUMBER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Z]{2,8}-\d{8}-[A-Z0-9]{6}$").expect("ticket number pattern is valid")
});

/// Ticket model from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Ticket {
    pub id: i32,
    pub ticket_number: String,
    pub qr_payload: String,
    pub help_request_id: i32,
    pub visitor_id: i32,
    pub category: String,
    pub visit_date: NaiveDate,
    pub time_slot: String,
    pub status: TicketStatus,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancel_reason: Option<String>,
    pub admin_notes: Option<String>,
}

/// Values needed to insert a ticket
#[derive(Debug, Clone)]
pub struct NewTicket {
    pub ticket_number: String,
    pub qr_payload: String,
    pub help_request_id: i32,
    pub visitor_id: i32,
    pub category: String,
    pub visit_date: NaiveDate,
    pub time_slot: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl NewTicket {
    /// Build an active ticket for a visit date, deriving QR payload and expiry
    pub fn for_visit(
        ticket_number: String,
        help_request_id: i32,
        visitor_id: i32,
        category: String,
        visit_date: NaiveDate,
        time_slot: String,
        issued_at: DateTime<Utc>,
    ) -> Self {
        Self {
            qr_payload: qr_payload_for(&ticket_number),
            expires_at: expires_at_for(visit_date),
            ticket_number,
            help_request_id,
            visitor_id,
            category,
            visit_date,
            time_slot,
            issued_at,
        }
    }
}

/// QR payload is a pure function of the ticket number
pub fn qr_payload_for(ticket_number: &str) -> String {
    let digest = hex::encode(Sha256::digest(ticket_number.as_bytes()));
    URL_SAFE_NO_PAD.encode(format!("{}:{}", ticket_number, &digest[..16]))
}

/// A ticket stays redeemable until midnight UTC following its visit date
pub fn expires_at_for(visit_date: NaiveDate) -> DateTime<Utc> {
    let next_day = visit_date.succ_opt().unwrap_or(NaiveDate::MAX);
    next_day.and_time(NaiveTime::default()).and_utc()
}

impl Ticket {
    /// Structural validity: a well-formed number whose QR payload matches
    pub fn is_well_formed(&self) -> bool {
        TICKET_NUMBER_RE.is_match(&self.ticket_number)
            && self.qr_payload == qr_payload_for(&self.ticket_number)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Evaluate every redemption predicate at `now`, with `today` as the
    /// caller's calendar day
    pub fn checks(&self, now: DateTime<Utc>, today: NaiveDate) -> ValidationChecks {
        ValidationChecks {
            exists: self.is_well_formed(),
            usable: self.status == TicketStatus::Active && !self.is_expired(now),
            not_used: self.status != TicketStatus::Used,
            same_day: self.visit_date == today,
            cancelled: self.status == TicketStatus::Cancelled,
        }
    }
}

/// Independent redemption predicates; a ticket is valid when all hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct ValidationChecks {
    /// Ticket exists and is structurally well formed
    pub exists: bool,
    /// Status is active and the ticket has not expired
    pub usable: bool,
    /// Ticket has not already been redeemed
    pub not_used: bool,
    /// Visit date is today
    pub same_day: bool,
    #[serde(skip)]
    cancelled: bool,
}

impl ValidationChecks {
    /// Checks reported for a ticket number with no matching row
    pub fn missing() -> Self {
        Self {
            exists: false,
            usable: false,
            not_used: true,
            same_day: false,
            cancelled: false,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.exists && self.usable && self.not_used && self.same_day
    }

    /// The single reason reported to the front desk, in priority order
    pub fn rejection(&self) -> Option<TicketRejection> {
        if self.is_valid() {
            None
        } else if !self.not_used {
            Some(TicketRejection::AlreadyUsed)
        } else if self.cancelled {
            Some(TicketRejection::Cancelled)
        } else if !self.same_day {
            Some(TicketRejection::WrongDay)
        } else if !self.usable {
            Some(TicketRejection::Expired)
        } else {
            Some(TicketRejection::Malformed)
        }
    }
}

/// Why a ticket cannot be redeemed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TicketRejection {
    NotFound,
    AlreadyUsed,
    Cancelled,
    WrongDay,
    Expired,
    Malformed,
    Unavailable,
}

impl TicketRejection {
    pub fn code(&self) -> &'static str {
        match self {
            TicketRejection::NotFound => "not_found",
            TicketRejection::AlreadyUsed => "already_used",
            TicketRejection::Cancelled => "cancelled",
            TicketRejection::WrongDay => "wrong_day",
            TicketRejection::Expired => "expired",
            TicketRejection::Malformed => "malformed",
            TicketRejection::Unavailable => "unavailable",
        }
    }
}

impl std::fmt::Display for TicketRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let message = match self {
            TicketRejection::NotFound => "Ticket not found",
            TicketRejection::AlreadyUsed => "Ticket already used",
            TicketRejection::Cancelled => "Ticket has been cancelled",
            TicketRejection::WrongDay => "Ticket is not valid today",
            TicketRejection::Expired => "Ticket has expired",
            TicketRejection::Malformed => "Ticket is invalid",
            TicketRejection::Unavailable => "Ticket could not be checked, please try again",
        };
        write!(f, "{}", message)
    }
}

/// Outcome of a read-only validation
#[derive(Debug, Clone)]
pub struct TicketValidation {
    pub checks: ValidationChecks,
    pub rejection: Option<TicketRejection>,
    pub ticket: Option<TicketDetails>,
}

impl TicketValidation {
    pub fn is_valid(&self) -> bool {
        self.rejection.is_none()
    }
}

/// Ticket as returned by read endpoints, with expiry computed at read time
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TicketDetails {
    #[serde(flatten)]
    pub ticket: Ticket,
    pub is_expired: bool,
}

impl TicketDetails {
    pub fn at(ticket: Ticket, now: DateTime<Utc>) -> Self {
        Self {
            is_expired: ticket.is_expired(now),
            ticket,
        }
    }
}

/// Ticket handed out by a bulk issuance
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct IssuedTicket {
    pub ticket_id: i32,
    pub ticket_number: String,
    pub help_request_id: i32,
    /// Reference of the originating help request
    pub reference: String,
    pub visitor_id: i32,
    pub visitor_name: Option<String>,
    pub category: String,
    pub visit_date: NaiveDate,
    pub time_slot: String,
    pub qr_payload: String,
    pub expires_at: DateTime<Utc>,
}

/// Result of a successful redemption
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Redemption {
    pub ticket_id: i32,
    pub ticket_number: String,
    pub used_at: DateTime<Utc>,
    pub queue_position: i32,
    /// Estimated wait in minutes
    pub estimated_wait: i32,
    pub visit_id: i32,
    pub queue_entry_id: i32,
}

/// Result of a successful cancellation
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Cancellation {
    pub ticket_id: i32,
    pub ticket_number: String,
    pub status: TicketStatus,
    pub cancelled_at: DateTime<Utc>,
    pub reason: String,
    /// Whether the linked help request went back to approved
    pub help_request_reverted: bool,
    pub notification_queued: bool,
}

/// Filters for listing tickets
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct TicketQuery {
    /// Visit date (YYYY-MM-DD)
    pub date: Option<String>,
    /// Ticket status (active, used, cancelled)
    pub status: Option<String>,
}
