//! Closed status enums shared by the ticket lifecycle
//!
//! Every status is stored as lowercase text. Decoding an unknown string is an
//! error: there is no catch-all variant.

use serde::{Deserialize, Serialize};
use sqlx::{Decode, Encode, Postgres};
use utoipa::ToSchema;

/// Implements `as_str`, `Display`, `FromStr` and the SQLx text conversions
/// for a fieldless enum.
macro_rules! text_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    _ => Err(format!("Invalid {}: {}", stringify!($name), s)),
                }
            }
        }

        impl sqlx::Type<Postgres> for $name {
            fn type_info() -> sqlx::postgres::PgTypeInfo {
                <String as sqlx::Type<Postgres>>::type_info()
            }

            fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
                <String as sqlx::Type<Postgres>>::compatible(ty)
            }
        }

        impl<'r> Decode<'r, Postgres> for $name {
            fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
                let s: &str = Decode::<Postgres>::decode(value)?;
                s.parse().map_err(|e: String| e.into())
            }
        }

        impl Encode<'_, Postgres> for $name {
            fn encode_by_ref(&self, buf: &mut sqlx::postgres::PgArgumentBuffer) -> sqlx::encode::IsNull {
                <&str as Encode<Postgres>>::encode(self.as_str(), buf)
            }
        }
    };
}

// ---------------------------------------------------------------------------
// HelpRequestStatus
// ---------------------------------------------------------------------------

/// Lifecycle of a visitor's help request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum HelpRequestStatus {
    Pending,
    Approved,
    TicketIssued,
    Completed,
    Rejected,
}

text_enum!(HelpRequestStatus {
    Pending => "pending",
    Approved => "approved",
    TicketIssued => "ticket_issued",
    Completed => "completed",
    Rejected => "rejected",
});

// ---------------------------------------------------------------------------
// TicketStatus
// ---------------------------------------------------------------------------

/// Stored ticket status. Expiry is not a status: it is derived from
/// `expires_at` at read time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    Active,
    Used,
    Cancelled,
}

text_enum!(TicketStatus {
    Active => "active",
    Used => "used",
    Cancelled => "cancelled",
});

impl TicketStatus {
    /// Used and Cancelled never transition again
    pub fn is_terminal(&self) -> bool {
        match self {
            TicketStatus::Active => false,
            TicketStatus::Used | TicketStatus::Cancelled => true,
        }
    }
}

// ---------------------------------------------------------------------------
// Visits
// ---------------------------------------------------------------------------

/// How a visitor was checked in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum CheckInMethod {
    StaffEntry,
    QrScan,
}

text_enum!(CheckInMethod {
    StaffEntry => "staff_entry",
    QrScan => "qr_scan",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum VisitStatus {
    CheckedIn,
    CheckedOut,
}

text_enum!(VisitStatus {
    CheckedIn => "checked_in",
    CheckedOut => "checked_out",
});

// ---------------------------------------------------------------------------
// QueueStatus
// ---------------------------------------------------------------------------

/// Queue entry status. Redemption only ever writes `Waiting`; the other
/// states belong to front-desk queue management.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum QueueStatus {
    Waiting,
    Called,
    Served,
    Left,
}

text_enum!(QueueStatus {
    Waiting => "waiting",
    Called => "called",
    Served => "served",
    Left => "left",
});

// ---------------------------------------------------------------------------
// AuditAction
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    TicketsBulkIssued,
    TicketsBulkIssueFailed,
    TicketRedeemed,
    TicketRedeemFailed,
    TicketCancelled,
    TicketCancelFailed,
}

text_enum!(AuditAction {
    TicketsBulkIssued => "tickets_bulk_issued",
    TicketsBulkIssueFailed => "tickets_bulk_issue_failed",
    TicketRedeemed => "ticket_redeemed",
    TicketRedeemFailed => "ticket_redeem_failed",
    TicketCancelled => "ticket_cancelled",
    TicketCancelFailed => "ticket_cancel_failed",
});
