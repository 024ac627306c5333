//! Audit trail entries

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enums::AuditAction;

/// One audit record: who did what to which entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub actor_id: Option<i32>,
    pub action: AuditAction,
    pub entity_type: String,
    pub entity_id: Option<i32>,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl AuditEntry {
    pub fn ticket(
        actor_id: Option<i32>,
        action: AuditAction,
        ticket_id: Option<i32>,
        description: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            actor_id,
            action,
            entity_type: "ticket".to_string(),
            entity_id: ticket_id,
            description: description.into(),
            created_at,
        }
    }
}
