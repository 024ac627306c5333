//! Audit trail collaborator

use std::sync::Arc;

use async_trait::async_trait;

use crate::{error::AppResult, models::AuditEntry};

/// Destination for audit records
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AuditLog: Send + Sync {
    async fn record(&self, entry: AuditEntry) -> AppResult<()>;
}

/// Writes audit records without ever failing the calling operation
#[derive(Clone)]
pub struct Auditor {
    log: Arc<dyn AuditLog>,
}

impl Auditor {
    pub fn new(log: Arc<dyn AuditLog>) -> Self {
        Self { log }
    }

    pub async fn record(&self, entry: AuditEntry) {
        let action = entry.action;
        let entity_id = entry.entity_id;
        if let Err(e) = self.log.record(entry).await {
            tracing::error!(%action, ?entity_id, "Failed to write audit record: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::AppError, models::AuditAction};
    use chrono::Utc;

    #[tokio::test]
    async fn test_audit_failure_is_swallowed() {
        let mut log = MockAuditLog::new();
        log.expect_record()
            .times(1)
            .returning(|_| Err(AppError::Internal("audit table missing".into())));

        let auditor = Auditor::new(Arc::new(log));
        auditor
            .record(AuditEntry::ticket(
                Some(1),
                AuditAction::TicketRedeemed,
                Some(9),
                "Ticket redeemed",
                Utc::now(),
            ))
            .await;
    }
}
