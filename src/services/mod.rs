//! Business logic services

pub mod audit;
pub mod clock;
pub mod email;
pub mod notifications;
pub mod queue;
pub mod tickets;

use std::sync::Arc;

use chrono::NaiveDate;

use crate::{
    config::TicketsConfig,
    error::{AppError, AppResult},
    repository::TicketStore,
};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub tickets: tickets::TicketsService,
    pub queue: queue::QueueService,
    /// Kept for the readiness probe
    pub store: Arc<dyn TicketStore>,
}

impl Services {
    /// Wire all services around one store, audit log, notifier and clock
    pub fn new(
        store: Arc<dyn TicketStore>,
        audit_log: Arc<dyn audit::AuditLog>,
        notifier: Arc<dyn notifications::Notifier>,
        clock: Arc<dyn clock::Clock>,
        tickets_config: TicketsConfig,
    ) -> Self {
        Self {
            tickets: tickets::TicketsService::new(
                store.clone(),
                audit::Auditor::new(audit_log),
                notifications::NotificationDispatcher::new(notifier),
                clock.clone(),
                tickets_config,
            ),
            queue: queue::QueueService::new(store.clone(), clock),
            store,
        }
    }
}

/// Parse a `YYYY-MM-DD` calendar date
pub(crate) fn parse_date(value: &str) -> AppResult<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| AppError::Validation(format!("Invalid date '{}', expected YYYY-MM-DD", value)))
}
