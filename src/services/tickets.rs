//! Visit-ticket lifecycle: bulk issuance, validation, redemption and
//! cancellation
//!
//! Every mutation runs inside one store transaction. Audit records are written
//! after the transaction ends, on success and on failure. Notifications are
//! dispatched only after a commit and never affect the result.

use std::{collections::HashSet, sync::Arc};

use chrono::{DateTime, NaiveDate, Utc};
use rand::Rng;
use serde_json::json;

use crate::{
    config::TicketsConfig,
    error::{AppError, AppResult},
    models::{
        help_request::{ApprovedRequestFilter, HelpRequest},
        queue::NewQueueEntry,
        ticket::{
            Cancellation, IssuedTicket, NewTicket, Redemption, Ticket, TicketDetails,
            TicketQuery, TicketRejection, TicketValidation, ValidationChecks,
        },
        visit::NewVisit,
        AuditAction, AuditEntry, CheckInMethod, TicketStatus,
    },
    repository::TicketStore,
};

use super::{
    audit::Auditor,
    clock::Clock,
    notifications::{Notification, NotificationDispatcher, NotificationTemplate, Recipient},
    parse_date,
};

const NUMBER_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const NUMBER_SUFFIX_LEN: usize = 6;

/// Bulk issuance parameters as received from the admin client
#[derive(Debug, Clone)]
pub struct BulkIssue {
    pub date: String,
    pub time_slot: String,
    pub capacity: i64,
    pub category: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct RedeemTicket {
    pub staff_id: i32,
    pub check_in_time: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub queue_position: Option<i32>,
}

#[derive(Debug, Clone)]
pub struct CancelTicket {
    pub reason: String,
    pub admin_notes: Option<String>,
    pub notify_user: bool,
}

#[derive(Clone)]
pub struct TicketsService {
    store: Arc<dyn TicketStore>,
    auditor: Auditor,
    notifications: NotificationDispatcher,
    clock: Arc<dyn Clock>,
    settings: TicketsConfig,
}

impl TicketsService {
    pub fn new(
        store: Arc<dyn TicketStore>,
        auditor: Auditor,
        notifications: NotificationDispatcher,
        clock: Arc<dyn Clock>,
        settings: TicketsConfig,
    ) -> Self {
        Self {
            store,
            auditor,
            notifications,
            clock,
            settings,
        }
    }

    /// `<prefix>-<YYYYMMDD>-<6 random uppercase alphanumerics>`
    fn generate_ticket_number(&self, visit_date: NaiveDate) -> String {
        let mut rng = rand::thread_rng();
        let suffix: String = (0..NUMBER_SUFFIX_LEN)
            .map(|_| NUMBER_ALPHABET[rng.gen_range(0..NUMBER_ALPHABET.len())] as char)
            .collect();
        format!(
            "{}-{}-{}",
            self.settings.number_prefix,
            visit_date.format("%Y%m%d"),
            suffix
        )
    }

    // -----------------------------------------------------------------------
    // BulkIssue
    // -----------------------------------------------------------------------

    /// Turn up to `capacity` approved help requests for a day into active
    /// tickets, oldest request first. All or nothing.
    #[tracing::instrument(skip(self, request), fields(date = %request.date, capacity = request.capacity))]
    pub async fn bulk_issue(&self, request: BulkIssue, actor_id: i32) -> AppResult<Vec<IssuedTicket>> {
        let visit_date = parse_date(&request.date)?;
        let time_slot = request.time_slot.trim();
        if time_slot.is_empty() {
            return Err(AppError::Validation("time_slot must not be empty".to_string()));
        }
        if request.capacity < 1 || request.capacity > self.settings.max_bulk_capacity {
            return Err(AppError::Validation(format!(
                "capacity must be between 1 and {}",
                self.settings.max_bulk_capacity
            )));
        }
        let category = request
            .category
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(String::from);

        let filter = ApprovedRequestFilter {
            visit_day: visit_date,
            category,
            limit: request.capacity,
        };

        let result = self.issue_batch(&filter, time_slot).await;
        let now = self.clock.now();

        match result {
            Ok((issued, notifications)) => {
                tracing::info!(
                    tickets_issued = issued.len(),
                    %visit_date,
                    "Bulk issuance committed"
                );
                self.auditor
                    .record(AuditEntry::ticket(
                        Some(actor_id),
                        AuditAction::TicketsBulkIssued,
                        None,
                        format!(
                            "Issued {} tickets for {} ({})",
                            issued.len(),
                            visit_date,
                            time_slot
                        ),
                        now,
                    ))
                    .await;
                for notification in notifications {
                    self.notifications.dispatch(notification);
                }
                Ok(issued)
            }
            Err(e) => {
                tracing::warn!(%visit_date, "Bulk issuance rolled back: {}", e);
                self.auditor
                    .record(AuditEntry::ticket(
                        Some(actor_id),
                        AuditAction::TicketsBulkIssueFailed,
                        None,
                        format!("Bulk issuance for {} failed: {}", visit_date, e),
                        now,
                    ))
                    .await;
                Err(e)
            }
        }
    }

    async fn issue_batch(
        &self,
        filter: &ApprovedRequestFilter,
        time_slot: &str,
    ) -> AppResult<(Vec<IssuedTicket>, Vec<Notification>)> {
        let mut tx = self.store.begin().await?;
        let requests = tx.approved_requests(filter).await?;
        let issued_at = self.clock.now();

        let mut numbers = HashSet::with_capacity(requests.len());
        let mut issued = Vec::with_capacity(requests.len());
        let mut notifications = Vec::with_capacity(requests.len());

        for help_request in &requests {
            // Collisions inside the batch are retried here; collisions with
            // stored tickets surface as a Conflict from the unique constraint
            let ticket_number = loop {
                let candidate = self.generate_ticket_number(filter.visit_day);
                if numbers.insert(candidate.clone()) {
                    break candidate;
                }
            };

            let new_ticket = NewTicket::for_visit(
                ticket_number,
                help_request.id,
                help_request.visitor_id,
                help_request.category.clone(),
                filter.visit_day,
                time_slot.to_string(),
                issued_at,
            );
            let ticket = tx
                .insert_ticket(&new_ticket)
                .await
                .map_err(|e| e.for_help_request(help_request.id))?;
            tx.attach_ticket(help_request.id, &ticket.ticket_number, &ticket.qr_payload)
                .await
                .map_err(|e| e.for_help_request(help_request.id))?;

            notifications.push(issued_notification(help_request, &ticket));
            issued.push(IssuedTicket {
                ticket_id: ticket.id,
                ticket_number: ticket.ticket_number,
                help_request_id: help_request.id,
                reference: help_request.reference.clone(),
                visitor_id: help_request.visitor_id,
                visitor_name: help_request.visitor_name.clone(),
                category: ticket.category,
                visit_date: ticket.visit_date,
                time_slot: ticket.time_slot,
                qr_payload: ticket.qr_payload,
                expires_at: ticket.expires_at,
            });
        }

        tx.commit().await?;
        Ok((issued, notifications))
    }

    // -----------------------------------------------------------------------
    // Validate
    // -----------------------------------------------------------------------

    /// Read-only check of whether a ticket could be redeemed right now. An
    /// unusable ticket is a normal result, not an error.
    pub async fn validate(&self, ticket_number: &str) -> AppResult<TicketValidation> {
        let ticket_number = ticket_number.trim();
        if ticket_number.is_empty() {
            return Err(AppError::Validation("ticket number must not be empty".to_string()));
        }

        let ticket = match self.store.ticket_by_number(ticket_number).await {
            Ok(ticket) => ticket,
            Err(e) => {
                tracing::error!(ticket_number, "Ticket lookup failed during validation: {}", e);
                return Ok(TicketValidation {
                    checks: ValidationChecks::missing(),
                    rejection: Some(TicketRejection::Unavailable),
                    ticket: None,
                });
            }
        };

        let Some(ticket) = ticket else {
            return Ok(TicketValidation {
                checks: ValidationChecks::missing(),
                rejection: Some(TicketRejection::NotFound),
                ticket: None,
            });
        };

        let now = self.clock.now();
        let checks = ticket.checks(now, self.clock.today());
        Ok(TicketValidation {
            rejection: checks.rejection(),
            checks,
            ticket: Some(TicketDetails::at(ticket, now)),
        })
    }

    // -----------------------------------------------------------------------
    // Redeem
    // -----------------------------------------------------------------------

    /// Mark a ticket used, record the visit and put the visitor in today's
    /// queue. Exactly one concurrent redemption of a ticket succeeds.
    #[tracing::instrument(skip(self, request), fields(staff_id = request.staff_id))]
    pub async fn redeem(&self, ticket_number: &str, request: RedeemTicket) -> AppResult<Redemption> {
        if let Some(position) = request.queue_position {
            if position < 1 {
                return Err(AppError::Validation(
                    "queue_position must be at least 1".to_string(),
                ));
            }
        }
        // The queue counts today's visits, so a check-in must land on today
        if let Some(check_in_time) = request.check_in_time {
            let now = self.clock.now();
            if check_in_time.date_naive() != self.clock.today() || check_in_time > now {
                return Err(AppError::Validation(format!(
                    "check_in_time {} must be earlier today",
                    check_in_time
                )));
            }
        }

        let staff_id = request.staff_id;
        let result = self.redeem_in_tx(ticket_number, request).await;
        let now = self.clock.now();

        match &result {
            Ok(redemption) => {
                tracing::info!(
                    ticket_number,
                    visit_id = redemption.visit_id,
                    queue_position = redemption.queue_position,
                    "Ticket redeemed"
                );
                self.auditor
                    .record(AuditEntry::ticket(
                        Some(staff_id),
                        AuditAction::TicketRedeemed,
                        Some(redemption.ticket_id),
                        format!(
                            "Ticket {} redeemed, queue position {}",
                            ticket_number, redemption.queue_position
                        ),
                        now,
                    ))
                    .await;
            }
            Err(e) => {
                tracing::warn!(ticket_number, "Redemption rejected: {}", e);
                self.auditor
                    .record(AuditEntry::ticket(
                        Some(staff_id),
                        AuditAction::TicketRedeemFailed,
                        None,
                        format!("Redemption of ticket {} failed: {}", ticket_number, e),
                        now,
                    ))
                    .await;
            }
        }

        result
    }

    async fn redeem_in_tx(&self, ticket_number: &str, request: RedeemTicket) -> AppResult<Redemption> {
        let mut tx = self.store.begin().await?;

        let ticket = tx
            .lock_ticket_by_number(ticket_number)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Ticket {} not found", ticket_number)))?;

        let now = self.clock.now();
        let today = self.clock.today();
        if let Some(rejection) = ticket.checks(now, today).rejection() {
            return Err(AppError::InvalidState(rejection));
        }

        let used_at = request.check_in_time.unwrap_or(now);
        tx.mark_ticket_used(ticket.id, used_at).await?;

        let visit = tx
            .insert_visit(&NewVisit {
                visitor_id: ticket.visitor_id,
                ticket_id: ticket.id,
                check_in_time: used_at,
                check_in_method: CheckInMethod::StaffEntry,
                staff_id: request.staff_id,
                notes: request.notes,
            })
            .await?;

        let queue_position = match request.queue_position {
            Some(position) => position,
            None => {
                let ahead = tx.count_open_visits(today, visit.id).await?;
                i32::try_from(ahead + 1)
                    .map_err(|_| AppError::Internal("queue position overflow".to_string()))?
            }
        };
        let estimated_wait = queue_position.saturating_mul(self.settings.minutes_per_visitor);

        let entry = tx
            .insert_queue_entry(&NewQueueEntry {
                visitor_id: ticket.visitor_id,
                visit_id: visit.id,
                reference: ticket.ticket_number.clone(),
                category: ticket.category.clone(),
                position: queue_position,
                joined_at: now,
                estimated_wait_minutes: estimated_wait,
            })
            .await?;

        tx.commit().await?;

        Ok(Redemption {
            ticket_id: ticket.id,
            ticket_number: ticket.ticket_number,
            used_at,
            queue_position,
            estimated_wait,
            visit_id: visit.id,
            queue_entry_id: entry.id,
        })
    }

    // -----------------------------------------------------------------------
    // Cancel
    // -----------------------------------------------------------------------

    /// Cancel an active ticket and hand its help request back to the approved
    /// pool when the request still holds this ticket.
    #[tracing::instrument(skip(self, request))]
    pub async fn cancel(
        &self,
        ticket_id: i32,
        request: CancelTicket,
        actor_id: i32,
    ) -> AppResult<Cancellation> {
        let reason = request.reason.trim().to_string();
        if reason.is_empty() {
            return Err(AppError::Validation("reason must not be empty".to_string()));
        }

        let result = self
            .cancel_in_tx(ticket_id, &reason, request.admin_notes.as_deref())
            .await;
        let now = self.clock.now();

        match result {
            Ok((ticket, help_request, reverted)) => {
                let cancelled_at = ticket.cancelled_at.unwrap_or(now);
                tracing::info!(
                    ticket_id,
                    ticket_number = %ticket.ticket_number,
                    help_request_reverted = reverted,
                    "Ticket cancelled"
                );
                self.auditor
                    .record(AuditEntry::ticket(
                        Some(actor_id),
                        AuditAction::TicketCancelled,
                        Some(ticket_id),
                        format!("Ticket {} cancelled: {}", ticket.ticket_number, reason),
                        now,
                    ))
                    .await;

                if request.notify_user {
                    self.notifications.dispatch(cancelled_notification(
                        &ticket,
                        help_request.as_ref(),
                        &reason,
                    ));
                }

                Ok(Cancellation {
                    ticket_id,
                    ticket_number: ticket.ticket_number,
                    status: TicketStatus::Cancelled,
                    cancelled_at,
                    reason,
                    help_request_reverted: reverted,
                    notification_queued: request.notify_user,
                })
            }
            Err(e) => {
                tracing::warn!(ticket_id, "Cancellation rejected: {}", e);
                self.auditor
                    .record(AuditEntry::ticket(
                        Some(actor_id),
                        AuditAction::TicketCancelFailed,
                        Some(ticket_id),
                        format!("Cancellation of ticket {} failed: {}", ticket_id, e),
                        now,
                    ))
                    .await;
                Err(e)
            }
        }
    }

    async fn cancel_in_tx(
        &self,
        ticket_id: i32,
        reason: &str,
        admin_notes: Option<&str>,
    ) -> AppResult<(Ticket, Option<HelpRequest>, bool)> {
        let mut tx = self.store.begin().await?;

        let mut ticket = tx
            .lock_ticket(ticket_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Ticket with id {} not found", ticket_id)))?;

        match ticket.status {
            TicketStatus::Used => return Err(AppError::InvalidState(TicketRejection::AlreadyUsed)),
            TicketStatus::Cancelled => {
                return Err(AppError::InvalidState(TicketRejection::Cancelled))
            }
            TicketStatus::Active => {}
        }

        let cancelled_at = self.clock.now();
        tx.mark_ticket_cancelled(ticket.id, cancelled_at, reason, admin_notes)
            .await?;
        ticket.status = TicketStatus::Cancelled;
        ticket.cancelled_at = Some(cancelled_at);
        ticket.cancel_reason = Some(reason.to_string());
        ticket.admin_notes = admin_notes.map(String::from);

        let help_request = tx.lock_help_request(ticket.help_request_id).await?;
        let reverted = match &help_request {
            Some(hr) if hr.holds_ticket(&ticket.ticket_number) => {
                tx.detach_ticket(hr.id).await?;
                true
            }
            _ => false,
        };

        tx.commit().await?;
        Ok((ticket, help_request, reverted))
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    pub async fn get_ticket(&self, ticket_number: &str) -> AppResult<TicketDetails> {
        let ticket = self
            .store
            .ticket_by_number(ticket_number)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Ticket {} not found", ticket_number)))?;
        Ok(TicketDetails::at(ticket, self.clock.now()))
    }

    pub async fn list_tickets(&self, query: &TicketQuery) -> AppResult<Vec<TicketDetails>> {
        let visit_date = query.date.as_deref().map(parse_date).transpose()?;
        let status = query
            .status
            .as_deref()
            .map(|s| s.parse::<TicketStatus>().map_err(AppError::Validation))
            .transpose()?;

        let now = self.clock.now();
        let tickets = self.store.list_tickets(visit_date, status).await?;
        Ok(tickets
            .into_iter()
            .map(|ticket| TicketDetails::at(ticket, now))
            .collect())
    }
}

fn recipient_for(visitor_id: i32, help_request: Option<&HelpRequest>) -> Recipient {
    Recipient {
        user_id: visitor_id,
        name: help_request.and_then(|hr| hr.visitor_name.clone()),
        email: help_request.and_then(|hr| hr.visitor_email.clone()),
    }
}

fn issued_notification(help_request: &HelpRequest, ticket: &Ticket) -> Notification {
    Notification {
        recipient: recipient_for(help_request.visitor_id, Some(help_request)),
        template: NotificationTemplate::TicketIssued,
        data: json!({
            "ticket_number": ticket.ticket_number,
            "reference": help_request.reference,
            "category": ticket.category,
            "visit_date": ticket.visit_date.to_string(),
            "time_slot": ticket.time_slot,
            "qr_payload": ticket.qr_payload,
        }),
    }
}

fn cancelled_notification(
    ticket: &Ticket,
    help_request: Option<&HelpRequest>,
    reason: &str,
) -> Notification {
    Notification {
        recipient: recipient_for(ticket.visitor_id, help_request),
        template: NotificationTemplate::TicketCancelled,
        data: json!({
            "ticket_number": ticket.ticket_number,
            "visit_date": ticket.visit_date.to_string(),
            "reason": reason,
        }),
    }
}
