//! In-memory store for service and router tests
//!
//! A transaction holds the store lock until it is committed or dropped and
//! works on a private copy of the state, so an uncommitted transaction leaves
//! no trace. Failpoints make a given step fail on demand.

use std::{
    collections::HashSet,
    sync::{Arc, Mutex as StdMutex},
};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::{
    error::{AppError, AppResult},
    models::{
        help_request::{ApprovedRequestFilter, HelpRequest},
        queue::{NewQueueEntry, QueueEntry},
        ticket::{NewTicket, Ticket, TicketRejection},
        visit::{NewVisit, Visit},
        AuditEntry, HelpRequestStatus, QueueStatus, TicketStatus, VisitStatus,
    },
    services::audit::AuditLog,
};

use super::{TicketStore, TicketTransaction};

#[derive(Debug, Clone, Default)]
struct State {
    help_requests: Vec<HelpRequest>,
    tickets: Vec<Ticket>,
    visits: Vec<Visit>,
    queue: Vec<QueueEntry>,
    next_id: i32,
}

impl State {
    fn next_id(&mut self) -> i32 {
        self.next_id += 1;
        self.next_id
    }
}

#[derive(Debug, Clone, Default)]
struct Failpoints {
    queue_insert: bool,
    issue_for: Option<i32>,
    reads: bool,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
    failpoints: Arc<StdMutex<Failpoints>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn failpoints(&self) -> Failpoints {
        self.failpoints.lock().unwrap().clone()
    }

    /// Make every queue insert fail
    pub fn fail_queue_insert(&self, fail: bool) {
        self.failpoints.lock().unwrap().queue_insert = fail;
    }

    /// Make attaching a ticket to this help request fail
    pub fn fail_issue_for(&self, help_request_id: Option<i32>) {
        self.failpoints.lock().unwrap().issue_for = help_request_id;
    }

    /// Make plain reads and the ping fail
    pub fn fail_reads(&self, fail: bool) {
        self.failpoints.lock().unwrap().reads = fail;
    }

    pub async fn seed_help_request(
        &self,
        reference: &str,
        visitor_id: i32,
        category: &str,
        visit_day: NaiveDate,
        status: HelpRequestStatus,
        created_at: DateTime<Utc>,
    ) -> i32 {
        let mut state = self.state.lock().await;
        let id = state.next_id();
        state.help_requests.push(HelpRequest {
            id,
            reference: reference.to_string(),
            visitor_id,
            category: category.to_string(),
            status,
            visit_day,
            time_slot: None,
            ticket_number: None,
            qr_payload: None,
            created_at,
            visitor_name: Some(format!("Visitor {}", visitor_id)),
            visitor_email: Some(format!("visitor{}@example.org", visitor_id)),
        });
        id
    }

    /// Overwrite the status of a help request, as the approval workflow would
    pub async fn set_help_request_status(&self, id: i32, status: HelpRequestStatus) {
        let mut state = self.state.lock().await;
        if let Some(hr) = state.help_requests.iter_mut().find(|hr| hr.id == id) {
            hr.status = status;
        }
    }

    /// Insert a ticket row directly, bypassing issuance
    pub async fn seed_ticket(&self, ticket: &NewTicket, status: TicketStatus) -> Ticket {
        let mut state = self.state.lock().await;
        let id = state.next_id();
        let row = ticket_row(id, ticket, status);
        state.tickets.push(row.clone());
        row
    }

    pub async fn help_request(&self, id: i32) -> Option<HelpRequest> {
        let state = self.state.lock().await;
        state.help_requests.iter().find(|hr| hr.id == id).cloned()
    }

    pub async fn tickets(&self) -> Vec<Ticket> {
        self.state.lock().await.tickets.clone()
    }

    pub async fn visits(&self) -> Vec<Visit> {
        self.state.lock().await.visits.clone()
    }

    pub async fn queue_entries(&self) -> Vec<QueueEntry> {
        self.state.lock().await.queue.clone()
    }

    fn check_reads(&self) -> AppResult<()> {
        if self.failpoints().reads {
            return Err(AppError::Store("injected read failure".to_string()));
        }
        Ok(())
    }
}

fn ticket_row(id: i32, ticket: &NewTicket, status: TicketStatus) -> Ticket {
    Ticket {
        id,
        ticket_number: ticket.ticket_number.clone(),
        qr_payload: ticket.qr_payload.clone(),
        help_request_id: ticket.help_request_id,
        visitor_id: ticket.visitor_id,
        category: ticket.category.clone(),
        visit_date: ticket.visit_date,
        time_slot: ticket.time_slot.clone(),
        status,
        issued_at: ticket.issued_at,
        expires_at: ticket.expires_at,
        used_at: None,
        cancelled_at: None,
        cancel_reason: None,
        admin_notes: None,
    }
}

#[async_trait]
impl TicketStore for MemoryStore {
    async fn begin(&self) -> AppResult<Box<dyn TicketTransaction>> {
        let guard = self.state.clone().lock_owned().await;
        let working = (*guard).clone();
        Ok(Box::new(MemoryTransaction {
            guard,
            working,
            failpoints: self.failpoints(),
        }))
    }

    async fn ticket_by_number(&self, ticket_number: &str) -> AppResult<Option<Ticket>> {
        self.check_reads()?;
        let state = self.state.lock().await;
        Ok(state
            .tickets
            .iter()
            .find(|t| t.ticket_number == ticket_number)
            .cloned())
    }

    async fn list_tickets(
        &self,
        visit_date: Option<NaiveDate>,
        status: Option<TicketStatus>,
    ) -> AppResult<Vec<Ticket>> {
        self.check_reads()?;
        let state = self.state.lock().await;
        let mut rows: Vec<Ticket> = state
            .tickets
            .iter()
            .filter(|t| visit_date.map_or(true, |d| t.visit_date == d))
            .filter(|t| status.map_or(true, |s| t.status == s))
            .cloned()
            .collect();
        rows.sort_by_key(|t| (t.issued_at, t.id));
        Ok(rows)
    }

    async fn queue_for_day(&self, day: NaiveDate) -> AppResult<Vec<QueueEntry>> {
        self.check_reads()?;
        let state = self.state.lock().await;
        let mut rows: Vec<QueueEntry> = state
            .queue
            .iter()
            .filter(|q| q.joined_at.date_naive() == day)
            .cloned()
            .collect();
        rows.sort_by_key(|q| (q.position, q.joined_at, q.id));
        Ok(rows)
    }

    async fn ping(&self) -> AppResult<()> {
        self.check_reads()
    }
}

pub struct MemoryTransaction {
    guard: OwnedMutexGuard<State>,
    working: State,
    failpoints: Failpoints,
}

impl MemoryTransaction {
    fn help_request_mut(&mut self, id: i32) -> Option<&mut HelpRequest> {
        self.working.help_requests.iter_mut().find(|hr| hr.id == id)
    }

    fn ticket_mut(&mut self, id: i32) -> Option<&mut Ticket> {
        self.working.tickets.iter_mut().find(|t| t.id == id)
    }
}

#[async_trait]
impl TicketTransaction for MemoryTransaction {
    async fn approved_requests(
        &mut self,
        filter: &ApprovedRequestFilter,
    ) -> AppResult<Vec<HelpRequest>> {
        let mut rows: Vec<HelpRequest> = self
            .working
            .help_requests
            .iter()
            .filter(|hr| hr.status == HelpRequestStatus::Approved)
            .filter(|hr| hr.visit_day == filter.visit_day)
            .filter(|hr| filter.category.as_ref().map_or(true, |c| &hr.category == c))
            .cloned()
            .collect();
        rows.sort_by_key(|hr| (hr.created_at, hr.id));
        rows.truncate(usize::try_from(filter.limit).unwrap_or(0));
        Ok(rows)
    }

    async fn insert_ticket(&mut self, ticket: &NewTicket) -> AppResult<Ticket> {
        let taken: HashSet<&str> = self
            .working
            .tickets
            .iter()
            .map(|t| t.ticket_number.as_str())
            .collect();
        if taken.contains(ticket.ticket_number.as_str()) {
            return Err(AppError::Conflict(format!(
                "Ticket number {} already exists",
                ticket.ticket_number
            )));
        }
        let id = self.working.next_id();
        let row = ticket_row(id, ticket, TicketStatus::Active);
        self.working.tickets.push(row.clone());
        Ok(row)
    }

    async fn attach_ticket(
        &mut self,
        help_request_id: i32,
        ticket_number: &str,
        qr_payload: &str,
    ) -> AppResult<()> {
        if self.failpoints.issue_for == Some(help_request_id) {
            return Err(AppError::Store("injected issue failure".to_string()));
        }
        match self.help_request_mut(help_request_id) {
            Some(hr) if hr.status == HelpRequestStatus::Approved => {
                hr.status = HelpRequestStatus::TicketIssued;
                hr.ticket_number = Some(ticket_number.to_string());
                hr.qr_payload = Some(qr_payload.to_string());
                Ok(())
            }
            _ => Err(AppError::NotFound(format!(
                "Approved help request with id {} not found",
                help_request_id
            ))),
        }
    }

    async fn lock_ticket_by_number(&mut self, ticket_number: &str) -> AppResult<Option<Ticket>> {
        Ok(self
            .working
            .tickets
            .iter()
            .find(|t| t.ticket_number == ticket_number)
            .cloned())
    }

    async fn lock_ticket(&mut self, id: i32) -> AppResult<Option<Ticket>> {
        Ok(self.working.tickets.iter().find(|t| t.id == id).cloned())
    }

    async fn mark_ticket_used(&mut self, id: i32, used_at: DateTime<Utc>) -> AppResult<()> {
        match self.ticket_mut(id) {
            Some(t) if t.status == TicketStatus::Active => {
                t.status = TicketStatus::Used;
                t.used_at = Some(used_at);
                Ok(())
            }
            _ => Err(AppError::InvalidState(TicketRejection::AlreadyUsed)),
        }
    }

    async fn mark_ticket_cancelled(
        &mut self,
        id: i32,
        cancelled_at: DateTime<Utc>,
        reason: &str,
        admin_notes: Option<&str>,
    ) -> AppResult<()> {
        match self.ticket_mut(id) {
            Some(t) if t.status == TicketStatus::Active => {
                t.status = TicketStatus::Cancelled;
                t.cancelled_at = Some(cancelled_at);
                t.cancel_reason = Some(reason.to_string());
                t.admin_notes = admin_notes.map(String::from);
                Ok(())
            }
            _ => Err(AppError::NotFound(format!(
                "Active ticket with id {} not found",
                id
            ))),
        }
    }

    async fn lock_help_request(&mut self, id: i32) -> AppResult<Option<HelpRequest>> {
        Ok(self
            .working
            .help_requests
            .iter()
            .find(|hr| hr.id == id)
            .cloned())
    }

    async fn detach_ticket(&mut self, help_request_id: i32) -> AppResult<()> {
        match self.help_request_mut(help_request_id) {
            Some(hr) if hr.status == HelpRequestStatus::TicketIssued => {
                hr.status = HelpRequestStatus::Approved;
                hr.ticket_number = None;
                hr.qr_payload = None;
                Ok(())
            }
            _ => Err(AppError::NotFound(format!(
                "Help request {} does not hold a ticket",
                help_request_id
            ))),
        }
    }

    async fn insert_visit(&mut self, visit: &NewVisit) -> AppResult<Visit> {
        let id = self.working.next_id();
        let row = Visit {
            id,
            visitor_id: visit.visitor_id,
            ticket_id: visit.ticket_id,
            check_in_time: visit.check_in_time,
            check_in_method: visit.check_in_method,
            staff_id: visit.staff_id,
            status: VisitStatus::CheckedIn,
            notes: visit.notes.clone(),
            check_out_time: None,
        };
        self.working.visits.push(row.clone());
        Ok(row)
    }

    async fn count_open_visits(&mut self, day: NaiveDate, excluding_visit: i32) -> AppResult<i64> {
        let count = self
            .working
            .visits
            .iter()
            .filter(|v| v.check_in_time.date_naive() == day)
            .filter(|v| v.check_out_time.is_none())
            .filter(|v| v.id != excluding_visit)
            .count();
        Ok(count as i64)
    }

    async fn insert_queue_entry(&mut self, entry: &NewQueueEntry) -> AppResult<QueueEntry> {
        if self.failpoints.queue_insert {
            return Err(AppError::Store("injected queue failure".to_string()));
        }
        let id = self.working.next_id();
        let row = QueueEntry {
            id,
            visitor_id: entry.visitor_id,
            visit_id: entry.visit_id,
            reference: entry.reference.clone(),
            category: entry.category.clone(),
            position: entry.position,
            status: QueueStatus::Waiting,
            joined_at: entry.joined_at,
            estimated_wait_minutes: entry.estimated_wait_minutes,
        };
        self.working.queue.push(row.clone());
        Ok(row)
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        let MemoryTransaction {
            mut guard, working, ..
        } = *self;
        *guard = working;
        Ok(())
    }
}

/// Audit log that keeps entries in memory
#[derive(Clone, Default)]
pub struct MemoryAuditLog {
    entries: Arc<StdMutex<Vec<AuditEntry>>>,
}

impl MemoryAuditLog {
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().unwrap().clone()
    }
}

#[async_trait]
impl AuditLog for MemoryAuditLog {
    async fn record(&self, entry: AuditEntry) -> AppResult<()> {
        self.entries.lock().unwrap().push(entry);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
    }

    #[tokio::test]
    async fn test_dropped_transaction_leaves_no_trace() {
        let store = MemoryStore::new();
        let issued_at = Utc.with_ymd_and_hms(2026, 10, 18, 9, 0, 0).unwrap();
        let ticket = NewTicket::for_visit(
            "TKT-20261019-AAAAAA".into(),
            1,
            7,
            "Food".into(),
            day(),
            "morning".into(),
            issued_at,
        );

        {
            let mut tx = store.begin().await.unwrap();
            tx.insert_ticket(&ticket).await.unwrap();
        }
        assert!(store.tickets().await.is_empty());

        let mut tx = store.begin().await.unwrap();
        tx.insert_ticket(&ticket).await.unwrap();
        tokio_test::assert_ok!(tx.commit().await);
        assert_eq!(store.tickets().await.len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_number_conflicts() {
        let store = MemoryStore::new();
        let ticket = NewTicket::for_visit(
            "TKT-20261019-BBBBBB".into(),
            1,
            7,
            "Food".into(),
            day(),
            "morning".into(),
            Utc::now(),
        );
        store.seed_ticket(&ticket, TicketStatus::Active).await;

        let mut tx = store.begin().await.unwrap();
        let result = tx.insert_ticket(&ticket).await;
        assert!(matches!(result, Err(AppError::Conflict(_))));
    }
}
