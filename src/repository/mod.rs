//! Repository layer for database operations
//!
//! The ticket lifecycle talks to storage through [`TicketStore`] and
//! [`TicketTransaction`]. Every multi-step mutation runs on one transaction;
//! dropping a transaction without calling `commit` rolls it back.

pub mod audit;
pub mod help_requests;
#[cfg(test)]
pub mod memory;
pub mod queue;
pub mod tickets;
pub mod visits;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{Pool, Postgres, Transaction};

use crate::{
    error::AppResult,
    models::{
        help_request::{ApprovedRequestFilter, HelpRequest},
        queue::{NewQueueEntry, QueueEntry},
        ticket::{NewTicket, Ticket},
        visit::{NewVisit, Visit},
        TicketStatus,
    },
};

/// Read access and transaction factory for the ticket lifecycle
#[async_trait]
pub trait TicketStore: Send + Sync {
    async fn begin(&self) -> AppResult<Box<dyn TicketTransaction>>;

    async fn ticket_by_number(&self, ticket_number: &str) -> AppResult<Option<Ticket>>;

    async fn list_tickets(
        &self,
        visit_date: Option<NaiveDate>,
        status: Option<TicketStatus>,
    ) -> AppResult<Vec<Ticket>>;

    async fn queue_for_day(&self, day: NaiveDate) -> AppResult<Vec<QueueEntry>>;

    /// Cheap round trip used by the readiness probe
    async fn ping(&self) -> AppResult<()>;
}

/// Writes and locking reads inside one store transaction
#[async_trait]
pub trait TicketTransaction: Send {
    /// Approved requests for a day, oldest first, locked for this transaction
    async fn approved_requests(
        &mut self,
        filter: &ApprovedRequestFilter,
    ) -> AppResult<Vec<HelpRequest>>;

    /// Fails with `Conflict` when the ticket number is already taken
    async fn insert_ticket(&mut self, ticket: &NewTicket) -> AppResult<Ticket>;

    /// Move an approved request to ticket_issued and attach the credential
    async fn attach_ticket(
        &mut self,
        help_request_id: i32,
        ticket_number: &str,
        qr_payload: &str,
    ) -> AppResult<()>;

    async fn lock_ticket_by_number(&mut self, ticket_number: &str) -> AppResult<Option<Ticket>>;

    async fn lock_ticket(&mut self, id: i32) -> AppResult<Option<Ticket>>;

    /// Fails with `InvalidState(AlreadyUsed)` unless the ticket is still active
    async fn mark_ticket_used(&mut self, id: i32, used_at: DateTime<Utc>) -> AppResult<()>;

    async fn mark_ticket_cancelled(
        &mut self,
        id: i32,
        cancelled_at: DateTime<Utc>,
        reason: &str,
        admin_notes: Option<&str>,
    ) -> AppResult<()>;

    async fn lock_help_request(&mut self, id: i32) -> AppResult<Option<HelpRequest>>;

    /// Revert a ticket_issued request to approved and clear its credential
    async fn detach_ticket(&mut self, help_request_id: i32) -> AppResult<()>;

    async fn insert_visit(&mut self, visit: &NewVisit) -> AppResult<Visit>;

    /// Visits checked in on `day` and not checked out, other than `excluding_visit`
    async fn count_open_visits(&mut self, day: NaiveDate, excluding_visit: i32) -> AppResult<i64>;

    async fn insert_queue_entry(&mut self, entry: &NewQueueEntry) -> AppResult<QueueEntry>;

    async fn commit(self: Box<Self>) -> AppResult<()>;
}

/// Main repository struct holding database connection pool
#[derive(Clone)]
pub struct Repository {
    pub pool: Pool<Postgres>,
    pub tickets: tickets::TicketsRepository,
    pub queue: queue::QueueRepository,
    pub audit: audit::AuditRepository,
}

impl Repository {
    /// Create a new repository with the given database pool
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            tickets: tickets::TicketsRepository::new(pool.clone()),
            queue: queue::QueueRepository::new(pool.clone()),
            audit: audit::AuditRepository::new(pool.clone()),
            pool,
        }
    }
}

#[async_trait]
impl TicketStore for Repository {
    async fn begin(&self) -> AppResult<Box<dyn TicketTransaction>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgTicketTransaction { tx }))
    }

    async fn ticket_by_number(&self, ticket_number: &str) -> AppResult<Option<Ticket>> {
        self.tickets.get_by_number(ticket_number).await
    }

    async fn list_tickets(
        &self,
        visit_date: Option<NaiveDate>,
        status: Option<TicketStatus>,
    ) -> AppResult<Vec<Ticket>> {
        self.tickets.list(visit_date, status).await
    }

    async fn queue_for_day(&self, day: NaiveDate) -> AppResult<Vec<QueueEntry>> {
        self.queue.for_day(day).await
    }

    async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Postgres transaction; rolled back by sqlx when dropped uncommitted
pub struct PgTicketTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl TicketTransaction for PgTicketTransaction {
    async fn approved_requests(
        &mut self,
        filter: &ApprovedRequestFilter,
    ) -> AppResult<Vec<HelpRequest>> {
        help_requests::HelpRequestsRepository::lock_approved(&mut self.tx, filter).await
    }

    async fn insert_ticket(&mut self, ticket: &NewTicket) -> AppResult<Ticket> {
        tickets::TicketsRepository::insert(&mut self.tx, ticket).await
    }

    async fn attach_ticket(
        &mut self,
        help_request_id: i32,
        ticket_number: &str,
        qr_payload: &str,
    ) -> AppResult<()> {
        help_requests::HelpRequestsRepository::attach_ticket(
            &mut self.tx,
            help_request_id,
            ticket_number,
            qr_payload,
        )
        .await
    }

    async fn lock_ticket_by_number(&mut self, ticket_number: &str) -> AppResult<Option<Ticket>> {
        tickets::TicketsRepository::lock_by_number(&mut self.tx, ticket_number).await
    }

    async fn lock_ticket(&mut self, id: i32) -> AppResult<Option<Ticket>> {
        tickets::TicketsRepository::lock_by_id(&mut self.tx, id).await
    }

    async fn mark_ticket_used(&mut self, id: i32, used_at: DateTime<Utc>) -> AppResult<()> {
        tickets::TicketsRepository::mark_used(&mut self.tx, id, used_at).await
    }

    async fn mark_ticket_cancelled(
        &mut self,
        id: i32,
        cancelled_at: DateTime<Utc>,
        reason: &str,
        admin_notes: Option<&str>,
    ) -> AppResult<()> {
        tickets::TicketsRepository::mark_cancelled(&mut self.tx, id, cancelled_at, reason, admin_notes)
            .await
    }

    async fn lock_help_request(&mut self, id: i32) -> AppResult<Option<HelpRequest>> {
        help_requests::HelpRequestsRepository::lock_by_id(&mut self.tx, id).await
    }

    async fn detach_ticket(&mut self, help_request_id: i32) -> AppResult<()> {
        help_requests::HelpRequestsRepository::detach_ticket(&mut self.tx, help_request_id).await
    }

    async fn insert_visit(&mut self, visit: &NewVisit) -> AppResult<Visit> {
        visits::VisitsRepository::insert(&mut self.tx, visit).await
    }

    async fn count_open_visits(&mut self, day: NaiveDate, excluding_visit: i32) -> AppResult<i64> {
        visits::VisitsRepository::count_open_on(&mut self.tx, day, excluding_visit).await
    }

    async fn insert_queue_entry(&mut self, entry: &NewQueueEntry) -> AppResult<QueueEntry> {
        queue::QueueRepository::insert(&mut self.tx, entry).await
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        self.tx.commit().await?;
        Ok(())
    }
}
