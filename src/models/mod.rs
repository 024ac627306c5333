//! Data models for Visitdesk

pub mod audit;
pub mod enums;
pub mod help_request;
pub mod queue;
pub mod ticket;
pub mod visit;

// Re-export commonly used types
pub use audit::AuditEntry;
pub use enums::{AuditAction, CheckInMethod, HelpRequestStatus, QueueStatus, TicketStatus, VisitStatus};
pub use help_request::HelpRequest;
pub use queue::QueueEntry;
pub use ticket::{Ticket, TicketRejection};
pub use visit::Visit;
