//! OpenAPI documentation

use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{health, queue, tickets};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Visitdesk API",
        version = "0.3.0",
        description = "Visit ticket issuance, front-desk redemption and same-day queue",
        license(name = "AGPL-3.0", url = "https://www.gnu.org/licenses/agpl-3.0.html")
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Tickets
        tickets::bulk_issue,
        tickets::validate_ticket,
        tickets::use_ticket,
        tickets::cancel_ticket,
        tickets::get_ticket,
        tickets::list_tickets,
        // Queue
        queue::get_queue,
    ),
    components(
        schemas(
            // Tickets
            tickets::BulkIssueRequest,
            tickets::BulkIssueResponse,
            tickets::ValidateTicketRequest,
            tickets::ValidateTicketResponse,
            tickets::UseTicketRequest,
            tickets::CancelTicketRequest,
            crate::models::ticket::Ticket,
            crate::models::ticket::TicketDetails,
            crate::models::ticket::IssuedTicket,
            crate::models::ticket::ValidationChecks,
            crate::models::ticket::TicketRejection,
            crate::models::ticket::Redemption,
            crate::models::ticket::Cancellation,
            crate::models::enums::TicketStatus,
            // Queue
            crate::models::queue::QueueEntry,
            crate::models::enums::QueueStatus,
            // Health
            health::HealthResponse,
            // Errors
            crate::error::ErrorResponse,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "tickets", description = "Visit ticket lifecycle"),
        (name = "queue", description = "Same-day queue")
    )
)]
pub struct ApiDoc;

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
