//! API handlers for Visitdesk REST endpoints

pub mod health;
pub mod openapi;
pub mod queue;
pub mod tickets;

use axum::{
    async_trait,
    body::Bytes,
    extract::{FromRequest, FromRequestParts, Request},
    http::request::Parts,
    routing::{get, post},
    Json, Router,
};
use serde::de::DeserializeOwned;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{error::AppError, AppState};

/// Header carrying the acting user's id, set by the fronting gateway
pub const ACTOR_HEADER: &str = "x-actor-id";

/// Id of the administrator performing the request
pub struct Actor(pub i32);

#[async_trait]
impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(ACTOR_HEADER)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::Validation("Missing X-Actor-Id header".to_string()))?;

        let actor_id = value
            .trim()
            .parse::<i32>()
            .map_err(|_| AppError::Validation("Invalid X-Actor-Id header".to_string()))?;

        Ok(Actor(actor_id))
    }
}

/// JSON body whose rejections come back as a 400 `ErrorResponse`
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(ApiJson(value))
    }
}

/// JSON body that may be omitted entirely, falling back to `T::default()`
pub struct OptionalJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for OptionalJson<T>
where
    T: DeserializeOwned + Default,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|e| AppError::Validation(e.body_text()))?;

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(OptionalJson(T::default()));
        }

        serde_json::from_slice(&bytes)
            .map(OptionalJson)
            .map_err(|e| AppError::Validation(format!("Invalid JSON body: {}", e)))
    }
}

/// Create the application router with all routes
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_v1 = Router::new()
        // Health check
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        // Tickets
        .route("/tickets", get(tickets::list_tickets))
        .route("/tickets/bulk-issue", post(tickets::bulk_issue))
        .route("/tickets/:ticket", get(tickets::get_ticket))
        .route("/tickets/:ticket/validate", post(tickets::validate_ticket))
        .route("/tickets/:ticket/use", post(tickets::use_ticket))
        .route("/tickets/:ticket/cancel", post(tickets::cancel_ticket))
        // Queue
        .route("/queue", get(queue::get_queue))
        .with_state(state);

    Router::new()
        .nest("/api/v1", api_v1)
        .merge(openapi::create_openapi_router())
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(cors)
}
