//! Same-day queue endpoint

use axum::{
    extract::{Query, State},
    Json,
};

use crate::{
    error::AppResult,
    models::{queue::QueueQuery, QueueEntry},
};

/// List the queue for a day
#[utoipa::path(
    get,
    path = "/queue",
    tag = "queue",
    params(QueueQuery),
    responses(
        (status = 200, description = "Queue entries in position order", body = Vec<QueueEntry>),
        (status = 400, description = "Invalid date", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_queue(
    State(state): State<crate::AppState>,
    Query(query): Query<QueueQuery>,
) -> AppResult<Json<Vec<QueueEntry>>> {
    let entries = state.services.queue.for_day(query.date.as_deref()).await?;
    Ok(Json(entries))
}
