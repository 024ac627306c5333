//! Visitdesk visit-ticket server
//!
//! Turns approved help requests into single-use, same-day visit tickets,
//! redeems them at the front desk and keeps the day's queue, behind a REST
//! JSON API.

use std::sync::Arc;

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod services;

pub use config::AppConfig;
pub use error::{AppError, AppResult};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Arc<services::Services>,
}
