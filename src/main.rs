//! Visitdesk Server
//!
//! REST API server for visit tickets and the front-desk queue.

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

use visitdesk_server::{
    api,
    config::{AppConfig, LogFormat, LoggingConfig, NotificationChannel},
    repository::Repository,
    services::{
        clock::SystemClock,
        email::EmailService,
        notifications::{LogNotifier, Notifier},
        Services,
    },
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::load().context("Failed to load configuration")?;

    // Keep the file writer alive for the whole process
    let _log_guard = init_tracing(&config.logging)?;

    tracing::info!("Starting Visitdesk Server v{}", env!("CARGO_PKG_VERSION"));

    // Create database connection pool
    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .connect(&config.database.url)
        .await
        .context("Failed to connect to database")?;

    tracing::info!("Connected to database");

    // Run migrations
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run database migrations")?;

    tracing::info!("Database migrations completed");

    let notifier: Arc<dyn Notifier> = match config.notifications.channel {
        NotificationChannel::Email => Arc::new(EmailService::new(config.email.clone())),
        NotificationChannel::Log => Arc::new(LogNotifier),
    };
    tracing::info!(channel = ?config.notifications.channel, "Notifications configured");

    // Create repository and services
    let repository = Repository::new(pool);
    let services = Services::new(
        Arc::new(repository.clone()),
        Arc::new(repository.audit.clone()),
        notifier,
        Arc::new(SystemClock),
        config.tickets.clone(),
    );

    let addr = SocketAddr::new(
        config
            .server
            .host
            .parse()
            .with_context(|| format!("Invalid host address {}", config.server.host))?,
        config.server.port,
    );

    // Create application state
    let state = AppState {
        config: Arc::new(config),
        services: Arc::new(services),
    };

    let app = api::create_router(state);

    tracing::info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Console output in the configured format, plus a daily rolling file when a
/// log directory is set
fn init_tracing(logging: &LoggingConfig) -> anyhow::Result<Option<WorkerGuard>> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("visitdesk_server={},tower_http=debug", logging.level).into()
    });

    let console = match logging.format {
        LogFormat::Pretty => tracing_subscriber::fmt::layer().boxed(),
        LogFormat::Json => tracing_subscriber::fmt::layer().json().boxed(),
    };

    let (file, guard) = match &logging.directory {
        Some(directory) => {
            let appender = tracing_appender::rolling::daily(directory, "visitdesk.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .json()
                .with_ansi(false)
                .with_writer(writer)
                .boxed();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file)
        .try_init()
        .context("Failed to initialise tracing")?;

    Ok(guard)
}
