//! Waterbird survey service - field data collection for wildlife surveys.
//!
//! # API Endpoints
//!
//! Under `/waterbirdforagingsurvey` and `/rookerycensussurvey`:
//!
//! - `GET /` - Summary listing of surveys
//! - `GET /export` - Completed surveys for reporting
//! - `GET /user/{userId}` - Surveys submitted by a user
//! - `GET /{guid}` - One survey
//! - `POST /` - Create a pending survey
//! - `PUT /{guid}` - Update, finish, or complete a survey
//!
//! Plus `GET /health` for health checks.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use waterbird_survey::api::{AppState, router};
use waterbird_survey::config::Config;
use waterbird_survey::manager::SurveyManager;
use waterbird_survey::storage::Storage;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env();

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("waterbird_survey=info".parse()?))
        .init();

    info!(
        port = config.port,
        db_url = %config.database_url,
        "Starting waterbird survey server"
    );

    let storage = Storage::new(&config.database_url, config.max_connections).await?;
    info!("Database initialized");

    let state = AppState {
        manager: SurveyManager::new(Arc::new(storage)),
    };
    let app = router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr).await?;

    info!(%addr, "Waterbird survey server is listening");

    axum::serve(listener, app).await?;

    Ok(())
}
