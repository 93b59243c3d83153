mod config;
mod routes;
mod services;
mod state;

use std::process::ExitCode;

use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt::init();

    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            error!(error = %e, "failed to load .env");
            return ExitCode::FAILURE;
        }
    }

    let config = match config::RelayConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            return ExitCode::FAILURE;
        }
    };
    let addr = config.addr();

    let state = state::AppState::new(config);
    let app = routes::app(state);
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(%addr, error = %e, "failed to bind");
            return ExitCode::FAILURE;
        }
    };

    info!(%addr, "sketchboard relay listening");
    if let Err(e) = axum::serve(listener, app).await {
        error!(error = %e, "server failed");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
