mod api;
mod auth;
mod config;
mod errors;
mod headers;
mod idp;
mod openapi;
mod protocol;
mod state;
#[cfg(test)]
mod test_utils;

use crate::protocol::SessionContext;
use crate::state::AppState;
use axum::{routing::get, Json, Router};
use log::{error, info};
use sse_session::SessionRegistry;
use std::net::SocketAddr;
use utoipa::OpenApi;
use utoipa_axum::router::OpenApiRouter;
use utoipa_scalar::{Scalar, Servable};

#[tokio::main]
async fn main() {
    // Initialize logging
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    // Load configuration
    let config = match config::BridgeConfig::new() {
        Ok(config) => config,
        Err(e) => {
            error!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));

    let state = match AppState::new(config) {
        Ok(state) => state,
        Err(e) => {
            error!("Failed to initialize application state: {}", e);
            std::process::exit(1);
        }
    };
    let sessions = state.sessions.clone();
    let app = create_app(state).await;

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    info!("Server running on {}, press Ctrl+C to stop", addr);
    let serve = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(sessions))
        .await;
    if let Err(e) = serve {
        error!("Server error: {}", e);
        std::process::exit(1);
    }
    info!("Server shutdown complete");
}

/// Create a new application instance with a given state
pub async fn create_app(state: AppState) -> Router {
    let (router, api_doc) = OpenApiRouter::with_openapi(openapi::ApiDoc::openapi())
        .merge(api::router(&state))
        .split_for_parts();

    let openapi_json = api_doc.clone();
    router
        .route("/openapi.json", get(move || async move { Json(openapi_json) }))
        .merge(Scalar::with_url("/scalar", api_doc))
        .with_state(state)
}

/// Resolves on Ctrl+C or SIGTERM, closing open sessions so their streams end
async fn shutdown_signal(sessions: SessionRegistry<SessionContext>) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received SIGTERM, shutting down");
        }
    }

    let closed = sessions.close_all();
    info!("Closed {} open sessions", closed);
}
