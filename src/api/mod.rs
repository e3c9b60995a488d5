//! HTTP Surface
//!
//! Axum router and server wiring for a hub.
//!
//! # Endpoints
//!
//! - `GET {path}` - WebSocket event stream (path chosen by the embedder)
//!
//! # Example
//!
//! ```rust,no_run
//! use wsevent::api::{build_router, serve};
//! use wsevent::{Hub, Options};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let hub: Hub = Hub::new(Options::default());
//!     let router = build_router(&hub, "/wsevents");
//!     serve(router, "0.0.0.0:8080").await?;
//!     Ok(())
//! }
//! ```

use axum::Router;
use tokio::net::ToSocketAddrs;
use tower_http::trace::TraceLayer;

use crate::error::{HubError, HubResult};
use crate::websocket::{Event, Hub};

/// Build the router serving `hub` on `path`, with request tracing
pub fn build_router<E: Event>(hub: &Hub<E>, path: &str) -> Router {
    hub.router(path).layer(TraceLayer::new_for_http())
}

/// Serve `router` until Ctrl+C or SIGTERM
pub async fn serve(router: Router, addr: impl ToSocketAddrs) -> HubResult<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!("wsevent listening on {}", listener.local_addr()?);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| HubError::Server(e.to_string()))?;

    tracing::info!("wsevent shut down gracefully");
    Ok(())
}

/// Wait for shutdown signal
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
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
                tracing::error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Options;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tower::util::ServiceExt;

    #[tokio::test]
    async fn test_unknown_path_not_found() {
        let hub: Hub = Hub::new(Options::default());
        let app = build_router(&hub, "/wsevents");

        let response = app
            .oneshot(Request::builder().uri("/other").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_plain_get_is_rejected() {
        let hub: Hub = Hub::new(Options::default());
        let app = build_router(&hub, "/wsevents");

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/wsevents")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert!(response.status().is_client_error());
        assert_eq!(hub.connection_count().await, 0);
    }

    #[tokio::test]
    async fn test_post_not_allowed() {
        let hub: Hub = Hub::new(Options::default());
        let app = build_router(&hub, "/wsevents");

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/wsevents")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }
}
