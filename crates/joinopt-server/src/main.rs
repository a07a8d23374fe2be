//! # joinopt-server: HTTP Service for Join Ordering
//!
//! This binary crate exposes the join ordering core as a network service. A query
//! planner sends the tables of a join cluster together with their statistics and
//! the conditions connecting them, and gets back the join tree chosen by DPsize
//! or the greedy orderer.
//!
//! ## Architecture
//!
//! ```text
//! Query planner
//!   |
//!   | HTTP POST /optimize/join-graph (JSON)
//!   v
//! joinopt-server (this binary)
//!   |
//!   +-> Build join graph (one vertex per table, one edge per join)
//!   +-> Order joins (DPsize up to the configured size, greedy beyond)
//!   +-> Serialize the join tree
//!   |
//!   | HTTP response (JSON)
//!   v
//! Query planner
//! ```
//!
//! ## Endpoints
//!
//! - `GET  /health`                - Health check
//! - `GET  /rules`                 - List active rules and the join ordering config
//! - `POST /optimize/join-graph`   - Order the joins of a join graph
//!
//! ## Configuration
//!
//! The server listens on `0.0.0.0:3000` unless `JOINOPT_ADDR` says otherwise.
//! Logging is controlled by the `RUST_LOG` environment variable (defaults to
//! `joinopt=debug`).

mod join_graph;
mod routes;
mod state;

use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("joinopt=debug")),
        )
        .init();

    let state = Arc::new(state::AppState::default());

    let app = Router::new()
        .route("/health", get(routes::health))
        .route("/rules", get(routes::list_rules))
        .route("/optimize/join-graph", post(join_graph::optimize_join_graph))
        .layer(CorsLayer::permissive()) // Allow cross-origin requests (for dev/debug UIs)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = state::listen_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("joinopt-server listening on http://{addr}");
    axum::serve(listener, app).await?;
    Ok(())
}
