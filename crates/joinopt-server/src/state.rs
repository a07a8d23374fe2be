//! # Application State
//!
//! This module defines the shared state that is available to all HTTP request handlers.
//! The state is created once at server startup and shared via `Arc` across all
//! concurrent requests.
//!
//! ## Components
//!
//! - **Rule Registry**: The plan rewrite rules, listed by `GET /rules`. Shared
//!   (not cloned per request) because rules are stateless.
//! - **Optimizer Config**: Join ordering strategy and the DPsize size limit used
//!   when a request does not choose a strategy itself.
//!
//! Every optimization request builds its own plan arena, so requests never share
//! mutable state.

use joinopt_core::optimizer::OptimizerConfig;
use joinopt_core::rule::RuleRegistry;
use std::net::SocketAddr;
use std::sync::Arc;

/// Address the server listens on unless `JOINOPT_ADDR` is set.
pub const DEFAULT_ADDR: &str = "0.0.0.0:3000";

/// Shared application state, accessible by all request handlers via Axum's State extractor.
pub struct AppState {
    /// Only reported by `GET /rules`; join graph requests order their graph
    /// without running plan rules.
    pub rule_registry: Arc<RuleRegistry>,
    pub config: OptimizerConfig,
}

impl AppState {
    pub fn new(config: OptimizerConfig) -> Self {
        let registry = joinopt_rules::default_rule_registry(&config);
        Self {
            rule_registry: Arc::new(registry),
            config,
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(OptimizerConfig::default())
    }
}

/// Listen address from `JOINOPT_ADDR`, falling back to [`DEFAULT_ADDR`].
pub fn listen_addr() -> Result<SocketAddr, std::net::AddrParseError> {
    std::env::var("JOINOPT_ADDR")
        .unwrap_or_else(|_| DEFAULT_ADDR.to_string())
        .parse()
}
