//! # HTTP Route Handlers
//!
//! Service-level endpoints. The join ordering endpoint lives in
//! [`join_graph`](crate::join_graph).

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;
use std::sync::Arc;

use crate::state::AppState;

/// GET /health
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
}

/// GET /rules: list active rules in application order.
///
/// These are the rules the optimizer applies to whole plans. The join graph
/// endpoint orders its graph directly and does not run them, so the listing
/// describes the rule set and the join ordering config it shares.
pub async fn list_rules(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(rules_response(&state))
}

fn rules_response(state: &AppState) -> RulesResponse {
    let rules = state
        .rule_registry
        .rules()
        .map(|r| RuleInfo {
            name: r.name().to_string(),
        })
        .collect();
    RulesResponse {
        rules,
        join_ordering_strategy: state.config.join_ordering.strategy.to_string(),
        dpsize_vertex_limit: state.config.join_ordering.dpsize_vertex_limit,
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RulesResponse {
    pub rules: Vec<RuleInfo>,
    pub join_ordering_strategy: String,
    pub dpsize_vertex_limit: usize,
}

#[derive(Serialize)]
pub struct RuleInfo {
    pub name: String,
}
