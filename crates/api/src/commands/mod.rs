//! Admin command handlers
//!
//! Every handler takes the shared [`AppContext`] as router state and
//! returns JSON. Errors are rendered by [`crate::error::ApiError`].

pub mod circuit_breakers;
pub mod degradation;
pub mod dlq;
pub mod health;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use crate::context::AppContext;

/// Build the `/admin` router over `context`
pub fn router(context: Arc<AppContext>) -> Router {
    Router::new()
        .route("/admin/circuit-breakers", get(circuit_breakers::list_breakers))
        .route("/admin/circuit-breakers/reset", post(circuit_breakers::reset_all_breakers))
        .route("/admin/circuit-breakers/{name}", get(circuit_breakers::get_breaker))
        .route("/admin/circuit-breakers/{name}/reset", post(circuit_breakers::reset_breaker))
        .route("/admin/degradation", get(degradation::get_status))
        .route("/admin/degradation/override", post(degradation::override_level))
        .route("/admin/dlq", get(dlq::list_messages).delete(dlq::clear_queue))
        .route("/admin/dlq/stats", get(dlq::get_stats))
        .route("/admin/dlq/process", post(dlq::process_batch))
        .route("/admin/dlq/{id}/retry", post(dlq::retry_message))
        .route("/admin/health", get(health::get_health))
        .route("/admin/health/check", post(health::run_check))
        .with_state(context)
}
