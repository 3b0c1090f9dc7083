//! Circuit breaker inspection and reset

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use innkeeper_common::resilience::{CircuitBreakerSnapshot, RegistrySummary};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::info;

use crate::context::AppContext;
use crate::error::{ApiError, ApiResult};

#[derive(Debug, Serialize)]
pub struct BreakerListing {
    pub summary: RegistrySummary,
    pub breakers: Vec<CircuitBreakerSnapshot>,
}

pub async fn list_breakers(State(ctx): State<Arc<AppContext>>) -> Json<BreakerListing> {
    Json(BreakerListing { summary: ctx.breakers.summary(), breakers: ctx.breakers.snapshots() })
}

pub async fn get_breaker(
    State(ctx): State<Arc<AppContext>>,
    Path(name): Path<String>,
) -> ApiResult<Json<CircuitBreakerSnapshot>> {
    ctx.breakers
        .get(&name)
        .map(|breaker| Json(breaker.snapshot()))
        .ok_or_else(|| ApiError::NotFound(format!("circuit breaker '{name}'")))
}

pub async fn reset_breaker(
    State(ctx): State<Arc<AppContext>>,
    Path(name): Path<String>,
) -> ApiResult<Json<Value>> {
    if !ctx.breakers.reset(&name) {
        return Err(ApiError::NotFound(format!("circuit breaker '{name}'")));
    }
    info!(breaker = %name, "Circuit breaker reset by administrator");
    Ok(Json(json!({ "name": name, "reset": true })))
}

pub async fn reset_all_breakers(State(ctx): State<Arc<AppContext>>) -> Json<Value> {
    let count = ctx.breakers.names().len();
    ctx.breakers.reset_all();
    info!(count, "All circuit breakers reset by administrator");
    Json(json!({ "reset": count }))
}
