//! Degradation status and manual override

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use innkeeper_domain::{DegradationLevel, DegradationStatus};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;

use crate::context::AppContext;

#[derive(Debug, Deserialize)]
pub struct OverrideRequest {
    pub level: DegradationLevel,
    #[serde(default = "default_reason")]
    pub reason: String,
}

fn default_reason() -> String {
    "manual override".to_string()
}

pub async fn get_status(State(ctx): State<Arc<AppContext>>) -> Json<DegradationStatus> {
    Json(ctx.degradation.status())
}

/// Force a level; the next evaluation may move it again
pub async fn override_level(
    State(ctx): State<Arc<AppContext>>,
    Json(request): Json<OverrideRequest>,
) -> Json<Value> {
    warn!(level = %request.level, reason = %request.reason, "Degradation level overridden");
    let event = ctx.degradation.set_level(request.level, request.reason);
    Json(json!({
        "level": ctx.degradation.current_level(),
        "changed": event.is_some(),
        "event": event,
    }))
}
