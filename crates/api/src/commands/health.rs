//! Dependency health

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use innkeeper_core::SystemHealth;
use innkeeper_domain::DependencySummary;
use serde::Serialize;

use crate::context::AppContext;

#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub summary: DependencySummary,
    /// `None` until the first monitoring cycle completes
    pub last_check: Option<SystemHealth>,
}

pub async fn get_health(State(ctx): State<Arc<AppContext>>) -> Json<HealthReport> {
    Json(HealthReport { summary: ctx.monitor.summary(), last_check: ctx.monitor.last_health() })
}

pub async fn run_check(State(ctx): State<Arc<AppContext>>) -> Json<SystemHealth> {
    Json(ctx.monitor.run_cycle().await)
}
