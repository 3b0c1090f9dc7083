//! Dead-letter queue administration

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use innkeeper_domain::{BatchReport, DlqPage, DlqStats};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::context::AppContext;
use crate::error::ApiResult;

const DEFAULT_PAGE_SIZE: usize = 50;
const MAX_PAGE_SIZE: usize = 500;

#[derive(Debug, Deserialize)]
pub struct ListParams {
    #[serde(default)]
    pub offset: usize,
    pub limit: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProcessRequest {
    pub batch_size: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct ClearParams {
    #[serde(default)]
    pub confirm: bool,
}

pub async fn list_messages(
    State(ctx): State<Arc<AppContext>>,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<DlqPage>> {
    let limit = params.limit.unwrap_or(DEFAULT_PAGE_SIZE).min(MAX_PAGE_SIZE);
    Ok(Json(ctx.dlq.list_page(params.offset, limit).await?))
}

pub async fn get_stats(State(ctx): State<Arc<AppContext>>) -> ApiResult<Json<DlqStats>> {
    Ok(Json(ctx.dlq.stats().await?))
}

pub async fn retry_message(
    State(ctx): State<Arc<AppContext>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let success = ctx.dlq.retry(&id).await?;
    info!(%id, success, "Manual dead-letter retry");
    Ok(Json(json!({ "id": id, "success": success })))
}

/// Retry up to `batch_size` messages; defaults to `dlq.batch_size`
pub async fn process_batch(
    State(ctx): State<Arc<AppContext>>,
    Json(request): Json<ProcessRequest>,
) -> ApiResult<Json<BatchReport>> {
    let batch_size = request.batch_size.unwrap_or(ctx.config.dlq.batch_size);
    Ok(Json(ctx.dlq.process_batch(batch_size).await?))
}

/// Remove every active message; requires `?confirm=true`
pub async fn clear_queue(
    State(ctx): State<Arc<AppContext>>,
    Query(params): Query<ClearParams>,
) -> ApiResult<Json<Value>> {
    let cleared = ctx.dlq.clear(params.confirm).await?;
    warn!(cleared, "Dead-letter queue cleared by administrator");
    Ok(Json(json!({ "cleared": cleared })))
}
