//! Best-effort substitutes for unavailable capabilities

use std::collections::HashMap;
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use futures::future::BoxFuture;
use innkeeper_domain::{
    DegradationLevel, FallbackKind, FallbackResponse, Intent, ServiceKind,
};
use parking_lot::RwLock;
use serde_json::{json, Value};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use super::ports::{DeferredWorkSink, FallbackHandler};
use crate::degradation::DegradationEngine;

const NO_FALLBACK_MESSAGE: &str = "service degraded, no fallback available";

/// Kind of database access that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseOperation {
    /// Reads can only be served by a registered handler
    Read,
    /// Writes are queued for replay
    Write,
}

fn default_responses() -> HashMap<Intent, String> {
    HashMap::from([
        (
            Intent::Greeting,
            "Hello! Thanks for reaching out. A member of our team will be with you shortly."
                .to_string(),
        ),
        (
            Intent::Apology,
            "We're sorry for the inconvenience. We're looking into this right away.".to_string(),
        ),
        (
            Intent::Escalation,
            "Your request has been passed to our front desk team, who will follow up with you."
                .to_string(),
        ),
        (
            Intent::GeneralHelp,
            "We've received your message and will reply as soon as possible.".to_string(),
        ),
        (
            Intent::Error,
            "Something went wrong on our side. Please try again in a few minutes.".to_string(),
        ),
        (
            Intent::Maintenance,
            "Our messaging assistant is temporarily limited. Please contact the front desk for urgent requests."
                .to_string(),
        ),
    ])
}

/// Replace `{key}` placeholders with string values from a JSON object
fn render(template: &str, context: &Value) -> String {
    let Some(fields) = context.as_object() else {
        return template.to_string();
    };
    fields.iter().fold(template.to_string(), |text, (key, value)| match value.as_str() {
        Some(value) => text.replace(&format!("{{{key}}}"), value),
        None => text,
    })
}

/// Produces fallback responses tagged with the current degradation level
pub struct FallbackProvider {
    engine: Arc<DegradationEngine>,
    responses: RwLock<HashMap<Intent, String>>,
    handlers: RwLock<HashMap<ServiceKind, Arc<dyn FallbackHandler>>>,
    sink: Option<Arc<dyn DeferredWorkSink>>,
}

impl std::fmt::Debug for FallbackProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FallbackProvider")
            .field("handlers", &self.handlers.read().keys().collect::<Vec<_>>())
            .field("has_sink", &self.sink.is_some())
            .finish_non_exhaustive()
    }
}

impl FallbackProvider {
    pub fn new(engine: Arc<DegradationEngine>) -> Self {
        Self {
            engine,
            responses: RwLock::new(default_responses()),
            handlers: RwLock::new(HashMap::new()),
            sink: None,
        }
    }

    /// Queue failed writes into `sink`
    pub fn with_sink(mut self, sink: Arc<dyn DeferredWorkSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Register (or replace) the handler for `service`
    pub fn register_handler(&self, service: ServiceKind, handler: Arc<dyn FallbackHandler>) {
        debug!(%service, "Registered fallback handler");
        self.handlers.write().insert(service, handler);
    }

    /// Replace the canned text for `intent`
    pub fn set_response(&self, intent: Intent, text: impl Into<String>) {
        self.responses.write().insert(intent, text.into());
    }

    fn level(&self) -> DegradationLevel {
        self.engine.current_level()
    }

    fn none_available(&self, service: ServiceKind) -> FallbackResponse {
        warn!(%service, "All fallbacks exhausted");
        FallbackResponse::new(false, Value::Null, self.level(), FallbackKind::NoneAvailable)
            .with_message(NO_FALLBACK_MESSAGE)
    }

    fn handler(&self, service: ServiceKind) -> Option<Arc<dyn FallbackHandler>> {
        self.handlers.read().get(&service).cloned()
    }

    /// Run `primary`, then `fallback`, then the registered handler
    ///
    /// The first success wins. `context` is handed to the registered
    /// handler.
    #[instrument(skip(self, context, primary, fallback), fields(service = %service))]
    pub async fn execute_with_fallback<E>(
        &self,
        service: ServiceKind,
        context: &Value,
        primary: impl Future<Output = Result<Value, E>>,
        fallback: Option<BoxFuture<'_, Result<Value, E>>>,
    ) -> FallbackResponse
    where
        E: Display,
    {
        match primary.await {
            Ok(data) => {
                return FallbackResponse::new(true, data, self.level(), FallbackKind::None);
            }
            Err(err) => warn!(error = %err, "Primary operation failed"),
        }

        if let Some(fallback) = fallback {
            match fallback.await {
                Ok(data) => {
                    return FallbackResponse::new(true, data, self.level(), FallbackKind::Custom);
                }
                Err(err) => warn!(error = %err, "Caller fallback failed"),
            }
        }

        if let Some(handler) = self.handler(service) {
            match handler.handle(context).await {
                Ok(data) => {
                    return FallbackResponse::new(
                        true,
                        data,
                        self.level(),
                        FallbackKind::RegisteredHandler,
                    );
                }
                Err(err) => warn!(error = %err, "Registered fallback handler failed"),
            }
        }

        self.none_available(service)
    }

    /// Canned reply for a conversation intent
    ///
    /// From `Severe` upward every intent gets the maintenance text.
    pub fn ai_fallback(&self, intent: Intent, context: &Value) -> FallbackResponse {
        let level = self.level();
        let effective = if level.is_severe_or_worse() { Intent::Maintenance } else { intent };

        let text = self
            .responses
            .read()
            .get(&effective)
            .map(|template| render(template, context))
            .unwrap_or_default();

        FallbackResponse::new(
            true,
            json!({ "response": text, "intent": effective }),
            level,
            FallbackKind::PredefinedResponse,
        )
    }

    /// Queue an outbound message for delivery after recovery
    pub async fn messaging_fallback(&self, payload: Value) -> FallbackResponse {
        self.queue(ServiceKind::Messaging, "send_message", payload).await
    }

    /// Queue writes, or serve reads from the registered database handler
    pub async fn database_fallback(
        &self,
        operation: DatabaseOperation,
        payload: Value,
    ) -> FallbackResponse {
        match operation {
            DatabaseOperation::Write => self.queue(ServiceKind::Database, "write", payload).await,
            DatabaseOperation::Read => {
                self.from_handler(ServiceKind::Database, &payload).await
            }
        }
    }

    /// Serve a cache lookup from the registered handler, or report a miss
    ///
    /// A miss is unsuccessful and uses no fallback path; callers go to the
    /// source of truth.
    pub async fn cache_fallback(&self, key: &str) -> FallbackResponse {
        if self.handler(ServiceKind::Cache).is_some() {
            return self.from_handler(ServiceKind::Cache, &json!({ "key": key })).await;
        }

        debug!(key, "Cache unavailable, reporting a miss");
        FallbackResponse::new(
            false,
            json!({ "key": key, "hit": false }),
            self.level(),
            FallbackKind::None,
        )
        .with_message("cache unavailable, treated as a miss")
    }

    async fn from_handler(&self, service: ServiceKind, context: &Value) -> FallbackResponse {
        if let Some(handler) = self.handler(service) {
            match handler.handle(context).await {
                Ok(data) => {
                    return FallbackResponse::new(
                        true,
                        data,
                        self.level(),
                        FallbackKind::RegisteredHandler,
                    );
                }
                Err(err) => warn!(%service, error = %err, "Registered fallback handler failed"),
            }
        }
        self.none_available(service)
    }

    async fn queue(&self, service: ServiceKind, operation: &str, payload: Value) -> FallbackResponse {
        let Some(sink) = &self.sink else {
            return self.none_available(service);
        };

        let id = Uuid::new_v4().to_string();
        let envelope = json!({
            "id": id,
            "queued_at": Utc::now(),
            "service": service,
            "operation": operation,
            "payload": payload,
        });

        match sink.defer(service, envelope).await {
            Ok(stored_id) => {
                debug!(%service, %id, %stored_id, "Deferred work for later replay");
                FallbackResponse::new(
                    true,
                    json!({ "queued": true, "id": id, "stored_id": stored_id }),
                    self.level(),
                    FallbackKind::Queue,
                )
                .with_message(format!("{service} unavailable, request queued for retry"))
            }
            Err(err) => {
                warn!(%service, error = %err, "Failed to defer work");
                self.none_available(service)
            }
        }
    }
}
