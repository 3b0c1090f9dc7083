//! Fallback responses returned while a capability is degraded

use serde::{Deserialize, Serialize};

use super::degradation::DegradationLevel;
use crate::impl_domain_status_conversions;

/// Capability a fallback stands in for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceKind {
    Ai,
    Messaging,
    Database,
    Cache,
}

impl_domain_status_conversions!(ServiceKind {
    Ai => "ai",
    Messaging => "messaging",
    Database => "database",
    Cache => "cache",
});

/// Conversation intent used to pick a canned reply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Greeting,
    Apology,
    Escalation,
    GeneralHelp,
    Error,
    Maintenance,
}

impl_domain_status_conversions!(Intent {
    Greeting => "greeting",
    Apology => "apology",
    Escalation => "escalation",
    GeneralHelp => "general_help",
    Error => "error",
    Maintenance => "maintenance",
});

/// Which path produced a response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackKind {
    /// The primary operation succeeded
    None,
    /// The caller-supplied fallback
    Custom,
    /// A handler registered for the service
    RegisteredHandler,
    /// Canned text
    PredefinedResponse,
    /// Deferred to the dead-letter queue
    Queue,
    /// Nothing worked
    NoneAvailable,
}

impl_domain_status_conversions!(FallbackKind {
    None => "none",
    Custom => "custom",
    RegisteredHandler => "registered_handler",
    PredefinedResponse => "predefined_response",
    Queue => "queue",
    NoneAvailable => "none_available",
});

/// Best-effort response tagged with how it was produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FallbackResponse {
    pub success: bool,
    pub data: serde_json::Value,
    pub level: DegradationLevel,
    pub fallback_used: FallbackKind,
    pub message: Option<String>,
}

impl FallbackResponse {
    pub fn new(
        success: bool,
        data: serde_json::Value,
        level: DegradationLevel,
        fallback_used: FallbackKind,
    ) -> Self {
        Self { success, data, level, fallback_used, message: None }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}
