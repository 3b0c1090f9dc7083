//! Degradation rules and the built-in rule set

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use innkeeper_common::resilience::CircuitBreakerRegistry;
use innkeeper_domain::{DegradationLevel, MANUAL_OVERRIDE_RULE, RECOVERY_RULE};

use super::{DegradationError, DegradationResult};

/// Side-effect-free condition evaluated on every cycle
pub trait RuleCondition: Send + Sync {
    /// Whether the condition currently holds
    fn check(&self) -> DegradationResult<bool>;
}

impl<F> RuleCondition for F
where
    F: Fn() -> DegradationResult<bool> + Send + Sync,
{
    fn check(&self) -> DegradationResult<bool> {
        self()
    }
}

/// Current process or host memory usage
pub trait MemoryGauge: Send + Sync {
    /// Used memory as a percentage in `0.0..=100.0`
    fn usage_percent(&self) -> DegradationResult<f64>;
}

/// A named condition that raises the system to `target_level` while it holds
#[derive(Clone)]
pub struct DegradationRule {
    name: String,
    target_level: DegradationLevel,
    priority: i32,
    cooldown: Duration,
    condition: Arc<dyn RuleCondition>,
}

impl fmt::Debug for DegradationRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DegradationRule")
            .field("name", &self.name)
            .field("target_level", &self.target_level)
            .field("priority", &self.priority)
            .field("cooldown", &self.cooldown)
            .finish_non_exhaustive()
    }
}

impl DegradationRule {
    /// Create a rule; names must be non-empty and not collide with the
    /// reserved event names
    pub fn new(
        name: impl Into<String>,
        target_level: DegradationLevel,
        priority: i32,
        cooldown: Duration,
        condition: impl RuleCondition + 'static,
    ) -> DegradationResult<Self> {
        let name = name.into();
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(DegradationError::InvalidRule { message: "rule name is empty".into() });
        }
        if trimmed == MANUAL_OVERRIDE_RULE || trimmed == RECOVERY_RULE {
            return Err(DegradationError::InvalidRule {
                message: format!("rule name '{trimmed}' is reserved"),
            });
        }
        if target_level == DegradationLevel::Normal {
            return Err(DegradationError::InvalidRule {
                message: format!("rule '{trimmed}' must target a level above normal"),
            });
        }

        Ok(Self {
            name: trimmed.to_string(),
            target_level,
            priority,
            cooldown,
            condition: Arc::new(condition),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn target_level(&self) -> DegradationLevel {
        self.target_level
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    pub(crate) fn check(&self) -> DegradationResult<bool> {
        self.condition.check()
    }
}

//==============================================================================
// Built-in rules
//==============================================================================

/// Fires when at least `threshold` circuit breakers are open
pub fn multiple_circuits_open(
    registry: Arc<CircuitBreakerRegistry>,
    threshold: usize,
    cooldown: Duration,
) -> DegradationResult<DegradationRule> {
    DegradationRule::new(
        "multiple_circuits_open",
        DegradationLevel::Moderate,
        90,
        cooldown,
        move || Ok(registry.open_count() >= threshold),
    )
}

/// Fires when any breaker named in `critical` is open
pub fn critical_service_down(
    registry: Arc<CircuitBreakerRegistry>,
    critical: Vec<String>,
    cooldown: Duration,
) -> DegradationResult<DegradationRule> {
    DegradationRule::new("critical_service_down", DegradationLevel::Severe, 100, cooldown, move || {
        let open = registry.open_names();
        Ok(critical.iter().any(|name| open.contains(name)))
    })
}

/// Fires when memory usage exceeds `threshold_percent`
pub fn high_memory_usage(
    gauge: Arc<dyn MemoryGauge>,
    threshold_percent: f64,
    cooldown: Duration,
) -> DegradationResult<DegradationRule> {
    DegradationRule::new("high_memory_usage", DegradationLevel::Minor, 50, cooldown, move || {
        Ok(gauge.usage_percent()? > threshold_percent)
    })
}

/// Fires when at least two breakers with enough samples fail more than half
/// of their windowed calls
pub fn high_failure_rate(
    registry: Arc<CircuitBreakerRegistry>,
    cooldown: Duration,
) -> DegradationResult<DegradationRule> {
    DegradationRule::new("high_failure_rate", DegradationLevel::Minor, 40, cooldown, move || {
        let failing = registry
            .snapshots()
            .iter()
            .filter(|s| s.has_sufficient_samples && s.window_failure_rate > 0.5)
            .count();
        Ok(failing >= 2)
    })
}

/// The four built-in rules sharing one registry
pub fn default_rules(
    registry: &Arc<CircuitBreakerRegistry>,
    gauge: Arc<dyn MemoryGauge>,
    critical_breakers: Vec<String>,
    memory_threshold_percent: f64,
    cooldown: Duration,
) -> DegradationResult<Vec<DegradationRule>> {
    Ok(vec![
        critical_service_down(Arc::clone(registry), critical_breakers, cooldown)?,
        multiple_circuits_open(Arc::clone(registry), 2, cooldown)?,
        high_memory_usage(gauge, memory_threshold_percent, cooldown)?,
        high_failure_rate(Arc::clone(registry), cooldown)?,
    ])
}
