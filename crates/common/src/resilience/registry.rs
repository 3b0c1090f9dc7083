//! Named circuit breaker registry
//!
//! One breaker per protected dependency, created lazily on first access and
//! shared afterwards. The registry is an ordinary value: construct it once at
//! startup and inject it where breakers are needed.

use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;
use tracing::{debug, info};

use super::circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerSnapshot, CircuitState, ConfigResult,
    SharedClock, SystemClock,
};

/// Counts of breakers per state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RegistrySummary {
    pub total: usize,
    pub closed: usize,
    pub open: usize,
    pub half_open: usize,
}

/// Concurrent map from dependency name to its circuit breaker
pub struct CircuitBreakerRegistry {
    breakers: DashMap<String, Arc<CircuitBreaker>>,
    default_config: CircuitBreakerConfig,
    clock: SharedClock,
}

impl std::fmt::Debug for CircuitBreakerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreakerRegistry")
            .field("breakers", &self.names())
            .field("default_config", &self.default_config)
            .finish_non_exhaustive()
    }
}

impl Default for CircuitBreakerRegistry {
    fn default() -> Self {
        Self {
            breakers: DashMap::new(),
            default_config: CircuitBreakerConfig::default(),
            clock: Arc::new(SystemClock),
        }
    }
}

impl CircuitBreakerRegistry {
    /// Create a registry whose lazily created breakers use `default_config`
    pub fn new(default_config: CircuitBreakerConfig) -> ConfigResult<Self> {
        Self::with_clock(default_config, Arc::new(SystemClock))
    }

    /// Create a registry whose breakers read time from `clock`
    pub fn with_clock(default_config: CircuitBreakerConfig, clock: SharedClock) -> ConfigResult<Self> {
        default_config.validate()?;
        Ok(Self { breakers: DashMap::new(), default_config, clock })
    }

    /// Default configuration for breakers created without one
    pub fn default_config(&self) -> &CircuitBreakerConfig {
        &self.default_config
    }

    /// Get the breaker for `name`, creating it on first access
    ///
    /// `config` only applies when the breaker does not exist yet; an existing
    /// breaker keeps the configuration it was created with.
    pub fn get_or_create(
        &self,
        name: &str,
        config: Option<CircuitBreakerConfig>,
    ) -> ConfigResult<Arc<CircuitBreaker>> {
        if let Some(existing) = self.breakers.get(name) {
            return Ok(Arc::clone(existing.value()));
        }

        let config = config.unwrap_or_else(|| self.default_config.clone());
        let breaker = CircuitBreaker::with_clock(name, config, Arc::clone(&self.clock))?;

        // A concurrent creator may have won the race; keep whichever landed first.
        let entry = self.breakers.entry(name.to_string()).or_insert_with(|| {
            debug!(breaker = name, "Registered circuit breaker");
            Arc::new(breaker)
        });
        Ok(Arc::clone(entry.value()))
    }

    /// Get an existing breaker
    pub fn get(&self, name: &str) -> Option<Arc<CircuitBreaker>> {
        self.breakers.get(name).map(|entry| Arc::clone(entry.value()))
    }

    /// Names of all registered breakers, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.breakers.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Snapshot of every breaker, sorted by name
    pub fn snapshots(&self) -> Vec<CircuitBreakerSnapshot> {
        let mut snapshots: Vec<_> = self.breakers.iter().map(|e| e.value().snapshot()).collect();
        snapshots.sort_by(|a, b| a.name.cmp(&b.name));
        snapshots
    }

    /// Count breakers per state
    pub fn summary(&self) -> RegistrySummary {
        self.breakers.iter().fold(RegistrySummary::default(), |mut summary, entry| {
            summary.total += 1;
            match entry.value().state() {
                CircuitState::Closed => summary.closed += 1,
                CircuitState::Open => summary.open += 1,
                CircuitState::HalfOpen => summary.half_open += 1,
            }
            summary
        })
    }

    /// Number of breakers currently open
    pub fn open_count(&self) -> usize {
        self.breakers.iter().filter(|e| e.value().state() == CircuitState::Open).count()
    }

    /// Names of breakers currently open
    pub fn open_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .breakers
            .iter()
            .filter(|e| e.value().state() == CircuitState::Open)
            .map(|e| e.key().clone())
            .collect();
        names.sort();
        names
    }

    /// Reset one breaker; returns false when no breaker has that name
    pub fn reset(&self, name: &str) -> bool {
        match self.get(name) {
            Some(breaker) => {
                breaker.reset();
                true
            }
            None => false,
        }
    }

    /// Reset every registered breaker
    pub fn reset_all(&self) {
        let count = self.breakers.len();
        for entry in &self.breakers {
            entry.value().reset();
        }
        info!(count, "Reset all circuit breakers");
    }
}
