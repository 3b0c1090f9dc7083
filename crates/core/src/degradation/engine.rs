//! Rule evaluation and the process-wide degradation level

use std::collections::{HashMap, VecDeque};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use innkeeper_common::resilience::{SharedClock, SystemClock};
use innkeeper_domain::{
    DegradationEvent, DegradationLevel, DegradationStatus, DEFAULT_DEGRADATION_HISTORY,
    MANUAL_OVERRIDE_RULE, RECOVERY_RULE,
};
use parking_lot::{Mutex, RwLock};
use tokio::sync::broadcast;
use tracing::{debug, error, info, instrument, warn};

use super::rules::DegradationRule;
use super::{DegradationError, DegradationResult};

const EVENT_CHANNEL_CAPACITY: usize = 64;
const RECENT_EVENTS_IN_STATUS: usize = 10;

struct EngineState {
    level: DegradationLevel,
    last_activation: HashMap<String, Instant>,
    active_rules: Vec<String>,
    history: VecDeque<DegradationEvent>,
}

/// Evaluates degradation rules and owns the current level
pub struct DegradationEngine {
    rules: RwLock<Vec<DegradationRule>>,
    state: Mutex<EngineState>,
    history_size: usize,
    clock: SharedClock,
    events: broadcast::Sender<DegradationEvent>,
}

impl std::fmt::Debug for DegradationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DegradationEngine")
            .field("level", &self.current_level())
            .field("rule_count", &self.rules.read().len())
            .finish_non_exhaustive()
    }
}

impl Default for DegradationEngine {
    fn default() -> Self {
        Self::new(DEFAULT_DEGRADATION_HISTORY)
    }
}

impl DegradationEngine {
    /// Create an engine at `Normal` keeping at most `history_size` events
    pub fn new(history_size: usize) -> Self {
        Self::with_clock(history_size, Arc::new(SystemClock))
    }

    pub fn with_clock(history_size: usize, clock: SharedClock) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            rules: RwLock::new(Vec::new()),
            state: Mutex::new(EngineState {
                level: DegradationLevel::Normal,
                last_activation: HashMap::new(),
                active_rules: Vec::new(),
                history: VecDeque::new(),
            }),
            history_size: history_size.max(1),
            clock,
            events,
        }
    }

    /// Add a rule; names must be unique
    pub fn register_rule(&self, rule: DegradationRule) -> DegradationResult<()> {
        let mut rules = self.rules.write();
        if rules.iter().any(|existing| existing.name() == rule.name()) {
            return Err(DegradationError::DuplicateRule { name: rule.name().to_string() });
        }

        debug!(rule = rule.name(), level = %rule.target_level(), "Registered degradation rule");
        rules.push(rule);
        // Stable sort keeps registration order among equal priorities.
        rules.sort_by(|a, b| b.priority().cmp(&a.priority()));
        Ok(())
    }

    /// Rule names in evaluation order
    pub fn rule_names(&self) -> Vec<String> {
        self.rules.read().iter().map(|r| r.name().to_string()).collect()
    }

    pub fn current_level(&self) -> DegradationLevel {
        self.state.lock().level
    }

    /// Run every rule once and update the level
    ///
    /// Returns the new level when it changed.
    #[instrument(skip(self))]
    pub fn evaluate(&self) -> Option<DegradationLevel> {
        let now = self.clock.now();
        let rules = self.rules.read().clone();

        // Rules that fired this cycle, and rules still holding from an earlier activation.
        let mut fired: Vec<&DegradationRule> = Vec::new();
        let mut active: Vec<&DegradationRule> = Vec::new();
        for rule in &rules {
            let cooling = self
                .state
                .lock()
                .last_activation
                .get(rule.name())
                .is_some_and(|at| now.saturating_duration_since(*at) < rule.cooldown());
            if cooling {
                debug!(rule = rule.name(), "Rule in cooldown holds its level");
                active.push(rule);
                continue;
            }

            match catch_unwind(AssertUnwindSafe(|| rule.check())) {
                Ok(Ok(true)) => {
                    fired.push(rule);
                    active.push(rule);
                }
                Ok(Ok(false)) => {}
                Ok(Err(err)) => {
                    warn!(rule = rule.name(), error = %err, "Degradation rule check failed");
                }
                Err(_) => error!(rule = rule.name(), "Degradation rule check panicked"),
            }
        }

        let mut state = self.state.lock();
        for rule in &fired {
            state.last_activation.insert(rule.name().to_string(), now);
        }
        state.active_rules = active.iter().map(|r| r.name().to_string()).collect();

        // First rule at the highest target wins, which is the highest priority one.
        let top = active.iter().copied().fold(None::<&DegradationRule>, |best, rule| match best {
            Some(b) if b.target_level() >= rule.target_level() => Some(b),
            _ => Some(rule),
        });

        match top {
            Some(rule) if rule.target_level() != state.level => {
                let reason = format!("Rule '{}' triggered", rule.name());
                self.transition(&mut state, rule.name(), rule.target_level(), reason);
                Some(rule.target_level())
            }
            Some(_) => None,
            None if state.level > DegradationLevel::Normal => {
                let next = state.level.step_down();
                self.transition(&mut state, RECOVERY_RULE, next, "No degradation rules active".into());
                Some(next)
            }
            None => None,
        }
    }

    /// Force the level regardless of rules
    ///
    /// The next evaluation may change it again.
    pub fn set_level(
        &self,
        level: DegradationLevel,
        reason: impl Into<String>,
    ) -> Option<DegradationEvent> {
        let mut state = self.state.lock();
        if state.level == level {
            return None;
        }
        Some(self.transition(&mut state, MANUAL_OVERRIDE_RULE, level, reason.into()))
    }

    /// Level, last firing rules and recent events
    pub fn status(&self) -> DegradationStatus {
        let rule_count = self.rules.read().len();
        let state = self.state.lock();
        let skip = state.history.len().saturating_sub(RECENT_EVENTS_IN_STATUS);
        DegradationStatus {
            level: state.level,
            active_rules: state.active_rules.clone(),
            rule_count,
            recent_events: state.history.iter().skip(skip).cloned().collect(),
        }
    }

    /// The most recent `limit` events, oldest first
    pub fn history(&self, limit: usize) -> Vec<DegradationEvent> {
        let state = self.state.lock();
        let skip = state.history.len().saturating_sub(limit);
        state.history.iter().skip(skip).cloned().collect()
    }

    /// Receive every level change as it happens
    pub fn subscribe(&self) -> broadcast::Receiver<DegradationEvent> {
        self.events.subscribe()
    }

    fn transition(
        &self,
        state: &mut EngineState,
        rule: &str,
        new_level: DegradationLevel,
        reason: String,
    ) -> DegradationEvent {
        let event = DegradationEvent {
            timestamp: DateTime::<Utc>::from(self.clock.system_time()),
            rule: rule.to_string(),
            old_level: state.level,
            new_level,
            reason,
        };

        if new_level > state.level {
            warn!(from = %state.level, to = %new_level, rule, "Degradation level raised");
        } else {
            info!(from = %state.level, to = %new_level, rule, "Degradation level lowered");
        }

        state.level = new_level;
        state.history.push_back(event.clone());
        while state.history.len() > self.history_size {
            state.history.pop_front();
        }
        // No subscribers is fine.
        let _ = self.events.send(event.clone());
        event
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    use innkeeper_common::resilience::MockClock;

    use super::*;

    fn flag_rule(
        name: &str,
        level: DegradationLevel,
        priority: i32,
        cooldown: Duration,
        flag: &Arc<AtomicBool>,
    ) -> DegradationRule {
        let flag = Arc::clone(flag);
        DegradationRule::new(name, level, priority, cooldown, move || Ok(flag.load(Ordering::SeqCst)))
            .unwrap()
    }

    fn engine() -> (DegradationEngine, MockClock) {
        let clock = MockClock::new();
        (DegradationEngine::with_clock(100, Arc::new(clock.clone())), clock)
    }

    /// Validates the level rises to the highest firing target and steps down
    /// one level per evaluation once nothing fires.
    ///
    /// Assertions:
    /// - Confirms the jump from normal straight to severe.
    /// - Confirms the step-down sequence severe, moderate, minor, normal.
    /// - Confirms recovery events use the `recovery` rule name.
    #[test]
    fn test_raise_then_step_down() {
        let (engine, _clock) = engine();
        let minor = Arc::new(AtomicBool::new(true));
        let severe = Arc::new(AtomicBool::new(true));
        engine
            .register_rule(flag_rule("minor", DegradationLevel::Minor, 10, Duration::ZERO, &minor))
            .unwrap();
        engine
            .register_rule(flag_rule("severe", DegradationLevel::Severe, 5, Duration::ZERO, &severe))
            .unwrap();

        assert_eq!(engine.evaluate(), Some(DegradationLevel::Severe));
        assert_eq!(engine.evaluate(), None);
        assert_eq!(engine.status().active_rules, vec!["minor".to_string(), "severe".to_string()]);

        minor.store(false, Ordering::SeqCst);
        severe.store(false, Ordering::SeqCst);
        let steps: Vec<_> = (0..4).filter_map(|_| engine.evaluate()).collect();
        assert_eq!(
            steps,
            vec![
                DegradationLevel::Moderate,
                DegradationLevel::Minor,
                DegradationLevel::Normal,
            ]
        );

        let history = engine.history(10);
        assert_eq!(history.len(), 4);
        assert_eq!(history[0].rule, "severe");
        assert!(history[1..].iter().all(|e| e.rule == RECOVERY_RULE));
    }

    /// Validates failing and panicking rules count as not fired.
    #[test]
    fn test_faulty_rules_are_isolated() {
        let (engine, _clock) = engine();
        engine
            .register_rule(
                DegradationRule::new("erroring", DegradationLevel::Critical, 1, Duration::ZERO, || {
                    Err(DegradationError::Condition { message: "boom".into() })
                })
                .unwrap(),
            )
            .unwrap();
        engine
            .register_rule(
                DegradationRule::new(
                    "panicking",
                    DegradationLevel::Critical,
                    2,
                    Duration::ZERO,
                    || -> DegradationResult<bool> { panic!("rule bug") },
                )
                .unwrap(),
            )
            .unwrap();

        assert_eq!(engine.evaluate(), None);
        assert_eq!(engine.current_level(), DegradationLevel::Normal);
    }

    /// Validates a firing rule changes the level once per cooldown window.
    ///
    /// Assertions:
    /// - Confirms the second evaluation inside the cooldown changes nothing.
    /// - Confirms the rule stays listed as active while it holds.
    /// - Confirms recovery starts only after the cooldown has elapsed.
    #[test]
    fn test_cooldown_holds_level() {
        let (engine, clock) = engine();
        let flag = Arc::new(AtomicBool::new(true));
        engine
            .register_rule(flag_rule(
                "moderate",
                DegradationLevel::Moderate,
                1,
                Duration::from_secs(60),
                &flag,
            ))
            .unwrap();

        assert_eq!(engine.evaluate(), Some(DegradationLevel::Moderate));
        clock.advance(Duration::from_secs(5));
        assert_eq!(engine.evaluate(), None);
        assert_eq!(engine.current_level(), DegradationLevel::Moderate);
        assert_eq!(engine.history(10).len(), 1);
        assert_eq!(engine.status().active_rules, vec!["moderate".to_string()]);

        flag.store(false, Ordering::SeqCst);
        clock.advance(Duration::from_secs(10));
        assert_eq!(engine.evaluate(), None);

        clock.advance(Duration::from_secs(60));
        assert_eq!(engine.evaluate(), Some(DegradationLevel::Minor));
        assert!(engine.status().active_rules.is_empty());
    }

    #[test]
    fn test_duplicate_rule_rejected() {
        let (engine, _clock) = engine();
        let flag = Arc::new(AtomicBool::new(false));
        engine
            .register_rule(flag_rule("dup", DegradationLevel::Minor, 1, Duration::ZERO, &flag))
            .unwrap();
        let err = engine
            .register_rule(flag_rule("dup", DegradationLevel::Severe, 2, Duration::ZERO, &flag))
            .unwrap_err();
        assert_eq!(err, DegradationError::DuplicateRule { name: "dup".into() });
        assert_eq!(engine.rule_names(), vec!["dup".to_string()]);
    }

    /// Validates manual overrides, the bounded history and event broadcast.
    #[test]
    fn test_manual_override_and_history_bound() {
        let engine = DegradationEngine::with_clock(3, Arc::new(MockClock::new()));
        let mut events = engine.subscribe();

        let event = engine.set_level(DegradationLevel::Critical, "maintenance window").unwrap();
        assert_eq!(event.rule, MANUAL_OVERRIDE_RULE);
        assert_eq!(events.try_recv().unwrap().new_level, DegradationLevel::Critical);
        assert!(engine.set_level(DegradationLevel::Critical, "again").is_none());

        for _ in 0..4 {
            engine.evaluate();
        }
        assert_eq!(engine.current_level(), DegradationLevel::Normal);
        assert_eq!(engine.history(100).len(), 3);
        assert_eq!(engine.status().recent_events.len(), 3);
    }
}
