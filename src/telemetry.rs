//! Counter and outcome recording.
//!
//! Logs and counters stay separate: `tracing` carries structured logs, this
//! trait carries the stable counter names monitoring is built on.

use std::collections::BTreeMap;
use std::sync::Mutex;

/// Recording surface for matcher telemetry.
///
/// Counter names are part of the crate's observable contract; callers build
/// them with the event-kind and label strings baked in.
pub trait Telemetry: Send + Sync {
    /// Bump a counter by one.
    fn record_hit(&self, name: &str);

    /// Record a measured value (a gap time, a price) under a name.
    fn record_outcome(&self, value: f64, name: &str);

    /// Record a recoverable error within a scope.
    fn record_error(&self, scope: &str, message: &str);
}

/// Telemetry sink that drops everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullTelemetry;

impl Telemetry for NullTelemetry {
    fn record_hit(&self, _name: &str) {}

    fn record_outcome(&self, _value: f64, _name: &str) {}

    fn record_error(&self, _scope: &str, _message: &str) {}
}

/// In-memory accumulator: counters, outcome series, and errors, queryable
/// after the fact. Used by the replay driver and throughout the tests.
#[derive(Debug, Default)]
pub struct StatsRegistry {
    hits: Mutex<BTreeMap<String, u64>>,
    outcomes: Mutex<BTreeMap<String, Vec<f64>>>,
    errors: Mutex<Vec<(String, String)>>,
}

impl StatsRegistry {
    pub fn new() -> Self {
        StatsRegistry::default()
    }

    pub fn hit_count(&self, name: &str) -> u64 {
        self.hits
            .lock()
            .expect("stats lock poisoned")
            .get(name)
            .copied()
            .unwrap_or(0)
    }

    pub fn outcome_values(&self, name: &str) -> Vec<f64> {
        self.outcomes
            .lock()
            .expect("stats lock poisoned")
            .get(name)
            .cloned()
            .unwrap_or_default()
    }

    pub fn errors(&self) -> Vec<(String, String)> {
        self.errors.lock().expect("stats lock poisoned").clone()
    }

    /// All counters in name order, for dumps.
    pub fn hits_snapshot(&self) -> Vec<(String, u64)> {
        self.hits
            .lock()
            .expect("stats lock poisoned")
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect()
    }
}

impl Telemetry for StatsRegistry {
    fn record_hit(&self, name: &str) {
        *self
            .hits
            .lock()
            .expect("stats lock poisoned")
            .entry(name.to_string())
            .or_insert(0) += 1;
    }

    fn record_outcome(&self, value: f64, name: &str) {
        self.outcomes
            .lock()
            .expect("stats lock poisoned")
            .entry(name.to_string())
            .or_default()
            .push(value);
    }

    fn record_error(&self, scope: &str, message: &str) {
        self.errors
            .lock()
            .expect("stats lock poisoned")
            .push((scope.to_string(), message.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hits_accumulate_per_name() {
        let stats = StatsRegistry::new();
        stats.record_hit("processedWin");
        stats.record_hit("processedWin");
        stats.record_hit("processedLoss");

        assert_eq!(stats.hit_count("processedWin"), 2);
        assert_eq!(stats.hit_count("processedLoss"), 1);
        assert_eq!(stats.hit_count("missing"), 0);
    }

    #[test]
    fn outcomes_keep_every_value() {
        let stats = StatsRegistry::new();
        stats.record_outcome(12.5, "gapMs");
        stats.record_outcome(80.0, "gapMs");

        assert_eq!(stats.outcome_values("gapMs"), vec![12.5, 80.0]);
    }

    #[test]
    fn errors_keep_scope_and_message() {
        let stats = StatsRegistry::new();
        stats.record_error("doBidResult.adSpotIdNotFound", "spot s9 not in auction a1");

        let errors = stats.errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].0, "doBidResult.adSpotIdNotFound");
    }

    #[test]
    fn null_telemetry_is_silent() {
        // Just exercising the impl; nothing observable.
        NullTelemetry.record_hit("x");
        NullTelemetry.record_outcome(1.0, "x");
        NullTelemetry.record_error("x", "y");
    }
}
