//! Planner configuration.
//!
//! All times are in milliseconds relative to a scheduling epoch (t=0),
//! the same convention the machine and job records use.

use serde::{Deserialize, Serialize};

use crate::models::{JobSignature, MachineSetup};

/// Milliseconds in one day, for building day-based horizons.
pub const DAY_MS: i64 = 24 * 60 * 60 * 1000;

/// Backlog policy applied to every machine queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DispatchThreshold {
    /// At most this many jobs per machine.
    Count(usize),
    /// Only jobs starting before `start + horizon_ms` stay queued.
    Horizon { horizon_ms: i64 },
}

/// Changeover costs charged before a job whose tooling differs from the job
/// the machine ran before it. Costs of every changed part add up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SetupTimes {
    /// Recipe (bonding diagram) change (ms).
    pub recipe_change_ms: i64,
    /// Tool kind change (ms).
    pub tool_change_ms: i64,
    /// Wire kind change (ms).
    pub wire_change_ms: i64,
}

impl SetupTimes {
    pub fn new(recipe_change_ms: i64, tool_change_ms: i64, wire_change_ms: i64) -> Self {
        Self {
            recipe_change_ms,
            tool_change_ms,
            wire_change_ms,
        }
    }

    /// Setup before running `next` after `previous`. A machine with no known
    /// previous tooling pays nothing.
    pub fn between(&self, previous: Option<&MachineSetup>, next: &JobSignature) -> i64 {
        let Some(previous) = previous else {
            return 0;
        };
        let mut total = 0;
        if previous.recipe != next.recipe {
            total += self.recipe_change_ms;
        }
        if previous.part_no != next.part_no {
            total += self.tool_change_ms;
        }
        if previous.part_id != next.part_id {
            total += self.wire_change_ms;
        }
        total
    }
}

/// Run-level options for [`Planner`](crate::scheduler::Planner).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Start of the scheduling horizon (ms).
    pub start_time_ms: i64,
    /// Count-based dispatch threshold.
    pub threshold: Option<usize>,
    /// Day-horizon dispatch threshold (ms past `start_time_ms`).
    pub horizon_ms: Option<i64>,
    /// Require the machine model to appear in the job's process-time table.
    pub strict_model: bool,
    /// Chance that an orphan machine is reassigned (1.0 = always).
    pub orphan_probability: f64,
    /// RNG seed for probabilistic reassignment.
    pub seed: u64,
    /// Upper bound on grouping/dispatch passes per run.
    pub max_passes: usize,
    /// Changeover costs between consecutive jobs on a machine.
    pub setup_times: SetupTimes,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            start_time_ms: 0,
            threshold: None,
            horizon_ms: None,
            strict_model: true,
            orphan_probability: 1.0,
            seed: 0,
            max_passes: 8,
            setup_times: SetupTimes::default(),
        }
    }
}

impl PlannerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_start_time(mut self, start_time_ms: i64) -> Self {
        self.start_time_ms = start_time_ms;
        self
    }

    pub fn with_threshold(mut self, count: usize) -> Self {
        self.threshold = Some(count);
        self
    }

    /// Sets the horizon as a number of days.
    pub fn with_day_horizon(mut self, days: i64) -> Self {
        self.horizon_ms = Some(days.saturating_mul(DAY_MS));
        self
    }

    pub fn with_strict_model(mut self, strict: bool) -> Self {
        self.strict_model = strict;
        self
    }

    pub fn with_orphan_probability(mut self, probability: f64) -> Self {
        self.orphan_probability = probability;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_max_passes(mut self, passes: usize) -> Self {
        self.max_passes = passes;
        self
    }

    pub fn with_setup_times(mut self, setup_times: SetupTimes) -> Self {
        self.setup_times = setup_times;
        self
    }

    /// Resolves the effective threshold. The count threshold wins when both
    /// are configured.
    pub fn threshold_policy(&self) -> Option<DispatchThreshold> {
        match (self.threshold, self.horizon_ms) {
            (Some(count), _) => Some(DispatchThreshold::Count(count)),
            (None, Some(horizon_ms)) => Some(DispatchThreshold::Horizon { horizon_ms }),
            (None, None) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = PlannerConfig::default();
        assert!(cfg.strict_model);
        assert_eq!(cfg.orphan_probability, 1.0);
        assert_eq!(cfg.threshold_policy(), None);
    }

    #[test]
    fn test_count_threshold_takes_precedence() {
        let cfg = PlannerConfig::new().with_day_horizon(2).with_threshold(5);
        assert_eq!(cfg.threshold_policy(), Some(DispatchThreshold::Count(5)));
    }

    #[test]
    fn test_horizon_policy() {
        let cfg = PlannerConfig::new().with_day_horizon(1);
        assert_eq!(
            cfg.threshold_policy(),
            Some(DispatchThreshold::Horizon { horizon_ms: DAY_MS })
        );
    }

    #[test]
    fn test_huge_day_horizon_saturates() {
        let cfg = PlannerConfig::new().with_day_horizon(i64::MAX);
        assert_eq!(cfg.horizon_ms, Some(i64::MAX));
    }

    #[test]
    fn test_setup_times_add_per_changed_part() {
        let times = SetupTimes::new(600, 60, 30);
        let sig = |recipe: &str, part_no: &str, part_id: &str| JobSignature {
            recipe: recipe.into(),
            part_no: part_no.into(),
            part_id: part_id.into(),
            tools_required: 1,
            wires_required: 1,
        };
        let current = MachineSetup::new("R1", "T1", "W1");

        assert_eq!(times.between(Some(&current), &sig("R1", "T1", "W1")), 0);
        assert_eq!(times.between(Some(&current), &sig("R1", "T2", "W1")), 60);
        assert_eq!(times.between(Some(&current), &sig("R2", "T2", "W2")), 690);
        assert_eq!(times.between(None, &sig("R2", "T2", "W2")), 0);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let cfg: PlannerConfig =
            serde_json::from_str(r#"{ "threshold": 3, "seed": 42 }"#).unwrap();
        assert_eq!(cfg.threshold, Some(3));
        assert_eq!(cfg.seed, 42);
        assert_eq!(cfg.max_passes, 8);
        assert!(cfg.strict_model);
        assert_eq!(cfg.setup_times, SetupTimes::default());
    }
}
