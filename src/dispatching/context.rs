//! Dispatch context for rule evaluation and queue limits.

use crate::config::{DispatchThreshold, SetupTimes};

/// Run-time state passed to dispatching rules and the dispatcher.
///
/// All times are in milliseconds relative to the scheduling epoch (t=0).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DispatchContext {
    /// Start of the scheduling horizon (ms).
    pub current_time_ms: i64,
    /// Backlog policy applied to machine queues.
    pub threshold: Option<DispatchThreshold>,
    /// Changeover costs charged when appending jobs.
    pub setup_times: SetupTimes,
}

impl DispatchContext {
    /// Creates a context at the given time with no threshold.
    pub fn at_time(current_time_ms: i64) -> Self {
        Self {
            current_time_ms,
            threshold: None,
            setup_times: SetupTimes::default(),
        }
    }

    pub fn with_threshold(mut self, threshold: DispatchThreshold) -> Self {
        self.threshold = Some(threshold);
        self
    }

    pub fn with_setup_times(mut self, setup_times: SetupTimes) -> Self {
        self.setup_times = setup_times;
        self
    }

    /// Latest start time a horizon policy admits, if one is set.
    pub fn horizon_end_ms(&self) -> Option<i64> {
        match self.threshold {
            Some(DispatchThreshold::Horizon { horizon_ms }) => {
                Some(self.current_time_ms.saturating_add(horizon_ms))
            }
            _ => None,
        }
    }
}
