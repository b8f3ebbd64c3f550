//! Dispatching: job ordering rules and per-group queue building.
//!
//! Provides priority-based dispatching rules (FIFO, SPT, EDD, etc.), a
//! composable rule engine for multi-criteria job prioritization, and the
//! [`Dispatcher`] that appends ordered jobs to member machines of a recipe
//! group under the dispatch threshold.
//!
//! # Usage
//!
//! ```
//! use u_dispatch::dispatching::{rules, DispatchContext, RuleEngine};
//! use u_dispatch::models::Job;
//!
//! let engine = RuleEngine::new()
//!     .with_rule(rules::Edd)
//!     .with_tie_breaker(rules::Spt);
//!
//! let a = Job::new("L1", "R1").with_due(5_000);
//! let b = Job::new("L2", "R1").with_due(1_000);
//! let order = engine.sort_indices(&[&a, &b], &DispatchContext::at_time(0));
//! assert_eq!(order, vec![1, 0]);
//! ```
//!
//! # References
//!
//! - Pinedo (2016), "Scheduling: Theory, Algorithms, and Systems", Ch. 4
//! - Haupt (1989), "A Survey of Priority Rule-Based Scheduling"

mod context;
mod dispatcher;
mod engine;
pub mod rules;

pub use context::DispatchContext;
pub use dispatcher::{
    calculate_group_index, group_volume, is_saturated, jobs_exceed_dispatching_threshold,
    Dispatcher,
};
pub use engine::{EvaluationMode, RuleEngine, TieBreaker};

use crate::models::Job;
use std::fmt::Debug;

/// Score returned by a dispatching rule.
///
/// Lower scores = higher priority (dispatched first).
pub type RuleScore = f64;

/// A dispatching rule that evaluates job priority.
///
/// # Score Convention
/// **Lower score = higher priority.**
///
/// # Reference
/// Pinedo (2016), "Scheduling", Ch. 4: Priority Dispatching
pub trait DispatchingRule: Send + Sync + Debug {
    /// Rule name (e.g., "SPT", "EDD").
    fn name(&self) -> &'static str;

    /// Returns a score where lower = higher priority.
    fn evaluate(&self, job: &Job, context: &DispatchContext) -> RuleScore;

    fn description(&self) -> &'static str {
        self.name()
    }
}
