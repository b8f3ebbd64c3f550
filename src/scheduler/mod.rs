//! Batch planner and run reports.
//!
//! [`Planner`] owns one run: it takes machines, lots, tooling stock and the
//! eligibility tables, then repeats grouping, distribution, selection,
//! dispatch and rebalancing passes until the plan stops improving.
//!
//! # Reports
//!
//! Each pass yields a [`PassReport`]; a finished run yields a [`PlanReport`]
//! with makespan, tardiness, on-time rate and utilization. Lots the planner
//! cannot serve are listed as [`JobConflict`]s.
//!
//! # References
//!
//! - Pinedo (2016), "Scheduling: Theory, Algorithms, and Systems", Ch. 4
//! - Mönch, Fowler & Mason (2013), "Production Planning and Control for
//!   Semiconductor Wafer Fabrication Facilities"

mod planner;
mod report;

pub use planner::Planner;
pub use report::{ConflictReason, JobConflict, PassReport, PlanReport};
