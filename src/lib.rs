//! Batch machine dispatching for assembly lots.
//!
//! Assigns lots to wire bonders and similar machines under tooling limits.
//! Machines are grouped by the recipe they are set up for; lots are grouped
//! by the tool and wire they need. Scarce tools and wires are shared across
//! lot groups in proportion to demand, idle machines are claimed and loaded
//! for the groups, and every recipe group's queue is built by dispatching
//! rules under a count or time-horizon threshold.
//!
//! # Modules
//!
//! - **`models`**: Domain types: `Job`, `Machine`, `ResourceInstance`,
//!   `MachineGroup`, `JobGroup`, constraint and dedication tables
//! - **`store`**: Handle arenas for machines, jobs and tool/wire instances
//! - **`eligibility`**: Whether a lot may run on a machine, and why not
//! - **`grouping`**: Recipe groups and tool/wire job groups
//! - **`distribution`**: Proportional tool/wire allocation and machine loading
//! - **`selection`**: Claim-once machine selection for job groups
//! - **`dispatching`**: Ordering rules, queue building and thresholds
//! - **`rebalance`**: Moving idle machines to the neediest groups
//! - **`scheduler`**: The [`Planner`] facade and run reports
//! - **`validation`**: Input integrity checks, all problems collected
//!
//! # Example
//!
//! ```
//! use std::collections::BTreeMap;
//! use u_dispatch::{Job, Machine, Planner, PlannerConfig};
//!
//! let mut planner = Planner::new(PlannerConfig::default().with_threshold(10));
//! planner.add_machine(Machine::new("BB211", "UTC3000", "TA-A")).unwrap();
//! planner.add_machine(Machine::new("BB212", "UTC3000", "TA-A")).unwrap();
//! planner.set_tool_totals(BTreeMap::from([("PART_NO".to_string(), 1)]));
//!
//! for lot in ["P23ASEA01", "P23ASEA02"] {
//!     planner
//!         .add_job(
//!             Job::new(lot, "AAS008YM2024A")
//!                 .with_tool("PART_NO", 1)
//!                 .with_process_time("UTC3000", 600),
//!         )
//!         .unwrap();
//! }
//!
//! let report = planner.run().unwrap();
//! // One tool in stock: a single bonder runs both lots.
//! assert_eq!(report.busy_machines, 1);
//! assert_eq!(report.makespan_ms, 1200);
//! ```
//!
//! # References
//!
//! - Pinedo (2016), "Scheduling: Theory, Algorithms, and Systems"
//! - Haupt (1989), "A Survey of Priority Rule-Based Scheduling"

pub mod config;
pub mod dispatching;
pub mod distribution;
pub mod eligibility;
pub mod error;
pub mod grouping;
pub mod models;
pub mod rebalance;
pub mod scheduler;
pub mod selection;
pub mod store;
pub mod validation;

pub use config::{DispatchThreshold, PlannerConfig, SetupTimes};
pub use error::{Result, SchedulerError};
pub use models::{Job, JobId, Machine, MachineId, MachineSetup, QueuedJob};
pub use scheduler::{JobConflict, PassReport, PlanReport, Planner};
