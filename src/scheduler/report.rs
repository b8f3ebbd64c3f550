//! Run reports and dispatch quality metrics.
//!
//! # Metrics
//!
//! | Metric | Definition |
//! |--------|-----------|
//! | Makespan (C_max) | Latest queued completion time |
//! | Total Tardiness | Sum of max(0, end - due) over queued lots |
//! | On-Time Rate | Fraction of queued lots with a due time that meet it |
//! | Avg Utilization | Mean busy share of working machines over the horizon |
//!
//! # Reference
//! Pinedo (2016), "Scheduling", Ch. 1.2: Performance Measures

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::eligibility::IneligibleReason;
use crate::store::{JobStore, MachineRegistry};

/// Why a job was left out of the plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConflictReason {
    /// No machine passes eligibility; carries the most common failed check.
    Ineligible(IneligibleReason),
    /// No machines are registered.
    NoMachines,
    /// A tracked tool or wire kind the job needs has no stock.
    NoStock,
}

impl fmt::Display for ConflictReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictReason::Ineligible(reason) => write!(f, "no eligible machine ({reason})"),
            ConflictReason::NoMachines => f.write_str("no machines registered"),
            ConflictReason::NoStock => f.write_str("required tooling has zero stock"),
        }
    }
}

/// A job that cannot be served in this run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobConflict {
    pub lot_number: String,
    pub reason: ConflictReason,
}

/// Counters for one grouping/dispatch pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassReport {
    /// 1-based pass number.
    pub pass: usize,
    pub job_groups: usize,
    /// Jobs newly marked orphan in this pass.
    pub orphan_jobs: usize,
    /// Idle machines claimed by the selector.
    pub machines_selected: usize,
    pub jobs_scheduled: usize,
    pub jobs_evicted: usize,
    pub machines_rebalanced: usize,
    /// Unscheduled jobs left after the pass.
    pub backlog: usize,
}

impl PassReport {
    /// Whether the pass placed more jobs than it evicted.
    pub fn made_progress(&self) -> bool {
        self.jobs_scheduled > self.jobs_evicted
    }
}

/// Summary of a planner run.
///
/// All time values are in milliseconds.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlanReport {
    pub passes: Vec<PassReport>,
    pub scheduled_jobs: usize,
    pub backlog_jobs: usize,
    pub orphan_jobs: usize,
    /// Jobs already running when the run started.
    pub in_process_jobs: usize,
    pub conflicts: usize,
    /// Machines with at least one queued job.
    pub busy_machines: usize,
    pub makespan_ms: i64,
    pub total_tardiness_ms: i64,
    /// Changeover time charged across all queues.
    pub total_setup_ms: i64,
    /// Fraction of due-dated queued lots finishing on time (0.0..=1.0).
    pub on_time_rate: f64,
    /// Mean busy share of busy machines (0.0..=1.0).
    pub avg_utilization: f64,
}

impl PlanReport {
    /// Computes the summary from the final planner state.
    pub fn calculate(
        passes: Vec<PassReport>,
        machines: &MachineRegistry,
        jobs: &JobStore,
        start_time_ms: i64,
        conflicts: usize,
    ) -> Self {
        let mut makespan = start_time_ms;
        let mut total_tardiness: i64 = 0;
        let mut total_setup: i64 = 0;
        let mut due_count: usize = 0;
        let mut on_time_count: usize = 0;

        let busy = machines.scheduled_machines();
        for machine in &busy {
            for entry in machine.queue() {
                makespan = makespan.max(entry.end_ms);
                total_setup += entry.setup_ms;
                if let Some(due) = jobs.get(entry.job).due_ms {
                    due_count += 1;
                    let tardiness = (entry.end_ms - due).max(0);
                    total_tardiness += tardiness;
                    if tardiness == 0 {
                        on_time_count += 1;
                    }
                }
            }
        }

        let span = makespan - start_time_ms;
        let avg_utilization = if busy.is_empty() || span <= 0 {
            0.0
        } else {
            let total: f64 = busy
                .iter()
                .map(|m| {
                    let worked: i64 = m.queue().iter().map(|q| q.end_ms - q.start_ms).sum();
                    (worked as f64 / span as f64).min(1.0)
                })
                .sum();
            total / busy.len() as f64
        };

        Self {
            passes,
            scheduled_jobs: jobs.scheduled_count(),
            backlog_jobs: jobs.unscheduled().len(),
            orphan_jobs: jobs.orphans().len(),
            in_process_jobs: jobs.in_process_count(),
            conflicts,
            busy_machines: busy.len(),
            makespan_ms: makespan,
            total_tardiness_ms: total_tardiness,
            total_setup_ms: total_setup,
            on_time_rate: if due_count == 0 {
                1.0
            } else {
                on_time_count as f64 / due_count as f64
            },
            avg_utilization,
        }
    }

    pub fn pass_count(&self) -> usize {
        self.passes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Job, Machine};

    #[test]
    fn test_metrics() {
        let mut reg = MachineRegistry::new();
        let m1 = reg.add(Machine::new("M1", "X", "L")).unwrap();
        reg.add(Machine::new("M2", "X", "L")).unwrap();

        let mut store = JobStore::new();
        let a = store.insert(Job::new("A", "R").with_due(500)).unwrap();
        let b = store.insert(Job::new("B", "R").with_due(1500)).unwrap();
        store.insert(Job::new("C", "R")).unwrap();
        reg.get_mut(m1).push_job(a, 1000, 0, false);
        reg.get_mut(m1).push_job(b, 1000, 0, false);
        store.mark_scheduled(a, m1);
        store.mark_scheduled(b, m1);

        let report = PlanReport::calculate(vec![PassReport::default()], &reg, &store, 0, 0);
        assert_eq!(report.makespan_ms, 2000);
        // A: 1000 - 500 = 500, B: 2000 - 1500 = 500
        assert_eq!(report.total_tardiness_ms, 1000);
        assert_eq!(report.on_time_rate, 0.0);
        assert_eq!(report.busy_machines, 1);
        assert!((report.avg_utilization - 1.0).abs() < 1e-10);
        assert_eq!(report.scheduled_jobs, 2);
        assert_eq!(report.backlog_jobs, 1);
        assert_eq!(report.total_setup_ms, 0);
        assert_eq!(report.pass_count(), 1);
    }

    #[test]
    fn test_empty_plan() {
        let report = PlanReport::calculate(Vec::new(), &MachineRegistry::new(), &JobStore::new(), 0, 0);
        assert_eq!(report.makespan_ms, 0);
        assert_eq!(report.on_time_rate, 1.0);
        assert_eq!(report.avg_utilization, 0.0);
    }

    #[test]
    fn test_progress() {
        let pass = PassReport {
            jobs_scheduled: 3,
            jobs_evicted: 3,
            ..Default::default()
        };
        assert!(!pass.made_progress());
        assert!(PassReport {
            jobs_scheduled: 1,
            ..Default::default()
        }
        .made_progress());
    }

    #[test]
    fn test_conflict_display() {
        let reason = ConflictReason::Ineligible(IneligibleReason::Location);
        assert_eq!(reason.to_string(), "no eligible machine (location not allowed)");
    }
}
