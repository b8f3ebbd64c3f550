//! Built-in dispatching rules.
//!
//! # Categories
//!
//! - **Arrival**: FIFO
//! - **Time-based**: SPT, LPT
//! - **Due-date**: EDD, MST, CR
//!
//! Processing-time rules use the mean of the job's per-model table, since the
//! machine is not yet known when the queue order is decided.
//!
//! # Score Convention
//! All rules return lower scores for higher priority jobs.
//!
//! # References
//! - Pinedo (2016), "Scheduling: Theory, Algorithms, and Systems", Ch. 4
//! - Haupt (1989), "A Survey of Priority Rule-Based Scheduling"

use super::{DispatchContext, DispatchingRule, RuleScore};
use crate::models::Job;

// ======================== Arrival rules ========================

/// First In, First Out.
///
/// Prioritizes lots that reached the station earliest.
#[derive(Debug, Clone, Copy)]
pub struct Fifo;

impl DispatchingRule for Fifo {
    fn name(&self) -> &'static str {
        "FIFO"
    }

    fn evaluate(&self, job: &Job, _context: &DispatchContext) -> RuleScore {
        job.arrival_ms as f64
    }

    fn description(&self) -> &'static str {
        "First In First Out"
    }
}

// ======================== Time-based rules ========================

/// Shortest Processing Time.
///
/// # Reference
/// Smith (1956), optimal for minimizing mean flow time on single machine.
#[derive(Debug, Clone, Copy)]
pub struct Spt;

impl DispatchingRule for Spt {
    fn name(&self) -> &'static str {
        "SPT"
    }

    fn evaluate(&self, job: &Job, _context: &DispatchContext) -> RuleScore {
        job.average_process_ms()
    }

    fn description(&self) -> &'static str {
        "Shortest Processing Time"
    }
}

/// Longest Processing Time.
#[derive(Debug, Clone, Copy)]
pub struct Lpt;

impl DispatchingRule for Lpt {
    fn name(&self) -> &'static str {
        "LPT"
    }

    fn evaluate(&self, job: &Job, _context: &DispatchContext) -> RuleScore {
        -job.average_process_ms()
    }

    fn description(&self) -> &'static str {
        "Longest Processing Time"
    }
}

// ======================== Due-date rules ========================

/// Earliest Due Date.
///
/// Lots without a due time are assigned lowest priority.
///
/// # Reference
/// Jackson (1955), optimal for minimizing maximum lateness on single machine.
#[derive(Debug, Clone, Copy)]
pub struct Edd;

impl DispatchingRule for Edd {
    fn name(&self) -> &'static str {
        "EDD"
    }

    fn evaluate(&self, job: &Job, _context: &DispatchContext) -> RuleScore {
        job.due_ms.map(|d| d as f64).unwrap_or(f64::MAX)
    }

    fn description(&self) -> &'static str {
        "Earliest Due Date"
    }
}

/// Minimum Slack Time.
///
/// Slack = (due - current_time) - processing time.
#[derive(Debug, Clone, Copy)]
pub struct Mst;

impl DispatchingRule for Mst {
    fn name(&self) -> &'static str {
        "MST"
    }

    fn evaluate(&self, job: &Job, context: &DispatchContext) -> RuleScore {
        let Some(due) = job.due_ms else {
            return f64::MAX;
        };
        (due - context.current_time_ms) as f64 - job.average_process_ms()
    }

    fn description(&self) -> &'static str {
        "Minimum Slack Time"
    }
}

/// Critical Ratio.
///
/// CR = (due - current_time) / processing time. Below 1.0 the lot is behind.
#[derive(Debug, Clone, Copy)]
pub struct Cr;

impl DispatchingRule for Cr {
    fn name(&self) -> &'static str {
        "CR"
    }

    fn evaluate(&self, job: &Job, context: &DispatchContext) -> RuleScore {
        let Some(due) = job.due_ms else {
            return f64::MAX;
        };
        let remaining = job.average_process_ms();
        if remaining <= 0.0 {
            return f64::MAX;
        }
        (due - context.current_time_ms) as f64 / remaining
    }

    fn description(&self) -> &'static str {
        "Critical Ratio"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(lot: &str, process_ms: i64) -> Job {
        Job::new(lot, "R1").with_process_time("UTC3000", process_ms)
    }

    #[test]
    fn test_fifo() {
        let ctx = DispatchContext::at_time(0);
        let early = job("A", 100).with_arrival(10);
        let late = job("B", 100).with_arrival(500);
        assert!(Fifo.evaluate(&early, &ctx) < Fifo.evaluate(&late, &ctx));
    }

    #[test]
    fn test_spt_uses_mean_process_time() {
        let ctx = DispatchContext::at_time(0);
        let j = job("A", 1000).with_process_time("UTC1000", 3000);
        assert!((Spt.evaluate(&j, &ctx) - 2000.0).abs() < 1e-10);
    }

    #[test]
    fn test_lpt() {
        let ctx = DispatchContext::at_time(0);
        assert!((Lpt.evaluate(&job("A", 5000), &ctx) - (-5000.0)).abs() < 1e-10);
    }

    #[test]
    fn test_edd() {
        let ctx = DispatchContext::at_time(0);
        assert!((Edd.evaluate(&job("A", 1).with_due(10_000), &ctx) - 10_000.0).abs() < 1e-10);
        assert_eq!(Edd.evaluate(&job("B", 1), &ctx), f64::MAX);
    }

    #[test]
    fn test_mst() {
        let ctx = DispatchContext::at_time(2000);
        let j = job("A", 3000).with_due(10_000);
        // (10000 - 2000) - 3000 = 5000
        assert!((Mst.evaluate(&j, &ctx) - 5000.0).abs() < 1e-10);
    }

    #[test]
    fn test_cr() {
        let ctx = DispatchContext::at_time(0);
        let j = job("A", 5000).with_due(10_000);
        assert!((Cr.evaluate(&j, &ctx) - 2.0).abs() < 1e-10);

        // No process times → lowest priority
        let bare = Job::new("B", "R1").with_due(10_000);
        assert_eq!(Cr.evaluate(&bare, &ctx), f64::MAX);
    }
}
