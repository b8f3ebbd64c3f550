//! Rule engine for multi-criteria job ordering.
//!
//! Composes multiple dispatching rules with configurable evaluation modes
//! and tie-breaking strategies.
//!
//! # Reference
//! Haupt (1989), "A Survey of Priority Rule-Based Scheduling"

use std::cmp::Ordering;
use std::sync::Arc;

use super::{rules, DispatchContext, DispatchingRule, RuleScore};
use crate::models::{Job, JobId};
use crate::store::JobStore;

/// How multiple rules are combined.
#[derive(Debug, Clone, Default)]
pub enum EvaluationMode {
    /// Apply rules in sequence; use next rule only on ties.
    #[default]
    Sequential,
    /// Compute weighted sum of all rule scores.
    Weighted,
}

/// How ties are broken after all rules are exhausted.
#[derive(Debug, Clone, Default)]
pub enum TieBreaker {
    /// Keep input order (stable sort).
    #[default]
    NextRule,
    /// Deterministic by lot number (lexicographic).
    ById,
}

#[derive(Clone)]
struct WeightedRule {
    rule: Arc<dyn DispatchingRule>,
    weight: f64,
}

/// A composable rule engine for job prioritization.
///
/// # Example
/// ```
/// use u_dispatch::dispatching::{rules, RuleEngine, TieBreaker};
///
/// let engine = RuleEngine::new()
///     .with_rule(rules::Edd)
///     .with_tie_breaker(rules::Spt)
///     .with_final_tie_breaker(TieBreaker::ById);
/// ```
#[derive(Clone)]
pub struct RuleEngine {
    rules: Vec<WeightedRule>,
    mode: EvaluationMode,
    tie_breaker: TieBreaker,
    epsilon: f64,
}

impl RuleEngine {
    /// Creates an empty rule engine.
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            mode: EvaluationMode::Sequential,
            tie_breaker: TieBreaker::NextRule,
            epsilon: 1e-9,
        }
    }

    /// FIFO by arrival, SPT on ties, then lot number.
    pub fn fifo() -> Self {
        Self::new()
            .with_rule(rules::Fifo)
            .with_tie_breaker(rules::Spt)
            .with_final_tie_breaker(TieBreaker::ById)
    }

    /// Adds a primary rule (weight 1.0).
    pub fn with_rule<R: DispatchingRule + 'static>(mut self, rule: R) -> Self {
        self.rules.push(WeightedRule {
            rule: Arc::new(rule),
            weight: 1.0,
        });
        self
    }

    /// Adds a weighted rule.
    pub fn with_weighted_rule<R: DispatchingRule + 'static>(
        mut self,
        rule: R,
        weight: f64,
    ) -> Self {
        self.rules.push(WeightedRule {
            rule: Arc::new(rule),
            weight,
        });
        self
    }

    /// Adds a tie-breaking rule (weight 0.0, used only in Sequential mode).
    pub fn with_tie_breaker<R: DispatchingRule + 'static>(mut self, rule: R) -> Self {
        self.rules.push(WeightedRule {
            rule: Arc::new(rule),
            weight: 0.0,
        });
        self
    }

    pub fn with_mode(mut self, mode: EvaluationMode) -> Self {
        self.mode = mode;
        self
    }

    /// Sets the final tie-breaking strategy.
    pub fn with_final_tie_breaker(mut self, tie_breaker: TieBreaker) -> Self {
        self.tie_breaker = tie_breaker;
        self
    }

    /// Sorts jobs by priority (highest priority first).
    ///
    /// Returns indices into the input slice.
    pub fn sort_indices(&self, jobs: &[&Job], context: &DispatchContext) -> Vec<usize> {
        let mut indices: Vec<usize> = (0..jobs.len()).collect();

        match &self.mode {
            EvaluationMode::Sequential => {
                indices.sort_by(|&a, &b| self.compare_sequential(jobs[a], jobs[b], context));
            }
            EvaluationMode::Weighted => {
                let scores: Vec<f64> = jobs
                    .iter()
                    .map(|j| self.weighted_score(j, context))
                    .collect();
                indices.sort_by(|&a, &b| {
                    scores[a]
                        .partial_cmp(&scores[b])
                        .unwrap_or(Ordering::Equal)
                        .then_with(|| self.final_tie(jobs[a], jobs[b]))
                });
            }
        }

        indices
    }

    /// Sorts job handles in place.
    pub fn sort_ids(&self, ids: &mut Vec<JobId>, jobs: &JobStore, context: &DispatchContext) {
        let refs: Vec<&Job> = ids.iter().map(|&id| jobs.get(id)).collect();
        let order = self.sort_indices(&refs, context);
        *ids = order.into_iter().map(|i| ids[i]).collect();
    }

    /// Returns the index of the highest-priority job.
    pub fn select_best(&self, jobs: &[&Job], context: &DispatchContext) -> Option<usize> {
        self.sort_indices(jobs, context).first().copied()
    }

    /// Evaluates a single job and returns scores from each rule.
    pub fn evaluate(&self, job: &Job, context: &DispatchContext) -> Vec<RuleScore> {
        self.rules
            .iter()
            .map(|wr| wr.rule.evaluate(job, context) * wr.weight)
            .collect()
    }

    fn compare_sequential(&self, a: &Job, b: &Job, context: &DispatchContext) -> Ordering {
        for wr in &self.rules {
            let score_a = wr.rule.evaluate(a, context);
            let score_b = wr.rule.evaluate(b, context);

            if (score_a - score_b).abs() > self.epsilon {
                return score_a.partial_cmp(&score_b).unwrap_or(Ordering::Equal);
            }
        }
        self.final_tie(a, b)
    }

    fn final_tie(&self, a: &Job, b: &Job) -> Ordering {
        match &self.tie_breaker {
            TieBreaker::NextRule => Ordering::Equal,
            TieBreaker::ById => a.lot_number.cmp(&b.lot_number),
        }
    }

    fn weighted_score(&self, job: &Job, context: &DispatchContext) -> f64 {
        self.rules
            .iter()
            .map(|wr| wr.rule.evaluate(job, context) * wr.weight)
            .sum()
    }
}

impl Default for RuleEngine {
    fn default() -> Self {
        Self::fifo()
    }
}

impl std::fmt::Debug for RuleEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleEngine")
            .field(
                "rules",
                &self
                    .rules
                    .iter()
                    .map(|r| format!("{}(w={})", r.rule.name(), r.weight))
                    .collect::<Vec<_>>(),
            )
            .field("mode", &self.mode)
            .field("tie_breaker", &self.tie_breaker)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_job(lot: &str, process_ms: i64, due: Option<i64>, arrival: i64) -> Job {
        let mut job = Job::new(lot, "R1")
            .with_process_time("UTC3000", process_ms)
            .with_arrival(arrival);
        job.due_ms = due;
        job
    }

    fn lots(jobs: &[Job], order: &[usize]) -> Vec<String> {
        order.iter().map(|&i| jobs[i].lot_number.clone()).collect()
    }

    #[test]
    fn test_spt_ordering() {
        let jobs = vec![
            make_job("long", 5000, None, 0),
            make_job("short", 1000, None, 0),
            make_job("medium", 3000, None, 0),
        ];
        let refs: Vec<&Job> = jobs.iter().collect();
        let ctx = DispatchContext::at_time(0);
        let engine = RuleEngine::new().with_rule(rules::Spt);

        let order = engine.sort_indices(&refs, &ctx);
        assert_eq!(lots(&jobs, &order), vec!["short", "medium", "long"]);
    }

    #[test]
    fn test_edd_ordering() {
        let jobs = vec![
            make_job("late", 1000, Some(50_000), 0),
            make_job("early", 1000, Some(10_000), 0),
            make_job("no_due", 1000, None, 0),
        ];
        let refs: Vec<&Job> = jobs.iter().collect();
        let engine = RuleEngine::new().with_rule(rules::Edd);

        let order = engine.sort_indices(&refs, &DispatchContext::at_time(0));
        assert_eq!(lots(&jobs, &order), vec!["early", "late", "no_due"]);
    }

    #[test]
    fn test_default_is_fifo_with_spt_tie_breaker() {
        let jobs = vec![
            make_job("C", 1000, None, 500),
            make_job("B", 2000, None, 100),
            make_job("A", 1000, None, 100),
            make_job("D", 1000, None, 100),
        ];
        let refs: Vec<&Job> = jobs.iter().collect();
        let engine = RuleEngine::default();

        let order = engine.sort_indices(&refs, &DispatchContext::at_time(0));
        // arrival 100: A and D tie on SPT → lot number; B is longer.
        assert_eq!(lots(&jobs, &order), vec!["A", "D", "B", "C"]);
    }

    #[test]
    fn test_weighted_mode() {
        let jobs = vec![
            make_job("A", 1000, Some(50_000), 0),
            make_job("B", 5000, Some(10_000), 0),
        ];
        let refs: Vec<&Job> = jobs.iter().collect();
        let engine = RuleEngine::new()
            .with_mode(EvaluationMode::Weighted)
            .with_weighted_rule(rules::Edd, 0.5)
            .with_weighted_rule(rules::Spt, 0.5);

        // A: 0.5*50000 + 0.5*1000 = 25500
        // B: 0.5*10000 + 0.5*5000 = 7500
        assert_eq!(engine.select_best(&refs, &DispatchContext::at_time(0)), Some(1));
    }

    #[test]
    fn test_sort_ids() {
        let mut store = JobStore::new();
        let late = store.insert(make_job("L2", 100, None, 900)).unwrap();
        let early = store.insert(make_job("L1", 100, None, 10)).unwrap();
        let mut ids = vec![late, early];

        RuleEngine::fifo().sort_ids(&mut ids, &store, &DispatchContext::at_time(0));
        assert_eq!(ids, vec![early, late]);
    }

    #[test]
    fn test_empty_jobs() {
        let engine = RuleEngine::new().with_rule(rules::Spt);
        let ctx = DispatchContext::at_time(0);
        assert!(engine.sort_indices(&[], &ctx).is_empty());
        assert!(engine.select_best(&[], &ctx).is_none());
    }

    #[test]
    fn test_evaluate_scores() {
        let job = make_job("T1", 3000, Some(20_000), 0);
        let engine = RuleEngine::new().with_rule(rules::Spt).with_rule(rules::Edd);

        let scores = engine.evaluate(&job, &DispatchContext::at_time(0));
        assert_eq!(scores.len(), 2);
        assert!((scores[0] - 3000.0).abs() < 1e-10);
        assert!((scores[1] - 20_000.0).abs() < 1e-10);
    }
}
