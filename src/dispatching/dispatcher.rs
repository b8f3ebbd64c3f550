//! Per-group queue building.
//!
//! A recipe group's pending jobs are dispatched expedite first, each subset in
//! rule-engine order. Every job goes to the member that would start
//! processing it first (changeover included) among those that are eligible,
//! hold the job's tooling and are not yet saturated by the dispatch threshold.

use crate::config::DispatchThreshold;
use crate::eligibility::EligibilityEvaluator;
use crate::distribution::holds_tooling;
use crate::models::{JobId, JobState, Machine, MachineGroup, MachineId};
use crate::store::{JobStore, MachineRegistry, ResourcePool};

use super::{DispatchContext, RuleEngine};

/// Appends ordered jobs to member machines of a recipe group.
#[derive(Debug, Clone, Copy)]
pub struct Dispatcher<'a> {
    evaluator: EligibilityEvaluator<'a>,
    rules: &'a RuleEngine,
    context: DispatchContext,
}

impl<'a> Dispatcher<'a> {
    pub fn new(
        evaluator: EligibilityEvaluator<'a>,
        rules: &'a RuleEngine,
        context: DispatchContext,
    ) -> Self {
        Self {
            evaluator,
            rules,
            context,
        }
    }

    /// Pending jobs of a group in dispatch order, expedite first.
    pub fn order_jobs(&self, group: &MachineGroup, jobs: &JobStore) -> Vec<JobId> {
        let mut ordered = group.expedite_jobs.clone();
        self.rules.sort_ids(&mut ordered, jobs, &self.context);
        let mut rest = group.unscheduled_jobs.clone();
        self.rules.sort_ids(&mut rest, jobs, &self.context);
        ordered.extend(rest);
        ordered
    }

    /// Member that would start processing `job` earliest; shorter queue, then
    /// member order, on ties.
    pub fn best_member(
        &self,
        group: &MachineGroup,
        job: JobId,
        machines: &MachineRegistry,
        jobs: &JobStore,
        pool: &ResourcePool,
    ) -> Option<MachineId> {
        let record = jobs.get(job);
        let signature = record.signature();
        group
            .machines
            .iter()
            .enumerate()
            .filter(|&(_, &id)| {
                let machine = machines.get(id);
                !is_saturated(machine, &self.context)
                    && self.evaluator.is_eligible(record, machine)
                    && holds_tooling(pool, id, &signature)
            })
            .min_by_key(|&(position, &id)| {
                let machine = machines.get(id);
                let changeover = machine.changeover_ms(&signature, &self.context.setup_times);
                (
                    machine.next_start_ms(record.arrival_ms) + changeover,
                    machine.queue_len(),
                    position,
                )
            })
            .map(|(_, &id)| id)
    }

    /// Dispatches the group's pending jobs and refreshes its index.
    ///
    /// Returns the number of jobs appended. Jobs no member can take stay
    /// pending.
    pub fn schedule_group(
        &self,
        group: &mut MachineGroup,
        machines: &mut MachineRegistry,
        jobs: &mut JobStore,
        pool: &ResourcePool,
    ) -> usize {
        let mut scheduled = 0;
        for job in self.order_jobs(group, jobs) {
            if jobs.state(job) != JobState::Unscheduled {
                continue;
            }
            let Some(target) = self.best_member(group, job, machines, jobs, pool) else {
                tracing::debug!(
                    lot = %jobs.get(job).lot_number,
                    recipe = %group.recipe,
                    "no member can take job"
                );
                continue;
            };

            let record = jobs.get(job);
            let machine = machines.get_mut(target);
            let duration = record.duration_on(&machine.model);
            let entry = machine.append_job(
                job,
                &record.signature(),
                duration,
                record.arrival_ms,
                false,
                &self.context.setup_times,
            );
            tracing::debug!(
                lot = %record.lot_number,
                machine = %machine.name,
                start_ms = entry.start_ms,
                setup_ms = entry.setup_ms,
                end_ms = entry.end_ms,
                "job dispatched"
            );
            jobs.mark_scheduled(job, target);
            group.scheduled_jobs.push(job);
            scheduled += 1;
        }

        group
            .unscheduled_jobs
            .retain(|&j| jobs.state(j) == JobState::Unscheduled);
        group
            .expedite_jobs
            .retain(|&j| jobs.state(j) == JobState::Unscheduled);
        group.index = calculate_group_index(group_volume(group, jobs), group.machines.len());
        scheduled
    }
}

/// Whether a machine's queue already meets the threshold.
pub fn is_saturated(machine: &Machine, context: &DispatchContext) -> bool {
    match context.threshold {
        None => false,
        Some(DispatchThreshold::Count(limit)) => machine.queue_len() >= limit,
        Some(DispatchThreshold::Horizon { .. }) => context
            .horizon_end_ms()
            .is_some_and(|end| machine.projected_free_ms() >= end),
    }
}

/// Cuts a machine queue back to the threshold.
///
/// Count policy keeps the first `T` entries; horizon policy keeps entries
/// starting before the horizon end. Pinned entries are always kept. Evicted
/// jobs return to unscheduled and are returned in queue order.
pub fn jobs_exceed_dispatching_threshold(
    machine: &mut Machine,
    jobs: &mut JobStore,
    context: &DispatchContext,
) -> Vec<JobId> {
    let within = match context.threshold {
        None => return Vec::new(),
        Some(DispatchThreshold::Count(limit)) => limit.min(machine.queue_len()),
        Some(DispatchThreshold::Horizon { .. }) => {
            let end = context.horizon_end_ms().unwrap_or(i64::MAX);
            machine
                .queue()
                .iter()
                .take_while(|q| q.start_ms < end)
                .count()
        }
    };
    let keep = within.max(machine.pinned_extent());

    let evicted: Vec<JobId> = machine
        .truncate_queue(keep)
        .into_iter()
        .map(|q| q.job)
        .collect();
    for &job in &evicted {
        jobs.mark_unscheduled(job);
    }
    if !evicted.is_empty() {
        tracing::debug!(
            machine = %machine.name,
            kept = keep,
            evicted = evicted.len(),
            "queue cut to dispatch threshold"
        );
    }
    evicted
}

/// Remaining work of a group: Σ mean process time of its pending jobs (ms).
pub fn group_volume(group: &MachineGroup, jobs: &JobStore) -> f64 {
    group
        .pending_jobs()
        .map(|id| jobs.get(id).average_process_ms())
        .sum()
}

/// How badly a group needs one more machine: `volume / (members + 1)`.
#[inline]
pub fn calculate_group_index(volume_ms: f64, members: usize) -> f64 {
    volume_ms / (members as f64 + 1.0)
}
