//! Orphan machine rebalancing.
//!
//! After dispatch some machines have nothing left to do: they are in no
//! group, or their group has no pending jobs. Each such machine may move to
//! the group that needs a machine most, measured by the group index.

use rand::Rng;

use crate::dispatching::{calculate_group_index, group_volume, is_saturated, DispatchContext};
use crate::distribution::{can_load, load_machine};
use crate::eligibility::EligibilityEvaluator;
use crate::grouping::Grouping;
use crate::models::{JobSignature, MachineId};
use crate::store::{JobStore, MachineRegistry, ResourcePool};

/// Machines without demand and not saturated, registration order.
pub fn orphan_machines(
    grouping: &Grouping,
    machines: &MachineRegistry,
    context: &DispatchContext,
) -> Vec<MachineId> {
    machines
        .iter()
        .filter(|(id, machine)| {
            let idle_group = grouping
                .group_of_machine(*id)
                .is_none_or(|g| !grouping.machine_groups[g].has_demand());
            idle_group && !is_saturated(machine, context)
        })
        .map(|(id, _)| id)
        .collect()
}

/// Group with the highest index that has a pending job `machine` is
/// eligible for and can be loaded for. First group wins ties.
fn best_target(
    grouping: &Grouping,
    machine: MachineId,
    machines: &MachineRegistry,
    jobs: &JobStore,
    pool: &ResourcePool,
    evaluator: &EligibilityEvaluator<'_>,
) -> Option<(usize, JobSignature)> {
    let current = grouping.group_of_machine(machine);
    let record = machines.get(machine);
    let mut best: Option<(usize, f64, JobSignature)> = None;

    for (idx, group) in grouping.machine_groups.iter().enumerate() {
        if Some(idx) == current || !group.has_demand() {
            continue;
        }
        if best.as_ref().is_some_and(|(_, top, _)| group.index <= *top) {
            continue;
        }
        let signature = group.pending_jobs().find_map(|j| {
            let job = jobs.get(j);
            let signature = job.signature();
            (evaluator.is_eligible(job, record) && can_load(pool, machine, &signature))
                .then_some(signature)
        });
        if let Some(signature) = signature {
            best = Some((idx, group.index, signature));
        }
    }

    best.map(|(idx, _, signature)| (idx, signature))
}

/// Moves orphan machines to the neediest groups.
///
/// Each orphan is considered with `probability` (1.0 always, without
/// touching `rng`). A moved machine is reloaded for the target's first
/// suitable job and the target index is recomputed before the next orphan.
/// Returns the indices of groups that gained a machine, first-gain order.
#[allow(clippy::too_many_arguments)]
pub fn distribute_orphan_machines<R: Rng + ?Sized>(
    grouping: &mut Grouping,
    machines: &mut MachineRegistry,
    jobs: &JobStore,
    pool: &mut ResourcePool,
    evaluator: &EligibilityEvaluator<'_>,
    context: &DispatchContext,
    probability: f64,
    rng: &mut R,
) -> Vec<usize> {
    let mut touched = Vec::new();

    for machine in orphan_machines(grouping, machines, context) {
        if probability < 1.0 && !rng.random_bool(probability.clamp(0.0, 1.0)) {
            continue;
        }
        let Some((target, signature)) =
            best_target(grouping, machine, machines, jobs, pool, evaluator)
        else {
            continue;
        };
        if !load_machine(machine, &signature, machines, pool) {
            continue;
        }

        grouping.assign_machine(machine, &signature.recipe);
        let group = &mut grouping.machine_groups[target];
        group.index = calculate_group_index(group_volume(group, jobs), group.machines.len());
        tracing::debug!(
            machine = %machines.get(machine).name,
            recipe = %signature.recipe,
            index = group.index,
            "orphan machine reassigned"
        );
        if !touched.contains(&target) {
            touched.push(target);
        }
    }

    touched
}
