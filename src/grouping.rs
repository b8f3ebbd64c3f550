//! Machine and job grouping.
//!
//! Each pass starts by grouping machines by the recipe they are set up for
//! and unscheduled jobs by tool/wire signature. Groups are plain snapshots:
//! membership changes go through [`Grouping::assign_machine`] so a machine
//! is never a member of two groups.

use std::collections::HashMap;

use crate::models::{
    JobGroup, JobId, JobSignature, JobState, MachineGroup, MachineId, ResourceKind,
};
use crate::store::{JobStore, MachineRegistry, ResourcePool};

/// One pass worth of machine groups and job groups.
#[derive(Debug, Clone, Default)]
pub struct Grouping {
    pub machine_groups: Vec<MachineGroup>,
    pub job_groups: Vec<JobGroup>,
    recipe_index: HashMap<String, usize>,
    machine_index: HashMap<MachineId, usize>,
}

impl Grouping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index of the group serving `recipe`, creating it if needed.
    fn ensure_group(&mut self, recipe: &str) -> usize {
        if let Some(&idx) = self.recipe_index.get(recipe) {
            return idx;
        }
        let idx = self.machine_groups.len();
        self.machine_groups.push(MachineGroup::new(recipe));
        self.recipe_index.insert(recipe.to_string(), idx);
        idx
    }

    pub fn group_of_recipe(&self, recipe: &str) -> Option<usize> {
        self.recipe_index.get(recipe).copied()
    }

    pub fn group_of_machine(&self, machine: MachineId) -> Option<usize> {
        self.machine_index.get(&machine).copied()
    }

    /// Moves a machine into the group of `recipe`, leaving any previous one.
    /// Returns the target group index.
    pub fn assign_machine(&mut self, machine: MachineId, recipe: &str) -> usize {
        let target = self.ensure_group(recipe);
        if let Some(previous) = self.machine_index.get(&machine).copied() {
            if previous == target {
                return target;
            }
            self.machine_groups[previous].machines.retain(|&m| m != machine);
        }
        self.machine_groups[target].machines.push(machine);
        self.machine_index.insert(machine, target);
        target
    }

    /// Recomputes each group's held tool and wire instances from its members.
    pub fn refresh_holdings(&mut self, machines: &MachineRegistry) {
        for group in &mut self.machine_groups {
            group.tools = group
                .machines
                .iter()
                .flat_map(|&m| machines.get(m).tools.iter().copied())
                .collect();
            group.wires = group
                .machines
                .iter()
                .flat_map(|&m| machines.get(m).wires.iter().copied())
                .collect();
        }
    }

    /// Total pending jobs across all machine groups.
    pub fn pending_count(&self) -> usize {
        self.machine_groups.iter().map(|g| g.pending_count()).sum()
    }
}

/// Builds one machine group per recipe.
///
/// Set-up machines come first, in registration order, and bring the jobs
/// already on their queues as scheduled jobs. Then every unscheduled job
/// joins the group of its recipe, creating a memberless group when no
/// machine carries it. Urgent jobs go to the expedite list.
pub fn group_machines_by_recipe(machines: &MachineRegistry, jobs: &JobStore) -> Grouping {
    let mut grouping = Grouping::new();

    for (id, machine) in machines.iter() {
        let Some(recipe) = machine.recipe() else {
            continue;
        };
        let idx = grouping.assign_machine(id, recipe);
        grouping.machine_groups[idx]
            .scheduled_jobs
            .extend(machine.job_ids());
    }

    for id in jobs.unscheduled() {
        let job = jobs.get(id);
        let idx = grouping.ensure_group(&job.recipe);
        let group = &mut grouping.machine_groups[idx];
        if job.urgent {
            group.expedite_jobs.push(id);
        } else {
            group.unscheduled_jobs.push(id);
        }
    }

    grouping.refresh_holdings(machines);
    grouping
}

/// Partitions unscheduled jobs by signature, first-seen order.
///
/// A job is an orphan when its recipe group has no members and a tracked
/// kind it needs has a total of zero: no group can ever be stood up for it.
/// Orphans are marked in the store, recorded on their job group, removed
/// from their machine group, and returned.
pub fn group_jobs_by_tool_and_wire(
    grouping: &mut Grouping,
    jobs: &mut JobStore,
    pool: &ResourcePool,
) -> Vec<JobId> {
    let mut by_signature: HashMap<JobSignature, usize> = HashMap::new();
    let mut job_groups: Vec<JobGroup> = Vec::new();
    let mut orphans = Vec::new();

    for id in jobs.unscheduled() {
        let job = jobs.get(id);
        let signature = job.signature();
        let idx = *by_signature.entry(signature.clone()).or_insert_with(|| {
            job_groups.push(JobGroup::new(signature.clone()));
            job_groups.len() - 1
        });

        let memberless = grouping
            .group_of_recipe(&signature.recipe)
            .is_none_or(|g| grouping.machine_groups[g].machines.is_empty());
        if memberless && !can_stand_up(&signature, pool) {
            job_groups[idx].orphan_jobs.push(id);
            orphans.push(id);
        } else {
            job_groups[idx].push(id);
        }
    }

    for &id in &orphans {
        jobs.mark_orphan(id);
        tracing::debug!(lot = %jobs.get(id).lot_number, "orphan job: tooling has zero stock");
    }
    for group in &mut grouping.machine_groups {
        group
            .unscheduled_jobs
            .retain(|&j| jobs.state(j) == JobState::Unscheduled);
        group
            .expedite_jobs
            .retain(|&j| jobs.state(j) == JobState::Unscheduled);
    }

    grouping.job_groups = job_groups;
    orphans
}

fn can_stand_up(signature: &JobSignature, pool: &ResourcePool) -> bool {
    let stocked = |kind: ResourceKind, name: &str, required: u32| {
        required == 0 || pool.total(kind, name).is_none_or(|total| total > 0)
    };
    stocked(ResourceKind::Tool, &signature.part_no, signature.tools_required)
        && stocked(ResourceKind::Wire, &signature.part_id, signature.wires_required)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Job, Machine, MachineSetup};
    use std::collections::BTreeMap;

    fn registry() -> MachineRegistry {
        let mut reg = MachineRegistry::new();
        reg.add(Machine::new("M1", "X", "L").with_setup(MachineSetup::new("R1", "T1", "W1")))
            .unwrap();
        reg.add(Machine::new("M2", "X", "L")).unwrap();
        reg.add(Machine::new("M3", "X", "L").with_setup(MachineSetup::new("R1", "T1", "W1")))
            .unwrap();
        reg
    }

    #[test]
    fn test_group_machines_by_recipe() {
        let reg = registry();
        let mut store = JobStore::new();
        store.insert(Job::new("L1", "R1")).unwrap();
        store.insert(Job::new("L2", "R2").with_urgent(true)).unwrap();

        let grouping = group_machines_by_recipe(&reg, &store);
        assert_eq!(grouping.machine_groups.len(), 2);

        let r1 = &grouping.machine_groups[grouping.group_of_recipe("R1").unwrap()];
        assert_eq!(r1.machines, vec![MachineId(0), MachineId(2)]);
        assert_eq!(r1.unscheduled_jobs.len(), 1);

        let r2 = &grouping.machine_groups[grouping.group_of_recipe("R2").unwrap()];
        assert!(r2.machines.is_empty());
        assert_eq!(r2.expedite_jobs.len(), 1);

        assert_eq!(grouping.group_of_machine(MachineId(1)), None);
    }

    #[test]
    fn test_assign_machine_keeps_membership_unique() {
        let reg = registry();
        let store = JobStore::new();
        let mut grouping = group_machines_by_recipe(&reg, &store);

        let idx = grouping.assign_machine(MachineId(0), "R9");
        assert_eq!(grouping.group_of_machine(MachineId(0)), Some(idx));
        let r1 = grouping.group_of_recipe("R1").unwrap();
        assert_eq!(grouping.machine_groups[r1].machines, vec![MachineId(2)]);
        assert!(grouping.machine_groups[idx].contains_machine(MachineId(0)));
        assert!(!grouping.machine_groups[r1].contains_machine(MachineId(0)));

        let total: usize = grouping.machine_groups.iter().map(|g| g.machines.len()).sum();
        assert_eq!(total, 2);
    }

    #[test]
    fn test_job_groups_by_signature() {
        let reg = registry();
        let mut store = JobStore::new();
        store.insert(Job::new("L1", "R1").with_tool("T1", 2)).unwrap();
        store.insert(Job::new("L2", "R1").with_tool("T2", 1)).unwrap();
        store.insert(Job::new("L3", "R1").with_tool("T1", 2)).unwrap();

        let mut grouping = group_machines_by_recipe(&reg, &store);
        let orphans = group_jobs_by_tool_and_wire(&mut grouping, &mut store, &ResourcePool::new());
        assert!(orphans.is_empty());
        assert_eq!(grouping.job_groups.len(), 2);
        assert_eq!(grouping.job_groups[0].signature.part_no, "T1");
        assert_eq!(grouping.job_groups[0].jobs.len(), 2);
        assert_eq!(grouping.job_groups[0].tool_demand, 4);
        assert_eq!(grouping.job_groups[1].signature.part_no, "T2");
    }

    #[test]
    fn test_orphan_jobs_with_zero_stock() {
        let reg = registry();
        let mut pool = ResourcePool::new();
        pool.materialize(ResourceKind::Tool, &BTreeMap::from([("T0".to_string(), 0)]));

        let mut store = JobStore::new();
        let orphan = store.insert(Job::new("L1", "R2").with_tool("T0", 1)).unwrap();
        // Has members already, so not an orphan even with zero stock
        let served = store.insert(Job::new("L2", "R1").with_tool("T0", 1)).unwrap();

        let mut grouping = group_machines_by_recipe(&reg, &store);
        let orphans = group_jobs_by_tool_and_wire(&mut grouping, &mut store, &pool);
        assert_eq!(orphans, vec![orphan]);
        assert_eq!(store.state(orphan), JobState::Orphan);
        assert_eq!(store.state(served), JobState::Unscheduled);

        let r2 = grouping.group_of_recipe("R2").unwrap();
        assert!(!grouping.machine_groups[r2].has_demand());
        assert_eq!(grouping.job_groups[0].orphan_jobs, vec![orphan]);
        assert_eq!(grouping.pending_count(), 1);
    }
}
