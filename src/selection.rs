//! Machine selection for job groups.
//!
//! Idle machines go into a [`CandidatePool`]. Each job group claims up to
//! its settled machine count from the pool; a claimed machine is gone for
//! the rest of the pass, so no machine serves two groups at once.
//!
//! A machine can be reserved for a recipe. A reserved machine is offered only
//! to job groups of that recipe, which lets a recipe-group member be retooled
//! for its own recipe without being pulled into another group.

use std::collections::{HashMap, HashSet};

use crate::eligibility::EligibilityEvaluator;
use crate::models::{JobGroup, MachineId, TransportationTable};
use crate::store::{JobStore, MachineRegistry};

/// Claim-once set of machines open for selection.
#[derive(Debug, Clone, Default)]
pub struct CandidatePool {
    order: Vec<MachineId>,
    claimed: HashSet<MachineId>,
    reserved: HashMap<MachineId, String>,
}

impl CandidatePool {
    /// Machines in registration order.
    pub fn new(machines: impl IntoIterator<Item = MachineId>) -> Self {
        Self {
            order: machines.into_iter().collect(),
            claimed: HashSet::new(),
            reserved: HashMap::new(),
        }
    }

    /// Adds `machine` open to every recipe.
    pub fn add(&mut self, machine: MachineId) {
        if !self.order.contains(&machine) {
            self.order.push(machine);
        }
    }

    /// Adds `machine` (if absent) and restricts it to groups of `recipe`.
    pub fn reserve(&mut self, machine: MachineId, recipe: &str) {
        self.add(machine);
        self.reserved.insert(machine, recipe.to_string());
    }

    /// Takes a machine. Returns `false` if it is not in the pool or already
    /// taken.
    pub fn claim(&mut self, machine: MachineId) -> bool {
        self.order.contains(&machine) && self.claimed.insert(machine)
    }

    pub fn is_claimed(&self, machine: MachineId) -> bool {
        self.claimed.contains(&machine)
    }

    /// Unclaimed machines, registration order.
    pub fn available(&self) -> impl Iterator<Item = MachineId> + '_ {
        self.order
            .iter()
            .copied()
            .filter(|m| !self.claimed.contains(m))
    }

    /// Unclaimed machines open to a job group of `recipe`.
    pub fn available_for<'a>(&'a self, recipe: &'a str) -> impl Iterator<Item = MachineId> + 'a {
        self.available()
            .filter(move |m| self.reserved.get(m).is_none_or(|r| r == recipe))
    }

    pub fn remaining(&self) -> usize {
        self.order.len() - self.claimed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }
}

/// Ranking inputs for one candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Rank {
    /// `false` sorts first: already carries the signature.
    needs_reload: bool,
    free_ms: i64,
    transport_ms: i64,
    position: usize,
}

/// Picks and claims machines for a job group.
///
/// A candidate qualifies when it is eligible for at least one of the group's
/// jobs and is open to the group's recipe. Qualifying machines are ranked by: already carrying the signature,
/// earliest projected free time, shortest transport from the jobs' origin,
/// registration order. At most `wanted` are claimed.
pub fn choose_machines_for_group(
    group: &JobGroup,
    wanted: usize,
    candidates: &mut CandidatePool,
    machines: &MachineRegistry,
    jobs: &JobStore,
    evaluator: &EligibilityEvaluator<'_>,
    transport: &TransportationTable,
) -> Vec<MachineId> {
    if wanted == 0 || group.jobs.is_empty() {
        return Vec::new();
    }

    let origins: Vec<&str> = group
        .jobs
        .iter()
        .filter_map(|&j| jobs.get(j).origin.as_deref())
        .collect();

    let mut ranked: Vec<(Rank, MachineId)> = candidates
        .available_for(&group.signature.recipe)
        .enumerate()
        .filter_map(|(position, id)| {
            let machine = machines.get(id);
            let eligible = group
                .jobs
                .iter()
                .any(|&j| evaluator.is_eligible(jobs.get(j), machine));
            if !eligible {
                return None;
            }
            let transport_ms = origins
                .iter()
                .map(|origin| transport.time_between(origin, &machine.location))
                .min()
                .unwrap_or(0);
            let rank = Rank {
                needs_reload: !machine.carries(&group.signature),
                free_ms: machine.projected_free_ms(),
                transport_ms,
                position,
            };
            Some((rank, id))
        })
        .collect();
    ranked.sort();

    let mut chosen = Vec::with_capacity(wanted.min(ranked.len()));
    for (_, id) in ranked {
        if chosen.len() == wanted {
            break;
        }
        if candidates.claim(id) {
            chosen.push(id);
        }
    }

    tracing::debug!(
        group = %group.name(),
        wanted,
        chosen = chosen.len(),
        "machines selected"
    );
    chosen
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eligibility::EligibilityTables;
    use crate::models::{Job, JobSignature, Machine, MachineSetup};

    fn setup() -> (MachineRegistry, JobStore, JobGroup) {
        let mut reg = MachineRegistry::new();
        reg.add(Machine::new("M1", "UTC3000", "TA-B").with_available_time(100)).unwrap();
        reg.add(Machine::new("M2", "UTC3000", "TA-A").with_available_time(100)).unwrap();
        reg.add(Machine::new("M3", "UTC1000", "TA-A")).unwrap();
        reg.add(
            Machine::new("M4", "UTC3000", "TA-A")
                .with_available_time(900)
                .with_setup(MachineSetup::new("R1", "T1", "W1")),
        )
        .unwrap();

        let mut store = JobStore::new();
        let job = Job::new("L1", "R1")
            .with_tool("T1", 1)
            .with_wire("W1", 1)
            .with_process_time("UTC3000", 100)
            .with_origin("TA-A");
        let signature: JobSignature = job.signature();
        let id = store.insert(job).unwrap();
        let mut group = JobGroup::new(signature);
        group.push(id);
        (reg, store, group)
    }

    #[test]
    fn test_claim_once() {
        let mut pool = CandidatePool::new([MachineId(0), MachineId(1)]);
        assert!(pool.claim(MachineId(1)));
        assert!(!pool.claim(MachineId(1)));
        assert!(!pool.claim(MachineId(7)));
        assert_eq!(pool.available().collect::<Vec<_>>(), vec![MachineId(0)]);
        assert_eq!(pool.remaining(), 1);
    }

    #[test]
    fn test_reserved_machine_only_for_its_recipe() {
        let mut pool = CandidatePool::new([MachineId(0)]);
        pool.reserve(MachineId(2), "R1");
        assert_eq!(pool.available_for("R2").collect::<Vec<_>>(), vec![MachineId(0)]);
        assert_eq!(
            pool.available_for("R1").collect::<Vec<_>>(),
            vec![MachineId(0), MachineId(2)]
        );
        assert_eq!(pool.remaining(), 2);
    }

    #[test]
    fn test_reserved_member_chosen_for_own_recipe() {
        let (reg, store, group) = setup();
        let tables = EligibilityTables::default();
        let ev = EligibilityEvaluator::new(&tables, true);
        let m2 = reg.lookup("M2").unwrap();

        let mut pool = CandidatePool::default();
        pool.reserve(m2, "R9");
        let none = choose_machines_for_group(
            &group,
            1,
            &mut pool,
            &reg,
            &store,
            &ev,
            &TransportationTable::new(),
        );
        assert!(none.is_empty());

        let mut pool = CandidatePool::default();
        pool.reserve(m2, "R1");
        let chosen = choose_machines_for_group(
            &group,
            1,
            &mut pool,
            &reg,
            &store,
            &ev,
            &TransportationTable::new(),
        );
        assert_eq!(chosen, vec![m2]);
    }

    #[test]
    fn test_ranking() {
        let (reg, store, group) = setup();
        let tables = EligibilityTables::default();
        let ev = EligibilityEvaluator::new(&tables, true);
        let transport = TransportationTable::new().with_time("TA-A", "TA-B", 30);

        let mut pool = CandidatePool::new(reg.ids());
        let chosen =
            choose_machines_for_group(&group, 3, &mut pool, &reg, &store, &ev, &transport);
        // M4 carries the signature; M2 beats M1 on transport; M3 has the wrong model.
        assert_eq!(
            chosen,
            vec![
                reg.lookup("M4").unwrap(),
                reg.lookup("M2").unwrap(),
                reg.lookup("M1").unwrap()
            ]
        );
        assert!(!pool.is_claimed(reg.lookup("M3").unwrap()));
    }

    #[test]
    fn test_no_double_assignment() {
        let (reg, store, group) = setup();
        let tables = EligibilityTables::default();
        let ev = EligibilityEvaluator::new(&tables, true);
        let transport = TransportationTable::new();

        let mut pool = CandidatePool::new(reg.ids());
        let first = choose_machines_for_group(&group, 2, &mut pool, &reg, &store, &ev, &transport);
        let second = choose_machines_for_group(&group, 5, &mut pool, &reg, &store, &ev, &transport);
        assert_eq!(first.len(), 2);
        assert_eq!(second.len(), 1);
        assert!(second.iter().all(|m| !first.contains(m)));
    }

    #[test]
    fn test_zero_wanted() {
        let (reg, store, group) = setup();
        let tables = EligibilityTables::default();
        let ev = EligibilityEvaluator::new(&tables, true);
        let mut pool = CandidatePool::new(reg.ids());
        let chosen = choose_machines_for_group(
            &group,
            0,
            &mut pool,
            &reg,
            &store,
            &ev,
            &TransportationTable::new(),
        );
        assert!(chosen.is_empty());
        assert_eq!(pool.remaining(), 4);
    }
}
