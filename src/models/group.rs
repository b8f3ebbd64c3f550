//! Machine groups and job groups.
//!
//! A [`MachineGroup`] gathers the machines and jobs of one recipe. A
//! [`JobGroup`] gathers unscheduled jobs sharing one tool/wire signature and
//! is what the resource distributor and machine selector work on. Both are
//! rebuilt at the start of every pass.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::{JobId, MachineId, ResourceId};

/// Grouping key: recipe plus the tooling it consumes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JobSignature {
    pub recipe: String,
    pub part_no: String,
    pub part_id: String,
    pub tools_required: u32,
    pub wires_required: u32,
}

impl fmt::Display for JobSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}[{}x{}/{}x{}]",
            self.recipe, self.part_no, self.tools_required, self.part_id, self.wires_required
        )
    }
}

/// Machines and jobs sharing one recipe.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MachineGroup {
    pub recipe: String,
    pub machines: Vec<MachineId>,
    pub unscheduled_jobs: Vec<JobId>,
    /// Urgent jobs, dispatched before `unscheduled_jobs`.
    pub expedite_jobs: Vec<JobId>,
    pub scheduled_jobs: Vec<JobId>,
    /// Tool instances held by members.
    pub tools: Vec<ResourceId>,
    /// Wire instances held by members.
    pub wires: Vec<ResourceId>,
    /// How badly the group needs one more machine (higher = more).
    pub index: f64,
}

impl MachineGroup {
    pub fn new(recipe: impl Into<String>) -> Self {
        Self {
            recipe: recipe.into(),
            ..Default::default()
        }
    }

    /// Whether the group still has jobs waiting.
    pub fn has_demand(&self) -> bool {
        !self.unscheduled_jobs.is_empty() || !self.expedite_jobs.is_empty()
    }

    /// Waiting jobs, expedite first.
    pub fn pending_jobs(&self) -> impl Iterator<Item = JobId> + '_ {
        self.expedite_jobs
            .iter()
            .chain(self.unscheduled_jobs.iter())
            .copied()
    }

    pub fn pending_count(&self) -> usize {
        self.expedite_jobs.len() + self.unscheduled_jobs.len()
    }

    pub fn contains_machine(&self, machine: MachineId) -> bool {
        self.machines.contains(&machine)
    }
}

/// Unscheduled jobs sharing one tool/wire signature.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobGroup {
    pub signature: JobSignature,
    pub jobs: Vec<JobId>,
    /// Jobs whose signature cannot be served by any machine group.
    pub orphan_jobs: Vec<JobId>,
    /// Σ tools required over `jobs`.
    pub tool_demand: u32,
    /// Σ wires required over `jobs`.
    pub wire_demand: u32,
    /// Tool instances granted by the distributor.
    pub tools_allocated: u32,
    /// Wire instances granted by the distributor.
    pub wires_allocated: u32,
    /// Machines the selector should pick.
    pub machine_count: usize,
}

impl JobGroup {
    pub fn new(signature: JobSignature) -> Self {
        Self {
            signature,
            jobs: Vec::new(),
            orphan_jobs: Vec::new(),
            tool_demand: 0,
            wire_demand: 0,
            tools_allocated: 0,
            wires_allocated: 0,
            machine_count: 0,
        }
    }

    /// Adds a servable job and its demand.
    pub fn push(&mut self, job: JobId) {
        self.jobs.push(job);
        self.tool_demand += self.signature.tools_required;
        self.wire_demand += self.signature.wires_required;
        self.machine_count = self.jobs.len();
    }

    /// Group name used in distribution logs.
    pub fn name(&self) -> String {
        self.signature.to_string()
    }
}

/// One input row of a proportional allocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionEntry {
    pub name: String,
    /// Share of the total demand (0.0..=1.0).
    pub ratio: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signature() -> JobSignature {
        JobSignature {
            recipe: "R1".into(),
            part_no: "T1".into(),
            part_id: "W1".into(),
            tools_required: 2,
            wires_required: 1,
        }
    }

    #[test]
    fn test_job_group_demand() {
        let mut g = JobGroup::new(signature());
        g.push(JobId(0));
        g.push(JobId(1));
        assert_eq!(g.tool_demand, 4);
        assert_eq!(g.wire_demand, 2);
        assert_eq!(g.machine_count, 2);
        assert_eq!(g.name(), "R1[T1x2/W1x1]");
    }

    #[test]
    fn test_pending_expedite_first() {
        let mut g = MachineGroup::new("R1");
        g.unscheduled_jobs = vec![JobId(1), JobId(2)];
        g.expedite_jobs = vec![JobId(7)];
        assert!(g.has_demand());
        assert_eq!(g.pending_count(), 3);
        assert_eq!(
            g.pending_jobs().collect::<Vec<_>>(),
            vec![JobId(7), JobId(1), JobId(2)]
        );
    }
}
