//! Job (lot) model.
//!
//! A job is one assembly lot waiting at the bonding station. It carries the
//! recipe it needs, the tool and wire kinds that recipe consumes, and the
//! eligibility data computed upstream (locations, per-model process times).
//!
//! # Time Representation
//! All times are in milliseconds relative to the scheduling epoch (t=0).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::{JobSignature, MachineId};

/// Handle into the [`JobStore`](crate::store::JobStore) arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JobId(pub u32);

impl JobId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Scheduling state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    /// Waiting for a machine.
    Unscheduled,
    /// Appended to the queue of the given machine.
    Scheduled(MachineId),
    /// Already running on the given machine when the run starts; never queued.
    InProcess(MachineId),
    /// Cannot be served in this run (no eligible machine, or no way to stand
    /// up a group for its signature).
    Orphan,
}

/// A job (lot) to be dispatched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Lot number, unique per run.
    pub lot_number: String,
    /// Production recipe (bonding diagram).
    pub recipe: String,
    /// Customer code, used by the dedication table.
    pub customer: String,
    /// Tool kind name.
    pub part_no: String,
    /// Wire kind name.
    pub part_id: String,
    /// Tool instances a machine needs to run this job.
    pub tools_required: u32,
    /// Wire instances a machine needs to run this job.
    pub wires_required: u32,
    /// Locations the job may run in. Empty = anywhere.
    pub locations: Vec<String>,
    /// Process time per machine model (ms).
    pub process_times: HashMap<String, i64>,
    /// Pre-computed machine names. Empty = derive from the other checks.
    pub candidate_machines: Vec<String>,
    /// Arrival at the bonding station (ms).
    pub arrival_ms: i64,
    /// Latest completion time (ms).
    pub due_ms: Option<i64>,
    /// Expedite flag.
    pub urgent: bool,
    /// Where the lot currently sits, for transport tie-breaks.
    pub origin: Option<String>,
    /// Machine the lot is manually pinned to.
    pub pinned_machine: Option<String>,
}

impl Job {
    /// Creates a job needing one tool and one wire of empty kinds.
    pub fn new(lot_number: impl Into<String>, recipe: impl Into<String>) -> Self {
        Self {
            lot_number: lot_number.into(),
            recipe: recipe.into(),
            customer: String::new(),
            part_no: String::new(),
            part_id: String::new(),
            tools_required: 1,
            wires_required: 1,
            locations: Vec::new(),
            process_times: HashMap::new(),
            candidate_machines: Vec::new(),
            arrival_ms: 0,
            due_ms: None,
            urgent: false,
            origin: None,
            pinned_machine: None,
        }
    }

    pub fn with_customer(mut self, customer: impl Into<String>) -> Self {
        self.customer = customer.into();
        self
    }

    /// Sets the tool kind and how many instances a machine needs.
    pub fn with_tool(mut self, part_no: impl Into<String>, count: u32) -> Self {
        self.part_no = part_no.into();
        self.tools_required = count;
        self
    }

    /// Sets the wire kind and how many instances a machine needs.
    pub fn with_wire(mut self, part_id: impl Into<String>, count: u32) -> Self {
        self.part_id = part_id.into();
        self.wires_required = count;
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.locations.push(location.into());
        self
    }

    pub fn with_process_time(mut self, model: impl Into<String>, ms: i64) -> Self {
        self.process_times.insert(model.into(), ms);
        self
    }

    pub fn with_candidate_machine(mut self, name: impl Into<String>) -> Self {
        self.candidate_machines.push(name.into());
        self
    }

    pub fn with_arrival(mut self, arrival_ms: i64) -> Self {
        self.arrival_ms = arrival_ms;
        self
    }

    pub fn with_due(mut self, due_ms: i64) -> Self {
        self.due_ms = Some(due_ms);
        self
    }

    pub fn with_urgent(mut self, urgent: bool) -> Self {
        self.urgent = urgent;
        self
    }

    pub fn with_origin(mut self, location: impl Into<String>) -> Self {
        self.origin = Some(location.into());
        self
    }

    /// Pins the job to a machine for manual prescheduling.
    pub fn pinned_to(mut self, machine: impl Into<String>) -> Self {
        self.pinned_machine = Some(machine.into());
        self
    }

    /// Process time on a model, if the table has one.
    pub fn process_time_on(&self, model: &str) -> Option<i64> {
        self.process_times.get(model).copied()
    }

    /// Mean of the process-time table (0.0 when empty).
    pub fn average_process_ms(&self) -> f64 {
        if self.process_times.is_empty() {
            return 0.0;
        }
        let total: i64 = self.process_times.values().sum();
        total as f64 / self.process_times.len() as f64
    }

    /// Duration on a model: the table value, else the table average.
    pub fn duration_on(&self, model: &str) -> i64 {
        self.process_time_on(model)
            .unwrap_or_else(|| self.average_process_ms().round() as i64)
    }

    /// Tool/wire signature used for job grouping.
    pub fn signature(&self) -> JobSignature {
        JobSignature {
            recipe: self.recipe.clone(),
            part_no: self.part_no.clone(),
            part_id: self.part_id.clone(),
            tools_required: self.tools_required,
            wires_required: self.wires_required,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_builder() {
        let job = Job::new("P23ASEA02", "AAS008YM2024A")
            .with_customer("MXIC")
            .with_tool("PART_NO", 1)
            .with_wire("PART_ID", 2)
            .with_location("TA-A")
            .with_process_time("UTC3000", 789)
            .with_arrival(100)
            .with_urgent(true);

        assert_eq!(job.lot_number, "P23ASEA02");
        assert_eq!(job.recipe, "AAS008YM2024A");
        assert_eq!(job.wires_required, 2);
        assert_eq!(job.locations, vec!["TA-A".to_string()]);
        assert_eq!(job.process_time_on("UTC3000"), Some(789));
        assert_eq!(job.process_time_on("UTC1000S"), None);
        assert!(job.urgent);
    }

    #[test]
    fn test_average_and_duration() {
        let job = Job::new("L1", "R1")
            .with_process_time("A", 100)
            .with_process_time("B", 300);
        assert!((job.average_process_ms() - 200.0).abs() < 1e-10);
        assert_eq!(job.duration_on("A"), 100);
        assert_eq!(job.duration_on("unknown"), 200);

        let empty = Job::new("L2", "R1");
        assert_eq!(empty.average_process_ms(), 0.0);
        assert_eq!(empty.duration_on("A"), 0);
    }

    #[test]
    fn test_signature_equality() {
        let a = Job::new("L1", "R1").with_tool("T", 1).with_wire("W", 1);
        let b = Job::new("L2", "R1").with_tool("T", 1).with_wire("W", 1);
        let c = Job::new("L3", "R1").with_tool("T", 2).with_wire("W", 1);
        assert_eq!(a.signature(), b.signature());
        assert_ne!(a.signature(), c.signature());
    }
}
