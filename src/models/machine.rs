//! Machine model.
//!
//! A machine is one bonder on the floor. It has a model and location fixed at
//! construction, an optional current setup (the recipe and tooling it is
//! loaded for), the resource instances it currently holds, and an ordered
//! dispatch queue.
//!
//! Each queue entry may start with a changeover: its setup time is charged
//! against the tooling of the entry before it (or the initial setup).
//!
//! The queue is FIFO in insertion order. It is only ever appended to or cut
//! at the tail; survivors are never reordered.

use serde::{Deserialize, Serialize};

use super::{JobId, JobSignature, ResourceId};
use crate::config::SetupTimes;

/// Handle into the [`MachineRegistry`](crate::store::MachineRegistry).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MachineId(pub u32);

impl MachineId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// The recipe and tooling a machine is currently loaded for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineSetup {
    pub recipe: String,
    /// Tool kind name.
    pub part_no: String,
    /// Wire kind name.
    pub part_id: String,
    /// Nominal tool capacity for this setup.
    pub tools: u32,
    /// Nominal wire capacity for this setup.
    pub wires: u32,
}

impl MachineSetup {
    /// Setup with one tool and one wire.
    pub fn new(
        recipe: impl Into<String>,
        part_no: impl Into<String>,
        part_id: impl Into<String>,
    ) -> Self {
        Self {
            recipe: recipe.into(),
            part_no: part_no.into(),
            part_id: part_id.into(),
            tools: 1,
            wires: 1,
        }
    }

    pub fn from_signature(signature: &JobSignature) -> Self {
        Self {
            recipe: signature.recipe.clone(),
            part_no: signature.part_no.clone(),
            part_id: signature.part_id.clone(),
            tools: signature.tools_required,
            wires: signature.wires_required,
        }
    }
}

/// A job placed on a machine queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedJob {
    pub job: JobId,
    /// Projected start, changeover included (ms).
    pub start_ms: i64,
    /// Changeover before processing (ms).
    pub setup_ms: i64,
    /// Projected end (ms).
    pub end_ms: i64,
    /// Manually prescheduled. Pinned entries are never evicted.
    pub pinned: bool,
}

/// A bonding machine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Machine {
    /// Entity name, unique per run.
    pub name: String,
    pub model: String,
    pub location: String,
    /// Earliest time the machine can start work (ms).
    pub available_ms: i64,
    pub setup: Option<MachineSetup>,
    /// Held tool instances.
    pub tools: Vec<ResourceId>,
    /// Held wire instances.
    pub wires: Vec<ResourceId>,
    /// Tooling of the last job run or queued; changeovers are charged from it.
    #[serde(default)]
    pub last_run: Option<MachineSetup>,
    queue: Vec<QueuedJob>,
    /// `last_run` as it was before each queue entry.
    #[serde(default)]
    run_before: Vec<Option<MachineSetup>>,
}

impl Machine {
    pub fn new(
        name: impl Into<String>,
        model: impl Into<String>,
        location: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            model: model.into(),
            location: location.into(),
            available_ms: 0,
            setup: None,
            tools: Vec::new(),
            wires: Vec::new(),
            last_run: None,
            queue: Vec::new(),
            run_before: Vec::new(),
        }
    }

    /// Sets the recover time.
    pub fn with_available_time(mut self, available_ms: i64) -> Self {
        self.available_ms = available_ms;
        self
    }

    /// Sets the loaded setup, which is also what the machine last ran.
    pub fn with_setup(mut self, setup: MachineSetup) -> Self {
        self.last_run = Some(setup.clone());
        self.setup = Some(setup);
        self
    }

    /// Currently loaded recipe.
    pub fn recipe(&self) -> Option<&str> {
        self.setup.as_ref().map(|s| s.recipe.as_str())
    }

    /// Whether the current setup matches a signature's recipe and tooling.
    pub fn carries(&self, signature: &JobSignature) -> bool {
        self.setup.as_ref().is_some_and(|s| {
            s.recipe == signature.recipe
                && s.part_no == signature.part_no
                && s.part_id == signature.part_id
        })
    }

    pub fn queue(&self) -> &[QueuedJob] {
        &self.queue
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn has_work(&self) -> bool {
        !self.queue.is_empty()
    }

    /// Queued job handles in dispatch order.
    pub fn job_ids(&self) -> Vec<JobId> {
        self.queue.iter().map(|q| q.job).collect()
    }

    /// When the machine finishes everything queued (ms).
    pub fn projected_free_ms(&self) -> i64 {
        self.queue
            .last()
            .map(|q| q.end_ms.max(self.available_ms))
            .unwrap_or(self.available_ms)
    }

    /// Start time a job arriving at `earliest_ms` would get.
    pub fn next_start_ms(&self, earliest_ms: i64) -> i64 {
        self.projected_free_ms().max(earliest_ms)
    }

    /// Pushes back the earliest start (e.g. waiting for a tool).
    pub fn delay_until(&mut self, time_ms: i64) {
        self.available_ms = self.available_ms.max(time_ms);
    }

    /// Appends a job at the tail of the queue with no changeover.
    pub fn push_job(
        &mut self,
        job: JobId,
        duration_ms: i64,
        earliest_ms: i64,
        pinned: bool,
    ) -> QueuedJob {
        self.push_entry(job, 0, duration_ms, earliest_ms, pinned)
    }

    /// Changeover a job with `signature` would pay at the tail of the queue.
    pub fn changeover_ms(&self, signature: &JobSignature, times: &SetupTimes) -> i64 {
        times.between(self.last_run.as_ref(), signature).max(0)
    }

    /// Appends a job, charging the changeover from the previous tooling.
    pub fn append_job(
        &mut self,
        job: JobId,
        signature: &JobSignature,
        duration_ms: i64,
        earliest_ms: i64,
        pinned: bool,
        times: &SetupTimes,
    ) -> QueuedJob {
        let setup_ms = self.changeover_ms(signature, times);
        let entry = self.push_entry(job, setup_ms, duration_ms, earliest_ms, pinned);
        self.last_run = Some(MachineSetup::from_signature(signature));
        entry
    }

    fn push_entry(
        &mut self,
        job: JobId,
        setup_ms: i64,
        duration_ms: i64,
        earliest_ms: i64,
        pinned: bool,
    ) -> QueuedJob {
        let start_ms = self.next_start_ms(earliest_ms);
        self.run_before.push(self.last_run.clone());
        let entry = QueuedJob {
            job,
            start_ms,
            setup_ms,
            end_ms: start_ms + setup_ms + duration_ms.max(0),
            pinned,
        };
        self.queue.push(entry);
        entry
    }

    /// Cuts the queue after `keep` entries and returns the removed tail.
    /// `last_run` goes back to the tooling of the last surviving entry.
    pub fn truncate_queue(&mut self, keep: usize) -> Vec<QueuedJob> {
        if keep >= self.queue.len() {
            return Vec::new();
        }
        if let Some(before) = self.run_before.get(keep) {
            self.last_run = before.clone();
        }
        self.run_before.truncate(keep);
        self.queue.split_off(keep)
    }

    /// Length of the shortest queue prefix holding every pinned entry.
    pub fn pinned_extent(&self) -> usize {
        self.queue
            .iter()
            .rposition(|q| q.pinned)
            .map_or(0, |i| i + 1)
    }
}
