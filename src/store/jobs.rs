//! Job arena.
//!
//! Every job record lives here exactly once, together with its scheduling
//! state. Machines and groups refer to jobs by [`JobId`].

use std::collections::HashMap;

use crate::error::{Result, SchedulerError};
use crate::models::{Job, JobId, JobState, MachineId};
use crate::validation::{ValidationError, ValidationErrorKind};

#[derive(Debug, Clone, Default)]
pub struct JobStore {
    jobs: Vec<Job>,
    states: Vec<JobState>,
    index: HashMap<String, JobId>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an unscheduled job. Lot numbers must be unique.
    pub fn insert(&mut self, job: Job) -> Result<JobId> {
        if self.index.contains_key(&job.lot_number) {
            return Err(SchedulerError::invalid(ValidationError::new(
                ValidationErrorKind::DuplicateId,
                format!("Duplicate lot number: {}", job.lot_number),
            )));
        }
        let id = JobId(self.jobs.len() as u32);
        self.index.insert(job.lot_number.clone(), id);
        self.jobs.push(job);
        self.states.push(JobState::Unscheduled);
        Ok(id)
    }

    #[inline]
    pub fn get(&self, id: JobId) -> &Job {
        &self.jobs[id.index()]
    }

    #[inline]
    pub fn get_mut(&mut self, id: JobId) -> &mut Job {
        &mut self.jobs[id.index()]
    }

    pub fn lookup(&self, lot_number: &str) -> Result<JobId> {
        self.index
            .get(lot_number)
            .copied()
            .ok_or_else(|| SchedulerError::job_not_found(lot_number))
    }

    #[inline]
    pub fn state(&self, id: JobId) -> JobState {
        self.states[id.index()]
    }

    pub fn mark_scheduled(&mut self, id: JobId, machine: MachineId) {
        self.states[id.index()] = JobState::Scheduled(machine);
    }

    pub fn mark_unscheduled(&mut self, id: JobId) {
        self.states[id.index()] = JobState::Unscheduled;
    }

    pub fn mark_in_process(&mut self, id: JobId, machine: MachineId) {
        self.states[id.index()] = JobState::InProcess(machine);
    }

    pub fn mark_orphan(&mut self, id: JobId) {
        self.states[id.index()] = JobState::Orphan;
    }

    /// All handles in insertion order.
    pub fn ids(&self) -> impl Iterator<Item = JobId> {
        (0..self.jobs.len() as u32).map(JobId)
    }

    pub fn iter(&self) -> impl Iterator<Item = (JobId, &Job)> {
        self.jobs
            .iter()
            .enumerate()
            .map(|(i, job)| (JobId(i as u32), job))
    }

    /// Handles currently in `state`, insertion order.
    pub fn with_state(&self, state: JobState) -> Vec<JobId> {
        self.ids().filter(|&id| self.state(id) == state).collect()
    }

    pub fn unscheduled(&self) -> Vec<JobId> {
        self.with_state(JobState::Unscheduled)
    }

    pub fn orphans(&self) -> Vec<JobId> {
        self.with_state(JobState::Orphan)
    }

    pub fn scheduled_count(&self) -> usize {
        self.states
            .iter()
            .filter(|s| matches!(s, JobState::Scheduled(_)))
            .count()
    }

    pub fn in_process_count(&self) -> usize {
        self.states
            .iter()
            .filter(|s| matches!(s, JobState::InProcess(_)))
            .count()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_lookup() {
        let mut store = JobStore::new();
        let a = store.insert(Job::new("L1", "R1")).unwrap();
        let b = store.insert(Job::new("L2", "R1")).unwrap();

        assert_eq!(store.lookup("L2").unwrap(), b);
        assert_eq!(store.get(a).lot_number, "L1");
        assert_eq!(store.unscheduled(), vec![a, b]);
        assert!(store.lookup("nope").is_err());
    }

    #[test]
    fn test_duplicate_lot_rejected() {
        let mut store = JobStore::new();
        store.insert(Job::new("L1", "R1")).unwrap();
        let err = store.insert(Job::new("L1", "R2")).unwrap_err();
        assert!(matches!(err, SchedulerError::InvalidConfiguration(_)));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_state_transitions() {
        let mut store = JobStore::new();
        let id = store.insert(Job::new("L1", "R1")).unwrap();

        store.mark_scheduled(id, MachineId(0));
        assert_eq!(store.state(id), JobState::Scheduled(MachineId(0)));
        assert_eq!(store.scheduled_count(), 1);

        store.mark_unscheduled(id);
        assert_eq!(store.unscheduled(), vec![id]);

        store.mark_orphan(id);
        assert_eq!(store.orphans(), vec![id]);
        assert!(store.unscheduled().is_empty());
    }

    #[test]
    fn test_in_process_is_not_scheduled() {
        let mut store = JobStore::new();
        let id = store.insert(Job::new("L1", "R1")).unwrap();

        store.mark_in_process(id, MachineId(3));
        assert_eq!(store.state(id), JobState::InProcess(MachineId(3)));
        assert_eq!(store.scheduled_count(), 0);
        assert_eq!(store.in_process_count(), 1);
        assert!(store.unscheduled().is_empty());
    }
}
