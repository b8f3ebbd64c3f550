//! Job/machine eligibility.
//!
//! Answers "can job J run on machine M?" and, if not, which check failed.
//! The evaluator is a pure predicate over the job, the machine and the
//! planner's manual tables; it never mutates anything, so calling it twice
//! with unchanged tables gives the same answer.
//!
//! # Checks (all must pass, in this order)
//! 0. Pre-computed candidate list, when the job carries one
//! 1. Location
//! 2. Model (strict: model in the process-time table; relaxed: also allowed
//!    when the machine is loaded with the job's recipe)
//! 3. Customer dedication
//! 4. Manual allow list, then manual restrain list
//!
//! Automotive lots always use the relaxed model rule.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::models::{DedicationTable, Job, Machine, MachineConstraint, MachineId};
use crate::store::MachineRegistry;

/// Why a job cannot run on a machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IneligibleReason {
    /// Not in the job's pre-computed candidate list.
    NotCandidate,
    /// Machine location not in the job's location list.
    Location,
    /// Machine model cannot run the job.
    Model,
    /// Machine dedicated to another customer.
    Dedicated,
    /// Allow list applies to the job and does not cover the machine.
    NotAllowed,
    /// Restrain list forbids the machine for the job.
    Restrained,
}

impl fmt::Display for IneligibleReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            IneligibleReason::NotCandidate => "not a candidate machine",
            IneligibleReason::Location => "location not allowed",
            IneligibleReason::Model => "model cannot run the job",
            IneligibleReason::Dedicated => "dedicated to another customer",
            IneligibleReason::NotAllowed => "not in allow list",
            IneligibleReason::Restrained => "restrained",
        };
        f.write_str(text)
    }
}

/// Result of an eligibility check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eligibility {
    Eligible,
    Ineligible(IneligibleReason),
}

impl Eligibility {
    pub fn is_eligible(self) -> bool {
        matches!(self, Eligibility::Eligible)
    }

    pub fn reason(self) -> Option<IneligibleReason> {
        match self {
            Eligibility::Eligible => None,
            Eligibility::Ineligible(reason) => Some(reason),
        }
    }
}

/// Manual tables consulted by the evaluator.
#[derive(Debug, Clone, Default)]
pub struct EligibilityTables {
    pub dedicated: DedicationTable,
    /// Allow list ("machine constraint A"). `None` = no restriction.
    pub allow: Option<MachineConstraint>,
    /// Restrain list ("machine constraint R"). `None` = no restriction.
    pub restrain: Option<MachineConstraint>,
    pub automotive_lots: HashSet<String>,
}

/// Pure eligibility predicate.
#[derive(Debug, Clone, Copy)]
pub struct EligibilityEvaluator<'a> {
    tables: &'a EligibilityTables,
    strict_model: bool,
}

impl<'a> EligibilityEvaluator<'a> {
    pub fn new(tables: &'a EligibilityTables, strict_model: bool) -> Self {
        Self {
            tables,
            strict_model,
        }
    }

    pub fn evaluate(&self, job: &Job, machine: &Machine) -> Eligibility {
        let failed = if !candidate_permits(job, machine) {
            Some(IneligibleReason::NotCandidate)
        } else if !location_permits(job, machine) {
            Some(IneligibleReason::Location)
        } else if !model_permits(job, machine, self.strict_for(job)) {
            Some(IneligibleReason::Model)
        } else if !self.tables.dedicated.permits(&job.customer, &machine.name) {
            Some(IneligibleReason::Dedicated)
        } else if self.allow_rejects(job, machine) {
            Some(IneligibleReason::NotAllowed)
        } else if self.restrain_rejects(job, machine) {
            Some(IneligibleReason::Restrained)
        } else {
            None
        };

        match failed {
            None => Eligibility::Eligible,
            Some(reason) => Eligibility::Ineligible(reason),
        }
    }

    #[inline]
    pub fn is_eligible(&self, job: &Job, machine: &Machine) -> bool {
        self.evaluate(job, machine).is_eligible()
    }

    /// Every registered machine the job may run on, registration order.
    pub fn eligible_machines(&self, job: &Job, machines: &MachineRegistry) -> Vec<MachineId> {
        machines
            .iter()
            .filter(|(_, m)| self.is_eligible(job, m))
            .map(|(id, _)| id)
            .collect()
    }

    /// The most common failure reason across all machines (first seen on
    /// ties); `None` if the job is eligible somewhere or there are no machines.
    pub fn dominant_reason(&self, job: &Job, machines: &MachineRegistry) -> Option<IneligibleReason> {
        let mut counts: Vec<(IneligibleReason, usize)> = Vec::new();
        for (_, machine) in machines.iter() {
            match self.evaluate(job, machine) {
                Eligibility::Eligible => return None,
                Eligibility::Ineligible(reason) => {
                    match counts.iter_mut().find(|(r, _)| *r == reason) {
                        Some((_, n)) => *n += 1,
                        None => counts.push((reason, 1)),
                    }
                }
            }
        }
        let mut best: Option<(IneligibleReason, usize)> = None;
        for (reason, n) in counts {
            if best.is_none_or(|(_, top)| n > top) {
                best = Some((reason, n));
            }
        }
        best.map(|(reason, _)| reason)
    }

    pub fn is_automotive(&self, job: &Job) -> bool {
        self.tables.automotive_lots.contains(&job.lot_number)
    }

    fn strict_for(&self, job: &Job) -> bool {
        self.strict_model && !self.is_automotive(job)
    }

    fn allow_rejects(&self, job: &Job, machine: &Machine) -> bool {
        self.tables
            .allow
            .as_ref()
            .and_then(|mc| mc.matches(job, &machine.name))
            == Some(false)
    }

    fn restrain_rejects(&self, job: &Job, machine: &Machine) -> bool {
        self.tables
            .restrain
            .as_ref()
            .and_then(|mc| mc.matches(job, &machine.name))
            == Some(true)
    }
}

/// Candidate-list check. An empty list permits every machine.
pub fn candidate_permits(job: &Job, machine: &Machine) -> bool {
    job.candidate_machines.is_empty() || job.candidate_machines.contains(&machine.name)
}

/// Location check. An empty location list permits every location.
pub fn location_permits(job: &Job, machine: &Machine) -> bool {
    job.locations.is_empty() || job.locations.contains(&machine.location)
}

/// Model check.
pub fn model_permits(job: &Job, machine: &Machine, strict: bool) -> bool {
    if job.process_times.contains_key(&machine.model) {
        return true;
    }
    !strict && machine.recipe() == Some(job.recipe.as_str())
}
