//! Manual eligibility tables.
//!
//! - [`MachineConstraint`]: planner-maintained allow / restrain lists that
//!   tie a class of jobs to a set of machine name patterns.
//! - [`DedicationTable`]: machines reserved for one customer.
//! - [`TransportationTable`]: travel time between two locations, used only
//!   as a selection tie-break.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::Job;

/// Which jobs a constraint entry applies to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobSelector {
    /// Exactly one lot.
    LotNumber(String),
    /// Every lot of a recipe.
    Recipe(String),
    /// Every lot of a customer.
    Customer(String),
    /// Every lot using a tool kind.
    PartNo(String),
}

impl JobSelector {
    pub fn matches(&self, job: &Job) -> bool {
        match self {
            JobSelector::LotNumber(lot) => job.lot_number == *lot,
            JobSelector::Recipe(recipe) => job.recipe == *recipe,
            JobSelector::Customer(customer) => job.customer == *customer,
            JobSelector::PartNo(part_no) => job.part_no == *part_no,
        }
    }
}

/// One row of a constraint table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstraintEntry {
    pub selector: JobSelector,
    /// Machine names. A trailing `*` matches by prefix (`"BB2*"`).
    pub machines: Vec<String>,
}

impl ConstraintEntry {
    pub fn new(selector: JobSelector, machines: Vec<String>) -> Self {
        Self { selector, machines }
    }

    /// Whether any pattern in this entry matches the machine name.
    pub fn covers(&self, machine_name: &str) -> bool {
        self.machines
            .iter()
            .any(|pattern| pattern_matches(pattern, machine_name))
    }
}

fn pattern_matches(pattern: &str, name: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => name.starts_with(prefix),
        None => pattern == name,
    }
}

/// A manual machine constraint table (allow list or restrain list).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineConstraint {
    pub entries: Vec<ConstraintEntry>,
}

impl MachineConstraint {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(mut self, selector: JobSelector, machines: Vec<String>) -> Self {
        self.entries.push(ConstraintEntry::new(selector, machines));
        self
    }

    /// Whether any entry applies to the job.
    pub fn applies_to(&self, job: &Job) -> bool {
        self.entries.iter().any(|e| e.selector.matches(job))
    }

    /// `None` when no entry applies to the job; otherwise whether an
    /// applicable entry covers the machine.
    pub fn matches(&self, job: &Job, machine_name: &str) -> Option<bool> {
        if !self.applies_to(job) {
            return None;
        }
        Some(
            self.entries
                .iter()
                .any(|e| e.selector.matches(job) && e.covers(machine_name)),
        )
    }

    /// Exact machine names (patterns without `*`), for validation.
    pub fn exact_machine_names(&self) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .flat_map(|e| e.machines.iter())
            .filter(|m| !m.ends_with('*'))
            .map(|m| m.as_str())
    }
}

/// Customer → machine → dedicated flag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DedicationTable {
    entries: HashMap<String, HashMap<String, bool>>,
}

impl DedicationTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, customer: impl Into<String>, machine: impl Into<String>, dedicated: bool) {
        self.entries
            .entry(customer.into())
            .or_default()
            .insert(machine.into(), dedicated);
    }

    pub fn with_dedication(
        mut self,
        customer: impl Into<String>,
        machine: impl Into<String>,
        dedicated: bool,
    ) -> Self {
        self.set(customer, machine, dedicated);
        self
    }

    pub fn get(&self, customer: &str, machine: &str) -> Option<bool> {
        self.entries
            .get(customer)
            .and_then(|machines| machines.get(machine))
            .copied()
    }

    /// Whether a lot of `customer` may run on `machine`.
    ///
    /// Rejected when another customer holds the machine as dedicated, or when
    /// the customer's own row marks it `false`. No entry = unrestricted.
    pub fn permits(&self, customer: &str, machine: &str) -> bool {
        if self.get(customer, machine) == Some(false) {
            return false;
        }
        !self
            .entries
            .iter()
            .any(|(owner, machines)| owner != customer && machines.get(machine) == Some(&true))
    }

    /// All machine names mentioned in the table.
    pub fn machine_names(&self) -> impl Iterator<Item = &str> {
        self.entries
            .values()
            .flat_map(|machines| machines.keys())
            .map(|m| m.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl From<HashMap<String, HashMap<String, bool>>> for DedicationTable {
    fn from(entries: HashMap<String, HashMap<String, bool>>) -> Self {
        Self { entries }
    }
}

/// Travel time between two locations (ms).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransportationTable {
    times: HashMap<(String, String), i64>,
}

impl TransportationTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, origin: impl Into<String>, destination: impl Into<String>, ms: i64) {
        self.times.insert((origin.into(), destination.into()), ms);
    }

    pub fn with_time(
        mut self,
        origin: impl Into<String>,
        destination: impl Into<String>,
        ms: i64,
    ) -> Self {
        self.set(origin, destination, ms);
        self
    }

    /// Explicit travel time, if present.
    pub fn get(&self, origin: &str, destination: &str) -> Option<i64> {
        self.times
            .get(&(origin.to_string(), destination.to_string()))
            .copied()
    }

    /// Travel time; missing entries count as 0.
    pub fn time_between(&self, origin: &str, destination: &str) -> i64 {
        self.get(origin, destination).unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }
}
