//! Machine registry.
//!
//! Owns every [`Machine`] keyed by entity name, hands out [`MachineId`]
//! handles, and keeps the model → locations table the reporting side needs.

use std::collections::{BTreeMap, HashMap};

use crate::error::{Result, SchedulerError};
use crate::models::{Machine, MachineId};
use crate::validation::{ValidationError, ValidationErrorKind};

#[derive(Debug, Clone, Default)]
pub struct MachineRegistry {
    machines: Vec<Machine>,
    index: HashMap<String, MachineId>,
    model_locations: BTreeMap<String, Vec<String>>,
}

impl MachineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a machine. Entity names must be unique.
    pub fn add(&mut self, machine: Machine) -> Result<MachineId> {
        if self.index.contains_key(&machine.name) {
            return Err(SchedulerError::invalid(ValidationError::new(
                ValidationErrorKind::DuplicateId,
                format!("Duplicate machine: {}", machine.name),
            )));
        }
        let locations = self.model_locations.entry(machine.model.clone()).or_default();
        if !locations.contains(&machine.location) {
            locations.push(machine.location.clone());
        }

        let id = MachineId(self.machines.len() as u32);
        self.index.insert(machine.name.clone(), id);
        self.machines.push(machine);
        Ok(id)
    }

    #[inline]
    pub fn get(&self, id: MachineId) -> &Machine {
        &self.machines[id.index()]
    }

    #[inline]
    pub fn get_mut(&mut self, id: MachineId) -> &mut Machine {
        &mut self.machines[id.index()]
    }

    pub fn lookup(&self, name: &str) -> Result<MachineId> {
        self.index
            .get(name)
            .copied()
            .ok_or_else(|| SchedulerError::machine_not_found(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Model of a machine by entity name.
    pub fn model_by_entity_name(&self, name: &str) -> Result<&str> {
        let id = self.lookup(name)?;
        Ok(self.get(id).model.as_str())
    }

    /// Model → locations hosting that model, in registration order.
    pub fn model_locations(&self) -> &BTreeMap<String, Vec<String>> {
        &self.model_locations
    }

    /// All handles in registration order.
    pub fn ids(&self) -> impl Iterator<Item = MachineId> {
        (0..self.machines.len() as u32).map(MachineId)
    }

    pub fn iter(&self) -> impl Iterator<Item = (MachineId, &Machine)> {
        self.machines
            .iter()
            .enumerate()
            .map(|(i, m)| (MachineId(i as u32), m))
    }

    /// Machines with at least one queued job.
    pub fn scheduled_machines(&self) -> Vec<&Machine> {
        self.machines.iter().filter(|m| m.has_work()).collect()
    }

    pub fn len(&self) -> usize {
        self.machines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.machines.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EntityKind;
    use crate::models::JobId;

    #[test]
    fn test_add_and_lookup() {
        let mut reg = MachineRegistry::new();
        let id = reg.add(Machine::new("BB211", "UTC3000", "TA-A")).unwrap();
        assert_eq!(reg.lookup("BB211").unwrap(), id);
        assert_eq!(reg.model_by_entity_name("BB211").unwrap(), "UTC3000");
    }

    #[test]
    fn test_unknown_entity() {
        let reg = MachineRegistry::new();
        match reg.model_by_entity_name("BB999").unwrap_err() {
            SchedulerError::NotFound { entity, key } => {
                assert_eq!(entity, EntityKind::Machine);
                assert_eq!(key, "BB999");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let mut reg = MachineRegistry::new();
        reg.add(Machine::new("BB211", "UTC3000", "TA-A")).unwrap();
        assert!(reg.add(Machine::new("BB211", "UTC1000", "TA-B")).is_err());
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_model_locations() {
        let mut reg = MachineRegistry::new();
        reg.add(Machine::new("M1", "UTC3000", "TA-A")).unwrap();
        reg.add(Machine::new("M2", "UTC3000", "TA-B")).unwrap();
        reg.add(Machine::new("M3", "UTC3000", "TA-A")).unwrap();
        reg.add(Machine::new("M4", "UTC1000", "TB")).unwrap();

        let table = reg.model_locations();
        assert_eq!(table["UTC3000"], vec!["TA-A".to_string(), "TA-B".to_string()]);
        assert_eq!(table["UTC1000"], vec!["TB".to_string()]);
    }

    #[test]
    fn test_scheduled_machines() {
        let mut reg = MachineRegistry::new();
        let a = reg.add(Machine::new("M1", "X", "L")).unwrap();
        reg.add(Machine::new("M2", "X", "L")).unwrap();
        reg.get_mut(a).push_job(JobId(0), 10, 0, false);

        let busy = reg.scheduled_machines();
        assert_eq!(busy.len(), 1);
        assert_eq!(busy[0].name, "M1");
    }
}
