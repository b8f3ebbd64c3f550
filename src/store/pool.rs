//! Tool and wire instance pool.
//!
//! Instances are created once from the configured totals and never
//! destroyed; only their holder and availability time change. A kind name
//! with no configured total is *untracked*: it is not scarce and jobs need
//! no instances of it.

use std::collections::{BTreeMap, HashMap};

use crate::models::{MachineId, ResourceId, ResourceInstance, ResourceKind};

type KindKey = (ResourceKind, String);

#[derive(Debug, Clone, Default)]
pub struct ResourcePool {
    instances: Vec<ResourceInstance>,
    by_name: HashMap<KindKey, Vec<ResourceId>>,
    totals: BTreeMap<KindKey, u32>,
}

impl ResourcePool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates `count` instances per kind name. Names already materialized
    /// are left untouched.
    pub fn materialize(&mut self, kind: ResourceKind, totals: &BTreeMap<String, u32>) {
        for (name, &count) in totals {
            let key = (kind, name.clone());
            if self.totals.contains_key(&key) {
                continue;
            }
            let mut ids = Vec::with_capacity(count as usize);
            for _ in 0..count {
                let id = ResourceId(self.instances.len() as u32);
                self.instances.push(ResourceInstance::new(id, kind, name.as_str()));
                ids.push(id);
            }
            self.by_name.insert(key.clone(), ids);
            self.totals.insert(key, count);
        }
    }

    pub fn is_tracked(&self, kind: ResourceKind, name: &str) -> bool {
        self.totals.contains_key(&(kind, name.to_string()))
    }

    /// Configured total, `None` when untracked.
    pub fn total(&self, kind: ResourceKind, name: &str) -> Option<u32> {
        self.totals.get(&(kind, name.to_string())).copied()
    }

    #[inline]
    pub fn get(&self, id: ResourceId) -> &ResourceInstance {
        &self.instances[id.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResourceInstance> {
        self.instances.iter()
    }

    pub fn instances_of(&self, kind: ResourceKind, name: &str) -> &[ResourceId] {
        self.by_name
            .get(&(kind, name.to_string()))
            .map(|ids| ids.as_slice())
            .unwrap_or(&[])
    }

    /// Free instances, earliest available first.
    pub fn free(&self, kind: ResourceKind, name: &str) -> Vec<ResourceId> {
        let mut ids: Vec<ResourceId> = self
            .instances_of(kind, name)
            .iter()
            .copied()
            .filter(|&id| self.get(id).is_free())
            .collect();
        ids.sort_by_key(|&id| (self.get(id).available_ms, id));
        ids
    }

    pub fn free_count(&self, kind: ResourceKind, name: &str) -> u32 {
        self.instances_of(kind, name)
            .iter()
            .filter(|&&id| self.get(id).is_free())
            .count() as u32
    }

    /// Instances of a kind name held by `machine`.
    pub fn held_by(&self, machine: MachineId, kind: ResourceKind, name: &str) -> Vec<ResourceId> {
        self.instances_of(kind, name)
            .iter()
            .copied()
            .filter(|&id| self.get(id).holder == Some(machine))
            .collect()
    }

    /// Whether `machine` can run work needing `count` instances of a kind
    /// name. Untracked names and zero counts always pass.
    pub fn satisfies(&self, machine: MachineId, kind: ResourceKind, name: &str, count: u32) -> bool {
        if count == 0 || !self.is_tracked(kind, name) {
            return true;
        }
        self.held_by(machine, kind, name).len() as u32 >= count
    }

    /// Hands `count` free instances to `machine`, earliest available first.
    /// Returns `None` and changes nothing if not enough are free.
    pub fn acquire(
        &mut self,
        kind: ResourceKind,
        name: &str,
        count: u32,
        machine: MachineId,
    ) -> Option<Vec<ResourceId>> {
        let free = self.free(kind, name);
        if (free.len() as u32) < count {
            return None;
        }
        let taken: Vec<ResourceId> = free.into_iter().take(count as usize).collect();
        for &id in &taken {
            self.instances[id.index()].holder = Some(machine);
        }
        Some(taken)
    }

    /// Frees an instance; it becomes usable no earlier than `at_ms`.
    pub fn release(&mut self, id: ResourceId, at_ms: i64) {
        let instance = &mut self.instances[id.index()];
        instance.holder = None;
        instance.available_ms = instance.available_ms.max(at_ms);
    }

    pub fn set_available(&mut self, id: ResourceId, at_ms: i64) {
        self.instances[id.index()].available_ms = at_ms;
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool() -> ResourcePool {
        let mut pool = ResourcePool::new();
        let totals = BTreeMap::from([("T1".to_string(), 3), ("T2".to_string(), 1)]);
        pool.materialize(ResourceKind::Tool, &totals);
        pool
    }

    #[test]
    fn test_materialize() {
        let pool = pool();
        assert_eq!(pool.len(), 4);
        assert_eq!(pool.total(ResourceKind::Tool, "T1"), Some(3));
        assert_eq!(pool.total(ResourceKind::Wire, "T1"), None);
        assert_eq!(pool.total(ResourceKind::Tool, "T2"), Some(1));
    }

    #[test]
    fn test_materialize_is_idempotent_per_name() {
        let mut pool = pool();
        let totals = BTreeMap::from([("T1".to_string(), 9)]);
        pool.materialize(ResourceKind::Tool, &totals);
        assert_eq!(pool.instances_of(ResourceKind::Tool, "T1").len(), 3);
    }

    #[test]
    fn test_acquire_and_release() {
        let mut pool = pool();
        let got = pool.acquire(ResourceKind::Tool, "T1", 2, MachineId(0)).unwrap();
        assert_eq!(got.len(), 2);
        assert_eq!(pool.free_count(ResourceKind::Tool, "T1"), 1);
        assert!(pool.acquire(ResourceKind::Tool, "T1", 2, MachineId(1)).is_none());
        assert_eq!(pool.free_count(ResourceKind::Tool, "T1"), 1);

        pool.release(got[0], 500);
        assert_eq!(pool.get(got[0]).available_ms, 500);
        assert_eq!(pool.free_count(ResourceKind::Tool, "T1"), 2);
    }

    #[test]
    fn test_free_orders_by_availability() {
        let mut pool = pool();
        let ids = pool.instances_of(ResourceKind::Tool, "T1").to_vec();
        pool.set_available(ids[0], 900);
        pool.set_available(ids[1], 100);
        pool.set_available(ids[2], 100);
        assert_eq!(pool.free(ResourceKind::Tool, "T1"), vec![ids[1], ids[2], ids[0]]);
    }

    #[test]
    fn test_satisfies_untracked() {
        let mut pool = pool();
        assert!(pool.satisfies(MachineId(0), ResourceKind::Wire, "W1", 3));
        assert!(!pool.satisfies(MachineId(0), ResourceKind::Tool, "T2", 1));
        pool.acquire(ResourceKind::Tool, "T2", 1, MachineId(0)).unwrap();
        assert!(pool.satisfies(MachineId(0), ResourceKind::Tool, "T2", 1));
    }

    #[test]
    fn test_no_instance_held_twice() {
        let mut pool = pool();
        pool.acquire(ResourceKind::Tool, "T1", 2, MachineId(0)).unwrap();
        pool.acquire(ResourceKind::Tool, "T1", 1, MachineId(1)).unwrap();
        let held_0 = pool.held_by(MachineId(0), ResourceKind::Tool, "T1");
        let held_1 = pool.held_by(MachineId(1), ResourceKind::Tool, "T1");
        assert!(held_0.iter().all(|id| !held_1.contains(id)));
        assert_eq!(held_0.len() + held_1.len(), 3);
    }
}
