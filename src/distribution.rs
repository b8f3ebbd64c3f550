//! Tool and wire distribution.
//!
//! Free instances of each kind name are shared across the job groups that
//! need them in proportion to demand, using largest-remainder allocation in
//! exact integer arithmetic. The allocation then bounds how many machines
//! each job group may stand up.
//!
//! Loading moves instances between the pool and machines. Nothing is ever
//! created or destroyed after [`setup_tool_and_wire`].

use std::collections::BTreeMap;

use crate::models::{
    DistributionEntry, JobGroup, JobSignature, MachineId, MachineSetup, ResourceId, ResourceKind,
};
use crate::store::{MachineRegistry, ResourcePool};

/// Splits `total` units across `demands`.
///
/// When the total covers every demand, each entry gets its demand.
/// Otherwise entry `i` gets `floor(total * d_i / D)` and the units left over
/// go one each to the largest remainders, earlier entries first on ties.
/// The result sums to `min(total, Σ demands)` and never exceeds a demand.
pub fn distribute_a_resource(total: u32, demands: &[u32]) -> Vec<u32> {
    let demand_sum: u64 = demands.iter().map(|&d| d as u64).sum();
    if demand_sum <= total as u64 {
        return demands.to_vec();
    }

    let total = total as u64;
    let mut shares: Vec<u32> = Vec::with_capacity(demands.len());
    let mut remainders: Vec<(u64, usize)> = Vec::with_capacity(demands.len());
    for (i, &d) in demands.iter().enumerate() {
        let scaled = total * d as u64;
        shares.push((scaled / demand_sum) as u32);
        remainders.push((scaled % demand_sum, i));
    }

    let given: u64 = shares.iter().map(|&s| s as u64).sum();
    let mut left = total - given;
    remainders.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
    for &(_, i) in &remainders {
        if left == 0 {
            break;
        }
        shares[i] += 1;
        left -= 1;
    }
    shares
}

/// Ratio view of an allocation input (`name`, share of Σ demand).
pub fn distribution_entries(job_groups: &[JobGroup], kind: ResourceKind) -> Vec<DistributionEntry> {
    let demand = |g: &JobGroup| match kind {
        ResourceKind::Tool => g.tool_demand,
        ResourceKind::Wire => g.wire_demand,
    };
    let sum: u64 = job_groups.iter().map(|g| demand(g) as u64).sum();
    job_groups
        .iter()
        .map(|g| DistributionEntry {
            name: g.name(),
            ratio: if sum == 0 {
                0.0
            } else {
                demand(g) as f64 / sum as f64
            },
        })
        .collect()
}

/// Allocates free tool instances to job groups, per tool kind.
pub fn distribute_tools(job_groups: &mut [JobGroup], pool: &ResourcePool) {
    distribute_kind(job_groups, pool, ResourceKind::Tool);
}

/// Allocates free wire instances to job groups, per wire kind.
pub fn distribute_wires(job_groups: &mut [JobGroup], pool: &ResourcePool) {
    distribute_kind(job_groups, pool, ResourceKind::Wire);
}

fn kind_name(group: &JobGroup, kind: ResourceKind) -> &str {
    match kind {
        ResourceKind::Tool => &group.signature.part_no,
        ResourceKind::Wire => &group.signature.part_id,
    }
}

fn distribute_kind(job_groups: &mut [JobGroup], pool: &ResourcePool, kind: ResourceKind) {
    let mut names: Vec<String> = Vec::new();
    for g in job_groups.iter() {
        let name = kind_name(g, kind);
        if !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    }

    for name in names {
        let members: Vec<usize> = job_groups
            .iter()
            .enumerate()
            .filter(|(_, g)| kind_name(g, kind) == name)
            .map(|(i, _)| i)
            .collect();
        let demands: Vec<u32> = members
            .iter()
            .map(|&i| match kind {
                ResourceKind::Tool => job_groups[i].tool_demand,
                ResourceKind::Wire => job_groups[i].wire_demand,
            })
            .collect();

        let allocation = if pool.is_tracked(kind, &name) {
            distribute_a_resource(pool.free_count(kind, &name), &demands)
        } else {
            demands.clone()
        };

        for (&i, &granted) in members.iter().zip(&allocation) {
            match kind {
                ResourceKind::Tool => job_groups[i].tools_allocated = granted,
                ResourceKind::Wire => job_groups[i].wires_allocated = granted,
            }
        }
        tracing::debug!(
            %kind,
            part = %name,
            demand = ?demands,
            allocation = ?allocation,
            "distributed"
        );
    }
}

/// Machines each job group may stand up given its allocation.
///
/// `min(tools ÷ tools required, wires ÷ wires required, job count)`; a zero
/// requirement does not constrain.
pub fn settle_machine_counts(job_groups: &mut [JobGroup]) {
    for g in job_groups.iter_mut() {
        let by = |allocated: u32, required: u32| {
            if required == 0 {
                usize::MAX
            } else {
                (allocated / required) as usize
            }
        };
        g.machine_count = g
            .jobs
            .len()
            .min(by(g.tools_allocated, g.signature.tools_required))
            .min(by(g.wires_allocated, g.signature.wires_required));
    }
}

/// Instances still to acquire for one kind, `None` when the pool cannot
/// supply them.
fn shortfall(
    pool: &ResourcePool,
    machine: MachineId,
    kind: ResourceKind,
    name: &str,
    required: u32,
) -> Option<u32> {
    if required == 0 || !pool.is_tracked(kind, name) {
        return Some(0);
    }
    let held = pool.held_by(machine, kind, name).len() as u32;
    let missing = required.saturating_sub(held);
    (pool.free_count(kind, name) >= missing).then_some(missing)
}

/// Whether `machine` already holds the tooling `signature` runs with.
pub fn holds_tooling(pool: &ResourcePool, machine: MachineId, signature: &JobSignature) -> bool {
    pool.satisfies(machine, ResourceKind::Tool, &signature.part_no, signature.tools_required)
        && pool.satisfies(machine, ResourceKind::Wire, &signature.part_id, signature.wires_required)
}

/// Whether `machine` could be loaded for `signature` right now.
pub fn can_load(pool: &ResourcePool, machine: MachineId, signature: &JobSignature) -> bool {
    shortfall(pool, machine, ResourceKind::Tool, &signature.part_no, signature.tools_required)
        .is_some()
        && shortfall(pool, machine, ResourceKind::Wire, &signature.part_id, signature.wires_required)
            .is_some()
}

/// Reloads a machine for a signature.
///
/// Held instances of the right names stay; the others are released and
/// become available when the machine's queue drains. Missing instances are
/// taken earliest-available first, and the machine cannot start before the
/// last of them is available. Returns `false` with nothing changed when the
/// pool cannot supply enough.
pub fn load_machine(
    machine: MachineId,
    signature: &JobSignature,
    machines: &mut MachineRegistry,
    pool: &mut ResourcePool,
) -> bool {
    let Some(tool_missing) = shortfall(
        pool,
        machine,
        ResourceKind::Tool,
        &signature.part_no,
        signature.tools_required,
    ) else {
        return false;
    };
    let Some(wire_missing) = shortfall(
        pool,
        machine,
        ResourceKind::Wire,
        &signature.part_id,
        signature.wires_required,
    ) else {
        return false;
    };

    let record = machines.get_mut(machine);
    let release_at = record.projected_free_ms();
    let mut ready_at = record.available_ms;

    for (kind, name, missing) in [
        (ResourceKind::Tool, signature.part_no.as_str(), tool_missing),
        (ResourceKind::Wire, signature.part_id.as_str(), wire_missing),
    ] {
        let held = match kind {
            ResourceKind::Tool => &mut record.tools,
            ResourceKind::Wire => &mut record.wires,
        };
        let (keep, drop): (Vec<ResourceId>, Vec<ResourceId>) =
            held.iter().copied().partition(|&id| pool.get(id).name == name);
        for id in drop {
            pool.release(id, release_at);
        }
        *held = keep;

        if missing > 0 {
            let Some(acquired) = pool.acquire(kind, name, missing, machine) else {
                return false;
            };
            for &id in &acquired {
                ready_at = ready_at.max(pool.get(id).available_ms);
            }
            held.extend(acquired);
        }
    }

    record.delay_until(ready_at);
    record.setup = Some(MachineSetup::from_signature(signature));
    tracing::debug!(
        machine = %record.name,
        signature = %signature,
        ready_ms = ready_at,
        "machine loaded"
    );
    true
}

/// Creates the pool from the configured totals and loads every set-up
/// machine up to its nominal capacity, in registration order.
pub fn setup_tool_and_wire(
    machines: &mut MachineRegistry,
    pool: &mut ResourcePool,
    tool_totals: &BTreeMap<String, u32>,
    wire_totals: &BTreeMap<String, u32>,
) {
    pool.materialize(ResourceKind::Tool, tool_totals);
    pool.materialize(ResourceKind::Wire, wire_totals);

    let ids: Vec<MachineId> = machines.ids().collect();
    for id in ids {
        let machine = machines.get_mut(id);
        let Some(setup) = machine.setup.clone() else {
            continue;
        };
        for (kind, name, capacity) in [
            (ResourceKind::Tool, setup.part_no.as_str(), setup.tools),
            (ResourceKind::Wire, setup.part_id.as_str(), setup.wires),
        ] {
            if !pool.is_tracked(kind, name) {
                continue;
            }
            let held = match kind {
                ResourceKind::Tool => &mut machine.tools,
                ResourceKind::Wire => &mut machine.wires,
            };
            let wanted = capacity.saturating_sub(held.len() as u32);
            let count = wanted.min(pool.free_count(kind, name));
            if count < wanted {
                tracing::debug!(
                    machine = %machine.name,
                    %kind,
                    part = name,
                    wanted,
                    got = count,
                    "setup short of stock"
                );
            }
            if let Some(acquired) = pool.acquire(kind, name, count, id) {
                held.extend(acquired);
            }
        }
    }
}

/// Each held instance becomes available when its holder's queue drains.
pub fn update_resource_available_times(machines: &MachineRegistry, pool: &mut ResourcePool) {
    let held: Vec<(ResourceId, MachineId)> = pool
        .iter()
        .filter_map(|r| r.holder.map(|m| (r.id, m)))
        .collect();
    for (id, holder) in held {
        pool.set_available(id, machines.get(holder).projected_free_ms());
    }
}
