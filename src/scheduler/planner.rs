//! Batch dispatch planner.
//!
//! # Algorithm
//!
//! Each pass:
//! 1. Mark jobs no machine can ever run as orphans.
//! 2. Group machines by recipe and jobs by tool/wire signature.
//! 3. Share free tools and wires across job groups; settle machine counts.
//! 4. Claim idle machines for each job group and load them; idle members
//!    holding none of their recipe's tooling are retooled in place.
//! 5. Dispatch every recipe group, then cut queues to the threshold.
//! 6. Move machines without demand to the neediest groups and dispatch
//!    those groups again.
//!
//! Passes repeat until one places no net jobs or `max_passes` is reached.
//!
//! # Complexity
//! O(p * j * m) per run where p=passes, j=jobs, m=machines.

use std::collections::{BTreeMap, HashMap, HashSet};

use rand::rngs::SmallRng;
use rand::SeedableRng;

use crate::config::{PlannerConfig, DAY_MS};
use crate::dispatching::{
    calculate_group_index, group_volume, jobs_exceed_dispatching_threshold, DispatchContext,
    Dispatcher, RuleEngine,
};
use crate::distribution::{
    distribute_tools, distribute_wires, holds_tooling, load_machine, settle_machine_counts, setup_tool_and_wire,
    update_resource_available_times,
};
use crate::eligibility::{EligibilityEvaluator, EligibilityTables};
use crate::error::{Result, SchedulerError};
use crate::grouping::{self, Grouping};
use crate::models::{
    DedicationTable, Job, JobId, JobState, Machine, MachineConstraint, MachineId, MachineSetup,
    QueuedJob, TransportationTable,
};
use crate::rebalance;
use crate::selection::{choose_machines_for_group, CandidatePool};
use crate::store::{JobStore, MachineRegistry, ResourcePool};
use crate::validation::{
    validate_config, validate_input, validate_tables, ResourceTotals, ValidationError,
    ValidationErrorKind,
};

use super::{ConflictReason, JobConflict, PassReport, PlanReport};

/// Batch dispatch planner.
///
/// Owns every machine, job and resource instance of one run.
///
/// # Example
///
/// ```
/// use u_dispatch::config::PlannerConfig;
/// use u_dispatch::models::{Job, Machine, MachineSetup};
/// use u_dispatch::scheduler::Planner;
///
/// let mut planner = Planner::new(PlannerConfig::default());
/// planner
///     .add_machine(
///         Machine::new("BB211", "UTC3000", "TA-A")
///             .with_setup(MachineSetup::new("AAS008YM2024A", "PART_NO", "PART_ID")),
///     )
///     .unwrap();
/// planner
///     .add_job(
///         Job::new("P23ASEA02", "AAS008YM2024A")
///             .with_tool("PART_NO", 1)
///             .with_wire("PART_ID", 1)
///             .with_location("TA-A")
///             .with_process_time("UTC3000", 789),
///     )
///     .unwrap();
///
/// let report = planner.run().unwrap();
/// assert_eq!(report.scheduled_jobs, 1);
/// assert_eq!(planner.queued_lots("BB211").unwrap(), vec!["P23ASEA02"]);
/// ```
#[derive(Debug, Clone)]
pub struct Planner {
    config: PlannerConfig,
    machines: MachineRegistry,
    jobs: JobStore,
    pool: ResourcePool,
    tables: EligibilityTables,
    transport: TransportationTable,
    tool_totals: BTreeMap<String, u32>,
    wire_totals: BTreeMap<String, u32>,
    rules: RuleEngine,
    grouping: Grouping,
    conflicts: Vec<JobConflict>,
    location_overrides: HashMap<JobId, Vec<String>>,
    process_time_overrides: HashMap<JobId, HashMap<String, i64>>,
    rng: SmallRng,
    prepared: bool,
}

impl Planner {
    pub fn new(config: PlannerConfig) -> Self {
        let rng = SmallRng::seed_from_u64(config.seed);
        Self {
            config,
            machines: MachineRegistry::new(),
            jobs: JobStore::new(),
            pool: ResourcePool::new(),
            tables: EligibilityTables::default(),
            transport: TransportationTable::new(),
            tool_totals: BTreeMap::new(),
            wire_totals: BTreeMap::new(),
            rules: RuleEngine::default(),
            grouping: Grouping::new(),
            conflicts: Vec::new(),
            location_overrides: HashMap::new(),
            process_time_overrides: HashMap::new(),
            rng,
            prepared: false,
        }
    }

    /// Replaces the job ordering rules (default: FIFO, SPT, lot number).
    pub fn with_rule_engine(mut self, rules: RuleEngine) -> Self {
        self.rules = rules;
        self
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    // ======================== Inputs ========================

    pub fn add_machine(&mut self, machine: Machine) -> Result<MachineId> {
        self.machines.add(machine)
    }

    /// Adds an unscheduled job. A job pinned to a machine is prescheduled.
    pub fn add_job(&mut self, job: Job) -> Result<JobId> {
        if job.pinned_machine.is_some() {
            return self.add_prescheduled_job(job);
        }
        self.jobs.insert(job)
    }

    /// Adds jobs of one recipe. Jobs without a recipe take `recipe`.
    pub fn add_group_jobs(
        &mut self,
        recipe: &str,
        jobs: impl IntoIterator<Item = Job>,
    ) -> Result<Vec<JobId>> {
        let mut ids = Vec::new();
        for mut job in jobs {
            if job.recipe.is_empty() {
                job.recipe = recipe.to_string();
            } else if job.recipe != recipe {
                return Err(SchedulerError::invalid(ValidationError::new(
                    ValidationErrorKind::InvalidParameter,
                    format!(
                        "Lot '{}' has recipe '{}' but was added to group '{}'",
                        job.lot_number, job.recipe, recipe
                    ),
                )));
            }
            ids.push(self.add_job(job)?);
        }
        Ok(ids)
    }

    /// Appends a job to the tail of its pinned machine's queue.
    ///
    /// Prescheduled jobs keep their call order and are never evicted. A
    /// machine without a setup takes the job's.
    pub fn add_prescheduled_job(&mut self, job: Job) -> Result<JobId> {
        let Some(pinned) = job.pinned_machine.clone() else {
            return Err(SchedulerError::invalid(ValidationError::new(
                ValidationErrorKind::InvalidParameter,
                format!("Lot '{}' is not pinned to a machine", job.lot_number),
            )));
        };
        let machine_id = self.machines.lookup(&pinned)?;
        let signature = job.signature();
        let arrival = job.arrival_ms;
        let id = self.jobs.insert(job)?;

        let duration = self.jobs.get(id).duration_on(&self.machines.get(machine_id).model);
        let machine = self.machines.get_mut(machine_id);
        if machine.setup.is_none() {
            machine.setup = Some(MachineSetup::from_signature(&signature));
        }
        let entry = machine.append_job(
            id,
            &signature,
            duration,
            arrival,
            true,
            &self.config.setup_times,
        );
        self.jobs.mark_scheduled(id, machine_id);
        tracing::debug!(
            lot = %self.jobs.get(id).lot_number,
            machine = %pinned,
            start_ms = entry.start_ms,
            setup_ms = entry.setup_ms,
            "job prescheduled"
        );
        Ok(id)
    }

    /// Registers a job already running on its pinned machine.
    ///
    /// The job is never queued; the machine's recover time is expected to
    /// cover it. The machine's tooling history takes the job's signature, so
    /// the first queued job pays the changeover from it.
    pub fn add_on_machine_job(&mut self, job: Job) -> Result<JobId> {
        let Some(pinned) = job.pinned_machine.clone() else {
            return Err(SchedulerError::invalid(ValidationError::new(
                ValidationErrorKind::InvalidParameter,
                format!("Lot '{}' is not pinned to a machine", job.lot_number),
            )));
        };
        let machine_id = self.machines.lookup(&pinned)?;
        let signature = job.signature();
        let id = self.jobs.insert(job)?;

        let machine = self.machines.get_mut(machine_id);
        let running = MachineSetup::from_signature(&signature);
        if machine.setup.is_none() {
            machine.setup = Some(running.clone());
        }
        machine.last_run = Some(running);
        self.jobs.mark_in_process(id, machine_id);
        tracing::debug!(
            lot = %self.jobs.get(id).lot_number,
            machine = %pinned,
            "job on machine"
        );
        Ok(id)
    }

    /// Overrides the locations a lot may run in.
    pub fn add_job_locations(&mut self, lot_number: &str, locations: Vec<String>) -> Result<()> {
        let id = self.jobs.lookup(lot_number)?;
        if self.location_overrides.insert(id, locations.clone()).is_some() {
            tracing::warn!(lot = %lot_number, "job locations set twice, overwriting");
        }
        self.jobs.get_mut(id).locations = locations;
        Ok(())
    }

    /// Overrides a lot's per-model process times (ms).
    pub fn add_job_process_times(
        &mut self,
        lot_number: &str,
        times: HashMap<String, i64>,
    ) -> Result<()> {
        let id = self.jobs.lookup(lot_number)?;
        if self.process_time_overrides.insert(id, times.clone()).is_some() {
            tracing::warn!(lot = %lot_number, "job process times set twice, overwriting");
        }
        self.jobs.get_mut(id).process_times = times;
        Ok(())
    }

    pub fn set_dedicated_machines(&mut self, table: DedicationTable) {
        self.tables.dedicated = table;
    }

    /// Sets the allow list ("machine constraint A").
    pub fn set_allow_constraint(&mut self, constraint: MachineConstraint) {
        self.tables.allow = Some(constraint);
    }

    /// Sets the restrain list ("machine constraint R").
    pub fn set_restrain_constraint(&mut self, constraint: MachineConstraint) {
        self.tables.restrain = Some(constraint);
    }

    pub fn set_automotive_lots(&mut self, lots: impl IntoIterator<Item = String>) {
        self.tables.automotive_lots = lots.into_iter().collect();
    }

    /// Tool totals by part number.
    pub fn set_tool_totals(&mut self, totals: BTreeMap<String, u32>) {
        self.tool_totals = totals;
    }

    /// Wire totals by part id.
    pub fn set_wire_totals(&mut self, totals: BTreeMap<String, u32>) {
        self.wire_totals = totals;
    }

    pub fn set_transportation_times(&mut self, table: TransportationTable) {
        self.transport = table;
    }

    /// Count threshold: at most `count` jobs per machine.
    pub fn set_threshold(&mut self, count: usize) {
        self.config.threshold = Some(count);
    }

    /// Day-horizon threshold.
    pub fn set_horizon(&mut self, days: i64) {
        self.config.horizon_ms = Some(days.saturating_mul(DAY_MS));
    }

    // ======================== Outputs ========================

    pub fn machines(&self) -> &MachineRegistry {
        &self.machines
    }

    pub fn jobs(&self) -> &JobStore {
        &self.jobs
    }

    pub fn resources(&self) -> &ResourcePool {
        &self.pool
    }

    /// Groups of the last pass.
    pub fn grouping(&self) -> &Grouping {
        &self.grouping
    }

    /// Machines with at least one queued job.
    pub fn scheduled_machines(&self) -> Vec<&Machine> {
        self.machines.scheduled_machines()
    }

    pub fn queue(&self, machine: &str) -> Result<&[QueuedJob]> {
        let id = self.machines.lookup(machine)?;
        Ok(self.machines.get(id).queue())
    }

    /// Lot numbers queued on a machine, in dispatch order.
    pub fn queued_lots(&self, machine: &str) -> Result<Vec<&str>> {
        Ok(self
            .queue(machine)?
            .iter()
            .map(|q| self.jobs.get(q.job).lot_number.as_str())
            .collect())
    }

    pub fn scheduled_jobs(&self) -> Vec<&Job> {
        self.jobs
            .iter()
            .filter(|(id, _)| matches!(self.jobs.state(*id), JobState::Scheduled(_)))
            .map(|(_, job)| job)
            .collect()
    }

    /// Unscheduled jobs in dispatch order, expedite first.
    pub fn backlog(&self) -> Vec<&Job> {
        let context = self.dispatch_context();
        let (mut expedite, mut rest): (Vec<JobId>, Vec<JobId>) = self
            .jobs
            .unscheduled()
            .into_iter()
            .partition(|&id| self.jobs.get(id).urgent);
        self.rules.sort_ids(&mut expedite, &self.jobs, &context);
        self.rules.sort_ids(&mut rest, &self.jobs, &context);
        expedite
            .into_iter()
            .chain(rest)
            .map(|id| self.jobs.get(id))
            .collect()
    }

    /// Jobs already running when the run started, per machine name.
    pub fn on_machine_jobs(&self) -> BTreeMap<&str, Vec<&Job>> {
        let mut running: BTreeMap<&str, Vec<&Job>> = BTreeMap::new();
        for (id, job) in self.jobs.iter() {
            if let JobState::InProcess(machine) = self.jobs.state(id) {
                running
                    .entry(self.machines.get(machine).name.as_str())
                    .or_default()
                    .push(job);
            }
        }
        running
    }

    /// Locations set by [`add_job_locations`](Self::add_job_locations).
    pub fn location_override(&self, lot_number: &str) -> Option<&[String]> {
        let id = self.jobs.lookup(lot_number).ok()?;
        self.location_overrides.get(&id).map(Vec::as_slice)
    }

    /// Process times set by [`add_job_process_times`](Self::add_job_process_times).
    pub fn process_time_override(&self, lot_number: &str) -> Option<&HashMap<String, i64>> {
        let id = self.jobs.lookup(lot_number).ok()?;
        self.process_time_overrides.get(&id)
    }

    pub fn orphan_jobs(&self) -> Vec<&Job> {
        self.jobs
            .orphans()
            .into_iter()
            .map(|id| self.jobs.get(id))
            .collect()
    }

    pub fn conflicts(&self) -> &[JobConflict] {
        &self.conflicts
    }

    /// Model → locations hosting that model.
    pub fn model_locations(&self) -> &BTreeMap<String, Vec<String>> {
        self.machines.model_locations()
    }

    pub fn model_by_entity_name(&self, name: &str) -> Result<&str> {
        self.machines.model_by_entity_name(name)
    }

    // ======================== Run ========================

    /// Checks the whole input, collecting every problem.
    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();

        let totals = ResourceTotals {
            tools: &self.tool_totals,
            wires: &self.wire_totals,
        };
        if let Err(e) = validate_input(
            self.machines.iter().map(|(_, m)| m),
            self.jobs.iter().map(|(_, j)| j),
            totals,
        ) {
            errors.extend(e);
        }

        let names: HashSet<&str> = self.machines.iter().map(|(_, m)| m.name.as_str()).collect();
        if let Err(e) = validate_tables(&self.tables, &names) {
            errors.extend(e);
        }
        if let Err(e) = validate_config(&self.config) {
            errors.extend(e);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(SchedulerError::InvalidConfiguration(errors))
        }
    }

    /// Validates, then runs passes until no progress or `max_passes`.
    pub fn run(&mut self) -> Result<PlanReport> {
        self.validate()?;
        self.prepare();

        let mut passes = Vec::new();
        for pass in 1..=self.config.max_passes {
            let report = self.run_pass(pass);
            let done = !report.made_progress() || report.backlog == 0;
            passes.push(report);
            if done {
                break;
            }
        }

        let report = PlanReport::calculate(
            passes,
            &self.machines,
            &self.jobs,
            self.config.start_time_ms,
            self.conflicts.len(),
        );
        tracing::info!(
            passes = report.pass_count(),
            scheduled = report.scheduled_jobs,
            backlog = report.backlog_jobs,
            orphans = report.orphan_jobs,
            makespan_ms = report.makespan_ms,
            "plan complete"
        );
        Ok(report)
    }

    /// Creates resource instances and loads set-up machines, once per run.
    fn prepare(&mut self) {
        if self.prepared {
            return;
        }
        setup_tool_and_wire(
            &mut self.machines,
            &mut self.pool,
            &self.tool_totals,
            &self.wire_totals,
        );
        update_resource_available_times(&self.machines, &mut self.pool);
        self.prepared = true;
    }

    /// One grouping/dispatch pass.
    pub fn run_pass(&mut self, pass: usize) -> PassReport {
        self.prepare();
        let mut report = PassReport {
            pass,
            ..Default::default()
        };

        report.orphan_jobs += self.reconsider_jobs();
        report.orphan_jobs += self.group_jobs_by_tool_and_wire();
        report.job_groups = self.grouping.job_groups.len();

        self.distribute_tools();
        self.distribute_wires();
        settle_machine_counts(&mut self.grouping.job_groups);

        report.machines_selected = self.choose_machines_for_groups();

        let all: Vec<usize> = (0..self.grouping.machine_groups.len()).collect();
        let (scheduled, evicted) = self.schedule_groups(&all);
        report.jobs_scheduled += scheduled;
        report.jobs_evicted += evicted;
        update_resource_available_times(&self.machines, &mut self.pool);

        let (touched, moved) = self.distribute_orphan_machines();
        report.machines_rebalanced = moved;
        let (scheduled, evicted) = self.schedule_groups(&touched);
        report.jobs_scheduled += scheduled;
        report.jobs_evicted += evicted;
        update_resource_available_times(&self.machines, &mut self.pool);

        report.backlog = self.jobs.unscheduled().len();
        tracing::info!(
            pass,
            job_groups = report.job_groups,
            selected = report.machines_selected,
            scheduled = report.jobs_scheduled,
            evicted = report.jobs_evicted,
            rebalanced = report.machines_rebalanced,
            backlog = report.backlog,
            "pass complete"
        );
        report
    }

    /// Marks jobs eligible on no machine as orphans and records conflicts.
    /// Returns the number marked.
    pub fn reconsider_jobs(&mut self) -> usize {
        let evaluator = EligibilityEvaluator::new(&self.tables, self.config.strict_model);
        let mut stranded = Vec::new();
        for id in self.jobs.unscheduled() {
            let job = self.jobs.get(id);
            if !evaluator.eligible_machines(job, &self.machines).is_empty() {
                continue;
            }
            let reason = match evaluator.dominant_reason(job, &self.machines) {
                Some(reason) => ConflictReason::Ineligible(reason),
                None => ConflictReason::NoMachines,
            };
            stranded.push((id, reason));
        }

        for &(id, reason) in &stranded {
            self.jobs.mark_orphan(id);
            self.record_conflict(id, reason);
        }
        stranded.len()
    }

    /// Rebuilds machine groups and job groups. Returns new orphan jobs.
    pub fn group_jobs_by_tool_and_wire(&mut self) -> usize {
        self.grouping = grouping::group_machines_by_recipe(&self.machines, &self.jobs);
        let orphans =
            grouping::group_jobs_by_tool_and_wire(&mut self.grouping, &mut self.jobs, &self.pool);
        for &id in &orphans {
            self.record_conflict(id, ConflictReason::NoStock);
        }
        orphans.len()
    }

    pub fn distribute_tools(&mut self) {
        distribute_tools(&mut self.grouping.job_groups, &self.pool);
    }

    pub fn distribute_wires(&mut self) {
        distribute_wires(&mut self.grouping.job_groups, &self.pool);
    }

    /// Claims and loads idle machines for every job group, up to the count
    /// its free stock allows. Returns the number of machines loaded.
    ///
    /// Machines outside any group, or in a group without demand, are open to
    /// every job group. An idle member of a group with demand that holds the
    /// tooling of none of its recipe's job groups is reserved for that recipe
    /// so it can be retooled in place.
    pub fn choose_machines_for_groups(&mut self) -> usize {
        let evaluator = EligibilityEvaluator::new(&self.tables, self.config.strict_model);
        let grouping = &mut self.grouping;
        let mut candidates = CandidatePool::default();
        for (id, machine) in self.machines.iter() {
            if machine.has_work() {
                continue;
            }
            let Some(g) = grouping.group_of_machine(id) else {
                candidates.add(id);
                continue;
            };
            let recipe_group = &grouping.machine_groups[g];
            if !recipe_group.has_demand() {
                candidates.add(id);
                continue;
            }
            let serving = grouping
                .job_groups
                .iter()
                .filter(|jg| jg.signature.recipe == recipe_group.recipe)
                .any(|jg| holds_tooling(&self.pool, id, &jg.signature));
            if !serving {
                candidates.reserve(id, &recipe_group.recipe);
            }
        }

        let mut joined = 0;
        for gi in 0..grouping.job_groups.len() {
            let group = &grouping.job_groups[gi];
            let chosen = choose_machines_for_group(
                group,
                group.machine_count,
                &mut candidates,
                &self.machines,
                &self.jobs,
                &evaluator,
                &self.transport,
            );

            let signature = group.signature.clone();
            for machine in chosen {
                if load_machine(machine, &signature, &mut self.machines, &mut self.pool) {
                    grouping.assign_machine(machine, &signature.recipe);
                    joined += 1;
                }
            }
        }
        grouping.refresh_holdings(&self.machines);
        joined
    }

    /// Dispatches the given machine groups and applies the threshold to their
    /// members. Every group's index is refreshed. Returns (scheduled, evicted).
    pub fn schedule_groups(&mut self, groups: &[usize]) -> (usize, usize) {
        let context = self.dispatch_context();
        let dispatcher = Dispatcher::new(
            EligibilityEvaluator::new(&self.tables, self.config.strict_model),
            &self.rules,
            context,
        );

        let mut scheduled = 0;
        let mut evicted = 0;
        for &gi in groups {
            let group = &mut self.grouping.machine_groups[gi];
            if !group.machines.is_empty() && group.has_demand() {
                scheduled +=
                    dispatcher.schedule_group(group, &mut self.machines, &mut self.jobs, &self.pool);

                for &m in &group.machines {
                    let cut = jobs_exceed_dispatching_threshold(
                        self.machines.get_mut(m),
                        &mut self.jobs,
                        &context,
                    );
                    evicted += cut.len();
                    group.scheduled_jobs.retain(|j| !cut.contains(j));
                    for job in cut {
                        if self.jobs.get(job).urgent {
                            group.expedite_jobs.push(job);
                        } else {
                            group.unscheduled_jobs.push(job);
                        }
                    }
                }
            }
            let volume = group_volume(group, &self.jobs);
            group.index = calculate_group_index(volume, group.machines.len());
        }
        (scheduled, evicted)
    }

    /// Moves machines without demand to the neediest groups. Returns the
    /// touched group indices and the number of machines moved.
    pub fn distribute_orphan_machines(&mut self) -> (Vec<usize>, usize) {
        let context = self.dispatch_context();
        let evaluator = EligibilityEvaluator::new(&self.tables, self.config.strict_model);
        let before: HashMap<MachineId, Option<usize>> = self
            .machines
            .ids()
            .map(|m| (m, self.grouping.group_of_machine(m)))
            .collect();

        let touched = rebalance::distribute_orphan_machines(
            &mut self.grouping,
            &mut self.machines,
            &self.jobs,
            &mut self.pool,
            &evaluator,
            &context,
            self.config.orphan_probability,
            &mut self.rng,
        );
        self.grouping.refresh_holdings(&self.machines);
        let moved = before
            .iter()
            .filter(|(m, group)| self.grouping.group_of_machine(**m) != **group)
            .count();
        (touched, moved)
    }

    fn dispatch_context(&self) -> DispatchContext {
        DispatchContext {
            current_time_ms: self.config.start_time_ms,
            threshold: self.config.threshold_policy(),
            setup_times: self.config.setup_times,
        }
    }

    fn record_conflict(&mut self, id: JobId, reason: ConflictReason) {
        let lot_number = self.jobs.get(id).lot_number.clone();
        tracing::warn!(lot = %lot_number, %reason, "job cannot be scheduled");
        self.conflicts.push(JobConflict { lot_number, reason });
    }
}

impl Default for Planner {
    fn default() -> Self {
        Self::new(PlannerConfig::default())
    }
}
