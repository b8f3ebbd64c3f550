//! Input validation for dispatch problems.
//!
//! Checks structural integrity of machines, jobs, manual tables and resource
//! totals before planning. Detects:
//! - Duplicate machine names and lot numbers
//! - Tables and pins naming machines that do not exist
//! - Per-machine requirements a tracked resource total can never satisfy
//! - Negative process times
//! - Out-of-range planner parameters
//!
//! Every problem is collected; validation never stops at the first one.

use std::collections::{BTreeMap, HashSet};

use crate::config::PlannerConfig;
use crate::eligibility::EligibilityTables;
use crate::models::{Job, Machine};

/// Validation result.
pub type ValidationResult = Result<(), Vec<ValidationError>>;

/// A validation error.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    /// Error category.
    pub kind: ValidationErrorKind,
    /// Human-readable description.
    pub message: String,
}

/// Categories of validation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationErrorKind {
    /// Two entities share the same name.
    DuplicateId,
    /// A table or a job references a machine that isn't registered.
    UnknownMachineReference,
    /// A tracked resource total is below what a single machine needs.
    InsufficientResources,
    /// A planner parameter is out of range.
    InvalidParameter,
    /// A process-time entry is negative.
    InvalidProcessTime,
}

impl ValidationError {
    pub fn new(kind: ValidationErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Configured tool and wire totals, by kind name.
#[derive(Debug, Clone, Copy)]
pub struct ResourceTotals<'a> {
    pub tools: &'a BTreeMap<String, u32>,
    pub wires: &'a BTreeMap<String, u32>,
}

/// Validates machines and jobs.
///
/// Checks:
/// 1. No duplicate machine names
/// 2. No duplicate lot numbers
/// 3. Pinned and candidate machines exist
/// 4. Process times are non-negative
/// 5. A tracked total of zero is allowed; a tracked total below one
///    machine's requirement is not
pub fn validate_input<'a>(
    machines: impl IntoIterator<Item = &'a Machine>,
    jobs: impl IntoIterator<Item = &'a Job>,
    totals: ResourceTotals<'_>,
) -> ValidationResult {
    let mut errors = Vec::new();

    let mut machine_names = HashSet::new();
    for m in machines {
        if !machine_names.insert(m.name.as_str()) {
            errors.push(ValidationError::new(
                ValidationErrorKind::DuplicateId,
                format!("Duplicate machine: {}", m.name),
            ));
        }
        if let Some(setup) = &m.setup {
            check_capacity(
                &mut errors,
                totals.tools,
                &setup.part_no,
                setup.tools,
                &format!("Machine '{}' setup", m.name),
            );
            check_capacity(
                &mut errors,
                totals.wires,
                &setup.part_id,
                setup.wires,
                &format!("Machine '{}' setup", m.name),
            );
        }
    }

    let mut lot_numbers = HashSet::new();
    for job in jobs {
        if !lot_numbers.insert(job.lot_number.as_str()) {
            errors.push(ValidationError::new(
                ValidationErrorKind::DuplicateId,
                format!("Duplicate lot number: {}", job.lot_number),
            ));
        }

        if let Some(pinned) = &job.pinned_machine {
            if !machine_names.contains(pinned.as_str()) {
                errors.push(ValidationError::new(
                    ValidationErrorKind::UnknownMachineReference,
                    format!("Lot '{}' is pinned to unknown machine '{}'", job.lot_number, pinned),
                ));
            }
        }
        for cand in &job.candidate_machines {
            if !machine_names.contains(cand.as_str()) {
                errors.push(ValidationError::new(
                    ValidationErrorKind::UnknownMachineReference,
                    format!(
                        "Lot '{}' lists unknown candidate machine '{}'",
                        job.lot_number, cand
                    ),
                ));
            }
        }

        let mut models: Vec<(&String, &i64)> = job.process_times.iter().collect();
        models.sort();
        for (model, &ms) in models {
            if ms < 0 {
                errors.push(ValidationError::new(
                    ValidationErrorKind::InvalidProcessTime,
                    format!(
                        "Lot '{}' has negative process time {} on model '{}'",
                        job.lot_number, ms, model
                    ),
                ));
            }
        }

        let owner = format!("Lot '{}'", job.lot_number);
        check_capacity(&mut errors, totals.tools, &job.part_no, job.tools_required, &owner);
        check_capacity(&mut errors, totals.wires, &job.part_id, job.wires_required, &owner);
    }

    finish(errors)
}

/// Validates that manual tables only name registered machines.
///
/// Prefix patterns (`"BB2*"`) are not checked.
pub fn validate_tables(tables: &EligibilityTables, machine_names: &HashSet<&str>) -> ValidationResult {
    let mut errors = Vec::new();

    let mut dedicated: Vec<&str> = tables.dedicated.machine_names().collect();
    dedicated.sort_unstable();
    dedicated.dedup();
    for name in dedicated {
        if !machine_names.contains(name) {
            errors.push(unknown_in("dedication table", name));
        }
    }

    for (label, constraint) in [("allow list", &tables.allow), ("restrain list", &tables.restrain)] {
        let Some(constraint) = constraint else {
            continue;
        };
        for name in constraint.exact_machine_names() {
            if !machine_names.contains(name) {
                errors.push(unknown_in(label, name));
            }
        }
    }

    finish(errors)
}

/// Validates planner parameters.
pub fn validate_config(config: &PlannerConfig) -> ValidationResult {
    let mut errors = Vec::new();

    let p = config.orphan_probability;
    if !p.is_finite() || !(0.0..=1.0).contains(&p) {
        errors.push(ValidationError::new(
            ValidationErrorKind::InvalidParameter,
            format!("Orphan probability must be within [0, 1], got {p}"),
        ));
    }
    if config.max_passes == 0 {
        errors.push(ValidationError::new(
            ValidationErrorKind::InvalidParameter,
            "max_passes must be at least 1",
        ));
    }
    if config.threshold == Some(0) {
        errors.push(ValidationError::new(
            ValidationErrorKind::InvalidParameter,
            "Dispatch threshold must be at least 1",
        ));
    }
    if let Some(horizon) = config.horizon_ms {
        if horizon <= 0 {
            errors.push(ValidationError::new(
                ValidationErrorKind::InvalidParameter,
                format!("Dispatch horizon must be positive, got {horizon} ms"),
            ));
        }
    }
    let times = &config.setup_times;
    for (part, ms) in [
        ("recipe", times.recipe_change_ms),
        ("tool", times.tool_change_ms),
        ("wire", times.wire_change_ms),
    ] {
        if ms < 0 {
            errors.push(ValidationError::new(
                ValidationErrorKind::InvalidParameter,
                format!("Negative {part} change time: {ms} ms"),
            ));
        }
    }

    finish(errors)
}

fn check_capacity(
    errors: &mut Vec<ValidationError>,
    totals: &BTreeMap<String, u32>,
    name: &str,
    required: u32,
    owner: &str,
) {
    // Zero totals are handled as orphan jobs, not as configuration errors.
    if let Some(&total) = totals.get(name) {
        if total > 0 && total < required {
            errors.push(ValidationError::new(
                ValidationErrorKind::InsufficientResources,
                format!("{owner} needs {required} of '{name}' but only {total} exist"),
            ));
        }
    }
}

fn unknown_in(table: &str, name: &str) -> ValidationError {
    ValidationError::new(
        ValidationErrorKind::UnknownMachineReference,
        format!("{table} references unknown machine '{name}'"),
    )
}

fn finish(errors: Vec<ValidationError>) -> ValidationResult {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
