//! Error types for the dispatch planner.
//!
//! Structural problems (unknown names, malformed tables) are returned as
//! [`SchedulerError`]. A job that cannot run anywhere is *not* an error: it is
//! recorded as a [`JobConflict`](crate::scheduler::JobConflict) and the pass
//! continues.

use std::fmt;

use thiserror::Error;

use crate::validation::ValidationError;

/// Entity category named by a failed lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Machine,
    Job,
    JobGroup,
    Resource,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::Machine => "machine",
            EntityKind::Job => "job",
            EntityKind::JobGroup => "job group",
            EntityKind::Resource => "resource",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("{entity} not found: {key}")]
    NotFound { entity: EntityKind, key: String },

    #[error("invalid configuration: {}", summarize(.0))]
    InvalidConfiguration(Vec<ValidationError>),
}

impl SchedulerError {
    pub fn machine_not_found(key: impl Into<String>) -> Self {
        Self::NotFound {
            entity: EntityKind::Machine,
            key: key.into(),
        }
    }

    pub fn job_not_found(key: impl Into<String>) -> Self {
        Self::NotFound {
            entity: EntityKind::Job,
            key: key.into(),
        }
    }

    /// Wraps a single validation problem.
    pub fn invalid(error: ValidationError) -> Self {
        Self::InvalidConfiguration(vec![error])
    }
}

fn summarize(errors: &[ValidationError]) -> String {
    match errors {
        [] => "no details".to_string(),
        [only] => only.message.clone(),
        [first, rest @ ..] => format!("{} (and {} more)", first.message, rest.len()),
    }
}

pub type Result<T> = std::result::Result<T, SchedulerError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::ValidationErrorKind;

    #[test]
    fn test_not_found_message() {
        let err = SchedulerError::machine_not_found("BB999");
        assert_eq!(err.to_string(), "machine not found: BB999");
    }

    #[test]
    fn test_invalid_configuration_summary() {
        let err = SchedulerError::InvalidConfiguration(vec![
            ValidationError::new(ValidationErrorKind::DuplicateId, "Duplicate machine: BB211"),
            ValidationError::new(ValidationErrorKind::DuplicateId, "Duplicate lot: P1"),
        ]);
        assert_eq!(
            err.to_string(),
            "invalid configuration: Duplicate machine: BB211 (and 1 more)"
        );
    }
}
