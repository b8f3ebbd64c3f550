//! Dispatching domain models.
//!
//! Plain records for the bonding-area dispatch problem. Identity is by name at
//! the boundary (lot number, entity name, part number) and by small integer
//! handles (`JobId`, `MachineId`, `ResourceId`) inside the engine.
//!
//! # Domain Mappings
//!
//! | u-dispatch | Assembly floor | Generic scheduling |
//! |------------|----------------|--------------------|
//! | Job | Lot | Task |
//! | Machine | Wire bonder / die attacher | Primary resource |
//! | ResourceInstance | Tool, wire spool | Secondary resource |
//! | MachineGroup | Recipe line-up | Resource pool |
//! | JobGroup | Lots sharing tooling | Task family |

mod constraint;
mod group;
mod job;
mod machine;
mod resource;

pub use constraint::{
    ConstraintEntry, DedicationTable, JobSelector, MachineConstraint, TransportationTable,
};
pub use group::{DistributionEntry, JobGroup, JobSignature, MachineGroup};
pub use job::{Job, JobId, JobState};
pub use machine::{Machine, MachineId, MachineSetup, QueuedJob};
pub use resource::{ResourceId, ResourceInstance, ResourceKind};
