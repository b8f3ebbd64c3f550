//! Owned state of a planning run.
//!
//! Jobs, machines and resource instances each live in one store and are
//! addressed by handle everywhere else.

mod jobs;
mod machines;
mod pool;

pub use jobs::JobStore;
pub use machines::MachineRegistry;
pub use pool::ResourcePool;
