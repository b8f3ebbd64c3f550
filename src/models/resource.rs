//! Resource instance model.
//!
//! Tools and wires are the two scarce secondary resources a bonder needs.
//! Each unit on the floor is one [`ResourceInstance`]: it has a kind name
//! (tool part number or wire part id), an availability time, and at most one
//! holder machine.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::MachineId;

/// Resource classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResourceKind {
    /// Bond head tooling, named by part number.
    Tool,
    /// Wire spool, named by part id.
    Wire,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Tool => f.write_str("tool"),
            ResourceKind::Wire => f.write_str("wire"),
        }
    }
}

/// Handle into the [`ResourcePool`](crate::store::ResourcePool).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceId(pub u32);

impl ResourceId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// One physical tool or wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceInstance {
    pub id: ResourceId,
    pub kind: ResourceKind,
    /// Kind name (part number / part id).
    pub name: String,
    /// When the instance becomes free (ms).
    pub available_ms: i64,
    /// Machine currently holding the instance.
    pub holder: Option<MachineId>,
}

impl ResourceInstance {
    pub fn new(id: ResourceId, kind: ResourceKind, name: impl Into<String>) -> Self {
        Self {
            id,
            kind,
            name: name.into(),
            available_ms: 0,
            holder: None,
        }
    }

    pub fn is_free(&self) -> bool {
        self.holder.is_none()
    }
}
