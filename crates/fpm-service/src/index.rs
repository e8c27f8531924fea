//! Flight plan slot identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A plan slot. Secondaries are numbered from 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanIndex {
    Active,
    Temporary,
    Uplink,
    Secondary(usize),
}

impl PlanIndex {
    /// Numeric slot: active 0, temporary 1, uplink 2, secondary n at 2 + n.
    pub fn as_usize(self) -> usize {
        match self {
            PlanIndex::Active => 0,
            PlanIndex::Temporary => 1,
            PlanIndex::Uplink => 2,
            PlanIndex::Secondary(n) => 2 + n,
        }
    }
}

impl From<usize> for PlanIndex {
    fn from(value: usize) -> Self {
        match value {
            0 => PlanIndex::Active,
            1 => PlanIndex::Temporary,
            2 => PlanIndex::Uplink,
            n => PlanIndex::Secondary(n - 2),
        }
    }
}

impl fmt::Display for PlanIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanIndex::Active => write!(f, "active"),
            PlanIndex::Temporary => write!(f, "temporary"),
            PlanIndex::Uplink => write!(f, "uplink"),
            PlanIndex::Secondary(n) => write!(f, "secondary {}", n),
        }
    }
}
