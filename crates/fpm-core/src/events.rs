//! Notifications raised by a flight plan for external consumers.

use serde::{Deserialize, Serialize};

use crate::models::FixInfoEntry;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlanEvent {
    FixInfoChanged {
        plan_index: usize,
        /// 1-based FIX INFO page number.
        slot: usize,
        entry: Option<FixInfoEntry>,
    },
    ActiveLegChanged {
        plan_index: usize,
        active_leg_index: usize,
    },
}
