//! Notifications broadcast to plan consumers.

use fpm_core::PlanEvent;
use serde::Serialize;

use crate::index::PlanIndex;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SyncEvent {
    PlanCreated {
        plan: PlanIndex,
    },
    PlanDeleted {
        plan: PlanIndex,
    },
    AllPlansDeleted,
    PlanCopied {
        from: PlanIndex,
        to: PlanIndex,
    },
    /// Fired once per committed operation that moved the plan version.
    VersionChanged {
        plan: PlanIndex,
        version: u64,
    },
    Plan {
        plan: PlanIndex,
        event: PlanEvent,
    },
}
