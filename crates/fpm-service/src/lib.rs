pub mod config;
pub mod events;
pub mod index;
pub mod manager;
pub mod service;

pub use config::FpmConfig;
pub use events::SyncEvent;
pub use index::PlanIndex;
pub use manager::{FlightPlanManager, SlotSummary};
pub use service::FlightPlanService;
