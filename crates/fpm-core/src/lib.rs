pub mod base_plan;
pub mod error;
pub mod events;
pub mod flight_plan;
pub mod leg;
pub mod models;
pub mod navdata;
pub mod pending_airways;
mod procedures;
pub mod segment;

pub use base_plan::{AvailableProcedures, BaseFlightPlan, ProcedureSelection};
pub use error::{NavDataError, PlanError, Result};
pub use events::PlanEvent;
pub use flight_plan::{build_city_pair, FlightPlan, FIX_INFO_SLOTS};
pub use leg::{FlightPlanElement, FlightPlanLeg, LegDefinition, LegType};
pub use models::{
    Airport, Airway, AltitudeConstraint, AltitudeDescriptor, Approach, Arrival, Coordinates,
    Departure, Fix, FixInfoEntry, PresentPosition, ProcedureLeg, ProcedureTransition, Runway,
    WaypointArea, WaypointDescriptor,
};
pub use navdata::{
    resolve_airway, resolve_edit, NavigationDatabase, ProcedureEdit, ResolutionContext,
    ResolvedEdit, StaticNavDatabase,
};
pub use pending_airways::PendingAirways;
pub use segment::{Segment, SegmentClass, SegmentKind};
