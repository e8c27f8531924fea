//! Flight plan legs, discontinuities and leg construction rules.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::{
    Airport, AltitudeConstraint, Coordinates, Fix, ProcedureLeg, Runway, WaypointDescriptor,
};

/// Height above the runway the origin centerline leg climbs to.
const CENTERLINE_CLIMB_FT: f64 = 1500.0;

/// ARINC 424 path terminator.
#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LegType {
    AF,
    CA,
    CD,
    CF,
    CI,
    CR,
    DF,
    FA,
    FC,
    FD,
    FM,
    HA,
    HF,
    HM,
    IF,
    PI,
    RF,
    TF,
    VA,
    VD,
    VI,
    VM,
    VR,
}

impl LegType {
    /// Terminates at a database fix (AF, CF, IF, DF, RF, TF).
    pub fn is_xf(self) -> bool {
        matches!(
            self,
            LegType::AF | LegType::CF | LegType::IF | LegType::DF | LegType::RF | LegType::TF
        )
    }

    /// Originates at a fix and terminates elsewhere (FA, FC, FD, FM).
    pub fn is_fx(self) -> bool {
        matches!(self, LegType::FA | LegType::FC | LegType::FD | LegType::FM)
    }

    pub fn is_hx(self) -> bool {
        matches!(self, LegType::HA | LegType::HF | LegType::HM)
    }
}

impl fmt::Display for LegType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Immutable leg data as coded in the database, plus pilot edits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegDefinition {
    pub leg_type: LegType,
    #[serde(default)]
    pub waypoint: Option<Fix>,
    #[serde(default)]
    pub waypoint_descriptor: Option<WaypointDescriptor>,
    #[serde(default)]
    pub recommended_navaid: Option<Fix>,
    #[serde(default)]
    pub magnetic_course: Option<f64>,
    #[serde(default)]
    pub altitude: Option<AltitudeConstraint>,
    #[serde(default)]
    pub length_nm: Option<f64>,
    #[serde(default)]
    pub theta: Option<f64>,
    #[serde(default)]
    pub arc_radius_nm: Option<f64>,
    #[serde(default)]
    pub vertical_angle: Option<f64>,
    #[serde(default)]
    pub overfly: bool,
    #[serde(default)]
    pub airway_ident: Option<String>,
}

impl LegDefinition {
    fn to_fix(leg_type: LegType, fix: Fix, descriptor: WaypointDescriptor) -> Self {
        Self {
            leg_type,
            waypoint: Some(fix),
            waypoint_descriptor: Some(descriptor),
            recommended_navaid: None,
            magnetic_course: None,
            altitude: None,
            length_nm: None,
            theta: None,
            arc_radius_nm: None,
            vertical_angle: None,
            overfly: false,
            airway_ident: None,
        }
    }
}

impl From<&ProcedureLeg> for LegDefinition {
    fn from(leg: &ProcedureLeg) -> Self {
        Self {
            leg_type: leg.leg_type,
            waypoint: leg.waypoint.clone(),
            waypoint_descriptor: leg.waypoint_descriptor,
            recommended_navaid: leg.recommended_navaid.clone(),
            magnetic_course: leg.magnetic_course,
            altitude: leg.altitude,
            length_nm: leg.length_nm,
            theta: leg.theta,
            arc_radius_nm: leg.arc_radius_nm,
            vertical_angle: leg.vertical_angle,
            overfly: leg.overfly,
            airway_ident: None,
        }
    }
}

/// A single leg as it appears in a flight plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightPlanLeg {
    pub ident: String,
    /// Procedure name or truncation marker shown next to the leg.
    #[serde(default)]
    pub annotation: String,
    /// Current path terminator. Restringing flips this between IF and TF.
    pub leg_type: LegType,
    pub definition: LegDefinition,
    #[serde(default)]
    pub rnp: Option<f64>,
}

impl FlightPlanLeg {
    /// Build a plan leg from a coded procedure leg.
    pub fn from_procedure_leg(leg: &ProcedureLeg, procedure_ident: &str) -> Self {
        Self {
            ident: procedure_leg_ident(leg),
            annotation: procedure_ident.to_string(),
            leg_type: leg.leg_type,
            definition: LegDefinition::from(leg),
            rnp: leg.rnp,
        }
    }

    /// IF leg at a runway threshold, or at the airport reference point without a runway.
    pub fn from_airport_and_runway(
        procedure_ident: &str,
        airport: &Airport,
        runway: Option<&Runway>,
    ) -> Self {
        match runway {
            Some(runway) => {
                let fix = runway.as_fix(airport);
                let mut definition =
                    LegDefinition::to_fix(LegType::IF, fix.clone(), WaypointDescriptor::Runway);
                definition.magnetic_course = Some(runway.magnetic_bearing);
                Self {
                    ident: fix.ident,
                    annotation: procedure_ident.to_string(),
                    leg_type: LegType::IF,
                    definition,
                    rnp: None,
                }
            }
            None => Self {
                ident: airport.ident.clone(),
                annotation: procedure_ident.to_string(),
                leg_type: LegType::IF,
                definition: LegDefinition::to_fix(
                    LegType::IF,
                    airport.as_fix(),
                    WaypointDescriptor::Airport,
                ),
                rnp: None,
            },
        }
    }

    /// FA leg along the departure runway heading, used until a departure is selected.
    pub fn origin_extended_centerline(airport: &Airport, runway: &Runway) -> Self {
        let elevation = if runway.threshold_elevation_ft != 0.0 {
            runway.threshold_elevation_ft
        } else {
            airport.elevation_ft
        };
        let altitude = elevation + CENTERLINE_CLIMB_FT;
        let ident: String = format!("{:.0}", altitude).chars().take(4).collect();

        let mut definition = LegDefinition::to_fix(
            LegType::FA,
            runway.as_fix(airport),
            WaypointDescriptor::Runway,
        );
        definition.magnetic_course = Some(runway.magnetic_bearing);
        definition.altitude = Some(AltitudeConstraint::at_or_above(altitude));

        Self {
            ident,
            annotation: format!("{}{:03.0}", runway.number(), runway.magnetic_bearing),
            leg_type: LegType::FA,
            definition,
            rnp: None,
        }
    }

    /// TF leg to a pilot-entered or airway waypoint.
    pub fn from_enroute_waypoint(fix: Fix, airway_ident: Option<String>) -> Self {
        let mut definition = LegDefinition::to_fix(LegType::TF, fix, WaypointDescriptor::Fix);
        definition.airway_ident = airway_ident.clone();
        Self {
            ident: definition
                .waypoint
                .as_ref()
                .map(|w| w.ident.clone())
                .unwrap_or_default(),
            annotation: airway_ident.unwrap_or_default(),
            leg_type: LegType::TF,
            definition,
            rnp: None,
        }
    }

    /// Starting point of a direct-to at the aircraft position.
    pub fn turning_point(location: Coordinates, magnetic_course: f64) -> Self {
        let mut definition = LegDefinition::to_fix(
            LegType::IF,
            Fix::from_location("T-P", location),
            WaypointDescriptor::Fix,
        );
        definition.magnetic_course = Some(magnetic_course);
        Self {
            ident: "T-P".to_string(),
            annotation: String::new(),
            leg_type: LegType::IF,
            definition,
            rnp: None,
        }
    }

    /// DF leg ending a direct-to at `fix`.
    pub fn direct_to_turn_end(fix: Fix) -> Self {
        Self {
            ident: fix.ident.clone(),
            annotation: String::new(),
            leg_type: LegType::DF,
            definition: LegDefinition::to_fix(LegType::DF, fix, WaypointDescriptor::Fix),
            rnp: None,
        }
    }

    pub fn is_xf(&self) -> bool {
        self.definition.leg_type.is_xf()
    }

    pub fn is_fx(&self) -> bool {
        self.definition.leg_type.is_fx()
    }

    pub fn is_hx(&self) -> bool {
        self.definition.leg_type.is_hx()
    }

    pub fn is_runway(&self) -> bool {
        self.definition.waypoint_descriptor == Some(WaypointDescriptor::Runway)
    }

    pub fn overfly(&self) -> bool {
        self.definition.overfly
    }

    /// Fix the leg ends at. Only fix-terminating legs have one; holds do not.
    pub fn termination_waypoint(&self) -> Option<&Fix> {
        if self.is_xf() {
            self.definition.waypoint.as_ref()
        } else {
            None
        }
    }

    /// Whether this leg ends at `fix` (by ident and ICAO region).
    pub fn terminates_with(&self, fix: &Fix) -> bool {
        self.termination_waypoint().is_some_and(|w| w.same_fix(fix))
    }
}

fn procedure_leg_ident(leg: &ProcedureLeg) -> String {
    let waypoint_ident = leg.waypoint.as_ref().map(|w| w.ident.as_str());
    let navaid_ident = leg
        .recommended_navaid
        .as_ref()
        .or(leg.waypoint.as_ref())
        .map(|w| w.ident.as_str());

    let ident = match leg.leg_type {
        LegType::AF
        | LegType::CF
        | LegType::DF
        | LegType::IF
        | LegType::RF
        | LegType::TF
        | LegType::HA
        | LegType::HF
        | LegType::HM
        | LegType::PI => waypoint_ident.map(str::to_string),
        LegType::CA | LegType::FA | LegType::VA => leg
            .altitude
            .map(|alt| format!("{:.0}", alt.altitude1_ft)),
        LegType::CD | LegType::FD | LegType::VD | LegType::FC => navaid_ident
            .zip(leg.length_nm)
            .map(|(navaid, distance)| format!("{}/{:.0}", navaid, distance)),
        LegType::CR | LegType::VR => navaid_ident
            .zip(leg.theta)
            .map(|(navaid, theta)| format!("{}{:03.0}", navaid, theta)),
        LegType::CI | LegType::VI => Some("INTCPT".to_string()),
        LegType::FM | LegType::VM => Some("MANUAL".to_string()),
    };

    ident.unwrap_or_else(|| leg.leg_type.to_string())
}

/// One entry of a flight plan: a leg or a route discontinuity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FlightPlanElement {
    Leg(FlightPlanLeg),
    Discontinuity,
}

impl FlightPlanElement {
    pub fn is_discontinuity(&self) -> bool {
        matches!(self, FlightPlanElement::Discontinuity)
    }

    pub fn as_leg(&self) -> Option<&FlightPlanLeg> {
        match self {
            FlightPlanElement::Leg(leg) => Some(leg),
            FlightPlanElement::Discontinuity => None,
        }
    }

    pub fn as_leg_mut(&mut self) -> Option<&mut FlightPlanLeg> {
        match self {
            FlightPlanElement::Leg(leg) => Some(leg),
            FlightPlanElement::Discontinuity => None,
        }
    }

    /// Display identifier; discontinuities render as a dashed marker.
    pub fn ident(&self) -> &str {
        match self {
            FlightPlanElement::Leg(leg) => &leg.ident,
            FlightPlanElement::Discontinuity => "---F-PLN DISCONTINUITY---",
        }
    }

    pub(crate) fn describe(&self) -> String {
        match self {
            FlightPlanElement::Leg(leg) => format!("a {} leg", leg.leg_type),
            FlightPlanElement::Discontinuity => "a discontinuity".to_string(),
        }
    }
}

impl From<FlightPlanLeg> for FlightPlanElement {
    fn from(leg: FlightPlanLeg) -> Self {
        FlightPlanElement::Leg(leg)
    }
}
