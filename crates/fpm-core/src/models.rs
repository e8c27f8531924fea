//! Navigation data models shared by the flight plan and the database backend.

use serde::{Deserialize, Serialize};

use crate::leg::LegType;

// ========== POSITIONS & FIXES ==========

/// Geographic position in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaypointArea {
    #[default]
    Enroute,
    Terminal,
}

/// What kind of facility a leg terminates at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaypointDescriptor {
    Airport,
    Runway,
    Navaid,
    Fix,
}

/// A named point in the navigation database (waypoint, navaid, runway threshold).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fix {
    #[serde(default)]
    pub database_id: String,
    pub ident: String,
    pub icao_code: String,
    pub location: Coordinates,
    #[serde(default)]
    pub area: WaypointArea,
}

impl Fix {
    pub fn new(ident: impl Into<String>, icao_code: impl Into<String>, location: Coordinates) -> Self {
        let ident = ident.into();
        let icao_code = icao_code.into();
        Self {
            database_id: format!("W{}{}", icao_code, ident),
            ident,
            icao_code,
            location,
            area: WaypointArea::Enroute,
        }
    }

    /// Pilot-defined point with no database counterpart.
    pub fn from_location(ident: impl Into<String>, location: Coordinates) -> Self {
        let ident = ident.into();
        Self {
            database_id: format!("X  {}", ident),
            ident,
            icao_code: "  ".to_string(),
            location,
            area: WaypointArea::Enroute,
        }
    }

    /// Two fixes are the same point when ident and ICAO region agree.
    pub fn same_fix(&self, other: &Fix) -> bool {
        self.ident == other.ident && self.icao_code == other.icao_code
    }
}

// ========== AIRPORTS & RUNWAYS ==========

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Airport {
    pub ident: String,
    pub icao_code: String,
    pub location: Coordinates,
    #[serde(default)]
    pub elevation_ft: f64,
}

impl Airport {
    /// Airport reference point as a fix.
    pub fn as_fix(&self) -> Fix {
        Fix {
            database_id: format!("A{}", self.ident),
            ident: self.ident.clone(),
            icao_code: self.icao_code.clone(),
            location: self.location,
            area: WaypointArea::Terminal,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Runway {
    /// Database ident, e.g. `RW06R`.
    pub ident: String,
    pub airport_ident: String,
    pub threshold: Coordinates,
    pub bearing: f64,
    pub magnetic_bearing: f64,
    #[serde(default)]
    pub length_m: f64,
    #[serde(default)]
    pub threshold_elevation_ft: f64,
}

impl Runway {
    /// Runway number without the `RW` prefix, e.g. `06R`.
    pub fn number(&self) -> &str {
        self.ident.strip_prefix("RW").unwrap_or(&self.ident)
    }

    /// Threshold fix named after the airport and runway, e.g. `CYYZ06R`.
    pub fn as_fix(&self, airport: &Airport) -> Fix {
        Fix {
            database_id: format!("R{}{}", airport.ident, self.number()),
            ident: format!("{}{}", airport.ident, self.number()),
            icao_code: airport.icao_code.clone(),
            location: self.threshold,
            area: WaypointArea::Terminal,
        }
    }
}

// ========== CONSTRAINTS ==========

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AltitudeDescriptor {
    At,
    AtOrAbove,
    AtOrBelow,
    Between,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AltitudeConstraint {
    pub descriptor: AltitudeDescriptor,
    pub altitude1_ft: f64,
    #[serde(default)]
    pub altitude2_ft: Option<f64>,
}

impl AltitudeConstraint {
    pub fn at_or_above(altitude_ft: f64) -> Self {
        Self {
            descriptor: AltitudeDescriptor::AtOrAbove,
            altitude1_ft: altitude_ft,
            altitude2_ft: None,
        }
    }
}

// ========== PROCEDURES ==========

/// One coded leg of a terminal procedure or transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcedureLeg {
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
    /// Distance for CD/FD/VD legs, leg length for FC legs.
    #[serde(default)]
    pub length_nm: Option<f64>,
    /// Radial from the recommended navaid for CR/VR legs.
    #[serde(default)]
    pub theta: Option<f64>,
    #[serde(default)]
    pub arc_radius_nm: Option<f64>,
    #[serde(default)]
    pub vertical_angle: Option<f64>,
    #[serde(default)]
    pub overfly: bool,
    #[serde(default)]
    pub rnp: Option<f64>,
}

impl ProcedureLeg {
    /// Plain track-to-fix leg; used by the database for airway legs.
    pub fn track_to(leg_type: LegType, fix: Fix) -> Self {
        Self {
            leg_type,
            waypoint: Some(fix),
            waypoint_descriptor: Some(WaypointDescriptor::Fix),
            recommended_navaid: None,
            magnetic_course: None,
            altitude: None,
            length_nm: None,
            theta: None,
            arc_radius_nm: None,
            vertical_angle: None,
            overfly: false,
            rnp: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcedureTransition {
    pub ident: String,
    pub legs: Vec<ProcedureLeg>,
}

/// Standard instrument departure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Departure {
    pub ident: String,
    /// Keyed by runway ident (`RW06R`).
    #[serde(default)]
    pub runway_transitions: Vec<ProcedureTransition>,
    #[serde(default)]
    pub common_legs: Vec<ProcedureLeg>,
    #[serde(default)]
    pub enroute_transitions: Vec<ProcedureTransition>,
}

/// Standard terminal arrival.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Arrival {
    pub ident: String,
    #[serde(default)]
    pub enroute_transitions: Vec<ProcedureTransition>,
    #[serde(default)]
    pub common_legs: Vec<ProcedureLeg>,
    /// Keyed by runway ident (`RW27R`).
    #[serde(default)]
    pub runway_transitions: Vec<ProcedureTransition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Approach {
    pub ident: String,
    #[serde(default)]
    pub runway_ident: Option<String>,
    /// Approach vias.
    #[serde(default)]
    pub transitions: Vec<ProcedureTransition>,
    pub legs: Vec<ProcedureLeg>,
    #[serde(default)]
    pub missed_legs: Vec<ProcedureLeg>,
}

impl Approach {
    /// Whether the final approach leg terminates at a runway threshold.
    pub fn ends_at_runway(&self) -> bool {
        self.legs
            .last()
            .is_some_and(|leg| leg.waypoint_descriptor == Some(WaypointDescriptor::Runway))
    }
}

pub(crate) fn find_transition<'a>(
    transitions: &'a [ProcedureTransition],
    ident: &str,
) -> Option<&'a ProcedureTransition> {
    transitions.iter().find(|t| t.ident == ident)
}

/// Named airway as an ordered list of fixes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Airway {
    pub ident: String,
    pub fixes: Vec<Fix>,
}

// ========== FIX INFO ==========

/// Pilot-entered reference data for one FIX INFO page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixInfoEntry {
    pub fix: Fix,
    #[serde(default)]
    pub radii_nm: Vec<f64>,
    /// Magnetic bearings from the fix.
    #[serde(default)]
    pub radials: Vec<f64>,
}

impl FixInfoEntry {
    pub fn new(fix: Fix) -> Self {
        Self {
            fix,
            radii_nm: Vec::new(),
            radials: Vec::new(),
        }
    }
}

// ========== AIRCRAFT STATE ==========

/// Aircraft position used when building a direct-to.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PresentPosition {
    pub location: Coordinates,
    pub true_track: f64,
    /// East positive.
    pub magnetic_variation: f64,
}

impl PresentPosition {
    /// Track converted to magnetic, normalized to [0, 360).
    pub fn magnetic_track(&self) -> f64 {
        (self.true_track - self.magnetic_variation).rem_euclid(360.0)
    }
}
