//! Navigation database access.
//!
//! The database is an asynchronous collaborator. Plan edits that need data
//! from it run in two phases: an owned [`ResolutionContext`] is captured from
//! the plan, [`resolve_edit`] performs the lookups, and the resulting
//! [`ResolvedEdit`] is applied synchronously afterwards. Nothing borrowed from
//! a plan is held across a lookup.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::error::{NavDataError, PlanError, Result};
use crate::models::{
    find_transition, Airport, Airway, Approach, Arrival, Departure, Fix, ProcedureTransition,
    Runway,
};
use crate::segment::SegmentKind;

type NavResult<T> = std::result::Result<T, NavDataError>;

/// Read-only procedure, airport and navaid lookup backend.
///
/// Lookups return empty collections when nothing matches; the caller decides
/// whether that is an error.
#[async_trait]
pub trait NavigationDatabase: Send + Sync {
    async fn get_airports(&self, idents: &[String]) -> NavResult<Vec<Airport>>;

    async fn get_runways(&self, airport_ident: &str) -> NavResult<Vec<Runway>>;

    async fn get_departures(&self, airport_ident: &str) -> NavResult<Vec<Departure>>;

    async fn get_arrivals(&self, airport_ident: &str) -> NavResult<Vec<Arrival>>;

    async fn get_approaches(&self, airport_ident: &str) -> NavResult<Vec<Approach>>;

    async fn get_waypoints(&self, idents: &[String]) -> NavResult<Vec<Fix>>;

    /// Fixes along `airway_ident` after `from`, up to and including `to`.
    async fn get_airway_fixes(&self, airway_ident: &str, from: &Fix, to: &Fix)
        -> NavResult<Vec<Fix>>;
}

// ========== EDIT INTENTS ==========

/// A named procedure change, before any database lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "edit", content = "ident", rename_all = "snake_case")]
pub enum ProcedureEdit {
    OriginAirport(String),
    OriginRunway(String),
    Departure(Option<String>),
    DepartureEnrouteTransition(Option<String>),
    ArrivalEnrouteTransition(Option<String>),
    Arrival(Option<String>),
    ApproachVia(Option<String>),
    Approach(Option<String>),
    DestinationAirport(String),
    DestinationRunway(String),
}

impl ProcedureEdit {
    /// Segment whose procedure this edit replaces.
    pub fn segment(&self) -> SegmentKind {
        match self {
            ProcedureEdit::OriginAirport(_) | ProcedureEdit::OriginRunway(_) => SegmentKind::Origin,
            ProcedureEdit::Departure(_) => SegmentKind::Departure,
            ProcedureEdit::DepartureEnrouteTransition(_) => SegmentKind::DepartureEnrouteTransition,
            ProcedureEdit::ArrivalEnrouteTransition(_) => SegmentKind::ArrivalEnrouteTransition,
            ProcedureEdit::Arrival(_) => SegmentKind::Arrival,
            ProcedureEdit::ApproachVia(_) => SegmentKind::ApproachVia,
            ProcedureEdit::Approach(_) => SegmentKind::Approach,
            ProcedureEdit::DestinationAirport(_) | ProcedureEdit::DestinationRunway(_) => {
                SegmentKind::Destination
            }
        }
    }
}

/// Plan data a lookup depends on, captured before suspending.
#[derive(Debug, Clone, Default)]
pub struct ResolutionContext {
    pub origin_airport: Option<String>,
    pub destination_airport: Option<String>,
    pub departure: Option<Departure>,
    pub arrival: Option<Arrival>,
    pub approach: Option<Approach>,
}

/// Database results for one edit, ready to apply without further lookups.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedEdit {
    OriginAirport {
        airport: Airport,
        runways: Vec<Runway>,
        departures: Vec<Departure>,
    },
    OriginRunway(Runway),
    Departure(Option<Departure>),
    DepartureEnrouteTransition(Option<ProcedureTransition>),
    ArrivalEnrouteTransition(Option<ProcedureTransition>),
    Arrival(Option<Arrival>),
    ApproachVia(Option<ProcedureTransition>),
    Approach(Option<Approach>),
    DestinationAirport {
        airport: Airport,
        runways: Vec<Runway>,
        arrivals: Vec<Arrival>,
        approaches: Vec<Approach>,
    },
    DestinationRunway(Runway),
}

/// Look up everything `edit` needs.
pub async fn resolve_edit<D>(
    db: &D,
    ctx: &ResolutionContext,
    edit: &ProcedureEdit,
) -> Result<ResolvedEdit>
where
    D: NavigationDatabase + ?Sized,
{
    let resolved = match edit {
        ProcedureEdit::OriginAirport(ident) => {
            let airport = fetch_airport(db, ident).await?;
            let runways = db.get_runways(&airport.ident).await?;
            let departures = db.get_departures(&airport.ident).await?;
            ResolvedEdit::OriginAirport {
                airport,
                runways,
                departures,
            }
        }
        ProcedureEdit::OriginRunway(ident) => {
            let airport = require(&ctx.origin_airport, "no origin airport selected")?;
            ResolvedEdit::OriginRunway(fetch_runway(db, airport, ident).await?)
        }
        ProcedureEdit::Departure(None) => ResolvedEdit::Departure(None),
        ProcedureEdit::Departure(Some(ident)) => {
            let airport = require(&ctx.origin_airport, "no origin airport selected")?;
            let departure = db
                .get_departures(airport)
                .await?
                .into_iter()
                .find(|d| &d.ident == ident)
                .ok_or_else(|| PlanError::not_found("departure", ident))?;
            ResolvedEdit::Departure(Some(departure))
        }
        ProcedureEdit::DepartureEnrouteTransition(None) => {
            ResolvedEdit::DepartureEnrouteTransition(None)
        }
        ProcedureEdit::DepartureEnrouteTransition(Some(ident)) => {
            let departure = require(&ctx.departure, "no departure selected")?;
            let transition = find_transition(&departure.enroute_transitions, ident)
                .ok_or_else(|| PlanError::not_found("departure enroute transition", ident))?;
            ResolvedEdit::DepartureEnrouteTransition(Some(transition.clone()))
        }
        ProcedureEdit::Arrival(None) => ResolvedEdit::Arrival(None),
        ProcedureEdit::Arrival(Some(ident)) => {
            let airport = require(&ctx.destination_airport, "no destination airport selected")?;
            let arrival = db
                .get_arrivals(airport)
                .await?
                .into_iter()
                .find(|a| &a.ident == ident)
                .ok_or_else(|| PlanError::not_found("arrival", ident))?;
            ResolvedEdit::Arrival(Some(arrival))
        }
        ProcedureEdit::ArrivalEnrouteTransition(None) => {
            ResolvedEdit::ArrivalEnrouteTransition(None)
        }
        ProcedureEdit::ArrivalEnrouteTransition(Some(ident)) => {
            let arrival = require(&ctx.arrival, "no arrival selected")?;
            let transition = find_transition(&arrival.enroute_transitions, ident)
                .ok_or_else(|| PlanError::not_found("arrival enroute transition", ident))?;
            ResolvedEdit::ArrivalEnrouteTransition(Some(transition.clone()))
        }
        ProcedureEdit::Approach(None) => ResolvedEdit::Approach(None),
        ProcedureEdit::Approach(Some(ident)) => {
            let airport = require(&ctx.destination_airport, "no destination airport selected")?;
            let approach = db
                .get_approaches(airport)
                .await?
                .into_iter()
                .find(|a| &a.ident == ident)
                .ok_or_else(|| PlanError::not_found("approach", ident))?;
            ResolvedEdit::Approach(Some(approach))
        }
        ProcedureEdit::ApproachVia(None) => ResolvedEdit::ApproachVia(None),
        ProcedureEdit::ApproachVia(Some(ident)) => {
            let approach = require(&ctx.approach, "no approach selected")?;
            let via = find_transition(&approach.transitions, ident)
                .ok_or_else(|| PlanError::not_found("approach via", ident))?;
            ResolvedEdit::ApproachVia(Some(via.clone()))
        }
        ProcedureEdit::DestinationAirport(ident) => {
            let airport = fetch_airport(db, ident).await?;
            let runways = db.get_runways(&airport.ident).await?;
            let arrivals = db.get_arrivals(&airport.ident).await?;
            let approaches = db.get_approaches(&airport.ident).await?;
            ResolvedEdit::DestinationAirport {
                airport,
                runways,
                arrivals,
                approaches,
            }
        }
        ProcedureEdit::DestinationRunway(ident) => {
            let airport = require(&ctx.destination_airport, "no destination airport selected")?;
            ResolvedEdit::DestinationRunway(fetch_runway(db, airport, ident).await?)
        }
    };

    tracing::debug!("Resolved {:?} for {:?}", edit, edit.segment());
    Ok(resolved)
}

/// Fixes along an airway from `from` to the fix named `exit_ident`.
pub async fn resolve_airway<D>(
    db: &D,
    airway_ident: &str,
    from: &Fix,
    exit_ident: &str,
) -> Result<Vec<Fix>>
where
    D: NavigationDatabase + ?Sized,
{
    let candidates = db.get_waypoints(&[exit_ident.to_string()]).await?;
    if candidates.is_empty() {
        return Err(PlanError::not_found("waypoint", exit_ident));
    }

    // Several fixes can share an ident; take the first one on the airway.
    for exit in &candidates {
        let fixes = db.get_airway_fixes(airway_ident, from, exit).await?;
        if !fixes.is_empty() {
            return Ok(fixes);
        }
    }

    Err(PlanError::not_found(
        "airway segment",
        format!("{} {}-{}", airway_ident, from.ident, exit_ident),
    ))
}

async fn fetch_airport<D>(db: &D, ident: &str) -> Result<Airport>
where
    D: NavigationDatabase + ?Sized,
{
    db.get_airports(&[ident.to_string()])
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| PlanError::not_found("airport", ident))
}

async fn fetch_runway<D>(db: &D, airport_ident: &str, ident: &str) -> Result<Runway>
where
    D: NavigationDatabase + ?Sized,
{
    let wanted = normalize_runway_ident(ident);
    db.get_runways(airport_ident)
        .await?
        .into_iter()
        .find(|r| r.ident == wanted)
        .ok_or_else(|| PlanError::not_found("runway", format!("{}{}", airport_ident, ident)))
}

/// Accepts `06R` or `RW06R`.
pub fn normalize_runway_ident(ident: &str) -> String {
    if ident.starts_with("RW") {
        ident.to_string()
    } else {
        format!("RW{}", ident)
    }
}

fn require<'a, T>(value: &'a Option<T>, message: &str) -> Result<&'a T> {
    value.as_ref().ok_or_else(|| PlanError::illegal_state(message))
}

// ========== STATIC DATABASE ==========

/// In-memory database loaded from JSON.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StaticNavDatabase {
    #[serde(default)]
    pub airports: Vec<Airport>,
    #[serde(default)]
    pub runways: Vec<Runway>,
    /// Keyed by airport ident.
    #[serde(default)]
    pub departures: HashMap<String, Vec<Departure>>,
    #[serde(default)]
    pub arrivals: HashMap<String, Vec<Arrival>>,
    #[serde(default)]
    pub approaches: HashMap<String, Vec<Approach>>,
    #[serde(default)]
    pub waypoints: Vec<Fix>,
    #[serde(default)]
    pub airways: Vec<Airway>,
}

impl StaticNavDatabase {
    pub fn from_json_str(json: &str) -> NavResult<Self> {
        serde_json::from_str(json).map_err(|e| NavDataError::Malformed(e.to_string()))
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> NavResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| NavDataError::Unavailable(format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(&json)
    }
}

#[async_trait]
impl NavigationDatabase for StaticNavDatabase {
    async fn get_airports(&self, idents: &[String]) -> NavResult<Vec<Airport>> {
        Ok(self
            .airports
            .iter()
            .filter(|a| idents.contains(&a.ident))
            .cloned()
            .collect())
    }

    async fn get_runways(&self, airport_ident: &str) -> NavResult<Vec<Runway>> {
        Ok(self
            .runways
            .iter()
            .filter(|r| r.airport_ident == airport_ident)
            .cloned()
            .collect())
    }

    async fn get_departures(&self, airport_ident: &str) -> NavResult<Vec<Departure>> {
        Ok(self.departures.get(airport_ident).cloned().unwrap_or_default())
    }

    async fn get_arrivals(&self, airport_ident: &str) -> NavResult<Vec<Arrival>> {
        Ok(self.arrivals.get(airport_ident).cloned().unwrap_or_default())
    }

    async fn get_approaches(&self, airport_ident: &str) -> NavResult<Vec<Approach>> {
        Ok(self.approaches.get(airport_ident).cloned().unwrap_or_default())
    }

    async fn get_waypoints(&self, idents: &[String]) -> NavResult<Vec<Fix>> {
        Ok(self
            .waypoints
            .iter()
            .filter(|w| idents.contains(&w.ident))
            .cloned()
            .collect())
    }

    async fn get_airway_fixes(
        &self,
        airway_ident: &str,
        from: &Fix,
        to: &Fix,
    ) -> NavResult<Vec<Fix>> {
        let Some(airway) = self.airways.iter().find(|a| a.ident == airway_ident) else {
            return Ok(Vec::new());
        };
        let position = |fix: &Fix| airway.fixes.iter().position(|f| f.same_fix(fix));
        let (Some(start), Some(end)) = (position(from), position(to)) else {
            return Ok(Vec::new());
        };

        let fixes = if start < end {
            airway.fixes[start + 1..=end].to_vec()
        } else if start > end {
            airway.fixes[end..start].iter().rev().cloned().collect()
        } else {
            Vec::new()
        };
        Ok(fixes)
    }
}
