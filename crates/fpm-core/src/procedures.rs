//! Rebuilding segment content from selected airports and procedures.

use crate::base_plan::BaseFlightPlan;
use crate::error::{PlanError, Result};
use crate::leg::{FlightPlanElement, FlightPlanLeg};
use crate::models::{find_transition, Approach, ProcedureLeg, ProcedureTransition};
use crate::navdata::ResolvedEdit;
use crate::segment::SegmentKind;

fn to_elements(legs: &[ProcedureLeg], procedure_ident: &str) -> Vec<FlightPlanElement> {
    legs.iter()
        .map(|leg| FlightPlanLeg::from_procedure_leg(leg, procedure_ident).into())
        .collect()
}

/// Approach legs without the final runway leg, which the destination segment provides.
fn approach_elements(approach: &Approach) -> Vec<FlightPlanElement> {
    let legs = if approach.ends_at_runway() {
        &approach.legs[..approach.legs.len() - 1]
    } else {
        &approach.legs[..]
    };
    to_elements(legs, &approach.ident)
}

fn ensure_offered(
    transitions: &[ProcedureTransition],
    transition: &ProcedureTransition,
    parent: &str,
) -> Result<()> {
    if transitions.contains(transition) {
        Ok(())
    } else {
        Err(PlanError::illegal_state(format!(
            "transition {} does not belong to the selected {}",
            transition.ident, parent
        )))
    }
}

impl BaseFlightPlan {
    /// Store a resolved procedure change and rebuild the affected segments.
    pub(crate) fn apply_procedure(&mut self, resolved: ResolvedEdit) -> Result<()> {
        match resolved {
            ResolvedEdit::OriginAirport {
                airport,
                runways,
                departures,
            } => {
                tracing::info!("Origin airport set to {}", airport.ident);
                self.procedures.origin_airport = Some(airport);
                self.procedures.origin_runway = None;
                self.available.origin_runways = runways;
                self.available.departures = departures;
                self.clear_departure();
                self.replace_segment(SegmentKind::Enroute, Vec::new());
                self.clear_arrival();
                self.clear_approach();
                self.rebuild_origin();
                self.rebuild_destination();
            }
            ResolvedEdit::OriginRunway(runway) => {
                tracing::info!("Origin runway set to {}", runway.ident);
                self.procedures.origin_runway = Some(runway);
                self.rebuild_origin();
                self.rebuild_departure_runway_transition();
            }
            ResolvedEdit::Departure(Some(departure)) => {
                tracing::info!("Departure set to {}", departure.ident);
                self.replace_segment(
                    SegmentKind::Departure,
                    to_elements(&departure.common_legs, &departure.ident),
                );
                self.replace_segment(SegmentKind::DepartureEnrouteTransition, Vec::new());
                self.procedures.departure = Some(departure);
                self.procedures.departure_enroute_transition = None;
                self.rebuild_departure_runway_transition();
                self.rebuild_origin();
            }
            ResolvedEdit::Departure(None) => {
                self.clear_departure();
                self.rebuild_origin();
            }
            ResolvedEdit::DepartureEnrouteTransition(transition) => {
                let departure = self
                    .procedures
                    .departure
                    .as_ref()
                    .ok_or_else(|| PlanError::illegal_state("no departure selected"))?;
                let elements = match &transition {
                    Some(t) => {
                        ensure_offered(&departure.enroute_transitions, t, "departure")?;
                        to_elements(&t.legs, &departure.ident)
                    }
                    None => Vec::new(),
                };
                self.procedures.departure_enroute_transition = transition.map(|t| t.ident);
                self.replace_segment(SegmentKind::DepartureEnrouteTransition, elements);
            }
            ResolvedEdit::Arrival(Some(arrival)) => {
                tracing::info!("Arrival set to {}", arrival.ident);
                self.replace_segment(
                    SegmentKind::Arrival,
                    to_elements(&arrival.common_legs, &arrival.ident),
                );
                self.replace_segment(SegmentKind::ArrivalEnrouteTransition, Vec::new());
                self.procedures.arrival = Some(arrival);
                self.procedures.arrival_enroute_transition = None;
                self.rebuild_arrival_runway_transition();
            }
            ResolvedEdit::Arrival(None) => self.clear_arrival(),
            ResolvedEdit::ArrivalEnrouteTransition(transition) => {
                let arrival = self
                    .procedures
                    .arrival
                    .as_ref()
                    .ok_or_else(|| PlanError::illegal_state("no arrival selected"))?;
                let elements = match &transition {
                    Some(t) => {
                        ensure_offered(&arrival.enroute_transitions, t, "arrival")?;
                        to_elements(&t.legs, &arrival.ident)
                    }
                    None => Vec::new(),
                };
                self.procedures.arrival_enroute_transition = transition.map(|t| t.ident);
                self.replace_segment(SegmentKind::ArrivalEnrouteTransition, elements);
            }
            ResolvedEdit::Approach(Some(approach)) => {
                tracing::info!("Approach set to {}", approach.ident);
                self.select_approach_runway(&approach);
                self.replace_segment(SegmentKind::ApproachVia, Vec::new());
                self.replace_segment(SegmentKind::Approach, approach_elements(&approach));
                self.replace_segment(
                    SegmentKind::MissedApproach,
                    to_elements(&approach.missed_legs, &approach.ident),
                );
                self.available.approach_vias = approach.transitions.clone();
                self.procedures.approach_via = None;
                self.procedures.approach = Some(approach);
                self.rebuild_destination();
            }
            ResolvedEdit::Approach(None) => {
                self.clear_approach();
                self.rebuild_destination();
            }
            ResolvedEdit::ApproachVia(via) => {
                let approach = self
                    .procedures
                    .approach
                    .as_ref()
                    .ok_or_else(|| PlanError::illegal_state("no approach selected"))?;
                let elements = match &via {
                    Some(v) => {
                        ensure_offered(&approach.transitions, v, "approach")?;
                        to_elements(&v.legs, &v.ident)
                    }
                    None => Vec::new(),
                };
                self.procedures.approach_via = via.map(|v| v.ident);
                self.replace_segment(SegmentKind::ApproachVia, elements);
            }
            ResolvedEdit::DestinationAirport {
                airport,
                runways,
                arrivals,
                approaches,
            } => {
                tracing::info!("Destination airport set to {}", airport.ident);
                self.procedures.destination_airport = Some(airport);
                self.procedures.destination_runway = None;
                self.available.destination_runways = runways;
                self.available.arrivals = arrivals;
                self.available.approaches = approaches;
                self.clear_arrival();
                self.clear_approach();
                self.rebuild_destination();
            }
            ResolvedEdit::DestinationRunway(runway) => {
                tracing::info!("Destination runway set to {}", runway.ident);
                let approach_for_other_runway = self.procedures.approach.as_ref().is_some_and(|a| {
                    a.runway_ident.as_ref().is_some_and(|r| *r != runway.ident)
                });
                self.procedures.destination_runway = Some(runway);
                if approach_for_other_runway {
                    self.clear_approach();
                }
                self.rebuild_arrival_runway_transition();
                self.rebuild_destination();
            }
        }
        Ok(())
    }

    fn select_approach_runway(&mut self, approach: &Approach) {
        let Some(runway_ident) = &approach.runway_ident else {
            return;
        };
        let already_selected = self
            .procedures
            .destination_runway
            .as_ref()
            .is_some_and(|r| &r.ident == runway_ident);
        if already_selected {
            return;
        }
        let runway = self
            .available
            .destination_runways
            .iter()
            .find(|r| &r.ident == runway_ident)
            .cloned();
        if let Some(runway) = runway {
            tracing::debug!("Approach {} selects runway {}", approach.ident, runway.ident);
            self.procedures.destination_runway = Some(runway);
            self.rebuild_arrival_runway_transition();
        }
    }

    fn clear_departure(&mut self) {
        self.procedures.departure = None;
        self.procedures.departure_enroute_transition = None;
        self.replace_segment(SegmentKind::DepartureRunwayTransition, Vec::new());
        self.replace_segment(SegmentKind::Departure, Vec::new());
        self.replace_segment(SegmentKind::DepartureEnrouteTransition, Vec::new());
    }

    fn clear_arrival(&mut self) {
        self.procedures.arrival = None;
        self.procedures.arrival_enroute_transition = None;
        self.replace_segment(SegmentKind::ArrivalEnrouteTransition, Vec::new());
        self.replace_segment(SegmentKind::Arrival, Vec::new());
        self.replace_segment(SegmentKind::ArrivalRunwayTransition, Vec::new());
    }

    fn clear_approach(&mut self) {
        self.procedures.approach = None;
        self.procedures.approach_via = None;
        self.available.approach_vias.clear();
        self.replace_segment(SegmentKind::ApproachVia, Vec::new());
        self.replace_segment(SegmentKind::Approach, Vec::new());
        self.replace_segment(SegmentKind::MissedApproach, Vec::new());
    }

    fn rebuild_origin(&mut self) {
        let Some(airport) = self.procedures.origin_airport.clone() else {
            self.replace_segment(SegmentKind::Origin, Vec::new());
            return;
        };
        let runway = self.procedures.origin_runway.as_ref();
        let annotation = self
            .procedures
            .departure
            .as_ref()
            .map(|d| d.ident.as_str())
            .unwrap_or_default();

        let mut elements = vec![FlightPlanLeg::from_airport_and_runway(annotation, &airport, runway).into()];
        if let (Some(runway), None) = (runway, &self.procedures.departure) {
            elements.push(FlightPlanLeg::origin_extended_centerline(&airport, runway).into());
        }
        self.replace_segment(SegmentKind::Origin, elements);
    }

    fn rebuild_destination(&mut self) {
        let Some(airport) = self.procedures.destination_airport.clone() else {
            self.replace_segment(SegmentKind::Destination, Vec::new());
            return;
        };
        let annotation = self
            .procedures
            .approach
            .as_ref()
            .map(|a| a.ident.as_str())
            .unwrap_or_default();
        let leg = FlightPlanLeg::from_airport_and_runway(
            annotation,
            &airport,
            self.procedures.destination_runway.as_ref(),
        );
        self.replace_segment(SegmentKind::Destination, vec![leg.into()]);
    }

    fn rebuild_departure_runway_transition(&mut self) {
        let elements = match (&self.procedures.departure, &self.procedures.origin_runway) {
            (Some(departure), Some(runway)) => find_transition(&departure.runway_transitions, &runway.ident)
                .map(|t| to_elements(&t.legs, &departure.ident))
                .unwrap_or_default(),
            _ => Vec::new(),
        };
        self.replace_segment(SegmentKind::DepartureRunwayTransition, elements);
    }

    fn rebuild_arrival_runway_transition(&mut self) {
        let elements = match (&self.procedures.arrival, &self.procedures.destination_runway) {
            (Some(arrival), Some(runway)) => find_transition(&arrival.runway_transitions, &runway.ident)
                .map(|t| to_elements(&t.legs, &arrival.ident))
                .unwrap_or_default(),
            _ => Vec::new(),
        };
        self.replace_segment(SegmentKind::ArrivalRunwayTransition, elements);
    }
}
