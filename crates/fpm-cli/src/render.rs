//! Text and JSON output for a flight plan.

use fpm_core::{AltitudeDescriptor, FlightPlan, FlightPlanElement, FlightPlanLeg};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct PlanReport<'a> {
    pub version: u64,
    pub active_leg_index: usize,
    pub destination_leg_index: Option<usize>,
    pub first_missed_approach_leg_index: usize,
    pub legs: Vec<LegRow<'a>>,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct LegRow<'a> {
    pub index: usize,
    pub ident: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub leg: Option<&'a FlightPlanLeg>,
}

pub fn report<'a>(plan: &FlightPlan, legs: &'a [FlightPlanElement]) -> PlanReport<'a> {
    PlanReport {
        version: plan.version(),
        active_leg_index: plan.active_leg_index(),
        destination_leg_index: plan.destination_leg_index(),
        first_missed_approach_leg_index: plan.first_missed_approach_leg_index(),
        legs: legs
            .iter()
            .enumerate()
            .map(|(index, element)| LegRow {
                index,
                ident: element.ident().to_string(),
                leg: element.as_leg(),
            })
            .collect(),
    }
}

fn altitude(leg: &FlightPlanLeg) -> String {
    let Some(constraint) = leg.definition.altitude else {
        return String::new();
    };
    let first = constraint.altitude1_ft.round();
    match constraint.descriptor {
        AltitudeDescriptor::At => format!("{}", first),
        AltitudeDescriptor::AtOrAbove => format!("+{}", first),
        AltitudeDescriptor::AtOrBelow => format!("-{}", first),
        AltitudeDescriptor::Between => match constraint.altitude2_ft {
            Some(second) => format!("{}/{}", first, second.round()),
            None => format!("{}", first),
        },
    }
}

/// One line per element, marking the active leg.
pub fn table(report: &PlanReport<'_>) -> String {
    let mut out = format!(
        "{:>3}  {:<26} {:<4} {:<8} {:>7}  {}\n",
        "#", "IDENT", "TYPE", "ALT", "CRS", "VIA"
    );
    for row in &report.legs {
        let marker = if row.index == report.active_leg_index {
            '>'
        } else {
            ' '
        };
        let line = match row.leg {
            Some(leg) => format!(
                "{}{:>2}  {:<26} {:<4} {:<8} {:>7}  {}{}\n",
                marker,
                row.index,
                leg.ident,
                leg.leg_type.to_string(),
                altitude(leg),
                leg.definition
                    .magnetic_course
                    .map(|c| format!("{:03.0}", c))
                    .unwrap_or_default(),
                leg.annotation,
                if leg.overfly() { " (OVFY)" } else { "" },
            ),
            None => format!("{}{:>2}  {}\n", marker, row.index, row.ident),
        };
        out.push_str(&line);
    }
    out.push_str(&format!("version {}\n", report.version));
    out
}
