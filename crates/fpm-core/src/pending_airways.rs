//! Airway entry staged before it is spliced into the plan.

use serde::{Deserialize, Serialize};

use crate::error::{PlanError, Result};
use crate::leg::FlightPlanLeg;
use crate::models::Fix;

/// Airways entered from a revised fix, not yet part of the plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingAirways {
    anchor_index: usize,
    anchor_fix: Fix,
    legs: Vec<FlightPlanLeg>,
}

impl PendingAirways {
    pub fn new(anchor_index: usize, anchor_fix: Fix) -> Self {
        Self {
            anchor_index,
            anchor_fix,
            legs: Vec::new(),
        }
    }

    /// Flattened index of the anchor leg when the entry was started.
    pub fn anchor_index(&self) -> usize {
        self.anchor_index
    }

    pub fn anchor_fix(&self) -> &Fix {
        &self.anchor_fix
    }

    pub fn legs(&self) -> &[FlightPlanLeg] {
        &self.legs
    }

    /// Where the next airway has to start.
    pub fn tail_fix(&self) -> &Fix {
        self.legs
            .last()
            .and_then(|leg| leg.definition.waypoint.as_ref())
            .unwrap_or(&self.anchor_fix)
    }

    /// Stage the fixes of one airway, each as a TF leg tagged with the airway.
    pub fn add_airway(&mut self, airway_ident: &str, fixes: Vec<Fix>) -> Result<()> {
        if fixes.is_empty() {
            return Err(PlanError::not_found("airway segment", airway_ident));
        }
        tracing::debug!(
            "Staging {} fixes on {} from {}",
            fixes.len(),
            airway_ident,
            self.tail_fix().ident
        );
        self.legs.extend(
            fixes
                .into_iter()
                .map(|fix| FlightPlanLeg::from_enroute_waypoint(fix, Some(airway_ident.to_string()))),
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Coordinates;

    fn fix(ident: &str) -> Fix {
        Fix::new(ident, "LF", Coordinates::new(47.0, 2.0))
    }

    #[test]
    fn test_tail_follows_staged_airways() {
        let mut pending = PendingAirways::new(3, fix("AAA"));
        assert_eq!(pending.tail_fix().ident, "AAA");

        pending.add_airway("UN859", vec![fix("BBB"), fix("CCC")]).unwrap();
        assert_eq!(pending.tail_fix().ident, "CCC");
        assert!(pending
            .legs()
            .iter()
            .all(|l| l.definition.airway_ident.as_deref() == Some("UN859")));
    }

    #[test]
    fn test_empty_airway_rejected() {
        let mut pending = PendingAirways::new(0, fix("AAA"));
        assert!(matches!(
            pending.add_airway("UN859", Vec::new()),
            Err(PlanError::NotFound { .. })
        ));
        assert!(pending.legs().is_empty());
    }
}
