//! Flight plan segments: one ordered element list per route phase.

use serde::{Deserialize, Serialize};

use crate::error::{PlanError, Result};
use crate::leg::{FlightPlanElement, FlightPlanLeg};

/// The twelve route phases, in flattening order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentKind {
    Origin,
    DepartureRunwayTransition,
    Departure,
    DepartureEnrouteTransition,
    Enroute,
    ArrivalEnrouteTransition,
    Arrival,
    ArrivalRunwayTransition,
    ApproachVia,
    Approach,
    Destination,
    MissedApproach,
}

/// Which side of the enroute segment a phase belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentClass {
    Departure,
    Arrival,
    Neutral,
}

impl SegmentKind {
    pub const ALL: [SegmentKind; 12] = [
        SegmentKind::Origin,
        SegmentKind::DepartureRunwayTransition,
        SegmentKind::Departure,
        SegmentKind::DepartureEnrouteTransition,
        SegmentKind::Enroute,
        SegmentKind::ArrivalEnrouteTransition,
        SegmentKind::Arrival,
        SegmentKind::ArrivalRunwayTransition,
        SegmentKind::ApproachVia,
        SegmentKind::Approach,
        SegmentKind::Destination,
        SegmentKind::MissedApproach,
    ];

    /// Position in flattening order.
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn class(self) -> SegmentClass {
        match self {
            SegmentKind::DepartureRunwayTransition
            | SegmentKind::Departure
            | SegmentKind::DepartureEnrouteTransition => SegmentClass::Departure,
            SegmentKind::ArrivalEnrouteTransition
            | SegmentKind::Arrival
            | SegmentKind::ArrivalRunwayTransition
            | SegmentKind::ApproachVia
            | SegmentKind::Approach => SegmentClass::Arrival,
            SegmentKind::Origin
            | SegmentKind::Enroute
            | SegmentKind::Destination
            | SegmentKind::MissedApproach => SegmentClass::Neutral,
        }
    }
}

/// Ordered elements for one route phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    kind: SegmentKind,
    elements: Vec<FlightPlanElement>,
    /// Trailing boundary verified connected since the last edit.
    strung: bool,
}

impl Segment {
    pub fn new(kind: SegmentKind) -> Self {
        Self {
            kind,
            elements: Vec::new(),
            strung: false,
        }
    }

    pub fn kind(&self) -> SegmentKind {
        self.kind
    }

    pub fn class(&self) -> SegmentClass {
        self.kind.class()
    }

    pub fn elements(&self) -> &[FlightPlanElement] {
        &self.elements
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn is_strung(&self) -> bool {
        self.strung
    }

    pub(crate) fn set_strung(&mut self, strung: bool) {
        self.strung = strung;
    }

    /// Last leg, looking past one trailing discontinuity.
    pub fn last_leg(&self) -> Option<&FlightPlanLeg> {
        match self.elements.last()? {
            FlightPlanElement::Leg(leg) => Some(leg),
            FlightPlanElement::Discontinuity => self
                .elements
                .len()
                .checked_sub(2)
                .and_then(|i| self.elements[i].as_leg()),
        }
    }

    pub fn ends_with_discontinuity(&self) -> bool {
        self.elements.last().is_some_and(FlightPlanElement::is_discontinuity)
    }

    /// Remove and return the elements from `index` to the end.
    pub fn truncate(&mut self, index: usize) -> Result<Vec<FlightPlanElement>> {
        self.check_bound(index, self.elements.len())?;
        Ok(self.elements.split_off(index))
    }

    /// Remove and return the elements before `index`.
    pub fn truncate_before(&mut self, index: usize) -> Result<Vec<FlightPlanElement>> {
        self.check_bound(index, self.elements.len())?;
        Ok(self.elements.drain(..index).collect())
    }

    /// Insert `element` so that it ends up at `position`.
    pub fn insert_at(&mut self, position: usize, element: FlightPlanElement) -> Result<()> {
        self.check_bound(position, self.elements.len())?;
        self.elements.insert(position, element);
        Ok(())
    }

    /// Remove and return the elements in `from..to`.
    pub fn remove_range(&mut self, from: usize, to: usize) -> Result<Vec<FlightPlanElement>> {
        self.check_bound(to, self.elements.len())?;
        self.check_bound(from, to)?;
        Ok(self.elements.drain(from..to).collect())
    }

    pub(crate) fn remove(&mut self, index: usize) -> Result<FlightPlanElement> {
        if index >= self.elements.len() {
            return Err(PlanError::InvalidIndex {
                index,
                len: self.elements.len(),
            });
        }
        Ok(self.elements.remove(index))
    }

    pub(crate) fn replace(&mut self, index: usize, element: FlightPlanElement) -> Result<()> {
        let len = self.elements.len();
        let slot = self
            .elements
            .get_mut(index)
            .ok_or(PlanError::InvalidIndex { index, len })?;
        *slot = element;
        Ok(())
    }

    pub(crate) fn element_mut(&mut self, index: usize) -> Option<&mut FlightPlanElement> {
        self.elements.get_mut(index)
    }

    pub(crate) fn elements_mut(&mut self) -> impl Iterator<Item = &mut FlightPlanElement> {
        self.elements.iter_mut()
    }

    pub(crate) fn set_elements(&mut self, elements: Vec<FlightPlanElement>) {
        self.elements = elements;
        self.strung = false;
    }

    pub(crate) fn take_elements(&mut self) -> Vec<FlightPlanElement> {
        std::mem::take(&mut self.elements)
    }

    pub(crate) fn prepend(&mut self, elements: Vec<FlightPlanElement>) {
        self.elements.splice(0..0, elements);
    }

    pub(crate) fn append(&mut self, elements: Vec<FlightPlanElement>) {
        self.elements.extend(elements);
    }

    pub(crate) fn splice(
        &mut self,
        range: std::ops::Range<usize>,
        elements: Vec<FlightPlanElement>,
    ) -> Result<()> {
        self.check_bound(range.end, self.elements.len())?;
        self.check_bound(range.start, range.end)?;
        self.elements.splice(range, elements);
        Ok(())
    }

    /// Append a discontinuity unless one already trails. Returns whether one was added.
    pub(crate) fn push_discontinuity(&mut self) -> bool {
        if self.ends_with_discontinuity() {
            return false;
        }
        self.elements.push(FlightPlanElement::Discontinuity);
        true
    }

    pub(crate) fn pop(&mut self) -> Option<FlightPlanElement> {
        self.elements.pop()
    }

    fn check_bound(&self, index: usize, max: usize) -> Result<()> {
        if index > max {
            return Err(PlanError::InvalidIndex {
                index,
                len: self.elements.len(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Coordinates, Fix};

    fn leg(ident: &str) -> FlightPlanElement {
        FlightPlanLeg::from_enroute_waypoint(Fix::new(ident, "CY", Coordinates::new(43.0, -79.0)), None)
            .into()
    }

    fn idents(segment: &Segment) -> Vec<&str> {
        segment.elements().iter().map(FlightPlanElement::ident).collect()
    }

    fn segment_with(kind: SegmentKind, names: &[&str]) -> Segment {
        let mut segment = Segment::new(kind);
        segment.set_elements(names.iter().map(|n| leg(n)).collect());
        segment
    }

    #[test]
    fn test_kind_order_and_classes() {
        for (i, kind) in SegmentKind::ALL.iter().enumerate() {
            assert_eq!(kind.index(), i);
        }
        assert_eq!(SegmentKind::Departure.class(), SegmentClass::Departure);
        assert_eq!(SegmentKind::ApproachVia.class(), SegmentClass::Arrival);
        assert_eq!(SegmentKind::MissedApproach.class(), SegmentClass::Neutral);
        assert!(SegmentKind::Enroute < SegmentKind::Arrival);
    }

    #[test]
    fn test_truncate_returns_tail() {
        let mut segment = segment_with(SegmentKind::Departure, &["A", "B", "C"]);
        let tail = segment.truncate(1).unwrap();
        assert_eq!(tail.len(), 2);
        assert_eq!(idents(&segment), vec!["A"]);
        assert!(segment.truncate(5).is_err());
        assert!(segment.truncate(1).unwrap().is_empty());
    }

    #[test]
    fn test_truncate_before_returns_head() {
        let mut segment = segment_with(SegmentKind::Arrival, &["A", "B", "C"]);
        let head = segment.truncate_before(2).unwrap();
        assert_eq!(head.len(), 2);
        assert_eq!(idents(&segment), vec!["C"]);
    }

    #[test]
    fn test_remove_range() {
        let mut segment = segment_with(SegmentKind::Enroute, &["A", "B", "C", "D"]);
        let removed = segment.remove_range(1, 3).unwrap();
        assert_eq!(removed.len(), 2);
        assert_eq!(idents(&segment), vec!["A", "D"]);
        assert!(segment.remove_range(2, 1).is_err());
        assert!(segment.remove_range(0, 9).is_err());
    }

    #[test]
    fn test_last_leg_skips_trailing_discontinuity() {
        let mut segment = segment_with(SegmentKind::Departure, &["A", "B"]);
        assert!(segment.push_discontinuity());
        assert!(!segment.push_discontinuity());
        assert_eq!(segment.last_leg().map(|l| l.ident.as_str()), Some("B"));

        let mut only_disc = Segment::new(SegmentKind::Departure);
        only_disc.push_discontinuity();
        assert!(only_disc.last_leg().is_none());
    }

    #[test]
    fn test_set_elements_clears_strung() {
        let mut segment = segment_with(SegmentKind::Arrival, &["A"]);
        segment.set_strung(true);
        segment.set_elements(vec![leg("B")]);
        assert!(!segment.is_strung());
    }
}
