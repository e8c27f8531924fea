//! Base flight plan: twelve segments flattened into one versioned leg sequence.
//!
//! Every structural edit runs on a draft copy through [`BaseFlightPlan::edit`].
//! The draft replaces the plan only when every step succeeds and the flattened
//! sequence still satisfies the discontinuity and IF placement rules, so a
//! failed edit leaves both the legs and the version untouched.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::{PlanError, Result};
use crate::leg::{FlightPlanElement, FlightPlanLeg, LegType};
use crate::models::{
    Airport, Approach, Arrival, Departure, Fix, ProcedureTransition, Runway,
};
use crate::navdata::{resolve_edit, NavigationDatabase, ProcedureEdit, ResolutionContext, ResolvedEdit};
use crate::segment::{Segment, SegmentClass, SegmentKind};

const DEPARTURE_KINDS: [SegmentKind; 3] = [
    SegmentKind::DepartureRunwayTransition,
    SegmentKind::Departure,
    SegmentKind::DepartureEnrouteTransition,
];

const ARRIVAL_KINDS: [SegmentKind; 5] = [
    SegmentKind::ArrivalEnrouteTransition,
    SegmentKind::Arrival,
    SegmentKind::ArrivalRunwayTransition,
    SegmentKind::ApproachVia,
    SegmentKind::Approach,
];

pub const TRUNCATED_DEPARTURE: &str = "TRUNC D";
pub const TRUNCATED_ARRIVAL: &str = "TRUNC A";

/// Airports, runways and procedures currently selected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcedureSelection {
    pub origin_airport: Option<Airport>,
    pub origin_runway: Option<Runway>,
    pub departure: Option<Departure>,
    pub departure_enroute_transition: Option<String>,
    pub arrival_enroute_transition: Option<String>,
    pub arrival: Option<Arrival>,
    pub approach_via: Option<String>,
    pub approach: Option<Approach>,
    pub destination_airport: Option<Airport>,
    pub destination_runway: Option<Runway>,
}

/// Choices offered to the pilot for the selected airports.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AvailableProcedures {
    pub origin_runways: Vec<Runway>,
    pub departures: Vec<Departure>,
    pub destination_runways: Vec<Runway>,
    pub arrivals: Vec<Arrival>,
    pub approaches: Vec<Approach>,
    pub approach_vias: Vec<ProcedureTransition>,
}

#[derive(Debug)]
struct LegCache {
    version: u64,
    elements: Arc<[FlightPlanElement]>,
}

/// Segmented flight plan with restringing and redistribution.
#[derive(Debug)]
pub struct BaseFlightPlan {
    pub(crate) segments: [Segment; 12],
    pub(crate) active_leg_index: usize,
    pub(crate) version: u64,
    pub(crate) procedures: ProcedureSelection,
    pub(crate) available: AvailableProcedures,
    cache: Mutex<Option<LegCache>>,
}

impl Clone for BaseFlightPlan {
    fn clone(&self) -> Self {
        Self {
            segments: self.segments.clone(),
            active_leg_index: self.active_leg_index,
            version: self.version,
            procedures: self.procedures.clone(),
            available: self.available.clone(),
            cache: Mutex::new(None),
        }
    }
}

impl Default for BaseFlightPlan {
    fn default() -> Self {
        Self::new()
    }
}

impl BaseFlightPlan {
    pub fn new() -> Self {
        Self {
            segments: SegmentKind::ALL.map(Segment::new),
            active_leg_index: 1,
            version: 0,
            procedures: ProcedureSelection::default(),
            available: AvailableProcedures::default(),
            cache: Mutex::new(None),
        }
    }

    // ========== READ ACCESS ==========

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn active_leg_index(&self) -> usize {
        self.active_leg_index
    }

    pub fn segment(&self, kind: SegmentKind) -> &Segment {
        &self.segments[kind.index()]
    }

    pub fn segments(&self) -> impl Iterator<Item = &Segment> {
        self.segments.iter()
    }

    pub fn procedures(&self) -> &ProcedureSelection {
        &self.procedures
    }

    pub fn available(&self) -> &AvailableProcedures {
        &self.available
    }

    /// The plan ends at a runway when there is no approach or the approach does.
    pub fn ends_at_runway(&self) -> bool {
        self.procedures
            .approach
            .as_ref()
            .map_or(true, Approach::ends_at_runway)
    }

    /// Flattened element sequence, rebuilt only when the version moved.
    pub fn all_legs(&self) -> Arc<[FlightPlanElement]> {
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(cached) = cache.as_ref() {
            if cached.version == self.version {
                return cached.elements.clone();
            }
        }

        let elements: Arc<[FlightPlanElement]> = self.flatten().into();
        *cache = Some(LegCache {
            version: self.version,
            elements: elements.clone(),
        });
        elements
    }

    pub fn leg_count(&self) -> usize {
        self.included_segments().map(Segment::len).sum()
    }

    pub fn has_element(&self, index: usize) -> bool {
        index < self.leg_count()
    }

    pub fn element_at(&self, index: usize) -> Result<FlightPlanElement> {
        self.all_legs()
            .get(index)
            .cloned()
            .ok_or(PlanError::InvalidIndex {
                index,
                len: self.leg_count(),
            })
    }

    /// Leg at `index`; discontinuities are rejected.
    pub fn leg_at(&self, index: usize) -> Result<FlightPlanLeg> {
        match self.element_at(index)? {
            FlightPlanElement::Leg(leg) => Ok(leg),
            FlightPlanElement::Discontinuity => Err(PlanError::InvalidLegType {
                index,
                found: "a discontinuity".to_string(),
                expected: "a leg",
            }),
        }
    }

    /// Index of the last flattened element up to and including the destination.
    ///
    /// With a circling approach the destination leg is not flattened, so this is
    /// the last approach element, the one right before the missed approach.
    pub fn destination_leg_index(&self) -> Option<usize> {
        let through_destination: usize = self
            .included_segments()
            .take_while(|s| s.kind() <= SegmentKind::Destination)
            .map(Segment::len)
            .sum();
        through_destination.checked_sub(1)
    }

    pub fn first_missed_approach_leg_index(&self) -> usize {
        self.leg_count() - self.segment(SegmentKind::MissedApproach).len()
    }

    pub fn origin_leg(&self) -> Option<&FlightPlanLeg> {
        self.segment(SegmentKind::Origin)
            .elements()
            .first()
            .and_then(FlightPlanElement::as_leg)
    }

    pub fn destination_leg(&self) -> Option<&FlightPlanLeg> {
        self.segment(SegmentKind::Destination)
            .elements()
            .first()
            .and_then(FlightPlanElement::as_leg)
    }

    /// First flattened index whose leg terminates at `fix`.
    pub fn find_fix(&self, fix: &Fix) -> Option<usize> {
        self.all_legs()
            .iter()
            .position(|e| e.as_leg().is_some_and(|leg| leg.terminates_with(fix)))
    }

    /// Segment and local index owning flattened `index`.
    pub fn segment_position(&self, index: usize) -> Result<(SegmentKind, usize)> {
        let mut remaining = index;
        for segment in self.included_segments() {
            if remaining < segment.len() {
                return Ok((segment.kind(), remaining));
            }
            remaining -= segment.len();
        }
        Err(PlanError::InvalidIndex {
            index,
            len: self.leg_count(),
        })
    }

    /// Owned snapshot of what procedure lookups need.
    pub fn resolution_context(&self) -> ResolutionContext {
        ResolutionContext {
            origin_airport: self.procedures.origin_airport.as_ref().map(|a| a.ident.clone()),
            destination_airport: self
                .procedures
                .destination_airport
                .as_ref()
                .map(|a| a.ident.clone()),
            departure: self.procedures.departure.clone(),
            arrival: self.procedures.arrival.clone(),
            approach: self.procedures.approach.clone(),
        }
    }

    // ========== EDITS ==========

    /// Resolve `edit` against `db` and apply it.
    pub async fn set_procedure<D>(&mut self, db: &D, edit: ProcedureEdit) -> Result<()>
    where
        D: NavigationDatabase + ?Sized,
    {
        let context = self.resolution_context();
        let resolved = resolve_edit(db, &context, &edit).await?;
        self.apply_resolved(resolved)
    }

    /// Apply database results for a procedure change, then restring.
    pub fn apply_resolved(&mut self, resolved: ResolvedEdit) -> Result<()> {
        self.edit("set procedure", |plan| {
            plan.apply_procedure(resolved)?;
            plan.restring_segments()
        })
    }

    /// Remove the element at `index`, optionally leaving a discontinuity in its place.
    pub fn remove_element_at(&mut self, index: usize, insert_discontinuity: bool) -> Result<bool> {
        self.edit("remove element", |plan| {
            let (kind, local) = plan.segment_position(index)?;
            let removing_leg = plan
                .flat_element(index)
                .is_some_and(|e| !e.is_discontinuity());
            let previous_is_leg = index > 0
                && plan
                    .flat_element(index - 1)
                    .is_some_and(|e| !e.is_discontinuity());

            if insert_discontinuity && removing_leg && previous_is_leg {
                plan.segment_mut(kind)
                    .replace(local, FlightPlanElement::Discontinuity)?;
            } else {
                plan.segment_mut(kind).remove(local)?;
            }

            plan.redistribute_at(index + 1)?;
            Ok(true)
        })
    }

    /// Remove the elements in `from..to`.
    pub fn remove_elements(&mut self, from: usize, to: usize) -> Result<()> {
        self.edit("remove elements", |plan| {
            let len = plan.leg_count();
            if to > len || from > to {
                return Err(PlanError::InvalidIndex { index: to, len });
            }
            plan.remove_flat_range(from, to)?;
            plan.redistribute_at(from)
        })
    }

    /// Insert `element` after `index`, collapsing a downstream duplicate of its fix.
    pub fn insert_element_after(&mut self, index: usize, element: FlightPlanElement) -> Result<()> {
        self.edit("insert element", |plan| {
            plan.insert_elements_after(index, vec![element])
        })
    }

    /// Insert a TF leg to `fix` after `index`.
    pub fn insert_waypoint_after(&mut self, index: usize, fix: Fix) -> Result<()> {
        self.insert_element_after(index, FlightPlanLeg::from_enroute_waypoint(fix, None).into())
    }

    /// Move legs around `index` between procedure segments and enroute.
    pub fn redistribute_legs_at(&mut self, index: usize) -> Result<()> {
        self.edit("redistribute legs", |plan| plan.redistribute_at(index))
    }

    /// Reconnect adjacent segments and fix up IF legs.
    pub fn restring(&mut self) -> Result<()> {
        self.edit("restring", |plan| plan.restring_segments())
    }

    pub fn set_active_leg_index(&mut self, index: usize) -> Result<()> {
        self.edit("set active leg", |plan| {
            let len = plan.leg_count();
            if index >= len {
                return Err(PlanError::InvalidIndex { index, len });
            }
            plan.active_leg_index = index;
            Ok(())
        })
    }

    /// Advance the active leg, skipping a discontinuity.
    pub fn sequence(&mut self) -> Result<()> {
        self.edit("sequence", |plan| {
            let len = plan.leg_count();
            let mut next = plan.active_leg_index + 1;
            if plan.flat_element(next).is_some_and(FlightPlanElement::is_discontinuity) {
                next += 1;
            }
            if next >= len {
                return Err(PlanError::illegal_state("no leg left to sequence"));
            }
            plan.active_leg_index = next;
            Ok(())
        })
    }

    pub fn set_overfly_at(&mut self, index: usize, overfly: bool) -> Result<()> {
        self.edit("set overfly", |plan| {
            let leg = plan.flat_leg_mut(index)?;
            leg.definition.overfly = overfly;
            Ok(())
        })
    }

    pub fn toggle_overfly_at(&mut self, index: usize) -> Result<()> {
        self.edit("toggle overfly", |plan| {
            let leg = plan.flat_leg_mut(index)?;
            leg.definition.overfly = !leg.definition.overfly;
            Ok(())
        })
    }

    // ========== TRANSACTIONS ==========

    /// Run `operation` on a draft and commit it with a single version bump.
    pub(crate) fn edit<T>(
        &mut self,
        operation: &str,
        operation_fn: impl FnOnce(&mut BaseFlightPlan) -> Result<T>,
    ) -> Result<T> {
        let mut draft = self.clone();
        let output = operation_fn(&mut draft)?;

        draft.merge_adjacent_discontinuities();
        draft.mark_joined_segments();
        draft.adjust_if_legs();
        draft.check_invariants()?;

        draft.version = self.version + 1;
        *self = draft;
        tracing::debug!("{} committed at version {}", operation, self.version);
        Ok(output)
    }

    /// Bump the version for changes outside the segment structure.
    pub(crate) fn touch(&mut self) {
        self.version += 1;
    }

    fn check_invariants(&self) -> Result<()> {
        let mut previous_discontinuity = false;
        for element in self.included_segments().flat_map(Segment::elements) {
            let discontinuity = element.is_discontinuity();
            if discontinuity && previous_discontinuity {
                tracing::error!("Adjacent discontinuities survived merging");
                return Err(PlanError::InvariantViolation(
                    "adjacent discontinuities".to_string(),
                ));
            }
            previous_discontinuity = discontinuity;
        }

        for segment in self.segments.iter().filter(|s| s.class() != SegmentClass::Neutral) {
            let last = segment.len().saturating_sub(1);
            let misplaced = segment
                .elements()
                .iter()
                .enumerate()
                .any(|(i, e)| e.is_discontinuity() && i != last);
            if misplaced {
                tracing::error!("Discontinuity inside {:?}", segment.kind());
                return Err(PlanError::InvariantViolation(format!(
                    "discontinuity inside {:?}",
                    segment.kind()
                )));
            }
        }
        Ok(())
    }

    // ========== INTERNALS ==========

    pub(crate) fn segment_mut(&mut self, kind: SegmentKind) -> &mut Segment {
        &mut self.segments[kind.index()]
    }

    pub(crate) fn included_segments(&self) -> impl Iterator<Item = &Segment> {
        let include_destination = self.ends_at_runway();
        self.segments
            .iter()
            .filter(move |s| include_destination || s.kind() != SegmentKind::Destination)
    }

    fn flatten(&self) -> Vec<FlightPlanElement> {
        self.included_segments()
            .flat_map(|s| s.elements().iter().cloned())
            .collect()
    }

    /// Uncached lookup, safe to use on a draft mid-edit.
    pub(crate) fn flat_element(&self, index: usize) -> Option<&FlightPlanElement> {
        self.included_segments()
            .flat_map(Segment::elements)
            .nth(index)
    }

    fn flat_leg_mut(&mut self, index: usize) -> Result<&mut FlightPlanLeg> {
        let (kind, local) = self.segment_position(index)?;
        self.segment_mut(kind)
            .element_mut(local)
            .and_then(FlightPlanElement::as_leg_mut)
            .ok_or_else(|| PlanError::InvalidLegType {
                index,
                found: "a discontinuity".to_string(),
                expected: "a leg",
            })
    }

    /// Flattened index of `position` within `kind`.
    fn flat_index_of(&self, kind: SegmentKind, position: usize) -> usize {
        self.included_segments()
            .take_while(|s| s.kind() < kind)
            .map(Segment::len)
            .sum::<usize>()
            + position
    }

    pub(crate) fn remove_flat_range(&mut self, from: usize, to: usize) -> Result<()> {
        let mut remaining = to.saturating_sub(from);
        while remaining > 0 {
            let (kind, local) = self.segment_position(from)?;
            let end = (local + remaining).min(self.segment(kind).len());
            remaining -= self.segment_mut(kind).remove_range(local, end)?.len();
        }
        Ok(())
    }

    fn next_non_empty(&self, from: usize) -> Option<usize> {
        (from..self.segments.len()).find(|&i| !self.segments[i].is_empty())
    }

    fn previous_non_empty(&self, before: usize) -> Option<usize> {
        (0..before).rev().find(|&i| !self.segments[i].is_empty())
    }

    /// Replace a segment's content; it and its predecessor need restringing.
    pub(crate) fn replace_segment(&mut self, kind: SegmentKind, elements: Vec<FlightPlanElement>) {
        if elements.is_empty() && self.segment(kind).is_empty() {
            return;
        }
        self.segment_mut(kind).set_elements(elements);
        if let Some(previous) = self.previous_non_empty(kind.index()) {
            self.segments[previous].set_strung(false);
        }
    }

    /// Where an element inserted after flattened `index` belongs.
    fn insertion_point(&self, index: usize) -> Result<(SegmentKind, usize)> {
        let (kind, local) = self.segment_position(index)?;
        let point = match kind {
            // Origin holds only airport legs; start the next segment instead.
            SegmentKind::Origin => DEPARTURE_KINDS
                .iter()
                .copied()
                .find(|k| !self.segment(*k).is_empty())
                .map_or((SegmentKind::Enroute, 0), |k| (k, 0)),
            SegmentKind::Destination => (SegmentKind::MissedApproach, 0),
            _ => (kind, local + 1),
        };
        Ok(point)
    }

    pub(crate) fn insert_elements_after(
        &mut self,
        index: usize,
        elements: Vec<FlightPlanElement>,
    ) -> Result<()> {
        let len = self.leg_count();
        if index >= len {
            return Err(PlanError::InvalidIndex { index, len });
        }
        if elements.is_empty() {
            return Ok(());
        }

        let count = elements.len();
        let last_fix = elements
            .last()
            .and_then(FlightPlanElement::as_leg)
            .filter(|leg| leg.is_xf())
            .and_then(FlightPlanLeg::termination_waypoint)
            .cloned();

        let (kind, position) = self.insertion_point(index)?;
        let start = self.flat_index_of(kind, position);
        for (offset, element) in elements.into_iter().enumerate() {
            self.segment_mut(kind).insert_at(position + offset, element)?;
        }

        if let Some(fix) = last_fix {
            let after = start + count;
            let duplicate = (after..self.leg_count()).find(|&i| {
                self.flat_element(i)
                    .and_then(FlightPlanElement::as_leg)
                    .is_some_and(|leg| leg.terminates_with(&fix))
            });

            match duplicate {
                Some(duplicate) => {
                    tracing::debug!(
                        "Collapsing {} elements up to duplicate {} at {}",
                        duplicate + 1 - after,
                        fix.ident,
                        duplicate
                    );
                    self.remove_flat_range(after, duplicate + 1)?;
                }
                None => {
                    let next = self.flat_element(after);
                    if next.is_some_and(|e| !e.is_discontinuity()) {
                        self.segment_mut(kind)
                            .insert_at(position + count, FlightPlanElement::Discontinuity)?;
                    }
                }
            }
        }

        self.redistribute_at(start)
    }

    /// Move procedure legs around flattened `index` into enroute.
    ///
    /// Departure side: the element at `index` and everything after it in the
    /// departure segments go to the front of enroute. Arrival side: everything
    /// from the first arrival segment through the element at `index` goes to
    /// the end of enroute. Flattened order is unchanged either way.
    pub(crate) fn redistribute_at(&mut self, index: usize) -> Result<()> {
        let Ok((kind, local)) = self.segment_position(index) else {
            return Ok(());
        };

        match kind.class() {
            SegmentClass::Neutral => {}
            SegmentClass::Departure => {
                let mut moved = self.segment_mut(kind).truncate(local)?;
                self.segment_mut(kind).set_strung(true);
                for later in DEPARTURE_KINDS.iter().filter(|k| **k > kind) {
                    moved.extend(self.segment_mut(*later).take_elements());
                }

                annotate(&mut moved, TRUNCATED_DEPARTURE);
                tracing::debug!("Moved {} elements from {:?} into enroute", moved.len(), kind);
                self.segment_mut(SegmentKind::Enroute).prepend(moved);
            }
            SegmentClass::Arrival => {
                let mut moved = Vec::new();
                for earlier in ARRIVAL_KINDS.iter().filter(|k| **k < kind) {
                    moved.extend(self.segment_mut(*earlier).take_elements());
                }
                let segment = self.segment_mut(kind);
                moved.extend(segment.truncate_before(local + 1)?);
                if segment.elements().first().is_some_and(FlightPlanElement::is_discontinuity) {
                    moved.extend(segment.truncate_before(1)?);
                }

                annotate(&mut moved, TRUNCATED_ARRIVAL);
                tracing::debug!("Moved {} elements from {:?} into enroute", moved.len(), kind);
                let enroute = self.segment_mut(SegmentKind::Enroute);
                enroute.append(moved);
                enroute.set_strung(true);
            }
        }
        Ok(())
    }

    /// String every pair of adjacent non-empty segments, then fix up IF legs.
    pub(crate) fn restring_segments(&mut self) -> Result<()> {
        let mut start = 0;
        while let Some(first) = self.next_non_empty(start) {
            let Some(second) = self.next_non_empty(first + 1) else {
                break;
            };
            self.string_pair(first, second)?;

            if self.segments[first].is_empty() {
                // The splice took the only leg; reconnect the predecessor instead.
                if let Some(previous) = self.previous_non_empty(first) {
                    self.segments[previous].set_strung(false);
                    start = previous;
                    continue;
                }
            }
            start = first + 1;
        }

        self.adjust_if_legs();
        Ok(())
    }

    fn string_pair(&mut self, first: usize, second: usize) -> Result<()> {
        let first_kind = SegmentKind::ALL[first];
        let second_kind = SegmentKind::ALL[second];
        let first_segment = &self.segments[first];
        if first_segment.is_strung() {
            return Ok(());
        }

        let ends_with_discontinuity = first_segment.ends_with_discontinuity();
        let last_leg = first_segment.last_leg().cloned().ok_or_else(|| {
            PlanError::InvariantViolation(format!("{:?} holds only a discontinuity", first_kind))
        })?;

        let definitional = matches!(
            (first_kind, second_kind),
            (SegmentKind::Approach, SegmentKind::Destination)
                | (
                    SegmentKind::Approach | SegmentKind::Destination,
                    SegmentKind::MissedApproach
                )
        );
        if definitional || last_leg.leg_type == LegType::IF {
            self.segments[first].set_strung(true);
            return Ok(());
        }

        let mut cut = None;
        if last_leg.is_xf() {
            let target = last_leg.termination_waypoint();
            for (i, element) in self.segments[second].elements().iter().enumerate() {
                let Some(leg) = element.as_leg() else {
                    continue;
                };
                if leg.is_xf() && target.is_some_and(|fix| leg.terminates_with(fix)) {
                    cut = Some((i, true));
                    break;
                }
                if leg.is_fx() {
                    cut = Some((0, false));
                    break;
                }
            }
        }

        match cut {
            None => {
                let added = self.segments[first].push_discontinuity();
                self.segments[first].set_strung(false);
                if added {
                    tracing::debug!("No connection from {:?} to {:?}", first_kind, second_kind);
                }
            }
            Some((cut_before, drop_last_leg)) => {
                if ends_with_discontinuity {
                    self.segments[first].pop();
                }
                if drop_last_leg {
                    self.segments[first].pop();
                }
                self.segments[second].truncate_before(cut_before)?;
                self.segments[first].set_strung(true);
                tracing::debug!(
                    "Strung {:?} to {:?} at {} ({})",
                    first_kind,
                    second_kind,
                    cut_before,
                    last_leg.ident
                );
            }
        }
        Ok(())
    }

    /// IF exactly at the start of the plan and after each discontinuity.
    pub(crate) fn adjust_if_legs(&mut self) {
        let include_destination = self.ends_at_runway();
        let mut at_start = true;
        for segment in self.segments.iter_mut() {
            if segment.kind() == SegmentKind::Destination && !include_destination {
                continue;
            }
            for element in segment.elements_mut() {
                match element {
                    FlightPlanElement::Discontinuity => at_start = true,
                    FlightPlanElement::Leg(leg) => {
                        if at_start {
                            leg.leg_type = LegType::IF;
                        } else if leg.leg_type == LegType::IF {
                            leg.leg_type = LegType::TF;
                        }
                        at_start = false;
                    }
                }
            }
        }
    }

    fn merge_adjacent_discontinuities(&mut self) {
        let include_destination = self.ends_at_runway();
        let mut previous_discontinuity = false;
        for segment in self.segments.iter_mut() {
            if segment.kind() == SegmentKind::Destination && !include_destination {
                continue;
            }
            let doubled = segment.elements().iter().enumerate().any(|(i, e)| {
                e.is_discontinuity()
                    && (if i == 0 {
                        previous_discontinuity
                    } else {
                        segment.elements()[i - 1].is_discontinuity()
                    })
            });
            if doubled {
                let strung = segment.is_strung();
                let mut kept = Vec::with_capacity(segment.len());
                let mut previous = previous_discontinuity;
                for element in segment.take_elements() {
                    let discontinuity = element.is_discontinuity();
                    if !(discontinuity && previous) {
                        kept.push(element);
                    }
                    previous = discontinuity;
                }
                segment.set_elements(kept);
                segment.set_strung(strung);
            }
            if let Some(last) = segment.elements().last() {
                previous_discontinuity = last.is_discontinuity();
            }
        }
    }

    /// Mark a segment strung when an edit left it running straight into the next one.
    ///
    /// Restringing never leaves such a boundary, so it comes from the user
    /// clearing the discontinuity. Later restrings keep the connection.
    fn mark_joined_segments(&mut self) {
        let include_destination = self.ends_at_runway();
        let mut previous: Option<usize> = None;
        for i in 0..self.segments.len() {
            let kind = self.segments[i].kind();
            let excluded = kind == SegmentKind::Destination && !include_destination;
            if excluded || self.segments[i].is_empty() {
                continue;
            }
            if let Some(p) = previous {
                let first = &mut self.segments[p];
                if !first.is_strung() && !first.ends_with_discontinuity() {
                    tracing::debug!("{:?} joined to {:?}", first.kind(), kind);
                    first.set_strung(true);
                }
            }
            previous = Some(i);
        }
    }

    /// Cut the plan after the active leg and continue with `alternate` from `offset`.
    pub(crate) fn splice_alternate(&mut self, alternate: &BaseFlightPlan, offset: usize) -> Result<()> {
        let len = self.leg_count();
        if len == 0 {
            return Err(PlanError::illegal_state("flight plan is empty"));
        }
        let active = self.active_leg_index.min(len - 1);
        self.redistribute_at(active)?;

        let (kind, local) = self.segment_position(active)?;
        self.segment_mut(kind).truncate(local + 1)?;
        for later in SegmentKind::ALL.iter().filter(|k| **k > kind) {
            self.segment_mut(*later).take_elements();
        }

        // Anything left past enroute now precedes the alternate's arrival.
        let holder = if kind > SegmentKind::Enroute {
            let include_destination = self.ends_at_runway();
            let mut tail = Vec::new();
            for k in SegmentKind::ALL.iter().filter(|k| **k > SegmentKind::Enroute) {
                let elements = self.segment_mut(*k).take_elements();
                if *k != SegmentKind::Destination || include_destination {
                    tail.extend(elements);
                }
            }
            self.segment_mut(SegmentKind::Enroute).append(tail);
            SegmentKind::Enroute
        } else {
            kind
        };
        self.segment_mut(holder).push_discontinuity();

        let alt = &alternate.procedures;
        self.procedures.arrival_enroute_transition = alt.arrival_enroute_transition.clone();
        self.procedures.arrival = alt.arrival.clone();
        self.procedures.approach_via = alt.approach_via.clone();
        self.procedures.approach = alt.approach.clone();
        self.procedures.destination_airport = alt.destination_airport.clone();
        self.procedures.destination_runway = alt.destination_runway.clone();
        self.available.destination_runways = alternate.available.destination_runways.clone();
        self.available.arrivals = alternate.available.arrivals.clone();
        self.available.approaches = alternate.available.approaches.clone();
        self.available.approach_vias = alternate.available.approach_vias.clone();

        let mut flat_index = 0;
        for segment in alternate.included_segments() {
            let target = segment.kind().max(SegmentKind::Enroute);
            for element in segment.elements() {
                if flat_index >= offset {
                    self.segment_mut(target).append(vec![element.clone()]);
                }
                flat_index += 1;
            }
            if target != SegmentKind::Enroute {
                self.segment_mut(target).set_strung(segment.is_strung());
            }
        }
        // An excluded alternate destination leg still belongs to the destination segment.
        if !alternate.ends_at_runway() {
            let destination = alternate.segment(SegmentKind::Destination).elements().to_vec();
            self.segment_mut(SegmentKind::Destination).append(destination);
        }

        self.active_leg_index = active;
        Ok(())
    }
}

fn annotate(elements: &mut [FlightPlanElement], annotation: &str) {
    for leg in elements.iter_mut().filter_map(FlightPlanElement::as_leg_mut) {
        leg.annotation = annotation.to_string();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Coordinates;
    use pretty_assertions::assert_eq;

    fn fix(ident: &str) -> Fix {
        Fix::new(ident, "CY", Coordinates::new(43.0, -79.0))
    }

    fn tf(ident: &str) -> FlightPlanElement {
        FlightPlanLeg::from_enroute_waypoint(fix(ident), None).into()
    }

    fn plan_with(segments: &[(SegmentKind, &[&str])]) -> BaseFlightPlan {
        let mut plan = BaseFlightPlan::new();
        for (kind, idents) in segments {
            let elements = idents
                .iter()
                .map(|i| if *i == "DISC" { FlightPlanElement::Discontinuity } else { tf(i) })
                .collect();
            plan.segment_mut(*kind).set_elements(elements);
        }
        plan
    }

    fn idents(plan: &BaseFlightPlan) -> Vec<String> {
        plan.all_legs()
            .iter()
            .map(|e| match e {
                FlightPlanElement::Leg(leg) => leg.ident.clone(),
                FlightPlanElement::Discontinuity => "DISC".to_string(),
            })
            .collect()
    }

    fn segment_idents(plan: &BaseFlightPlan, kind: SegmentKind) -> Vec<&str> {
        plan.segment(kind).elements().iter().map(FlightPlanElement::ident).collect()
    }

    #[test]
    fn test_cache_rebuilt_on_version_change() {
        let mut plan = plan_with(&[(SegmentKind::Enroute, &["A", "B", "C"])]);
        let first = plan.all_legs();
        let again = plan.all_legs();
        assert!(Arc::ptr_eq(&first, &again));

        plan.remove_element_at(1, false).unwrap();
        let after = plan.all_legs();
        assert!(!Arc::ptr_eq(&first, &after));
        assert_eq!(idents(&plan), vec!["A", "C"]);
    }

    #[test]
    fn test_clone_starts_with_fresh_cache() {
        let plan = plan_with(&[(SegmentKind::Enroute, &["A", "B"])]);
        let legs = plan.all_legs();
        let copy = plan.clone();
        assert!(!Arc::ptr_eq(&legs, &copy.all_legs()));
        assert_eq!(legs[..], copy.all_legs()[..]);
    }

    #[test]
    fn test_remove_with_discontinuity() {
        let mut plan = plan_with(&[(SegmentKind::Enroute, &["A", "B", "C"])]);
        plan.remove_element_at(1, true).unwrap();
        assert_eq!(idents(&plan), vec!["A", "DISC", "C"]);
        assert_eq!(plan.version(), 1);
    }

    #[test]
    fn test_remove_first_element_never_leaves_discontinuity() {
        let mut plan = plan_with(&[(SegmentKind::Enroute, &["A", "B", "C"])]);
        plan.remove_element_at(0, true).unwrap();
        assert_eq!(idents(&plan), vec!["B", "C"]);
    }

    #[test]
    fn test_remove_out_of_range_keeps_version() {
        let mut plan = plan_with(&[(SegmentKind::Enroute, &["A"])]);
        let err = plan.remove_element_at(4, false).unwrap_err();
        assert!(matches!(err, PlanError::InvalidIndex { index: 4, len: 1 }));
        assert_eq!(plan.version(), 0);
    }

    #[test]
    fn test_adjacent_discontinuities_merge() {
        let mut plan = plan_with(&[(SegmentKind::Enroute, &["A", "DISC", "B", "DISC", "C"])]);
        plan.remove_element_at(2, false).unwrap();
        assert_eq!(idents(&plan), vec!["A", "DISC", "C"]);
    }

    #[test]
    fn test_redistribute_departure_moves_tail_into_enroute() {
        let mut plan = plan_with(&[
            (SegmentKind::DepartureRunwayTransition, &["R1", "R2"]),
            (SegmentKind::Departure, &["D1", "D2", "D3"]),
            (SegmentKind::DepartureEnrouteTransition, &["T1"]),
            (SegmentKind::Enroute, &["E1"]),
        ]);
        plan.redistribute_legs_at(3).unwrap();

        assert_eq!(segment_idents(&plan, SegmentKind::Departure), vec!["D1"]);
        assert!(plan.segment(SegmentKind::DepartureEnrouteTransition).is_empty());
        assert_eq!(
            segment_idents(&plan, SegmentKind::Enroute),
            vec!["D2", "D3", "T1", "E1"]
        );
        let annotations: Vec<_> = plan
            .segment(SegmentKind::Enroute)
            .elements()
            .iter()
            .filter_map(|e| e.as_leg().map(|l| l.annotation.as_str()))
            .collect();
        assert_eq!(annotations, vec![TRUNCATED_DEPARTURE, TRUNCATED_DEPARTURE, TRUNCATED_DEPARTURE, ""]);
        assert_eq!(idents(&plan), vec!["R1", "R2", "D1", "D2", "D3", "T1", "E1"]);
    }

    #[test]
    fn test_redistribute_arrival_moves_head_into_enroute() {
        let mut plan = plan_with(&[
            (SegmentKind::Enroute, &["E1"]),
            (SegmentKind::ArrivalEnrouteTransition, &["T1"]),
            (SegmentKind::Arrival, &["A1", "A2", "A3"]),
            (SegmentKind::Approach, &["P1"]),
        ]);
        plan.redistribute_legs_at(3).unwrap();

        assert_eq!(segment_idents(&plan, SegmentKind::Enroute), vec!["E1", "T1", "A1", "A2"]);
        assert_eq!(segment_idents(&plan, SegmentKind::Arrival), vec!["A3"]);
        assert_eq!(
            plan.segment(SegmentKind::Enroute).elements()[3].as_leg().unwrap().annotation,
            TRUNCATED_ARRIVAL
        );
    }

    #[test]
    fn test_redistribute_neutral_is_noop_but_bumps() {
        let mut plan = plan_with(&[(SegmentKind::Enroute, &["A", "B"])]);
        plan.redistribute_legs_at(1).unwrap();
        assert_eq!(idents(&plan), vec!["A", "B"]);
        assert_eq!(plan.version(), 1);
    }

    #[test]
    fn test_insert_collapses_duplicate_within_segment() {
        let mut plan = plan_with(&[(SegmentKind::Enroute, &["NOSUS", "NAPEE", "PBERG", "HOVOB"])]);
        plan.insert_waypoint_after(0, fix("HOVOB")).unwrap();
        assert_eq!(idents(&plan), vec!["NOSUS", "HOVOB"]);
    }

    #[test]
    fn test_insert_without_duplicate_adds_discontinuity() {
        let mut plan = plan_with(&[(SegmentKind::Enroute, &["A", "B"])]);
        plan.insert_waypoint_after(0, fix("X")).unwrap();
        assert_eq!(idents(&plan), vec!["A", "X", "DISC", "B"]);
        assert_eq!(plan.all_legs()[3].as_leg().unwrap().leg_type, LegType::IF);
    }

    #[test]
    fn test_insert_at_end_adds_no_discontinuity() {
        let mut plan = plan_with(&[(SegmentKind::Enroute, &["A", "B"])]);
        plan.insert_waypoint_after(1, fix("X")).unwrap();
        assert_eq!(idents(&plan), vec!["A", "B", "X"]);
    }

    #[test]
    fn test_insert_collapses_across_segments() {
        let mut plan = plan_with(&[
            (SegmentKind::Departure, &["D1", "D2"]),
            (SegmentKind::Enroute, &["E1", "E2", "E3"]),
        ]);
        plan.insert_waypoint_after(0, fix("E2")).unwrap();

        assert_eq!(idents(&plan), vec!["D1", "E2", "E3"]);
        assert_eq!(segment_idents(&plan, SegmentKind::Departure), vec!["D1"]);
        assert_eq!(segment_idents(&plan, SegmentKind::Enroute), vec!["E2", "E3"]);
    }

    #[test]
    fn test_insert_into_arrival_keeps_discontinuity_in_enroute() {
        let mut plan = plan_with(&[
            (SegmentKind::Enroute, &["E1"]),
            (SegmentKind::Arrival, &["A1", "A2", "A3"]),
        ]);
        plan.insert_waypoint_after(1, fix("X")).unwrap();

        assert_eq!(idents(&plan), vec!["E1", "A1", "X", "DISC", "A2", "A3"]);
        assert_eq!(segment_idents(&plan, SegmentKind::Arrival), vec!["A2", "A3"]);
    }

    fn hold_at(ident: &str) -> FlightPlanElement {
        let mut leg = FlightPlanLeg::from_enroute_waypoint(fix(ident), None);
        leg.leg_type = LegType::HM;
        leg.definition.leg_type = LegType::HM;
        leg.into()
    }

    #[test]
    fn test_insert_does_not_collapse_into_hold() {
        let mut plan = plan_with(&[(SegmentKind::Enroute, &["A", "B"])]);
        plan.segment_mut(SegmentKind::Enroute)
            .insert_at(2, hold_at("X"))
            .unwrap();

        plan.insert_waypoint_after(0, fix("X")).unwrap();

        assert_eq!(idents(&plan), vec!["A", "X", "DISC", "B", "X"]);
        assert_eq!(plan.leg_at(4).unwrap().leg_type, LegType::HM);
    }

    #[test]
    fn test_find_fix_skips_holds() {
        let mut plan = plan_with(&[(SegmentKind::Enroute, &["A", "B", "X"])]);
        plan.segment_mut(SegmentKind::Enroute)
            .insert_at(1, hold_at("X"))
            .unwrap();

        assert_eq!(plan.find_fix(&fix("X")), Some(3));
    }

    #[test]
    fn test_insert_invalid_index() {
        let mut plan = plan_with(&[(SegmentKind::Enroute, &["A"])]);
        assert!(matches!(
            plan.insert_waypoint_after(1, fix("X")),
            Err(PlanError::InvalidIndex { .. })
        ));
        assert_eq!(plan.version(), 0);
    }

    #[test]
    fn test_remove_range() {
        let mut plan = plan_with(&[(SegmentKind::Enroute, &["A", "B", "C", "D"])]);
        plan.remove_elements(1, 3).unwrap();
        assert_eq!(idents(&plan), vec!["A", "D"]);
        assert!(plan.remove_elements(1, 5).is_err());
    }

    #[test]
    fn test_remove_range_across_segments() {
        let mut plan = plan_with(&[
            (SegmentKind::Departure, &["D1", "D2"]),
            (SegmentKind::Enroute, &["E1", "E2", "E3"]),
        ]);
        plan.remove_elements(1, 4).unwrap();

        assert_eq!(idents(&plan), vec!["D1", "E3"]);
        assert_eq!(segment_idents(&plan, SegmentKind::Departure), vec!["D1"]);
        assert_eq!(segment_idents(&plan, SegmentKind::Enroute), vec!["E3"]);
    }

    #[test]
    fn test_restring_splices_matching_fix() {
        let mut plan = plan_with(&[
            (SegmentKind::Departure, &["D1", "JOIN"]),
            (SegmentKind::Enroute, &["E0", "JOIN", "E2"]),
        ]);
        plan.restring().unwrap();

        assert_eq!(idents(&plan), vec!["D1", "JOIN", "E2"]);
        assert!(plan.segment(SegmentKind::Departure).is_strung());
        assert_eq!(segment_idents(&plan, SegmentKind::Departure), vec!["D1"]);
    }

    #[test]
    fn test_restring_inserts_discontinuity_without_match() {
        let mut plan = plan_with(&[
            (SegmentKind::Departure, &["D1", "D2"]),
            (SegmentKind::Enroute, &["E1", "E2"]),
        ]);
        plan.restring().unwrap();
        assert_eq!(idents(&plan), vec!["D1", "D2", "DISC", "E1", "E2"]);
        assert!(!plan.segment(SegmentKind::Departure).is_strung());

        // Already disconnected: no second discontinuity
        plan.restring().unwrap();
        assert_eq!(idents(&plan), vec!["D1", "D2", "DISC", "E1", "E2"]);
    }

    #[test]
    fn test_cleared_discontinuity_stays_joined() {
        let mut plan = plan_with(&[
            (SegmentKind::Departure, &["D1", "D2"]),
            (SegmentKind::Enroute, &["E1", "E2"]),
        ]);
        plan.restring().unwrap();

        plan.remove_element_at(2, false).unwrap();

        assert_eq!(idents(&plan), vec!["D1", "D2", "E1", "E2"]);
        assert!(plan.segment(SegmentKind::Departure).is_strung());
        assert_eq!(plan.leg_at(2).unwrap().leg_type, LegType::TF);
        plan.restring().unwrap();
        assert_eq!(idents(&plan), vec!["D1", "D2", "E1", "E2"]);
    }

    #[test]
    fn test_restring_rejects_lone_discontinuity() {
        let mut plan = plan_with(&[
            (SegmentKind::Departure, &["DISC"]),
            (SegmentKind::Enroute, &["E1"]),
        ]);
        let err = plan.restring().unwrap_err();
        assert!(matches!(err, PlanError::InvariantViolation(_)));
        assert_eq!(plan.version(), 0);
    }

    #[test]
    fn test_if_placement_after_restring() {
        let mut plan = plan_with(&[
            (SegmentKind::Departure, &["D1", "D2"]),
            (SegmentKind::Enroute, &["E1", "E2"]),
        ]);
        plan.restring().unwrap();

        let legs = plan.all_legs();
        for (i, element) in legs.iter().enumerate() {
            if let Some(leg) = element.as_leg() {
                let expect_if = i == 0 || legs[i - 1].is_discontinuity();
                assert_eq!(leg.leg_type == LegType::IF, expect_if, "leg {} at {}", leg.ident, i);
            }
        }
    }

    #[test]
    fn test_overfly_toggle() {
        let mut plan = plan_with(&[(SegmentKind::Enroute, &["A", "DISC", "B"])]);
        plan.toggle_overfly_at(0).unwrap();
        assert!(plan.leg_at(0).unwrap().overfly());
        plan.set_overfly_at(0, false).unwrap();
        assert!(!plan.leg_at(0).unwrap().overfly());
        assert!(matches!(
            plan.toggle_overfly_at(1),
            Err(PlanError::InvalidLegType { index: 1, .. })
        ));
        assert_eq!(plan.version(), 2);
    }

    #[test]
    fn test_sequence_skips_discontinuity() {
        let mut plan = plan_with(&[(SegmentKind::Enroute, &["A", "B", "DISC", "C"])]);
        assert_eq!(plan.active_leg_index(), 1);
        plan.sequence().unwrap();
        assert_eq!(plan.active_leg_index(), 3);
        assert!(plan.sequence().is_err());
    }

    #[test]
    fn test_segment_position() {
        let plan = plan_with(&[
            (SegmentKind::Origin, &["O"]),
            (SegmentKind::Enroute, &["E1", "E2"]),
            (SegmentKind::MissedApproach, &["M1"]),
        ]);
        assert_eq!(plan.segment_position(0).unwrap(), (SegmentKind::Origin, 0));
        assert_eq!(plan.segment_position(2).unwrap(), (SegmentKind::Enroute, 1));
        assert_eq!(plan.segment_position(3).unwrap(), (SegmentKind::MissedApproach, 0));
        assert!(plan.segment_position(4).is_err());
        assert_eq!(plan.first_missed_approach_leg_index(), 3);
        assert_eq!(plan.destination_leg_index(), Some(2));
    }
}
