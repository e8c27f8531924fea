//! Flight plan: base plan plus alternate, FIX INFO, airway entry and direct-to.

use std::ops::{Deref, DerefMut};

use crate::base_plan::BaseFlightPlan;
use crate::error::{PlanError, Result};
use crate::events::PlanEvent;
use crate::leg::{FlightPlanElement, FlightPlanLeg};
use crate::models::{Fix, FixInfoEntry, PresentPosition};
use crate::navdata::{resolve_airway, NavigationDatabase, ProcedureEdit, ResolutionContext, ResolvedEdit};
use crate::pending_airways::PendingAirways;
use crate::segment::SegmentKind;

/// Number of FIX INFO pages.
pub const FIX_INFO_SLOTS: usize = 4;

/// A complete flight plan occupying one slot.
///
/// Dereferences to [`BaseFlightPlan`] for the segment and leg operations.
#[derive(Debug, Clone)]
pub struct FlightPlan {
    index: usize,
    base: BaseFlightPlan,
    alternate: Option<BaseFlightPlan>,
    pending_airways: Option<PendingAirways>,
    fix_infos: [Option<FixInfoEntry>; FIX_INFO_SLOTS],
    events: Vec<PlanEvent>,
}

impl Deref for FlightPlan {
    type Target = BaseFlightPlan;

    fn deref(&self) -> &BaseFlightPlan {
        &self.base
    }
}

impl DerefMut for FlightPlan {
    fn deref_mut(&mut self) -> &mut BaseFlightPlan {
        &mut self.base
    }
}

/// Base plan between two airports, as used for alternates.
pub async fn build_city_pair<D>(db: &D, from: &str, to: &str) -> Result<BaseFlightPlan>
where
    D: NavigationDatabase + ?Sized,
{
    let mut plan = BaseFlightPlan::new();
    plan.set_procedure(db, ProcedureEdit::OriginAirport(from.to_string()))
        .await?;
    plan.set_procedure(db, ProcedureEdit::DestinationAirport(to.to_string()))
        .await?;
    Ok(plan)
}

impl FlightPlan {
    pub fn new(index: usize) -> Self {
        Self {
            index,
            base: BaseFlightPlan::new(),
            alternate: None,
            pending_airways: None,
            fix_infos: Default::default(),
            events: Vec::new(),
        }
    }

    /// Fresh plan from `from` to `to`, with an optional alternate airport.
    pub async fn for_city_pair<D>(
        db: &D,
        index: usize,
        from: &str,
        to: &str,
        alternate: Option<&str>,
    ) -> Result<Self>
    where
        D: NavigationDatabase + ?Sized,
    {
        let mut plan = Self::new(index);
        plan.base = build_city_pair(db, from, to).await?;
        if let Some(alternate) = alternate {
            plan.alternate = Some(build_city_pair(db, to, alternate).await?);
        }
        Ok(plan)
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Deep copy for another slot.
    pub fn clone_for(&self, index: usize) -> Self {
        let mut plan = self.clone();
        plan.index = index;
        plan.events.clear();
        plan
    }

    pub fn base(&self) -> &BaseFlightPlan {
        &self.base
    }

    pub fn alternate(&self) -> Option<&BaseFlightPlan> {
        self.alternate.as_ref()
    }

    pub fn pending_airways(&self) -> Option<&PendingAirways> {
        self.pending_airways.as_ref()
    }

    /// Drain notifications raised since the last call.
    pub fn take_events(&mut self) -> Vec<PlanEvent> {
        std::mem::take(&mut self.events)
    }

    // ========== ACTIVE LEG ==========

    pub fn set_active_leg_index(&mut self, index: usize) -> Result<()> {
        self.base.set_active_leg_index(index)?;
        self.push_active_leg_event();
        Ok(())
    }

    pub fn sequence(&mut self) -> Result<()> {
        self.base.sequence()?;
        self.push_active_leg_event();
        Ok(())
    }

    fn push_active_leg_event(&mut self) {
        self.events.push(PlanEvent::ActiveLegChanged {
            plan_index: self.index,
            active_leg_index: self.base.active_leg_index(),
        });
    }

    // ========== ALTERNATE ==========

    /// Replace the alternate sub-plan.
    pub fn set_alternate(&mut self, alternate: Option<BaseFlightPlan>) {
        self.alternate = alternate;
        self.base.touch();
    }

    /// Build the alternate from the current destination to `icao`.
    pub async fn set_alternate_destination_airport<D>(&mut self, db: &D, icao: &str) -> Result<()>
    where
        D: NavigationDatabase + ?Sized,
    {
        let origin = self.alternate_origin()?;
        let alternate = build_city_pair(db, &origin, icao).await?;
        self.set_alternate(Some(alternate));
        Ok(())
    }

    /// Airport an alternate has to start from.
    pub fn alternate_origin(&self) -> Result<String> {
        self.base
            .procedures()
            .destination_airport
            .as_ref()
            .map(|a| a.ident.clone())
            .ok_or_else(|| PlanError::illegal_state("no destination airport selected"))
    }

    pub fn alternate_resolution_context(&self) -> Result<ResolutionContext> {
        self.alternate
            .as_ref()
            .map(BaseFlightPlan::resolution_context)
            .ok_or_else(|| PlanError::illegal_state("no alternate flight plan"))
    }

    /// Apply a procedure change to the alternate.
    pub fn apply_alternate_resolved(&mut self, resolved: ResolvedEdit) -> Result<()> {
        let alternate = self
            .alternate
            .as_mut()
            .ok_or_else(|| PlanError::illegal_state("no alternate flight plan"))?;
        alternate.apply_resolved(resolved)?;
        self.base.touch();
        Ok(())
    }

    /// Divert: drop everything after the active leg and continue on the alternate.
    pub fn enable_altn(&mut self, alternate_leg_offset: usize) -> Result<()> {
        let alternate = self
            .alternate
            .clone()
            .ok_or_else(|| PlanError::illegal_state("no alternate flight plan"))?;
        let len = alternate.leg_count();
        if alternate_leg_offset >= len {
            return Err(PlanError::InvalidIndex {
                index: alternate_leg_offset,
                len,
            });
        }

        self.base.edit("enable alternate", |plan| {
            plan.splice_alternate(&alternate, alternate_leg_offset)
        })?;
        self.alternate = None;
        self.pending_airways = None;
        tracing::info!("Plan {} diverted to its alternate", self.index);
        Ok(())
    }

    // ========== DIRECT TO ==========

    /// Direct-to the first leg terminating at `target`.
    pub fn direct_to(&mut self, ppos: &PresentPosition, target: &Fix) -> Result<()> {
        let index = self
            .base
            .find_fix(target)
            .ok_or_else(|| PlanError::not_found("fix in flight plan", target.ident.clone()))?;
        self.direct_to_leg(ppos, index)
    }

    /// Direct-to the leg at `index` from the present position.
    pub fn direct_to_leg(&mut self, ppos: &PresentPosition, index: usize) -> Result<()> {
        let target = match self.base.element_at(index)? {
            FlightPlanElement::Discontinuity => {
                return Err(PlanError::InvalidTarget {
                    index,
                    reason: "target is a discontinuity",
                })
            }
            FlightPlanElement::Leg(leg) if leg.is_xf() => leg
                .definition
                .waypoint
                .ok_or(PlanError::InvalidTarget {
                    index,
                    reason: "leg has no terminating fix",
                })?,
            FlightPlanElement::Leg(_) => {
                return Err(PlanError::InvalidTarget {
                    index,
                    reason: "leg does not terminate at a fix",
                })
            }
        };

        let turning_point = FlightPlanLeg::turning_point(ppos.location, ppos.magnetic_track());
        let turn_end = FlightPlanLeg::direct_to_turn_end(target);

        self.base.edit("direct to", |plan| {
            plan.redistribute_at(index)?;
            let (kind, local) = plan.segment_position(index)?;
            if !matches!(kind, SegmentKind::Enroute | SegmentKind::MissedApproach) {
                return Err(PlanError::InvalidTarget {
                    index,
                    reason: "target is an origin or destination leg",
                });
            }

            let after_discontinuity = index == 0
                || plan
                    .flat_element(index - 1)
                    .is_some_and(FlightPlanElement::is_discontinuity);
            let mut spliced = Vec::with_capacity(3);
            if !after_discontinuity {
                spliced.push(FlightPlanElement::Discontinuity);
            }
            spliced.push(turning_point.into());
            spliced.push(turn_end.into());

            let turn_end_index = index + spliced.len() - 1;
            plan.segment_mut(kind).splice(local..local + 1, spliced)?;
            plan.active_leg_index = turn_end_index;
            Ok(())
        })?;

        tracing::info!(
            "Direct to {} in plan {}, active leg {}",
            self.base.leg_at(self.base.active_leg_index())?.ident,
            self.index,
            self.base.active_leg_index()
        );
        self.push_active_leg_event();
        Ok(())
    }

    // ========== AIRWAYS ==========

    /// Begin entering airways from the fix at `index`.
    pub fn start_airway_entry(&mut self, index: usize) -> Result<()> {
        let element = self.base.element_at(index)?;
        let fix = element
            .as_leg()
            .filter(|leg| leg.is_xf() || leg.is_hx())
            .and_then(|leg| leg.definition.waypoint.clone())
            .ok_or_else(|| PlanError::InvalidLegType {
                index,
                found: element.describe(),
                expected: "a fix-terminating or hold leg",
            })?;

        self.pending_airways = Some(PendingAirways::new(index, fix));
        self.base.touch();
        Ok(())
    }

    /// Stage fixes already resolved along `airway_ident`.
    pub fn add_pending_airway(&mut self, airway_ident: &str, fixes: Vec<Fix>) -> Result<()> {
        let pending = self
            .pending_airways
            .as_mut()
            .ok_or_else(|| PlanError::illegal_state("no airway entry in progress"))?;
        pending.add_airway(airway_ident, fixes)?;
        self.base.touch();
        Ok(())
    }

    /// Resolve and stage the airway from the current tail fix to `exit_ident`.
    pub async fn continue_airway_entry<D>(
        &mut self,
        db: &D,
        airway_ident: &str,
        exit_ident: &str,
    ) -> Result<()>
    where
        D: NavigationDatabase + ?Sized,
    {
        let from = self
            .pending_airways
            .as_ref()
            .map(|p| p.tail_fix().clone())
            .ok_or_else(|| PlanError::illegal_state("no airway entry in progress"))?;
        let fixes = resolve_airway(db, airway_ident, &from, exit_ident).await?;
        self.add_pending_airway(airway_ident, fixes)
    }

    /// Splice the staged airway legs into the plan after their anchor.
    ///
    /// The anchor is found again by its fix, since edits made while the entry
    /// was pending can move it. On failure the entry stays pending.
    pub fn finalize_airway_entry(&mut self) -> Result<()> {
        let Some(pending) = self.pending_airways.as_ref() else {
            return Ok(());
        };
        if pending.legs().is_empty() {
            self.pending_airways = None;
            return Ok(());
        }

        let anchor_fix = pending.anchor_fix();
        let anchors =
            |e: &FlightPlanElement| e.as_leg().is_some_and(|leg| anchors_airway(leg, anchor_fix));
        let stored = pending.anchor_index();
        let anchor = if self.base.element_at(stored).is_ok_and(|e| anchors(&e)) {
            stored
        } else {
            self.base.all_legs().iter().position(anchors).ok_or_else(|| {
                PlanError::illegal_state(format!(
                    "airway entry fix {} is no longer in the flight plan",
                    anchor_fix.ident
                ))
            })?
        };

        let elements: Vec<FlightPlanElement> =
            pending.legs().iter().cloned().map(Into::into).collect();
        self.base.edit("finalize airways", |plan| {
            plan.insert_elements_after(anchor, elements)
        })?;
        self.pending_airways = None;
        Ok(())
    }

    pub fn cancel_airway_entry(&mut self) {
        if self.pending_airways.take().is_some() {
            self.base.touch();
        }
    }

    // ========== FIX INFO ==========

    pub fn fix_info(&self, slot: usize) -> Result<Option<&FixInfoEntry>> {
        Ok(self.fix_infos[Self::fix_info_position(slot)?].as_ref())
    }

    pub fn set_fix_info_entry(&mut self, slot: usize, entry: Option<FixInfoEntry>) -> Result<()> {
        self.edit_fix_info_entry(slot, |_| entry)
    }

    /// Replace a FIX INFO page with the result of `transform` applied to its content.
    pub fn edit_fix_info_entry(
        &mut self,
        slot: usize,
        transform: impl FnOnce(Option<FixInfoEntry>) -> Option<FixInfoEntry>,
    ) -> Result<()> {
        let position = Self::fix_info_position(slot)?;
        let entry = transform(self.fix_infos[position].take());
        self.fix_infos[position] = entry.clone();
        self.events.push(PlanEvent::FixInfoChanged {
            plan_index: self.index,
            slot,
            entry,
        });
        self.base.touch();
        Ok(())
    }

    fn fix_info_position(slot: usize) -> Result<usize> {
        if (1..=FIX_INFO_SLOTS).contains(&slot) {
            Ok(slot - 1)
        } else {
            Err(PlanError::InvalidIndex {
                index: slot,
                len: FIX_INFO_SLOTS,
            })
        }
    }
}

/// Legs an airway entry can start from: fix-terminating legs and holds at `fix`.
fn anchors_airway(leg: &FlightPlanLeg, fix: &Fix) -> bool {
    (leg.is_xf() || leg.is_hx())
        && leg
            .definition
            .waypoint
            .as_ref()
            .is_some_and(|w| w.same_fix(fix))
}
