//! Edit API over the plan slots.
//!
//! Destructive edits on the active plan are staged into the temporary plan
//! according to [`FpmConfig`]. Edits that need database lookups read the slot
//! epoch before suspending and only commit if the slot is still the same one
//! afterwards.

use fpm_core::{
    build_city_pair, resolve_airway, resolve_edit, Fix, FixInfoEntry, FlightPlan,
    NavigationDatabase, PlanError, PresentPosition, ProcedureEdit, Result,
};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::config::FpmConfig;
use crate::events::SyncEvent;
use crate::index::PlanIndex;
use crate::manager::{FlightPlanManager, SlotSummary};

pub struct FlightPlanService<D: NavigationDatabase> {
    manager: FlightPlanManager,
    db: Arc<D>,
    config: FpmConfig,
}

impl<D: NavigationDatabase> FlightPlanService<D> {
    pub fn new(db: Arc<D>, config: FpmConfig) -> Self {
        Self {
            manager: FlightPlanManager::new(config.event_capacity),
            db,
            config,
        }
    }

    pub fn config(&self) -> &FpmConfig {
        &self.config
    }

    pub fn manager(&self) -> &FlightPlanManager {
        &self.manager
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.manager.subscribe()
    }

    /// Create the active plan and every configured secondary.
    pub fn create_flight_plans(&self) -> Result<()> {
        self.manager.create(PlanIndex::Active)?;
        for n in 1..=self.config.num_secondary {
            self.manager.create(PlanIndex::Secondary(n))?;
        }
        Ok(())
    }

    /// Drop every slot and start over with empty plans.
    pub fn reset(&self) -> Result<()> {
        self.manager.delete_all();
        self.create_flight_plans()
    }

    pub fn has(&self, index: PlanIndex) -> bool {
        self.manager.has(index)
    }

    pub fn has_temporary(&self) -> bool {
        self.manager.has(PlanIndex::Temporary)
    }

    /// The plan the crew is looking at: temporary if there is one.
    pub fn active_or_temporary(&self) -> PlanIndex {
        if self.has_temporary() {
            PlanIndex::Temporary
        } else {
            PlanIndex::Active
        }
    }

    pub fn read<T>(&self, index: PlanIndex, f: impl FnOnce(&FlightPlan) -> T) -> Result<T> {
        self.manager.read(index, f)
    }

    pub fn active_leg_index(&self, index: PlanIndex) -> Result<usize> {
        self.manager.read(index, |p| p.active_leg_index())
    }

    pub fn summaries(&self) -> Vec<SlotSummary> {
        self.manager.summaries()
    }

    /// Slot a destructive edit on `index` should go to.
    ///
    /// Edits on the active plan go to the temporary plan, which is created
    /// from the active plan if needed.
    pub fn prepare_destructive_modification(&self, index: PlanIndex) -> Result<PlanIndex> {
        if index != PlanIndex::Active {
            return Ok(index);
        }
        if !self.has_temporary() {
            self.manager.copy(PlanIndex::Active, PlanIndex::Temporary)?;
        }
        Ok(PlanIndex::Temporary)
    }

    /// Where a policy-gated revision lands, or `None` if it is not allowed.
    fn revision_target(&self, index: PlanIndex, stage: bool) -> Result<Option<PlanIndex>> {
        if index == PlanIndex::Temporary && !self.config.allow_revisions_on_tmpy {
            tracing::warn!("Revisions on the temporary flight plan are not allowed");
            return Ok(None);
        }
        if stage {
            self.prepare_destructive_modification(index).map(Some)
        } else {
            Ok(Some(index))
        }
    }

    // ========== TEMPORARY / UPLINK ==========

    /// Commit the temporary plan over the active plan.
    pub fn temporary_insert(&self) -> Result<()> {
        if !self.has_temporary() {
            return Err(PlanError::illegal_state(
                "cannot insert temporary flight plan: none exists",
            ));
        }
        self.manager
            .modify(PlanIndex::Temporary, |p| p.finalize_airway_entry())?;
        self.manager.copy(PlanIndex::Temporary, PlanIndex::Active)?;
        self.manager.delete(PlanIndex::Temporary);
        Ok(())
    }

    pub fn temporary_delete(&self) -> Result<()> {
        if !self.manager.delete(PlanIndex::Temporary) {
            return Err(PlanError::illegal_state(
                "cannot delete temporary flight plan: none exists",
            ));
        }
        Ok(())
    }

    /// Put a received plan into the uplink slot.
    pub fn load_uplink(&self, plan: FlightPlan) {
        self.manager.install(PlanIndex::Uplink, plan);
    }

    /// Commit the uplink plan over the active plan.
    pub fn uplink_insert(&self) -> Result<()> {
        if !self.has(PlanIndex::Uplink) {
            return Err(PlanError::illegal_state(
                "cannot insert uplink flight plan: none exists",
            ));
        }
        self.manager.copy(PlanIndex::Uplink, PlanIndex::Active)?;
        self.manager.delete(PlanIndex::Uplink);
        self.manager.delete(PlanIndex::Temporary);
        Ok(())
    }

    // ========== CITY PAIR ==========

    /// Replace the plan in `index` with a fresh one from `from` to `to`.
    ///
    /// Airports are looked up before any slot is touched.
    pub async fn new_city_pair(
        &self,
        from: &str,
        to: &str,
        alternate: Option<&str>,
        index: PlanIndex,
    ) -> Result<()> {
        if index == PlanIndex::Temporary {
            return Err(PlanError::illegal_state(
                "cannot create a city pair on the temporary flight plan",
            ));
        }

        let plan =
            FlightPlan::for_city_pair(self.db.as_ref(), index.as_usize(), from, to, alternate)
                .await?;

        if index == PlanIndex::Active {
            self.manager.delete(PlanIndex::Temporary);
        }
        self.manager.install(index, plan);
        tracing::info!("New city pair {} -> {} in {} flight plan", from, to, index);
        Ok(())
    }

    // ========== PROCEDURES ==========

    async fn set_procedure(&self, index: PlanIndex, edit: ProcedureEdit) -> Result<()> {
        let target = self.prepare_destructive_modification(index)?;
        let (epoch, context) = self
            .manager
            .read_with_epoch(target, |p| p.resolution_context())?;

        let resolved = resolve_edit(self.db.as_ref(), &context, &edit).await?;

        self.manager
            .modify_if_current(target, epoch, |p| p.apply_resolved(resolved))?;
        tracing::info!("Applied {:?} to {} flight plan", edit, target);
        Ok(())
    }

    pub async fn set_origin_airport(&self, icao: &str, index: PlanIndex) -> Result<()> {
        self.set_procedure(index, ProcedureEdit::OriginAirport(icao.to_string()))
            .await
    }

    pub async fn set_origin_runway(&self, runway: &str, index: PlanIndex) -> Result<()> {
        self.set_procedure(index, ProcedureEdit::OriginRunway(runway.to_string()))
            .await
    }

    pub async fn set_departure(&self, departure: Option<&str>, index: PlanIndex) -> Result<()> {
        self.set_procedure(index, ProcedureEdit::Departure(departure.map(str::to_string)))
            .await
    }

    pub async fn set_departure_enroute_transition(
        &self,
        transition: Option<&str>,
        index: PlanIndex,
    ) -> Result<()> {
        self.set_procedure(
            index,
            ProcedureEdit::DepartureEnrouteTransition(transition.map(str::to_string)),
        )
        .await
    }

    pub async fn set_arrival_enroute_transition(
        &self,
        transition: Option<&str>,
        index: PlanIndex,
    ) -> Result<()> {
        self.set_procedure(
            index,
            ProcedureEdit::ArrivalEnrouteTransition(transition.map(str::to_string)),
        )
        .await
    }

    pub async fn set_arrival(&self, arrival: Option<&str>, index: PlanIndex) -> Result<()> {
        self.set_procedure(index, ProcedureEdit::Arrival(arrival.map(str::to_string)))
            .await
    }

    pub async fn set_approach_via(&self, via: Option<&str>, index: PlanIndex) -> Result<()> {
        self.set_procedure(index, ProcedureEdit::ApproachVia(via.map(str::to_string)))
            .await
    }

    pub async fn set_approach(&self, approach: Option<&str>, index: PlanIndex) -> Result<()> {
        self.set_procedure(index, ProcedureEdit::Approach(approach.map(str::to_string)))
            .await
    }

    pub async fn set_destination_airport(&self, icao: &str, index: PlanIndex) -> Result<()> {
        self.set_procedure(index, ProcedureEdit::DestinationAirport(icao.to_string()))
            .await
    }

    pub async fn set_destination_runway(&self, runway: &str, index: PlanIndex) -> Result<()> {
        self.set_procedure(index, ProcedureEdit::DestinationRunway(runway.to_string()))
            .await
    }

    // ========== ALTERNATE ==========

    pub async fn set_alternate_destination_airport(
        &self,
        icao: &str,
        index: PlanIndex,
    ) -> Result<()> {
        let target = self.prepare_destructive_modification(index)?;
        let (epoch, origin) = self
            .manager
            .read_with_epoch(target, |p| p.alternate_origin())?;
        let origin = origin?;

        let alternate = build_city_pair(self.db.as_ref(), &origin, icao).await?;

        self.manager.modify_if_current(target, epoch, |p| {
            p.set_alternate(Some(alternate));
            Ok(())
        })?;
        tracing::info!("Alternate {} -> {} in {} flight plan", origin, icao, target);
        Ok(())
    }

    /// Procedure change on the alternate sub-plan.
    pub async fn set_alternate_procedure(&self, edit: ProcedureEdit, index: PlanIndex) -> Result<()> {
        let target = self.prepare_destructive_modification(index)?;
        let (epoch, context) = self
            .manager
            .read_with_epoch(target, |p| p.alternate_resolution_context())?;
        let context = context?;

        let resolved = resolve_edit(self.db.as_ref(), &context, &edit).await?;

        self.manager
            .modify_if_current(target, epoch, |p| p.apply_alternate_resolved(resolved))?;
        tracing::info!("Applied {:?} to {} alternate", edit, target);
        Ok(())
    }

    /// Divert `index` to its alternate.
    pub fn enable_altn(&self, alternate_leg_offset: usize, index: PlanIndex) -> Result<()> {
        self.manager
            .modify(index, |p| p.enable_altn(alternate_leg_offset))
    }

    // ========== ELEMENTS ==========

    /// Delete the element at `element_index`.
    ///
    /// Returns `false` when the configured policy does not allow the revision.
    pub fn delete_element_at(&self, element_index: usize, index: PlanIndex) -> Result<bool> {
        let Some(target) = self.revision_target(index, self.config.tmpy_on_delete_waypoint)? else {
            return Ok(false);
        };
        self.manager
            .modify(target, |p| p.remove_element_at(element_index, false))
    }

    /// Insert a waypoint after `element_index`.
    ///
    /// Returns `false` when the configured policy does not allow the revision.
    pub fn insert_waypoint(&self, element_index: usize, fix: Fix, index: PlanIndex) -> Result<bool> {
        let Some(target) = self.revision_target(index, self.config.tmpy_on_insert_waypoint)? else {
            return Ok(false);
        };
        self.manager
            .modify(target, |p| p.insert_waypoint_after(element_index, fix))?;
        Ok(true)
    }

    /// Like [`Self::insert_waypoint`], looking the fix up by ident first.
    pub async fn insert_waypoint_by_ident(
        &self,
        element_index: usize,
        ident: &str,
        index: PlanIndex,
    ) -> Result<bool> {
        let Some(target) = self.revision_target(index, self.config.tmpy_on_insert_waypoint)? else {
            return Ok(false);
        };
        let epoch = self
            .manager
            .epoch(target)
            .ok_or_else(|| PlanError::illegal_state(format!("no {} flight plan", target)))?;

        let fix = self
            .db
            .get_waypoints(&[ident.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| PlanError::not_found("waypoint", ident))?;

        self.manager.modify_if_current(target, epoch, |p| {
            p.insert_waypoint_after(element_index, fix)
        })?;
        Ok(true)
    }

    pub fn set_overfly(&self, element_index: usize, overfly: bool, index: PlanIndex) -> Result<bool> {
        let Some(target) = self.revision_target(index, self.config.tmpy_on_overfly)? else {
            return Ok(false);
        };
        self.manager
            .modify(target, |p| p.set_overfly_at(element_index, overfly))?;
        Ok(true)
    }

    pub fn toggle_overfly(&self, element_index: usize, index: PlanIndex) -> Result<bool> {
        let Some(target) = self.revision_target(index, self.config.tmpy_on_overfly)? else {
            return Ok(false);
        };
        self.manager
            .modify(target, |p| p.toggle_overfly_at(element_index))?;
        Ok(true)
    }

    // ========== AIRWAYS ==========

    pub fn start_airway_entry(&self, element_index: usize, index: PlanIndex) -> Result<()> {
        let target = self.prepare_destructive_modification(index)?;
        self.manager
            .modify(target, |p| p.start_airway_entry(element_index))
    }

    /// Stage `airway` from the current tail fix to `exit`.
    pub async fn continue_airway_entry(
        &self,
        airway: &str,
        exit: &str,
        index: PlanIndex,
    ) -> Result<()> {
        let (epoch, from) = self.manager.read_with_epoch(index, |p| {
            p.pending_airways().map(|pending| pending.tail_fix().clone())
        })?;
        let from =
            from.ok_or_else(|| PlanError::illegal_state("no airway entry in progress"))?;

        let fixes = resolve_airway(self.db.as_ref(), airway, &from, exit).await?;

        self.manager
            .modify_if_current(index, epoch, |p| p.add_pending_airway(airway, fixes))
    }

    pub fn finalize_airway_entry(&self, index: PlanIndex) -> Result<()> {
        self.manager.modify(index, |p| p.finalize_airway_entry())
    }

    pub fn cancel_airway_entry(&self, index: PlanIndex) -> Result<()> {
        self.manager.modify(index, |p| {
            p.cancel_airway_entry();
            Ok(())
        })
    }

    // ========== NAVIGATION ==========

    /// Stage a direct-to `target` from the present position.
    pub fn direct_to(&self, ppos: &PresentPosition, target: &Fix, index: PlanIndex) -> Result<()> {
        let staged = self.prepare_destructive_modification(index)?;
        self.manager.modify(staged, |p| p.direct_to(ppos, target))
    }

    /// Stage a direct-to the leg at `element_index`.
    pub fn direct_to_leg(
        &self,
        ppos: &PresentPosition,
        element_index: usize,
        index: PlanIndex,
    ) -> Result<()> {
        let staged = self.prepare_destructive_modification(index)?;
        self.manager
            .modify(staged, |p| p.direct_to_leg(ppos, element_index))
    }

    pub fn sequence(&self, index: PlanIndex) -> Result<()> {
        self.manager.modify(index, |p| p.sequence())
    }

    pub fn set_active_leg_index(&self, leg_index: usize, index: PlanIndex) -> Result<()> {
        self.manager
            .modify(index, |p| p.set_active_leg_index(leg_index))
    }

    // ========== FIX INFO ==========

    fn check_fix_info_plan(&self, index: PlanIndex) -> Result<()> {
        if index != PlanIndex::Active && !self.config.allow_non_active_fix_infos {
            return Err(PlanError::illegal_state(
                "FIX INFO can only be modified on the active flight plan",
            ));
        }
        Ok(())
    }

    pub fn set_fix_info_entry(
        &self,
        slot: usize,
        entry: Option<FixInfoEntry>,
        index: PlanIndex,
    ) -> Result<()> {
        self.check_fix_info_plan(index)?;
        self.manager
            .modify(index, |p| p.set_fix_info_entry(slot, entry))
    }

    pub fn edit_fix_info_entry(
        &self,
        slot: usize,
        transform: impl FnOnce(Option<FixInfoEntry>) -> Option<FixInfoEntry>,
        index: PlanIndex,
    ) -> Result<()> {
        self.check_fix_info_plan(index)?;
        self.manager
            .modify(index, |p| p.edit_fix_info_entry(slot, transform))
    }

    // ========== SECONDARIES ==========

    fn secondary(&self, n: usize) -> Result<PlanIndex> {
        if (1..=self.config.num_secondary).contains(&n) {
            Ok(PlanIndex::Secondary(n))
        } else {
            Err(PlanError::InvalidIndex {
                index: n,
                len: self.config.num_secondary,
            })
        }
    }

    pub fn copy_active_to_secondary(&self, n: usize) -> Result<()> {
        let secondary = self.secondary(n)?;
        self.manager.copy(PlanIndex::Active, secondary)
    }

    /// Make secondary `n` the active plan. Any temporary plan is dropped.
    pub fn activate_secondary(&self, n: usize) -> Result<()> {
        let secondary = self.secondary(n)?;
        self.manager.copy(secondary, PlanIndex::Active)?;
        self.manager.delete(PlanIndex::Temporary);
        Ok(())
    }

    /// Empty secondary `n`.
    pub fn delete_secondary(&self, n: usize) -> Result<()> {
        let secondary = self.secondary(n)?;
        self.manager.install(secondary, FlightPlan::new(secondary.as_usize()));
        Ok(())
    }
}
