//! In-memory plan slots using DashMap.
//!
//! Every slot carries an epoch, renewed whenever the slot is created, replaced
//! or overwritten by a copy. Lookups that suspend capture the epoch first and
//! commit through [`FlightPlanManager::modify_if_current`], so a result for a
//! slot that was deleted or replaced in the meantime is dropped.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use fpm_core::{FlightPlan, PlanError, Result};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;

use crate::events::SyncEvent;
use crate::index::PlanIndex;

struct PlanSlot {
    plan: FlightPlan,
    epoch: u64,
    created_at: DateTime<Utc>,
}

/// Condensed view of one slot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlotSummary {
    pub plan: PlanIndex,
    pub version: u64,
    pub epoch: u64,
    pub leg_count: usize,
    pub active_leg_index: usize,
    pub origin: Option<String>,
    pub destination: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Plan slots plus the notification channel.
pub struct FlightPlanManager {
    slots: DashMap<PlanIndex, PlanSlot>,
    epoch_counter: AtomicU64,
    tx: broadcast::Sender<SyncEvent>,
}

impl FlightPlanManager {
    pub fn new(event_capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(event_capacity.max(1));
        Self {
            slots: DashMap::new(),
            epoch_counter: AtomicU64::new(1),
            tx,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.tx.subscribe()
    }

    fn next_epoch(&self) -> u64 {
        self.epoch_counter.fetch_add(1, Ordering::SeqCst)
    }

    fn send(&self, event: SyncEvent) {
        // Nobody listening is fine
        let _ = self.tx.send(event);
    }

    fn missing(index: PlanIndex) -> PlanError {
        PlanError::illegal_state(format!("no {} flight plan", index))
    }

    pub fn has(&self, index: PlanIndex) -> bool {
        self.slots.contains_key(&index)
    }

    pub fn epoch(&self, index: PlanIndex) -> Option<u64> {
        self.slots.get(&index).map(|slot| slot.epoch)
    }

    /// Create an empty plan in a free slot.
    pub fn create(&self, index: PlanIndex) -> Result<()> {
        if self.has(index) {
            return Err(PlanError::illegal_state(format!(
                "{} flight plan already exists",
                index
            )));
        }
        self.install(index, FlightPlan::new(index.as_usize()));
        Ok(())
    }

    /// Put `plan` into `index`, replacing whatever was there.
    pub fn install(&self, index: PlanIndex, plan: FlightPlan) {
        let plan = if plan.index() == index.as_usize() {
            plan
        } else {
            plan.clone_for(index.as_usize())
        };
        let version = plan.version();
        let slot = PlanSlot {
            plan,
            epoch: self.next_epoch(),
            created_at: Utc::now(),
        };
        self.slots.insert(index, slot);
        tracing::info!("Created {} flight plan", index);
        self.send(SyncEvent::PlanCreated { plan: index });
        self.send(SyncEvent::VersionChanged {
            plan: index,
            version,
        });
    }

    /// Returns whether a plan was removed.
    pub fn delete(&self, index: PlanIndex) -> bool {
        let removed = self.slots.remove(&index).is_some();
        if removed {
            tracing::info!("Deleted {} flight plan", index);
            self.send(SyncEvent::PlanDeleted { plan: index });
        }
        removed
    }

    pub fn delete_all(&self) {
        self.slots.clear();
        tracing::info!("Deleted all flight plans");
        self.send(SyncEvent::AllPlansDeleted);
    }

    /// Deep copy `from` over `to`. The target gets a fresh epoch.
    pub fn copy(&self, from: PlanIndex, to: PlanIndex) -> Result<()> {
        let plan = self
            .slots
            .get(&from)
            .map(|slot| slot.plan.clone_for(to.as_usize()))
            .ok_or_else(|| Self::missing(from))?;
        let version = plan.version();

        let slot = PlanSlot {
            plan,
            epoch: self.next_epoch(),
            created_at: Utc::now(),
        };
        self.slots.insert(to, slot);
        tracing::info!("Copied {} flight plan to {}", from, to);
        self.send(SyncEvent::PlanCopied { from, to });
        self.send(SyncEvent::VersionChanged { plan: to, version });
        Ok(())
    }

    pub fn read<T>(&self, index: PlanIndex, f: impl FnOnce(&FlightPlan) -> T) -> Result<T> {
        self.slots
            .get(&index)
            .map(|slot| f(&slot.plan))
            .ok_or_else(|| Self::missing(index))
    }

    /// Read together with the slot epoch, before a lookup suspends.
    pub fn read_with_epoch<T>(
        &self,
        index: PlanIndex,
        f: impl FnOnce(&FlightPlan) -> T,
    ) -> Result<(u64, T)> {
        self.slots
            .get(&index)
            .map(|slot| (slot.epoch, f(&slot.plan)))
            .ok_or_else(|| Self::missing(index))
    }

    /// Run `f` on the plan and publish its version change and plan events.
    pub fn modify<T>(
        &self,
        index: PlanIndex,
        f: impl FnOnce(&mut FlightPlan) -> Result<T>,
    ) -> Result<T> {
        self.modify_checked(index, None, f)
    }

    /// Like [`Self::modify`], but only while the slot still has `epoch`.
    pub fn modify_if_current<T>(
        &self,
        index: PlanIndex,
        epoch: u64,
        f: impl FnOnce(&mut FlightPlan) -> Result<T>,
    ) -> Result<T> {
        self.modify_checked(index, Some(epoch), f)
    }

    fn modify_checked<T>(
        &self,
        index: PlanIndex,
        epoch: Option<u64>,
        f: impl FnOnce(&mut FlightPlan) -> Result<T>,
    ) -> Result<T> {
        let (output, version, events) = {
            let Some(mut slot) = self.slots.get_mut(&index) else {
                return Err(match epoch {
                    Some(_) => {
                        tracing::warn!("Dropping lookup result: {} flight plan is gone", index);
                        PlanError::Superseded {
                            slot: index.as_usize(),
                        }
                    }
                    None => Self::missing(index),
                });
            };
            if epoch.is_some_and(|e| e != slot.epoch) {
                tracing::warn!("Dropping lookup result: {} flight plan was replaced", index);
                return Err(PlanError::Superseded {
                    slot: index.as_usize(),
                });
            }

            let before = slot.plan.version();
            let result = f(&mut slot.plan);
            let after = slot.plan.version();
            let events = slot.plan.take_events();
            (result, (after != before).then_some(after), events)
        };

        for event in events {
            self.send(SyncEvent::Plan { plan: index, event });
        }
        if let Some(version) = version {
            self.send(SyncEvent::VersionChanged {
                plan: index,
                version,
            });
        }
        output
    }

    /// One summary per existing slot, in slot order.
    pub fn summaries(&self) -> Vec<SlotSummary> {
        let mut summaries: Vec<SlotSummary> = self
            .slots
            .iter()
            .map(|entry| {
                let slot = entry.value();
                let procedures = slot.plan.procedures();
                SlotSummary {
                    plan: *entry.key(),
                    version: slot.plan.version(),
                    epoch: slot.epoch,
                    leg_count: slot.plan.leg_count(),
                    active_leg_index: slot.plan.active_leg_index(),
                    origin: procedures.origin_airport.as_ref().map(|a| a.ident.clone()),
                    destination: procedures
                        .destination_airport
                        .as_ref()
                        .map(|a| a.ident.clone()),
                    created_at: slot.created_at,
                }
            })
            .collect();
        summaries.sort_by_key(|s| s.plan);
        summaries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fpm_core::{Coordinates, Fix, FlightPlanElement, FlightPlanLeg};

    fn fix(ident: &str) -> Fix {
        Fix::new(ident, "CY", Coordinates::new(44.0, -79.0))
    }

    fn leg(ident: &str) -> FlightPlanElement {
        FlightPlanLeg::from_enroute_waypoint(fix(ident), None).into()
    }

    #[test]
    fn test_create_twice_is_illegal() {
        let manager = FlightPlanManager::new(8);
        manager.create(PlanIndex::Active).unwrap();
        assert!(matches!(
            manager.create(PlanIndex::Active),
            Err(PlanError::IllegalState(_))
        ));
    }

    #[test]
    fn test_copy_renews_epoch_and_reindexes() {
        let manager = FlightPlanManager::new(8);
        manager.create(PlanIndex::Active).unwrap();
        manager.create(PlanIndex::Temporary).unwrap();
        let before = manager.epoch(PlanIndex::Temporary).unwrap();

        manager.copy(PlanIndex::Active, PlanIndex::Temporary).unwrap();

        assert!(manager.epoch(PlanIndex::Temporary).unwrap() > before);
        let index = manager.read(PlanIndex::Temporary, |p| p.index()).unwrap();
        assert_eq!(index, PlanIndex::Temporary.as_usize());
    }

    #[test]
    fn test_copy_from_missing_slot() {
        let manager = FlightPlanManager::new(8);
        assert!(matches!(
            manager.copy(PlanIndex::Uplink, PlanIndex::Active),
            Err(PlanError::IllegalState(_))
        ));
        assert!(!manager.has(PlanIndex::Active));
    }

    #[test]
    fn test_stale_epoch_is_superseded() {
        let manager = FlightPlanManager::new(8);
        manager.create(PlanIndex::Secondary(1)).unwrap();
        let (epoch, _) = manager
            .read_with_epoch(PlanIndex::Secondary(1), |p| p.version())
            .unwrap();

        manager.delete(PlanIndex::Secondary(1));
        manager.create(PlanIndex::Secondary(1)).unwrap();

        let result = manager.modify_if_current(PlanIndex::Secondary(1), epoch, |p| {
            p.insert_element_after(0, leg("AAA"))
        });
        assert_eq!(result, Err(PlanError::Superseded { slot: 3 }));
    }

    #[test]
    fn test_modify_missing_slot() {
        let manager = FlightPlanManager::new(8);
        assert!(matches!(
            manager.modify(PlanIndex::Active, |p| p.sequence()),
            Err(PlanError::IllegalState(_))
        ));
        assert!(matches!(
            manager.modify_if_current(PlanIndex::Active, 1, |p| p.sequence()),
            Err(PlanError::Superseded { slot: 0 })
        ));
    }

    #[test]
    fn test_events_for_modification() {
        let manager = FlightPlanManager::new(8);
        manager.create(PlanIndex::Active).unwrap();
        let mut rx = manager.subscribe();

        manager
            .modify(PlanIndex::Active, |p| {
                p.set_fix_info_entry(1, Some(fpm_core::FixInfoEntry::new(fix("AAA"))))
            })
            .unwrap();

        assert!(matches!(
            rx.try_recv().unwrap(),
            SyncEvent::Plan {
                plan: PlanIndex::Active,
                event: fpm_core::PlanEvent::FixInfoChanged { slot: 1, .. }
            }
        ));
        assert_eq!(
            rx.try_recv().unwrap(),
            SyncEvent::VersionChanged {
                plan: PlanIndex::Active,
                version: 1
            }
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_failed_modification_sends_nothing() {
        let manager = FlightPlanManager::new(8);
        manager.create(PlanIndex::Active).unwrap();
        let mut rx = manager.subscribe();

        assert!(manager
            .modify(PlanIndex::Active, |p| p.remove_element_at(3, false))
            .is_err());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_summaries_in_slot_order() {
        let manager = FlightPlanManager::new(8);
        manager.create(PlanIndex::Secondary(2)).unwrap();
        manager.create(PlanIndex::Active).unwrap();
        manager.create(PlanIndex::Uplink).unwrap();

        let plans: Vec<_> = manager.summaries().iter().map(|s| s.plan).collect();
        assert_eq!(
            plans,
            vec![PlanIndex::Active, PlanIndex::Uplink, PlanIndex::Secondary(2)]
        );
    }
}
