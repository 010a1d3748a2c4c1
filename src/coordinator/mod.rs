//! Save/load coordinator.
//!
//! Owns the subscription registry, the pending value cache and the slot
//! registry, and drives the storage backend. Save, Load and Delete exclude each
//! other: a request made while another operation is in flight is dropped and
//! reported as [`OperationStatus::Busy`] without firing any event.

pub mod config;
mod phase;

pub use config::{CoordinatorConfig, DEFAULT_SLOT_REGISTRY_PRIORITY};

use crate::core::{
    GameSave, LoadMode, OperationStatus, Payload, Phase, Result, SHARED_SLOT, clamp_slot,
    storage_key,
};
use crate::events::{EventBus, SaveEvent};
use crate::registry::{SubscriberRef, SubscriptionRegistry};
use crate::slots::{SlotData, SlotRegistry};
use crate::storage::DataStorage;
use phase::PhaseCell;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{Instrument, Level, event, info_span};

const NO_SLOT_LOADED: u32 = 0;

pub struct SnapshotCoordinator {
    config: CoordinatorConfig,
    storage: Arc<dyn DataStorage>,
    subscriptions: Mutex<SubscriptionRegistry>,
    slots: Arc<SlotRegistry>,
    slot_loaded: AtomicU32,
    phase: PhaseCell,
    shutting_down: AtomicBool,
    events: EventBus,
}

impl SnapshotCoordinator {
    /// Creates a coordinator over `storage` and restores the slot registry from slot 0.
    pub async fn open(storage: Arc<dyn DataStorage>, config: CoordinatorConfig) -> Result<Self> {
        let slots = Arc::new(SlotRegistry::new(config.slot_registry_id.clone()));
        let coordinator = Self {
            config,
            storage,
            subscriptions: Mutex::new(SubscriptionRegistry::new()),
            slots: Arc::clone(&slots),
            slot_loaded: AtomicU32::new(NO_SLOT_LOADED),
            phase: PhaseCell::default(),
            shutting_down: AtomicBool::new(false),
            events: EventBus::new(),
        };

        let priority = coordinator.config.slot_registry_priority;
        coordinator.subscribe(slots, priority).await?;
        let slot_count = coordinator.slots.len()?;
        event!(Level::DEBUG, slots = slot_count, "snapshot coordinator opened");
        Ok(coordinator)
    }

    // ========================================================================
    // Registry
    // ========================================================================

    /// Registers `target` for persistence, replacing any subscription with the same identity.
    ///
    /// Lazy targets restore right away from the pending cache or, when a game
    /// is loaded, from the loaded slot. Greedy shared targets restore right away
    /// from slot 0. Everything else waits for [`load`](Self::load).
    pub async fn subscribe(&self, target: Arc<dyn GameSave>, priority: i32) -> Result<()> {
        if self.is_shutting_down() {
            event!(Level::DEBUG, "subscribe ignored during shutdown");
            return Ok(());
        }

        let (subscription, cached) = {
            let mut registry = self.subscriptions.lock()?;
            let subscription = registry.register(&target, priority);
            let cached = registry.cached_value(&subscription.identity);
            (subscription, cached)
        };
        event!(
            Level::TRACE,
            identity = %subscription.identity,
            priority,
            load_mode = ?subscription.load_mode,
            shared = subscription.is_shared,
            "subscribed"
        );

        match subscription.load_mode {
            LoadMode::Lazy => {
                if let Some(payload) = cached {
                    target.on_load(Some(payload)).await?;
                } else if let Some(slot) = self.slot_loaded() {
                    self.load_item(target.as_ref(), slot).await?;
                }
            }
            LoadMode::Greedy => {
                if subscription.is_shared {
                    self.load_item(target.as_ref(), SHARED_SLOT).await?;
                }
            }
        }
        Ok(())
    }

    /// Caches the current state of `target` so a later save still sees it
    /// after the object is gone.
    ///
    /// Ignored while loading and during shutdown.
    pub fn unsubscribe(&self, target: &dyn GameSave) -> Result<()> {
        if self.is_shutting_down() || self.is_loading() {
            return Ok(());
        }

        let identity = target.save_id();
        let payload = target.save_data()?;
        self.subscriptions
            .lock()?
            .store_value(&identity, payload, target.is_shared());
        event!(Level::TRACE, identity = %identity, "unsubscribed");
        Ok(())
    }

    /// Number of subscriptions whose object is still alive.
    pub fn subscriber_count(&self) -> Result<usize> {
        Ok(self.subscriptions.lock()?.live_count())
    }

    pub fn is_subscribed(&self, identity: &str) -> Result<bool> {
        Ok(self.subscriptions.lock()?.is_subscribed(identity))
    }

    /// Last cached snapshot of `identity`, if any.
    pub fn pending_value(&self, identity: &str) -> Result<Option<Payload>> {
        Ok(self.subscriptions.lock()?.cached_value(identity))
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn has_save(&self) -> Result<bool> {
        self.slots.has_save()
    }

    pub fn has_save_at(&self, slot: u32) -> Result<bool> {
        self.slots.has_save_at(slot)
    }

    pub fn latest_slot(&self) -> Result<Option<u32>> {
        self.slots.latest_slot()
    }

    pub fn slots(&self) -> Result<Vec<(u32, SlotData)>> {
        self.slots.slots()
    }

    pub fn slot_data(&self, slot: u32) -> Result<Option<SlotData>> {
        self.slots.get(slot)
    }

    /// Slot of the last `load`, if any.
    pub fn slot_loaded(&self) -> Option<u32> {
        match self.slot_loaded.load(Ordering::SeqCst) {
            NO_SLOT_LOADED => None,
            slot => Some(slot),
        }
    }

    pub fn is_game_loaded(&self) -> bool {
        self.slot_loaded().is_some()
    }

    pub fn phase(&self) -> Phase {
        self.phase.current()
    }

    pub fn is_saving(&self) -> bool {
        self.phase() == Phase::Saving
    }

    pub fn is_loading(&self) -> bool {
        self.phase() == Phase::Loading
    }

    pub fn is_deleting(&self) -> bool {
        self.phase() == Phase::Deleting
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn storage(&self) -> &Arc<dyn DataStorage> {
        &self.storage
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// From now on `subscribe` and `unsubscribe` do nothing.
    pub fn begin_shutdown(&self) {
        self.shutting_down.store(true, Ordering::SeqCst);
        event!(Level::DEBUG, "snapshot coordinator shutting down");
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    // ========================================================================
    // Operations
    // ========================================================================

    /// Captures every live subscriber and writes all known state to `slot`.
    pub async fn save(&self, slot: u32) -> Result<OperationStatus> {
        let slot = clamp_slot(slot);
        self.save_slot(slot)
            .instrument(info_span!("saveload.save", slot))
            .await
    }

    /// Restores greedy subscribers from `slot`, highest priority first.
    pub async fn load(&self, slot: u32) -> Result<OperationStatus> {
        self.load_with(slot, || {}).await
    }

    /// Like [`load`](Self::load), running `callback` once restoring is done and
    /// before the after-load event.
    pub async fn load_with<F>(&self, slot: u32, callback: F) -> Result<OperationStatus>
    where
        F: FnOnce() + Send,
    {
        let slot = clamp_slot(slot);
        self.load_slot(slot, callback)
            .instrument(info_span!("saveload.load", slot))
            .await
    }

    pub async fn load_latest(&self) -> Result<OperationStatus> {
        self.load_latest_with(|| {}).await
    }

    pub async fn load_latest_with<F>(&self, callback: F) -> Result<OperationStatus>
    where
        F: FnOnce() + Send,
    {
        match self.slots.latest_slot()? {
            Some(slot) => self.load_with(slot, callback).await,
            None => {
                event!(Level::DEBUG, "load latest skipped, no save exists");
                Ok(OperationStatus::NoSave)
            }
        }
    }

    /// Removes every per-slot key stored for `slot`. Shared data is kept.
    pub async fn delete(&self, slot: u32) -> Result<OperationStatus> {
        let slot = clamp_slot(slot);
        self.delete_slot(slot)
            .instrument(info_span!("saveload.delete", slot))
            .await
    }

    async fn save_slot(&self, slot: u32) -> Result<OperationStatus> {
        if !self.phase.is_idle() {
            return Ok(self.reject_busy("save"));
        }
        self.events.publish(SaveEvent::BeforeSave(slot))?;
        let Some(guard) = self.phase.try_enter(Phase::Saving) else {
            return Ok(self.reject_busy("save"));
        };

        let targets = self.subscriptions.lock()?.live_targets();
        let mut captured = Vec::with_capacity(targets.len());
        for (subscription, target) in &targets {
            captured.push((
                subscription.identity.clone(),
                target.save_data()?,
                subscription.is_shared,
            ));
        }

        let values = {
            let mut registry = self.subscriptions.lock()?;
            for (identity, payload, is_shared) in captured {
                registry.store_value(&identity, payload, is_shared);
            }
            let (keys, shared_keys) = registry.known_identities();
            self.slots.update(slot, keys, shared_keys)?;
            // The registry was captured before this update.
            registry.store_value(&self.slots.save_id(), self.slots.save_data()?, true);
            let pruned = registry.prune_expired();
            if pruned > 0 {
                event!(Level::TRACE, pruned, "expired subscriptions pruned");
            }
            registry.pending_values()
        };

        let written = values.len();
        for (identity, value) in values {
            let key = storage_key(slot, value.is_shared, &identity);
            self.storage.set_blob(&key, value.payload).await?;
        }
        self.storage.commit().await?;

        drop(guard);
        event!(Level::INFO, blobs = written, "game saved");
        self.events.publish(SaveEvent::AfterSave(slot))?;
        Ok(OperationStatus::Completed)
    }

    async fn load_slot<F>(&self, slot: u32, callback: F) -> Result<OperationStatus>
    where
        F: FnOnce() + Send,
    {
        if !self.phase.is_idle() {
            return Ok(self.reject_busy("load"));
        }
        self.events.publish(SaveEvent::BeforeLoad(slot))?;
        let Some(guard) = self.phase.try_enter(Phase::Loading) else {
            return Ok(self.reject_busy("load"));
        };

        self.slot_loaded.store(slot, Ordering::SeqCst);
        let ordered = {
            let mut registry = self.subscriptions.lock()?;
            registry.clear_values();
            registry.restore_order()
        };

        let mut restored = 0usize;
        for subscription in ordered {
            if subscription.load_mode == LoadMode::Lazy {
                continue;
            }
            let target = match subscription.resolve() {
                SubscriberRef::Live(target) => target,
                SubscriberRef::Expired => continue,
            };
            self.load_item(target.as_ref(), slot).await?;
            restored += 1;
        }

        drop(guard);
        event!(Level::INFO, restored, "game loaded");
        callback();
        self.events.publish(SaveEvent::AfterLoad(slot))?;
        Ok(OperationStatus::Completed)
    }

    async fn delete_slot(&self, slot: u32) -> Result<OperationStatus> {
        if !self.phase.is_idle() {
            return Ok(self.reject_busy("delete"));
        }
        self.events.publish(SaveEvent::BeforeDelete(slot))?;
        let Some(guard) = self.phase.try_enter(Phase::Deleting) else {
            return Ok(self.reject_busy("delete"));
        };

        match self.slots.get(slot)? {
            Some(data) => {
                for identity in data.keys.iter().rev() {
                    self.storage
                        .delete_key(&storage_key(slot, false, identity))
                        .await?;
                }
                self.slots.remove(slot)?;

                let key = storage_key(slot, true, &self.slots.save_id());
                self.storage.set_blob(&key, self.slots.save_data()?).await?;
                self.storage.commit().await?;
                event!(Level::INFO, keys = data.keys.len(), "slot deleted");
            }
            None => {
                event!(Level::DEBUG, "delete skipped, slot has no save");
            }
        }

        drop(guard);
        self.events.publish(SaveEvent::AfterDelete(slot))?;
        Ok(OperationStatus::Completed)
    }

    async fn load_item(&self, target: &dyn GameSave, slot: u32) -> Result<()> {
        let key = storage_key(slot, target.is_shared(), &target.save_id());
        let blob = self.storage.get_blob(&key).await?;
        event!(Level::TRACE, key = %key, found = blob.is_some(), "restoring");
        target.on_load(blob).await
    }

    fn reject_busy(&self, operation: &'static str) -> OperationStatus {
        event!(
            Level::DEBUG,
            operation,
            phase = ?self.phase(),
            "operation rejected, coordinator busy"
        );
        OperationStatus::Busy
    }
}
