//! Registry of save slots.
//!
//! Tracks which slots hold a save, which identities each one stores and which
//! slot was written last. The registry is itself a shared, greedy
//! [`GameSave`], so it lives at slot 0 and is current as soon as it subscribes.

use crate::core::{GameSave, LoadMode, Payload, Result, SaveError, clamp_slot};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Mutex;

pub const DEFAULT_SLOT_REGISTRY_ID: &str = "slots";

/// What one slot holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotData {
    /// Per-slot identities, in the order they were first captured.
    pub keys: Vec<String>,
    /// Shared identities captured by the same save. They live at slot 0.
    pub shared_keys: Vec<String>,
    /// Write order across all slots. Highest is the latest save.
    pub sequence: u64,
    pub saved_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SlotRecord {
    slot: u32,
    data: SlotData,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct SlotTable {
    next_sequence: u64,
    slots: Vec<SlotRecord>,
}

impl SlotTable {
    fn into_map(self) -> (u64, BTreeMap<u32, SlotData>) {
        let slots = self
            .slots
            .into_iter()
            .map(|record| (record.slot, record.data))
            .collect();
        (self.next_sequence, slots)
    }
}

#[derive(Debug, Default)]
struct SlotState {
    next_sequence: u64,
    slots: BTreeMap<u32, SlotData>,
}

pub struct SlotRegistry {
    save_id: String,
    state: Mutex<SlotState>,
}

impl SlotRegistry {
    pub fn new(save_id: impl Into<String>) -> Self {
        Self {
            save_id: save_id.into(),
            state: Mutex::new(SlotState::default()),
        }
    }

    /// Overwrites the entry for `slot` and marks it as the latest save.
    pub fn update(&self, slot: u32, keys: Vec<String>, shared_keys: Vec<String>) -> Result<()> {
        let slot = clamp_slot(slot);
        let mut state = self.state.lock()?;
        let sequence = state.next_sequence;
        state.next_sequence += 1;
        state.slots.insert(
            slot,
            SlotData {
                keys,
                shared_keys,
                sequence,
                saved_at: Utc::now(),
            },
        );
        Ok(())
    }

    pub fn remove(&self, slot: u32) -> Result<Option<SlotData>> {
        Ok(self.state.lock()?.slots.remove(&clamp_slot(slot)))
    }

    pub fn get(&self, slot: u32) -> Result<Option<SlotData>> {
        Ok(self.state.lock()?.slots.get(&clamp_slot(slot)).cloned())
    }

    pub fn has_save(&self) -> Result<bool> {
        Ok(!self.state.lock()?.slots.is_empty())
    }

    pub fn has_save_at(&self, slot: u32) -> Result<bool> {
        Ok(self.state.lock()?.slots.contains_key(&clamp_slot(slot)))
    }

    /// Most recently written slot, if any.
    pub fn latest_slot(&self) -> Result<Option<u32>> {
        let state = self.state.lock()?;
        Ok(state
            .slots
            .iter()
            .max_by_key(|(_, data)| data.sequence)
            .map(|(slot, _)| *slot))
    }

    /// All slots in ascending order.
    pub fn slots(&self) -> Result<Vec<(u32, SlotData)>> {
        let state = self.state.lock()?;
        Ok(state
            .slots
            .iter()
            .map(|(slot, data)| (*slot, data.clone()))
            .collect())
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.state.lock()?.slots.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        self.has_save().map(|has| !has)
    }
}

#[async_trait]
impl GameSave for SlotRegistry {
    fn save_id(&self) -> String {
        self.save_id.clone()
    }

    fn is_shared(&self) -> bool {
        true
    }

    fn load_mode(&self) -> LoadMode {
        LoadMode::Greedy
    }

    fn save_data(&self) -> Result<Payload> {
        let state = self.state.lock()?;
        let table = SlotTable {
            next_sequence: state.next_sequence,
            slots: state
                .slots
                .iter()
                .map(|(slot, data)| SlotRecord {
                    slot: *slot,
                    data: data.clone(),
                })
                .collect(),
        };
        Ok(serde_json::to_value(table)?)
    }

    async fn on_load(&self, payload: Option<Payload>) -> Result<()> {
        let table = match payload {
            Some(payload) => serde_json::from_value::<SlotTable>(payload)
                .map_err(|e| SaveError::restore(&self.save_id, e))?,
            None => SlotTable::default(),
        };
        let (next_sequence, slots) = table.into_map();
        let mut state = self.state.lock()?;
        state.next_sequence = next_sequence;
        state.slots = slots;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn keys(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_empty_registry() {
        let registry = SlotRegistry::new(DEFAULT_SLOT_REGISTRY_ID);
        assert!(!registry.has_save().unwrap());
        assert!(registry.is_empty().unwrap());
        assert_eq!(registry.latest_slot().unwrap(), None);
    }

    #[test]
    fn test_latest_follows_last_update() {
        let registry = SlotRegistry::new(DEFAULT_SLOT_REGISTRY_ID);
        registry.update(7, keys(&["a"]), vec![]).unwrap();
        registry.update(3, keys(&["a"]), vec![]).unwrap();
        assert_eq!(registry.latest_slot().unwrap(), Some(3));

        registry.update(7, keys(&["a", "b"]), vec![]).unwrap();
        assert_eq!(registry.latest_slot().unwrap(), Some(7));
        assert_eq!(registry.get(7).unwrap().unwrap().keys, keys(&["a", "b"]));

        registry.remove(7).unwrap();
        assert_eq!(registry.latest_slot().unwrap(), Some(3));
        assert_eq!(registry.len().unwrap(), 1);
    }

    #[test]
    fn test_slot_numbers_are_clamped() {
        let registry = SlotRegistry::new(DEFAULT_SLOT_REGISTRY_ID);
        registry.update(0, keys(&["a"]), vec![]).unwrap();
        registry.update(50_000, keys(&["a"]), vec![]).unwrap();

        assert!(registry.has_save_at(1).unwrap());
        assert!(registry.has_save_at(9999).unwrap());
        let slots: Vec<_> = registry.slots().unwrap().into_iter().map(|(s, _)| s).collect();
        assert_eq!(slots, vec![1, 9999]);
    }

    #[tokio::test]
    async fn test_round_trips_through_payload() {
        let registry = SlotRegistry::new(DEFAULT_SLOT_REGISTRY_ID);
        registry
            .update(2, keys(&["player", "chest"]), keys(&["options"]))
            .unwrap();
        registry.update(5, keys(&["player"]), vec![]).unwrap();
        let payload = registry.save_data().unwrap();

        let restored = SlotRegistry::new(DEFAULT_SLOT_REGISTRY_ID);
        restored.on_load(Some(payload)).await.unwrap();
        assert_eq!(restored.slots().unwrap(), registry.slots().unwrap());
        assert_eq!(restored.latest_slot().unwrap(), Some(5));

        restored.update(2, keys(&["player"]), vec![]).unwrap();
        assert_eq!(restored.latest_slot().unwrap(), Some(2));
    }

    #[tokio::test]
    async fn test_missing_payload_resets() {
        let registry = SlotRegistry::new(DEFAULT_SLOT_REGISTRY_ID);
        registry.update(1, keys(&["a"]), vec![]).unwrap();
        registry.on_load(None).await.unwrap();
        assert!(!registry.has_save().unwrap());
    }

    #[tokio::test]
    async fn test_malformed_payload_is_restore_error() {
        let registry = SlotRegistry::new(DEFAULT_SLOT_REGISTRY_ID);
        let err = registry.on_load(Some(json!("nope"))).await.unwrap_err();
        assert!(matches!(err, SaveError::Restore { identity, .. } if identity == "slots"));
    }

    #[test]
    fn test_registry_is_shared_and_greedy() {
        let registry = SlotRegistry::new("custom-slots");
        assert_eq!(registry.save_id(), "custom-slots");
        assert!(registry.is_shared());
        assert_eq!(registry.load_mode(), LoadMode::Greedy);
    }
}
