use serde::{Deserialize, Serialize};

/// Opaque serialized state of one persistable object.
pub type Payload = serde_json::Value;

/// Lowest slot number a game can be saved to.
pub const SLOT_MIN: u32 = 1;
/// Highest slot number a game can be saved to.
pub const SLOT_MAX: u32 = 9999;
/// Address used for data shared across every slot.
pub const SHARED_SLOT: u32 = 0;

const STORAGE_KEY_PREFIX: &str = "data";

/// How a subscriber gets its state back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum LoadMode {
    /// Restores itself when it subscribes, from the pending cache or the loaded slot.
    /// `Load` skips lazy subscribers.
    #[default]
    Lazy,
    /// Restored by `Load` in priority order. Shared greedy objects also restore
    /// from slot 0 the moment they subscribe.
    Greedy,
}

/// Phase of the coordinator. Only one non-idle phase can be active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Phase {
    #[default]
    Idle,
    Saving,
    Loading,
    Deleting,
}

/// Outcome of a Save/Load/Delete request that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationStatus {
    /// The operation ran to completion and fired its after-event.
    Completed,
    /// Another operation was in flight; nothing happened.
    Busy,
    /// `load_latest` found no save to load.
    NoSave,
}

impl OperationStatus {
    pub fn is_completed(&self) -> bool {
        matches!(self, OperationStatus::Completed)
    }
}

pub fn clamp_slot(slot: u32) -> u32 {
    slot.clamp(SLOT_MIN, SLOT_MAX)
}

/// Flat key under which the backend stores one identity's blob.
///
/// Shared data always lives at slot 0, everything else at the clamped slot.
pub fn storage_key(slot: u32, is_shared: bool, identity: &str) -> String {
    let slot = if is_shared { SHARED_SLOT } else { clamp_slot(slot) };
    format!("{}-{:04}-{}", STORAGE_KEY_PREFIX, slot, identity)
}
