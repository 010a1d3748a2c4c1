use crate::slots::DEFAULT_SLOT_REGISTRY_ID;

/// Slot registry restores before anything with a lower priority.
pub const DEFAULT_SLOT_REGISTRY_PRIORITY: i32 = 100;

/// Coordinator configuration
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Identity the slot registry is stored under (at slot 0)
    pub slot_registry_id: String,

    /// Restore priority of the slot registry
    pub slot_registry_priority: i32,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            slot_registry_id: DEFAULT_SLOT_REGISTRY_ID.to_string(),
            slot_registry_priority: DEFAULT_SLOT_REGISTRY_PRIORITY,
        }
    }
}

impl CoordinatorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the identity of the slot registry record
    pub fn slot_registry_id(mut self, id: &str) -> Self {
        self.slot_registry_id = id.to_string();
        self
    }

    /// Set the restore priority of the slot registry
    pub fn slot_registry_priority(mut self, priority: i32) -> Self {
        self.slot_registry_priority = priority;
        self
    }
}
