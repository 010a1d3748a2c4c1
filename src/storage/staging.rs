use crate::core::Payload;
use std::collections::BTreeMap;

/// Committed blobs plus the changes staged since the last commit.
///
/// A staged `None` is a pending delete.
#[derive(Debug, Default, Clone)]
pub struct BlobStage {
    committed: BTreeMap<String, Payload>,
    staged: BTreeMap<String, Option<Payload>>,
}

impl BlobStage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_committed(committed: BTreeMap<String, Payload>) -> Self {
        Self {
            committed,
            staged: BTreeMap::new(),
        }
    }

    /// Reads through staged changes first.
    pub fn get(&self, key: &str) -> Option<Payload> {
        match self.staged.get(key) {
            Some(staged) => staged.clone(),
            None => self.committed.get(key).cloned(),
        }
    }

    pub fn set(&mut self, key: &str, payload: Payload) {
        self.staged.insert(key.to_string(), Some(payload));
    }

    pub fn delete(&mut self, key: &str) {
        self.staged.insert(key.to_string(), None);
    }

    pub fn is_dirty(&self) -> bool {
        !self.staged.is_empty()
    }

    /// Committed state as it will look once the staged changes are applied.
    pub fn merged(&self) -> BTreeMap<String, Payload> {
        let mut merged = self.committed.clone();
        for (key, change) in &self.staged {
            match change {
                Some(payload) => {
                    merged.insert(key.clone(), payload.clone());
                }
                None => {
                    merged.remove(key);
                }
            }
        }
        merged
    }

    /// Replaces the committed state and drops the staged changes.
    pub fn finish_commit(&mut self, committed: BTreeMap<String, Payload>) {
        self.committed = committed;
        self.staged.clear();
    }

    pub fn committed(&self) -> &BTreeMap<String, Payload> {
        &self.committed
    }
}
