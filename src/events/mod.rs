//! Before/after notifications for save, load and delete.

use crate::core::Result;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SaveEvent {
    BeforeSave(u32),
    AfterSave(u32),
    BeforeLoad(u32),
    AfterLoad(u32),
    BeforeDelete(u32),
    AfterDelete(u32),
}

impl SaveEvent {
    pub fn slot(&self) -> u32 {
        match *self {
            SaveEvent::BeforeSave(slot)
            | SaveEvent::AfterSave(slot)
            | SaveEvent::BeforeLoad(slot)
            | SaveEvent::AfterLoad(slot)
            | SaveEvent::BeforeDelete(slot)
            | SaveEvent::AfterDelete(slot) => slot,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SaveEvent::BeforeSave(_) => "before_save",
            SaveEvent::AfterSave(_) => "after_save",
            SaveEvent::BeforeLoad(_) => "before_load",
            SaveEvent::AfterLoad(_) => "after_load",
            SaveEvent::BeforeDelete(_) => "before_delete",
            SaveEvent::AfterDelete(_) => "after_delete",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

pub type Listener = Arc<dyn Fn(&SaveEvent) + Send + Sync>;

#[derive(Default)]
struct ListenerList {
    next_id: u64,
    listeners: Vec<(ListenerId, Listener)>,
}

/// Observer list published to synchronously by the coordinator.
///
/// Listeners run outside the internal lock, so a listener may add or remove
/// listeners. Changes apply from the next publish.
#[derive(Default)]
pub struct EventBus {
    inner: Mutex<ListenerList>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, listener: F) -> Result<ListenerId>
    where
        F: Fn(&SaveEvent) + Send + Sync + 'static,
    {
        let mut inner = self.inner.lock()?;
        let id = ListenerId(inner.next_id);
        inner.next_id += 1;
        inner.listeners.push((id, Arc::new(listener)));
        Ok(id)
    }

    /// Returns false when `id` was not registered.
    pub fn unsubscribe(&self, id: ListenerId) -> Result<bool> {
        let mut inner = self.inner.lock()?;
        let before = inner.listeners.len();
        inner.listeners.retain(|(listener_id, _)| *listener_id != id);
        Ok(inner.listeners.len() != before)
    }

    pub fn listener_count(&self) -> Result<usize> {
        Ok(self.inner.lock()?.listeners.len())
    }

    pub fn publish(&self, event: SaveEvent) -> Result<()> {
        let listeners: Vec<Listener> = self
            .inner
            .lock()?
            .listeners
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            listener(&event);
        }
        Ok(())
    }
}
