#![allow(dead_code)]

use async_trait::async_trait;
use saveload::{
    DataStorage, GameSave, LoadMode, MemoryStorage, Payload, Result, SaveError, SaveEvent,
    SnapshotCoordinator,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

pub type Trace = Arc<Mutex<Vec<String>>>;

/// Greedy object that records the order it gets restored in.
pub struct TraceProbe {
    pub id: String,
    pub trace: Trace,
    pub value: Mutex<Payload>,
}

impl TraceProbe {
    pub fn new(id: &str, trace: &Trace) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            trace: Arc::clone(trace),
            value: Mutex::new(Payload::Null),
        })
    }
}

#[async_trait]
impl GameSave for TraceProbe {
    fn save_id(&self) -> String {
        self.id.clone()
    }

    fn load_mode(&self) -> LoadMode {
        LoadMode::Greedy
    }

    fn save_data(&self) -> Result<Payload> {
        Ok(self.value.lock()?.clone())
    }

    async fn on_load(&self, payload: Option<Payload>) -> Result<()> {
        self.trace.lock()?.push(self.id.clone());
        if let Some(payload) = payload {
            *self.value.lock()? = payload;
        }
        Ok(())
    }
}

pub fn record_events(coordinator: &SnapshotCoordinator) -> Arc<Mutex<Vec<SaveEvent>>> {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    coordinator
        .events()
        .subscribe(move |event| sink.lock().unwrap().push(*event))
        .unwrap();
    events
}

/// Memory backend that can be told to fail or to park inside `commit`.
#[derive(Default)]
pub struct ControlledStorage {
    pub inner: MemoryStorage,
    pub fail_commit: AtomicBool,
    pub fail_reads: AtomicBool,
    pub hold_commit: AtomicBool,
    pub gate: Notify,
}

impl ControlledStorage {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn release(&self) {
        self.gate.notify_one();
    }
}

#[async_trait]
impl DataStorage for ControlledStorage {
    async fn get_blob(&self, key: &str) -> Result<Option<Payload>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(SaveError::Storage(format!("read of '{}' failed", key)));
        }
        self.inner.get_blob(key).await
    }

    async fn set_blob(&self, key: &str, payload: Payload) -> Result<()> {
        self.inner.set_blob(key, payload).await
    }

    async fn delete_key(&self, key: &str) -> Result<()> {
        self.inner.delete_key(key).await
    }

    async fn commit(&self) -> Result<()> {
        if self.hold_commit.load(Ordering::SeqCst) {
            self.gate.notified().await;
        }
        if self.fail_commit.load(Ordering::SeqCst) {
            return Err(SaveError::Storage("commit failed".to_string()));
        }
        self.inner.commit().await
    }
}
