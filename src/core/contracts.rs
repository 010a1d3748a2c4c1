use super::{LoadMode, Payload, Result};
use async_trait::async_trait;

/// A stateful object that takes part in save and load.
///
/// The coordinator only keeps weak handles to implementors, so an object that
/// is dropped simply stops being saved or restored.
#[async_trait]
pub trait GameSave: Send + Sync {
    /// Stable identity of this object's data stream. Must not change between runs.
    fn save_id(&self) -> String;

    /// Shared objects are stored once for all slots.
    fn is_shared(&self) -> bool {
        false
    }

    fn load_mode(&self) -> LoadMode {
        LoadMode::Lazy
    }

    /// Current state snapshot.
    fn save_data(&self) -> Result<Payload>;

    /// Restore hook. `None` means nothing was stored and the object should use its defaults.
    async fn on_load(&self, payload: Option<Payload>) -> Result<()>;
}
