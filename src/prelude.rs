//! Everything a persistable object and its host usually need.

pub use crate::{
    CoordinatorConfig, DataStorage, GameSave, LoadMode, OperationStatus, Payload, Result,
    SaveCell, SaveError, SaveEvent, SnapshotCoordinator,
};
pub use async_trait::async_trait;
