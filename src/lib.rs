// ============================================================================
// saveload Library
// ============================================================================

//! Slot-based save/load coordination for many independent stateful objects.
//!
//! Objects implement [`GameSave`] and subscribe to a [`SnapshotCoordinator`].
//! The coordinator captures their state on [`save`](SnapshotCoordinator::save),
//! restores it in priority order on [`load`](SnapshotCoordinator::load), and
//! stores everything through a pluggable [`DataStorage`] backend.
//!
//! # Examples
//!
//! ```
//! use saveload::{CoordinatorConfig, MemoryStorage, SaveCell, SnapshotCoordinator};
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() -> saveload::Result<()> {
//! let storage = Arc::new(MemoryStorage::new());
//! let coordinator = SnapshotCoordinator::open(storage, CoordinatorConfig::default()).await?;
//!
//! let score = Arc::new(SaveCell::new("score", 0u64).greedy());
//! coordinator.subscribe(score.clone(), 0).await?;
//!
//! score.set(1200)?;
//! coordinator.save(1).await?;
//!
//! score.set(0)?;
//! coordinator.load(1).await?;
//! assert_eq!(score.get()?, 1200);
//! # Ok(())
//! # }
//! ```

pub mod cell;
pub mod coordinator;
pub mod core;
pub mod events;
pub mod prelude;
pub mod registry;
pub mod slots;
pub mod storage;

// Re-export main types for convenience
pub use cell::SaveCell;
pub use coordinator::{CoordinatorConfig, SnapshotCoordinator};
pub use self::core::{
    GameSave, LoadMode, OperationStatus, Payload, Phase, Result, SHARED_SLOT, SLOT_MAX, SLOT_MIN,
    SaveError, clamp_slot, storage_key,
};
pub use events::{EventBus, ListenerId, SaveEvent};
pub use registry::{PendingValue, SubscriberRef, Subscription, SubscriptionRegistry};
pub use slots::{SlotData, SlotRegistry};
pub use storage::{DataStorage, FileFormat, FileStorage, FileStorageConfig, MemoryStorage};
