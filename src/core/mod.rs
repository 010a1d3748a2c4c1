pub mod contracts;
pub mod error;
pub mod types;

pub use contracts::GameSave;
pub use error::{Result, SaveError};
pub use types::{
    LoadMode, OperationStatus, Payload, Phase, SHARED_SLOT, SLOT_MAX, SLOT_MIN, clamp_slot,
    storage_key,
};
