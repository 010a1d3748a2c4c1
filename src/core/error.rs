use thiserror::Error;

#[derive(Error, Debug)]
pub enum SaveError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Restore of '{identity}' failed: {reason}")]
    Restore { identity: String, reason: String },

    #[error("Lock error: {0}")]
    LockError(String),
}

pub type Result<T> = std::result::Result<T, SaveError>;

impl<T> From<std::sync::PoisonError<T>> for SaveError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::LockError(err.to_string())
    }
}

impl From<std::io::Error> for SaveError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for SaveError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl SaveError {
    pub fn restore(identity: impl Into<String>, reason: impl ToString) -> Self {
        Self::Restore {
            identity: identity.into(),
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_poisoned_mutex_maps_to_lock_error() {
        let shared = Arc::new(Mutex::new(0));
        let poisoner = Arc::clone(&shared);
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.lock().unwrap();
            panic!("poison");
        })
        .join();

        let err: SaveError = shared.lock().unwrap_err().into();
        assert!(matches!(err, SaveError::LockError(_)));
    }

    #[test]
    fn test_restore_error_message() {
        let err = SaveError::restore("player", "bad payload");
        assert_eq!(err.to_string(), "Restore of 'player' failed: bad payload");
    }
}
