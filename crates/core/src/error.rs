//! Unified error types for outpost.
//!
//! Serving-path failures never propagate as errors: the coordinator folds
//! them into a response with an appropriate status. These variants exist for
//! the store, lifecycle, and trigger boundaries.

use tokio_rusqlite::rusqlite;

/// Unified error types for the outpost proxy.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The backing medium rejected a write for lack of space. Opportunistic
    /// writers treat this as best-effort and continue without caching.
    #[error("STORAGE_FULL: {0}")]
    StorageFull(String),

    /// The origin could not be reached (connect error, timeout, etc.).
    /// Triggers the offline-fallback policy, never fatal.
    #[error("NETWORK_FAILURE: {0}")]
    NetworkFailure(String),

    /// A manifest entry failed during install. The whole generation is
    /// discarded; nothing partial survives.
    #[error("INSTALL_INCOMPLETE: {entry}: {cause}")]
    InstallIncomplete { entry: String, cause: String },

    /// Neither cache, network, nor the fallback document could satisfy a
    /// request. The terminal, user-visible failure (503-equivalent).
    #[error("UNAVAILABLE: {0}")]
    Unavailable(String),

    /// A trigger handler failed. Caught and logged at the gateway boundary,
    /// never propagated to the external scheduler.
    #[error("TRIGGER_FAILED: {0}")]
    TriggerFailed(String),

    /// Database operation failed.
    #[error("STORE_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("STORE_ERROR: migration failed: {0}")]
    MigrationFailed(String),

    /// Invalid URL.
    #[error("INVALID_URL: {0}")]
    InvalidUrl(String),

    /// Illegal lifecycle phase transition (e.g. activate during install).
    #[error("LIFECYCLE_ERROR: {0}")]
    Lifecycle(String),
}

/// Map a raw sqlite error, surfacing quota exhaustion as its own variant.
fn from_sqlite(err: rusqlite::Error) -> Error {
    if err.sqlite_error_code() == Some(rusqlite::ErrorCode::DiskFull) {
        Error::StorageFull(err.to_string())
    } else {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => from_sqlite(e),
            other => Error::Database(other),
        }
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        from_sqlite(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Unavailable("/".to_string());
        assert!(err.to_string().contains("UNAVAILABLE"));
        assert!(err.to_string().contains('/'));
    }

    #[test]
    fn test_install_incomplete_display() {
        let err = Error::InstallIncomplete { entry: "/style.css".into(), cause: "status 404".into() };
        assert!(err.to_string().contains("INSTALL_INCOMPLETE"));
        assert!(err.to_string().contains("/style.css"));
        assert!(err.to_string().contains("status 404"));
    }

    #[test]
    fn test_disk_full_maps_to_storage_full() {
        let raw = rusqlite::Error::SqliteFailure(rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_FULL), None);
        let err = Error::from(raw);
        assert!(matches!(err, Error::StorageFull(_)));
    }

    #[test]
    fn test_other_sqlite_errors_stay_database() {
        let raw = rusqlite::Error::SqliteFailure(rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY), None);
        let err = Error::from(raw);
        assert!(matches!(err, Error::Database(_)));
    }
}
