//! Error types for the TUID store
//!
//! Every failure surfaces directly to the caller. The store performs no
//! internal retries and no partial-result suppression, with one documented
//! exception: batch lookups configured with [`MissingKey::Skip`] drop
//! per-key misses from their result map.
//!
//! [`MissingKey::Skip`]: crate::store::MissingKey::Skip

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// TUID store error types
#[derive(Error, Debug)]
pub enum Error {
    /// Requested TUID has no container, or the container has no stored file
    #[error("Not found: {0}")]
    NotFound(String),

    /// Writer could not acquire the per-dataset lock within the bound
    #[error("Lock timeout: gave up on {lockfile} after {waited:?}")]
    LockTimeout {
        /// Lock file that could not be acquired
        lockfile: PathBuf,
        /// How long the writer waited before giving up
        waited: Duration,
    },

    /// Malformed TUID string
    #[error("Invalid TUID {0:?}: expected YYYYmmDD-HHMMSS-mmm-xxxxxx")]
    InvalidTuid(String),

    /// Storage error (Parquet serialization)
    #[error("Storage error: {0}")]
    Storage(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Arrow error
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Snapshot (de)serialization error
    #[error("Snapshot error: {0}")]
    Snapshot(#[from] serde_json::Error),
}
