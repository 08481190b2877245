//! # TUID Store: Process-Safe Experiment Dataset Storage
//!
//! A durable store for experiment datasets, keyed by a Time-Unique
//! Identifier (TUID). Each run gets a filesystem container holding its
//! dataset (Parquet), an optional instrument snapshot (JSON), and optional
//! analysis results. Multiple uncoordinated processes can write
//! concurrently: every write holds a per-`(TUID, file)` advisory lock
//! with a bounded wait, and reads stay lock-free.
//!
//! ## Design
//!
//! - One container directory per run, named from the TUID — no secondary
//!   index, no in-memory cache; every operation re-touches the filesystem.
//! - The store is an explicit value, constructed with its data directory
//!   and passed where needed.
//! - Failures surface directly: a lock timeout or I/O fault is terminal
//!   for that call, never retried internally.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use tuid_store::{DataStore, Dataset};
//! # use std::sync::Arc;
//! # use arrow::array::Float64Array;
//! # use arrow::datatypes::{DataType, Field, Schema};
//! # use arrow::record_batch::RecordBatch;
//!
//! let store = DataStore::open("/data/experiments")?;
//!
//! // Store a run's dataset; the TUID comes back for later retrieval.
//! # let schema = Schema::new(vec![Field::new("defect_rate", DataType::Float64, false)]);
//! # let batch = RecordBatch::try_new(
//! #     Arc::new(schema),
//! #     vec![Arc::new(Float64Array::from(vec![0.02, 0.018]))],
//! # )?;
//! let mut dataset = Dataset::new(vec![batch]);
//! let tuid = store.store(&mut dataset, None, "surface_code_d3")?;
//!
//! // Range lookups scan the container tree by creation time and name.
//! let newest = store.latest("surface_code")?;
//! assert_eq!(newest, tuid);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod container;
pub mod dataset;
pub mod error;
pub mod lock;
pub mod store;
pub mod tuid;

pub use container::SNAPSHOT_FILENAME;
pub use dataset::{Dataset, DATASET_FILENAME, PROCESSED_DATASET_FILENAME};
pub use error::{Error, Result};
pub use lock::{lock_file_name, FileLock, DEFAULT_LOCK_TIMEOUT};
pub use store::{DataStore, DataStoreBuilder, MissingKey};
pub use tuid::Tuid;
