//! Dataset store keyed by TUID
//!
//! [`DataStore`] maps each experiment run to a durable container on disk
//! and is the only write path for datasets, snapshots, and analysis
//! results. It holds its data directory explicitly — construct one store
//! per data tree and pass it where it is needed; there is no process-wide
//! active directory and no singleton.
//!
//! ## Concurrency
//!
//! Calls are single-threaded; concurrency arises from multiple
//! uncoordinated OS processes writing at once. Every write takes the
//! per-`(TUID, file)` advisory lock with a bounded wait and releases it
//! unconditionally, write failure included. Reads are unlocked:
//! read-during-write races resolve as last-writer-wins, which this use
//! case accepts. A lock timeout is terminal for that call — no internal
//! retries.
//!
//! # Example
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
//! # let schema = Schema::new(vec![Field::new("defect_rate", DataType::Float64, false)]);
//! # let batch = RecordBatch::try_new(
//! #     Arc::new(schema),
//! #     vec![Arc::new(Float64Array::from(vec![0.02, 0.018]))],
//! # )?;
//! let mut dataset = Dataset::new(vec![batch]);
//! let tuid = store.store(&mut dataset, None, "surface_code_d3")?;
//!
//! let loaded = store.load(&tuid)?;
//! assert_eq!(loaded.attr("tuid"), Some(tuid.as_str()));
//! assert_eq!(loaded.attr("name"), Some("surface_code_d3"));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::collections::HashMap;
use std::fs::{self, File};
use std::hash::Hash;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde_json::{Map, Value};
use tracing::debug;

use crate::container::{self, SNAPSHOT_FILENAME};
use crate::dataset::{Dataset, DATASET_FILENAME, PROCESSED_DATASET_FILENAME};
use crate::error::{Error, Result};
use crate::lock::{lock_file_name, FileLock, DEFAULT_LOCK_TIMEOUT, LOCK_DIR_NAME};
use crate::tuid::Tuid;

/// How batch lookups treat a key whose filter matches no run.
///
/// The store's own behavior is fixed either way: per-key range scans run
/// to completion and only the aggregation differs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissingKey {
    /// Omit the key from the result map. Callers must treat an absent key
    /// as "no matching run", not as an error.
    #[default]
    Skip,
    /// Surface the first miss as [`Error::NotFound`].
    Error,
}

/// Durable, process-safe store of one dataset per experiment run.
///
/// See the [module docs](self) for the concurrency contract and
/// [`DataStoreBuilder`] for configuration.
#[derive(Debug, Clone)]
pub struct DataStore {
    data_dir: PathBuf,
    lock_dir: PathBuf,
    lock_timeout: Duration,
    missing_key: MissingKey,
}

impl DataStore {
    /// Open a store rooted at `data_dir` with default configuration,
    /// creating the directory when absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the data directory cannot be created.
    pub fn open(data_dir: impl Into<PathBuf>) -> Result<Self> {
        Self::builder(data_dir).build()
    }

    /// Create a builder for a store with non-default configuration.
    #[must_use]
    pub fn builder(data_dir: impl Into<PathBuf>) -> DataStoreBuilder {
        DataStoreBuilder::new(data_dir)
    }

    /// Root data directory holding the day/container tree.
    #[must_use]
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Directory holding the per-dataset lock files.
    #[must_use]
    pub fn lock_dir(&self) -> &Path {
        &self.lock_dir
    }

    /// Bound on lock acquisition for write operations.
    #[must_use]
    pub const fn lock_timeout(&self) -> Duration {
        self.lock_timeout
    }

    /// Batch-lookup policy for keys that match nothing.
    #[must_use]
    pub const fn missing_key(&self) -> MissingKey {
        self.missing_key
    }

    /// Generate a fresh TUID and materialize its container directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the container path cannot be created
    /// (permissions, disk full).
    pub fn create_container(&self, name: &str) -> Result<Tuid> {
        let tuid = Tuid::now();
        let path = container::create(&self.data_dir, &tuid, name)?;
        debug!(%tuid, name, path = %path.display(), "created experiment container");
        Ok(tuid)
    }

    /// Store a dataset, returning the TUID it was stored under.
    ///
    /// Generates a TUID when none is supplied and creates the container
    /// lazily. The provenance attributes `name` and `tuid` are attached to
    /// the dataset before writing — the caller sees them too. The write
    /// happens under the per-dataset advisory lock; the lock is released
    /// unconditionally before this returns, on the error path included.
    ///
    /// # Errors
    ///
    /// [`Error::LockTimeout`] when the lock stays contended past the
    /// configured bound; storage/IO errors surface as-is.
    pub fn store(&self, dataset: &mut Dataset, tuid: Option<Tuid>, name: &str) -> Result<Tuid> {
        let tuid = tuid.unwrap_or_else(Tuid::now);
        let container = container::locate_or_create(&self.data_dir, &tuid, name)?;

        dataset.set_attr("name", name);
        dataset.set_attr("tuid", tuid.as_str());

        let path = container.join(DATASET_FILENAME);
        let _lock = FileLock::acquire(
            &self.lock_dir,
            &lock_file_name(&tuid, DATASET_FILENAME),
            self.lock_timeout,
        )?;
        dataset.write_parquet(&path)?;

        debug!(%tuid, name, rows = dataset.num_rows(), "stored dataset");
        Ok(tuid)
    }

    /// Load the dataset stored under `tuid`.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] when no container or no dataset exists for the
    /// TUID.
    pub fn load(&self, tuid: &Tuid) -> Result<Dataset> {
        let container = container::locate(&self.data_dir, tuid)?;
        let path = container.join(DATASET_FILENAME);
        if !path.is_file() {
            return Err(Error::NotFound(format!("no dataset stored under {tuid}")));
        }
        Dataset::read_parquet(&path)
    }

    /// Load the snapshot (instrument/experiment configuration) stored
    /// under `tuid`.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] when no container or no snapshot exists for the
    /// TUID.
    pub fn load_snapshot(&self, tuid: &Tuid) -> Result<Map<String, Value>> {
        let container = container::locate(&self.data_dir, tuid)?;
        let path = container.join(SNAPSHOT_FILENAME);
        if !path.is_file() {
            return Err(Error::NotFound(format!("no snapshot stored under {tuid}")));
        }
        let reader = BufReader::new(File::open(&path)?);
        Ok(serde_json::from_reader(reader)?)
    }

    /// Write the snapshot for an existing run.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] when no container exists for the TUID — a
    /// snapshot annotates a run, it does not create one.
    pub fn store_snapshot(&self, tuid: &Tuid, snapshot: &Map<String, Value>) -> Result<()> {
        let container = container::locate(&self.data_dir, tuid)?;
        let path = container.join(SNAPSHOT_FILENAME);

        let _lock = FileLock::acquire(
            &self.lock_dir,
            &lock_file_name(tuid, SNAPSHOT_FILENAME),
            self.lock_timeout,
        )?;
        let writer = BufWriter::new(File::create(&path)?);
        serde_json::to_writer_pretty(writer, snapshot)?;

        debug!(%tuid, keys = snapshot.len(), "stored snapshot");
        Ok(())
    }

    /// Store an analysis-result dataset under an existing run.
    ///
    /// The dataset lands in `analysis_<analysis_name>/` inside the run's
    /// container, stamped with `tuid` and `analysis_name` attributes, and
    /// is written under the processed-dataset lock for the TUID.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] when no container exists for the TUID;
    /// [`Error::LockTimeout`] and storage/IO errors as for
    /// [`store`](Self::store).
    pub fn store_processed(
        &self,
        tuid: &Tuid,
        analysis_name: &str,
        dataset: &mut Dataset,
    ) -> Result<()> {
        let container = container::locate(&self.data_dir, tuid)?;
        let analysis_dir = container.join(format!("analysis_{analysis_name}"));
        fs::create_dir_all(&analysis_dir)?;

        dataset.set_attr("tuid", tuid.as_str());
        dataset.set_attr("analysis_name", analysis_name);

        let path = analysis_dir.join(PROCESSED_DATASET_FILENAME);
        let _lock = FileLock::acquire(
            &self.lock_dir,
            &lock_file_name(tuid, PROCESSED_DATASET_FILENAME),
            self.lock_timeout,
        )?;
        dataset.write_parquet(&path)?;

        debug!(%tuid, analysis_name, rows = dataset.num_rows(), "stored processed dataset");
        Ok(())
    }

    /// Load the analysis-result dataset stored under `tuid` by the named
    /// analysis.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] when the container or the processed dataset is
    /// missing.
    pub fn load_processed(&self, tuid: &Tuid, analysis_name: &str) -> Result<Dataset> {
        let container = container::locate(&self.data_dir, tuid)?;
        let path = container
            .join(format!("analysis_{analysis_name}"))
            .join(PROCESSED_DATASET_FILENAME);
        if !path.is_file() {
            return Err(Error::NotFound(format!(
                "no {analysis_name} result stored under {tuid}"
            )));
        }
        Dataset::read_parquet(&path)
    }

    /// The newest TUID whose container name contains `contains`.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] when nothing matches.
    pub fn latest(&self, contains: &str) -> Result<Tuid> {
        self.scan(contains, None)?
            .pop()
            .ok_or_else(|| Error::NotFound(format!("no run matching {contains:?}")))
    }

    /// All TUIDs in the creation-time range `[start, end]` (inclusive)
    /// whose container name contains `contains`.
    ///
    /// Results come back chronologically ascending, or descending when
    /// `reverse` is set. No match is an empty vector, not an error.
    ///
    /// # Errors
    ///
    /// Filesystem errors while scanning surface as-is.
    pub fn find(
        &self,
        contains: &str,
        start: &Tuid,
        end: &Tuid,
        reverse: bool,
    ) -> Result<Vec<Tuid>> {
        let mut tuids = self.scan(contains, Some((start, end)))?;
        if reverse {
            tuids.reverse();
        }
        Ok(tuids)
    }

    /// Resolve the newest matching TUID per key over a shared time range.
    ///
    /// Each key carries its own name filter. A key whose filter matches
    /// nothing is handled per the configured [`MissingKey`] policy: under
    /// [`MissingKey::Skip`] (the default) it is absent from the result
    /// map, under [`MissingKey::Error`] the first miss fails the call.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] for a miss under [`MissingKey::Error`];
    /// filesystem errors while scanning surface as-is.
    pub fn latest_for_keys<K>(
        &self,
        filters: &HashMap<K, String>,
        start: &Tuid,
        end: &Tuid,
    ) -> Result<HashMap<K, Tuid>>
    where
        K: Clone + Eq + Hash,
    {
        let mut result = HashMap::with_capacity(filters.len());
        for (key, contains) in filters {
            match self.scan(contains, Some((start, end)))?.pop() {
                Some(tuid) => {
                    result.insert(key.clone(), tuid);
                }
                None => match self.missing_key {
                    MissingKey::Skip => {
                        debug!(contains = %contains, "batch lookup: no match for key, skipping");
                    }
                    MissingKey::Error => {
                        return Err(Error::NotFound(format!(
                            "no run matching {contains:?} in range {start}..={end}"
                        )));
                    }
                },
            }
        }
        Ok(result)
    }

    /// Scan the container tree for TUIDs, ascending.
    ///
    /// `contains` filters on the container directory name (time label plus
    /// run name); the optional range is inclusive on both ends and
    /// compares embedded creation times. Entries that don't follow the
    /// layout are skipped.
    fn scan(&self, contains: &str, range: Option<(&Tuid, &Tuid)>) -> Result<Vec<Tuid>> {
        let mut found = Vec::new();

        for day_entry in fs::read_dir(&self.data_dir)? {
            let day_entry = day_entry?;
            let day_name = day_entry.file_name();
            let Some(day) = day_name.to_str() else {
                continue;
            };
            if !container::is_day_dir(day) || !day_entry.path().is_dir() {
                continue;
            }
            if let Some((start, end)) = range {
                if day < start.date_label() || day > end.date_label() {
                    continue;
                }
            }

            for entry in fs::read_dir(day_entry.path())? {
                let entry = entry?;
                let entry_name = entry.file_name();
                let Some(entry_name) = entry_name.to_str() else {
                    continue;
                };
                let Some(tuid) = container::parse_entry(day, entry_name) else {
                    continue;
                };
                if !entry_name.contains(contains) {
                    continue;
                }
                if let Some((start, end)) = range {
                    if tuid.timestamp() < start.timestamp()
                        || tuid.timestamp() > end.timestamp()
                    {
                        continue;
                    }
                }
                found.push(tuid);
            }
        }

        found.sort();
        Ok(found)
    }
}

/// Builder for [`DataStore`].
#[derive(Debug)]
pub struct DataStoreBuilder {
    data_dir: PathBuf,
    lock_dir: Option<PathBuf>,
    lock_timeout: Duration,
    missing_key: MissingKey,
}

impl DataStoreBuilder {
    /// Create a builder rooted at `data_dir`.
    #[must_use]
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            lock_dir: None,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            missing_key: MissingKey::default(),
        }
    }

    /// Override the lock directory (default: `.dataset_locks` under the
    /// data directory).
    #[must_use]
    pub fn lock_dir(mut self, lock_dir: impl Into<PathBuf>) -> Self {
        self.lock_dir = Some(lock_dir.into());
        self
    }

    /// Override the bound on lock acquisition (default: 5 seconds).
    #[must_use]
    pub const fn lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// Set the batch-lookup policy for keys that match nothing.
    #[must_use]
    pub const fn missing_key(mut self, policy: MissingKey) -> Self {
        self.missing_key = policy;
        self
    }

    /// Build the store, creating the data directory when absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the data directory cannot be created.
    pub fn build(self) -> Result<DataStore> {
        fs::create_dir_all(&self.data_dir)?;
        let lock_dir = self
            .lock_dir
            .unwrap_or_else(|| self.data_dir.join(LOCK_DIR_NAME));
        Ok(DataStore {
            data_dir: self.data_dir,
            lock_dir,
            lock_timeout: self.lock_timeout,
            missing_key: self.missing_key,
        })
    }
}
