//! Dataset blob (Arrow in memory, Parquet on disk)
//!
//! A [`Dataset`] is the unit the store writes into an experiment
//! container: a set of equally-shaped named columns held as Arrow
//! `RecordBatch`es, plus free-form string attributes. The attributes ride
//! in the Arrow schema metadata, so they survive the Parquet round trip
//! without a side file. The store uses them for provenance: it stamps
//! `name` and `tuid` on every dataset it writes.

use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use arrow::datatypes::{Fields, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;

use crate::error::{Error, Result};

/// Fixed file name of the primary dataset inside a container.
pub const DATASET_FILENAME: &str = "dataset.parquet";

/// Fixed file name of an analysis-result dataset inside an analysis
/// subdirectory.
pub const PROCESSED_DATASET_FILENAME: &str = "dataset_processed.parquet";

/// Labeled columnar dataset with string attributes.
///
/// All batches share one schema; [`append_batch`](Self::append_batch)
/// enforces that. Attributes are ordinary string key-value pairs and are
/// embedded in the schema metadata on write.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    batches: Vec<RecordBatch>,
    attrs: BTreeMap<String, String>,
}

impl Dataset {
    /// Create a dataset from existing batches, with no attributes.
    #[must_use]
    pub fn new(batches: Vec<RecordBatch>) -> Self {
        Self {
            batches,
            attrs: BTreeMap::new(),
        }
    }

    /// Get all record batches.
    #[must_use]
    pub fn batches(&self) -> &[RecordBatch] {
        &self.batches
    }

    /// Total row count across all batches.
    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.batches.iter().map(RecordBatch::num_rows).sum()
    }

    /// Check whether the dataset holds no rows and no attributes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.num_rows() == 0 && self.attrs.is_empty()
    }

    /// Get all attributes.
    #[must_use]
    pub const fn attrs(&self) -> &BTreeMap<String, String> {
        &self.attrs
    }

    /// Get a single attribute value.
    #[must_use]
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs.get(key).map(String::as_str)
    }

    /// Set an attribute, overwriting any existing value.
    pub fn set_attr(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.attrs.insert(key.into(), value.into());
    }

    /// Append a batch to the dataset.
    ///
    /// # Errors
    ///
    /// Returns an error if the batch columns don't match the schema of the
    /// batches already present.
    pub fn append_batch(&mut self, batch: RecordBatch) -> Result<()> {
        if let Some(existing) = self.batches.first() {
            if batch.schema().fields() != existing.schema().fields() {
                return Err(Error::Storage(format!(
                    "Schema mismatch: expected {:?}, got {:?}",
                    existing.schema().fields(),
                    batch.schema().fields()
                )));
            }
        }
        self.batches.push(batch);
        Ok(())
    }

    /// Write the dataset to a Parquet file, attributes included.
    ///
    /// The write replaces any existing file at `path`. Callers that need
    /// cross-process exclusion hold the dataset lock around this call; the
    /// store does so for every public write operation.
    ///
    /// # Errors
    ///
    /// Returns an error if the dataset holds no batches (Parquet cannot
    /// represent a zero-column schema), if the file cannot be created, or
    /// if the serialization fails.
    pub fn write_parquet<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let Some(first) = self.batches.first() else {
            return Err(Error::Storage(
                "Cannot write a dataset with no columns".to_string(),
            ));
        };
        let fields: Fields = first.schema().fields().clone();
        let metadata: HashMap<String, String> = self
            .attrs
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let schema = Arc::new(Schema::new_with_metadata(fields, metadata));

        let file = File::create(path.as_ref()).map_err(|e| {
            Error::Storage(format!("Failed to create Parquet file: {e}"))
        })?;
        let mut writer = ArrowWriter::try_new(file, schema.clone(), None)
            .map_err(|e| Error::Storage(format!("Failed to create Parquet writer: {e}")))?;

        for batch in &self.batches {
            // Re-wrap under the metadata-bearing schema so the writer
            // accepts every batch.
            let batch = RecordBatch::try_new(schema.clone(), batch.columns().to_vec())?;
            writer
                .write(&batch)
                .map_err(|e| Error::Storage(format!("Failed to write record batch: {e}")))?;
        }

        writer
            .close()
            .map_err(|e| Error::Storage(format!("Failed to finalize Parquet file: {e}")))?;
        Ok(())
    }

    /// Read a dataset back from a Parquet file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn read_parquet<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref()).map_err(|e| {
            Error::Storage(format!("Failed to open Parquet file: {e}"))
        })?;

        let builder = ParquetRecordBatchReaderBuilder::try_new(file).map_err(|e| {
            Error::Storage(format!("Failed to parse Parquet file: {e}"))
        })?;

        let attrs: BTreeMap<String, String> = builder
            .schema()
            .metadata()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        let reader = builder.build().map_err(|e| {
            Error::Storage(format!("Failed to create Parquet reader: {e}"))
        })?;

        let mut batches = Vec::new();
        for batch in reader {
            let batch = batch.map_err(|e| {
                Error::Storage(format!("Failed to read record batch: {e}"))
            })?;
            batches.push(batch);
        }

        Ok(Self { batches, attrs })
    }
}
