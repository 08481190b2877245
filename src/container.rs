//! Experiment container layout on disk
//!
//! Containers live in per-day directories under the store's data
//! directory, named after the TUID that owns them:
//!
//! ```text
//! data_dir/
//! ├── 20250526/
//! │   ├── 200454-747-e499bf-surface_code_d3/
//! │   │   ├── dataset.parquet                  # primary dataset
//! │   │   ├── snapshot.json                    # instrument snapshot
//! │   │   └── analysis_RepeatedStabilizer/
//! │   │       └── dataset_processed.parquet    # analysis result
//! │   └── 224530-511-a39031-surface_code_d5/
//! └── 20250527/
//!     └── 091502-003-1b77c2/                   # unnamed run
//! ```
//!
//! The TUID's date half names the day directory and its time half
//! prefixes the container directory, so a container is found by prefix
//! match without any secondary index.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::tuid::{Tuid, TIME_LABEL_LEN};

/// Fixed file name of the snapshot (metadata) blob inside a container.
pub const SNAPSHOT_FILENAME: &str = "snapshot.json";

/// Directory name for a container: the TUID time label, suffixed with the
/// human-readable name when one was given.
pub(crate) fn dir_name(tuid: &Tuid, name: &str) -> String {
    if name.is_empty() {
        tuid.time_label().to_string()
    } else {
        format!("{}-{name}", tuid.time_label())
    }
}

/// True when `name` looks like a day directory (`YYYYmmDD`).
pub(crate) fn is_day_dir(name: &str) -> bool {
    name.len() == 8 && name.bytes().all(|b| b.is_ascii_digit())
}

/// Recover a TUID from a day directory name plus a container directory
/// name. Returns `None` for entries that don't follow the layout.
pub(crate) fn parse_entry(day: &str, entry_name: &str) -> Option<Tuid> {
    if entry_name.len() < TIME_LABEL_LEN {
        return None;
    }
    if entry_name.len() > TIME_LABEL_LEN && entry_name.as_bytes()[TIME_LABEL_LEN] != b'-' {
        return None;
    }
    let candidate = format!("{day}-{}", &entry_name[..TIME_LABEL_LEN]);
    Tuid::parse(&candidate).ok()
}

/// Locate the existing container directory for `tuid`.
///
/// # Errors
///
/// [`Error::NotFound`] when no container exists for the TUID.
pub(crate) fn locate(data_dir: &Path, tuid: &Tuid) -> Result<PathBuf> {
    let day_dir = data_dir.join(tuid.date_label());
    if day_dir.is_dir() {
        for entry in fs::read_dir(&day_dir)? {
            let entry = entry?;
            let file_name = entry.file_name();
            let Some(entry_name) = file_name.to_str() else {
                continue;
            };
            if entry_name.starts_with(tuid.time_label()) && entry.path().is_dir() {
                return Ok(entry.path());
            }
        }
    }
    Err(Error::NotFound(format!("no experiment container for {tuid}")))
}

/// Materialize the container directory for `tuid`.
pub(crate) fn create(data_dir: &Path, tuid: &Tuid, name: &str) -> Result<PathBuf> {
    let path = data_dir
        .join(tuid.date_label())
        .join(dir_name(tuid, name));
    fs::create_dir_all(&path)?;
    Ok(path)
}

/// Locate the container for `tuid`, creating it when absent.
pub(crate) fn locate_or_create(data_dir: &Path, tuid: &Tuid, name: &str) -> Result<PathBuf> {
    match locate(data_dir, tuid) {
        Ok(path) => Ok(path),
        Err(Error::NotFound(_)) => create(data_dir, tuid, name),
        Err(e) => Err(e),
    }
}
