//! Time-Unique Identifier (TUID)
//!
//! A TUID names exactly one experiment run. It embeds the creation
//! timestamp down to the millisecond plus a random disambiguator, so that
//! lexicographic order equals chronological order and repeated generation
//! never collides.
//!
//! Format: `YYYYmmDD-HHMMSS-mmm-xxxxxx` (26 characters), e.g.
//! `20250526-200454-747-e499bf`. The trailing fragment is six lowercase
//! hex characters drawn from a v4 UUID.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

/// Total length of a TUID string.
pub const TUID_LEN: usize = 26;

/// Length of the date half (`YYYYmmDD`).
const DATE_LEN: usize = 8;

/// Length of the time half (`HHMMSS-mmm-xxxxxx`), used as the container
/// directory prefix.
pub(crate) const TIME_LABEL_LEN: usize = 17;

/// Time-Unique Identifier for one experiment run.
///
/// Immutable once issued. Round-trips through its string form, orders
/// lexicographically (equal to chronological order), and serializes as a
/// plain string.
///
/// # Example
///
/// ```rust
/// use tuid_store::Tuid;
///
/// let tuid: Tuid = "20250526-200454-747-e499bf".parse()?;
/// assert_eq!(tuid.date_label(), "20250526");
/// assert_eq!(tuid.time_label(), "200454-747-e499bf");
/// assert_eq!(tuid.to_string(), "20250526-200454-747-e499bf");
/// # Ok::<(), tuid_store::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Tuid {
    raw: String,
    timestamp: DateTime<Utc>,
}

impl Tuid {
    /// Generate a fresh TUID from the current UTC time.
    ///
    /// The millisecond timestamp plus the random fragment make collisions
    /// within one process run vanishingly unlikely; the fragment alone
    /// disambiguates runs created within the same millisecond.
    #[must_use]
    pub fn now() -> Self {
        let bytes = Uuid::new_v4().into_bytes();
        let fragment = format!("{:02x}{:02x}{:02x}", bytes[0], bytes[1], bytes[2]);
        Self::from_timestamp(Utc::now(), &fragment)
    }

    /// Build a TUID from an explicit timestamp and hex fragment.
    ///
    /// Sub-millisecond precision is discarded so the value round-trips
    /// through its string form. The fragment must already be six lowercase
    /// hex characters; callers inside this crate guarantee that.
    fn from_timestamp(timestamp: DateTime<Utc>, fragment: &str) -> Self {
        let millis = timestamp.timestamp_subsec_millis().min(999);
        let raw = format!(
            "{}-{millis:03}-{fragment}",
            timestamp.format("%Y%m%d-%H%M%S")
        );
        let truncated = timestamp
            .with_nanosecond(millis * 1_000_000)
            .unwrap_or(timestamp);
        Self {
            raw,
            timestamp: truncated,
        }
    }

    /// Parse a TUID from its canonical string form.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTuid`] when the input deviates from
    /// `YYYYmmDD-HHMMSS-mmm-xxxxxx`: wrong length, bad separators, an
    /// impossible calendar date or time, a non-numeric millisecond field,
    /// or a fragment that is not six lowercase hex characters.
    pub fn parse(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidTuid(s.to_string());

        if s.len() != TUID_LEN || !s.is_ascii() {
            return Err(invalid());
        }
        let bytes = s.as_bytes();
        if bytes[8] != b'-' || bytes[15] != b'-' || bytes[19] != b'-' {
            return Err(invalid());
        }

        let naive = NaiveDateTime::parse_from_str(&s[..15], "%Y%m%d-%H%M%S")
            .map_err(|_| invalid())?;

        let millis_field = &s[16..19];
        if !millis_field.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let millis: u32 = millis_field.parse().map_err(|_| invalid())?;

        let fragment = &s[20..];
        if !fragment
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
        {
            return Err(invalid());
        }

        let timestamp =
            naive.and_utc() + chrono::Duration::milliseconds(i64::from(millis));
        Ok(Self {
            raw: s.to_string(),
            timestamp,
        })
    }

    /// The canonical 26-character string form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// The embedded creation time, millisecond precision.
    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// The `YYYYmmDD` half, which names the day directory on disk.
    #[must_use]
    pub fn date_label(&self) -> &str {
        &self.raw[..DATE_LEN]
    }

    /// The `HHMMSS-mmm-xxxxxx` half, which prefixes the container
    /// directory name.
    #[must_use]
    pub fn time_label(&self) -> &str {
        &self.raw[DATE_LEN + 1..DATE_LEN + 1 + TIME_LABEL_LEN]
    }
}

impl fmt::Display for Tuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for Tuid {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Tuid {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        Self::parse(&s)
    }
}

impl From<Tuid> for String {
    fn from(tuid: Tuid) -> Self {
        tuid.raw
    }
}
