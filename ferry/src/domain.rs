use crate::clock::Clock;
use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use serde_json::Value;
use shared::{Error, Result};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// A live share as returned by a lookup
#[derive(Clone, Debug, PartialEq)]
pub struct Share {
    pub id: String,
    pub value: Value,
    pub created_at: DateTime<Utc>,
}

/// Diagnostic view of a share, without its payload
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShareSummary {
    pub id: String,
    pub created_at: DateTime<Utc>,
    /// Byte length of the serialized value, when the backend can report it
    pub size: Option<usize>,
}

pub mod response {
    use chrono::{DateTime, Utc};

    #[derive(Clone, Debug)]
    pub struct PutResponse {
        /// A live share with the same id was overwritten
        pub replaced: bool,
        pub created_at: DateTime<Utc>,
    }

    impl PutResponse {
        pub fn new(replaced: bool, created_at: DateTime<Utc>) -> Self {
            Self {
                replaced,
                created_at,
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    Memory,
    File,
    Remote,
}

impl StorageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageKind::Memory => "memory",
            StorageKind::File => "file",
            StorageKind::Remote => "remote",
        }
    }
}

impl fmt::Display for StorageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How long a share stays readable after its last write
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetentionPolicy {
    max_age: TimeDelta,
}

impl RetentionPolicy {
    pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(7 * 24 * 60 * 60);

    pub fn new(max_age: Duration) -> Self {
        Self {
            max_age: TimeDelta::from_std(max_age).unwrap_or(TimeDelta::MAX),
        }
    }

    pub fn max_age(&self) -> TimeDelta {
        self.max_age
    }

    /// An entry is expired once its age strictly exceeds the window
    pub fn is_expired(&self, created_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(created_at) > self.max_age
    }

    /// Oldest `created_at` that is still live at `now`
    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now.checked_sub_signed(self.max_age)
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// Human readable window, e.g. "7 days" or "12 hours"
    pub fn describe(&self) -> String {
        let secs = self.max_age.num_seconds();
        let (amount, unit) = if secs >= 86_400 && secs % 86_400 == 0 {
            (secs / 86_400, "day")
        } else if secs >= 3_600 && secs % 3_600 == 0 {
            (secs / 3_600, "hour")
        } else if secs >= 60 && secs % 60 == 0 {
            (secs / 60, "minute")
        } else {
            (secs, "second")
        };

        if amount == 1 {
            format!("1 {}", unit)
        } else {
            format!("{} {}s", amount, unit)
        }
    }
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_AGE)
    }
}

/// Everything a backend needs besides its own location
#[derive(Clone)]
pub struct StoreSettings {
    pub retention: RetentionPolicy,
    pub io_timeout: Duration,
    pub clock: Arc<dyn Clock>,
}

impl fmt::Debug for StoreSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreSettings")
            .field("retention", &self.retention)
            .field("io_timeout", &self.io_timeout)
            .field("clock", &"<dyn Clock>")
            .finish()
    }
}

/// Reject writes the store must never accept
pub fn validate_share(id: &str, value: &Value) -> Result<()> {
    if id.trim().is_empty() {
        return Err(Error::invalid_input("share id must not be empty"));
    }
    if value.is_null() {
        return Err(Error::invalid_input("share value must not be null"));
    }
    Ok(())
}

/// Byte length of a value once serialized as JSON
pub fn serialized_size(value: &Value) -> usize {
    serde_json::to_vec(value).map(|bytes| bytes.len()).unwrap_or(0)
}
