//! Session record and its on-disk value format.
//!
//! A record pairs an opaque payload with an optional expiration timestamp
//! (Unix epoch seconds). Values are stored as JSON so they stay readable with
//! generic redb tooling.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Current Unix time in seconds.
pub fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// A stored session: opaque payload plus expiration metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Caller-encoded session values.
    pub payload: Vec<u8>,
    /// Expiration timestamp (Unix epoch seconds). `None` or `0` = never expires.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
}

impl Record {
    /// Creates a record that lives for `max_age_secs` from now.
    ///
    /// A positive age sets an expiration, zero means the record never
    /// expires and a negative age produces a record that is already expired.
    pub fn new(payload: Vec<u8>, max_age_secs: i64) -> Self {
        Self::new_at(payload, max_age_secs, unix_now())
    }

    /// Same as [`Record::new`] with an explicit clock reading.
    pub fn new_at(payload: Vec<u8>, max_age_secs: i64, now: i64) -> Self {
        let expires_at = match max_age_secs {
            0 => None,
            // Past timestamps must never collapse into the `0` sentinel.
            age if age < 0 => Some(now.saturating_add(age).max(1)),
            age => Some(now.saturating_add(age)),
        };
        Self {
            payload,
            expires_at,
        }
    }

    /// Creates a record that never expires.
    pub const fn persistent(payload: Vec<u8>) -> Self {
        Self {
            payload,
            expires_at: None,
        }
    }

    /// Creates a record that is already expired.
    pub const fn expired(payload: Vec<u8>) -> Self {
        Self {
            payload,
            expires_at: Some(1),
        }
    }

    /// Whether the record is expired at `now`.
    pub const fn is_expired_at(&self, now: i64) -> bool {
        match self.expires_at {
            Some(at) => at != 0 && at <= now,
            None => false,
        }
    }

    /// Whether the record is expired right now.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(unix_now())
    }

    /// Remaining lifetime in seconds at `now`, `None` if it never expires.
    pub fn ttl_at(&self, now: i64) -> Option<i64> {
        match self.expires_at {
            Some(at) if at != 0 => Some((at - now).max(0)),
            _ => None,
        }
    }
}

/// Encodes a record into its stored value.
pub fn encode(record: &Record) -> Result<Vec<u8>> {
    serde_json::to_vec(record).map_err(Error::Encode)
}

/// Decodes a stored value.
///
/// Fails with [`Error::Decode`] when the bytes are not a record.
pub fn decode(bytes: &[u8]) -> Result<Record> {
    serde_json::from_slice(bytes).map_err(Error::Decode)
}
