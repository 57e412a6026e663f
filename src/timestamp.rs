//! Timestamps as stored by tweetstore.
//!
//! Feed dates look like `"Wed Oct 10 20:19:24 +0000 2018"`. Only the six
//! wall-clock components are kept; the offset written in the string is dropped
//! and the process-wide zone from [`TimeMode`] is attached instead. In naive
//! mode no zone is attached at all.
//!
//! Parsed feed dates have whole-second resolution. Values read back from the
//! database and user-supplied query bounds keep any fractional seconds, and
//! comparisons are exact to the nanosecond.

use crate::error::{Result, TweetStoreError};
use chrono::{
    DateTime, FixedOffset, Local, NaiveDateTime, Offset, SecondsFormat, TimeZone, Timelike, Utc,
};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Feed date layout used by the streaming API.
const FEED_FORMAT: &str = "%a %b %d %H:%M:%S %z %Y";

/// Offset-less variants accepted as a fallback.
const NAIVE_FEED_FORMATS: &[&str] = &["%a %b %d %H:%M:%S %Y", "%a, %d %b %Y %H:%M:%S"];

/// Storage rendering for naive timestamps.
const NAIVE_DB_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// How parsed wall-clock times are turned into stored values.
///
/// Fixed at startup and passed to the normalizer; nothing reads it from global
/// state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeMode {
    /// Attach this offset to every parsed time.
    Aware(FixedOffset),
    /// Keep wall-clock values without any zone.
    Naive,
}

impl TimeMode {
    /// Timezone-aware mode in UTC.
    #[must_use]
    pub fn utc() -> Self {
        Self::Aware(Utc.fix())
    }

    /// Build a mode from the `use_tz` switch and a zone name.
    ///
    /// # Errors
    ///
    /// Returns an error if `zone` is not `UTC`, `Z` or a `±HH:MM` offset.
    pub fn from_settings(use_tz: bool, zone: &str) -> Result<Self> {
        if use_tz {
            Ok(Self::Aware(parse_zone(zone)?))
        } else {
            Ok(Self::Naive)
        }
    }

    /// Whether values carry a zone.
    #[must_use]
    pub const fn is_aware(self) -> bool {
        matches!(self, Self::Aware(_))
    }

    /// Current time in this mode, truncated to whole seconds.
    #[must_use]
    pub fn now(self) -> Timestamp {
        match self {
            Self::Aware(offset) => Timestamp::aware(Utc::now().with_timezone(&offset)),
            Self::Naive => Timestamp::naive(Local::now().naive_local()),
        }
    }
}

impl Default for TimeMode {
    fn default() -> Self {
        Self::utc()
    }
}

/// Parse a zone setting: `UTC`, `Z`, `+09:00`, `-0530`.
///
/// # Errors
///
/// Returns an error for anything else, or for offsets of a day or more.
pub fn parse_zone(zone: &str) -> Result<FixedOffset> {
    let trimmed = zone.trim();
    if trimmed.eq_ignore_ascii_case("utc") || trimmed == "Z" {
        return Ok(Utc.fix());
    }

    let invalid = || TweetStoreError::invalid_argument(format!("invalid time zone '{zone}'"));

    let (sign, rest) = match trimmed.chars().next() {
        Some('+') => (1, &trimmed[1..]),
        Some('-') => (-1, &trimmed[1..]),
        _ => return Err(invalid()),
    };
    let digits: String = rest.chars().filter(|c| *c != ':').collect();
    if digits.len() != 4 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }
    let hours: i32 = digits[..2].parse().map_err(|_| invalid())?;
    let minutes: i32 = digits[2..].parse().map_err(|_| invalid())?;
    if minutes >= 60 {
        return Err(invalid());
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).ok_or_else(invalid)
}

/// A stored point in time, either zoned or naive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Timestamp {
    Aware(DateTime<FixedOffset>),
    Naive(NaiveDateTime),
}

impl Timestamp {
    /// Zoned timestamp, truncated to whole seconds.
    #[must_use]
    pub fn aware(dt: DateTime<FixedOffset>) -> Self {
        Self::Aware(dt.with_nanosecond(0).unwrap_or(dt))
    }

    /// Naive timestamp, truncated to whole seconds.
    #[must_use]
    pub fn naive(dt: NaiveDateTime) -> Self {
        Self::Naive(dt.with_nanosecond(0).unwrap_or(dt))
    }

    /// Unix seconds used for ordering and range queries.
    ///
    /// Naive values are read as UTC.
    #[must_use]
    pub fn sort_key(&self) -> i64 {
        match self {
            Self::Aware(dt) => dt.timestamp(),
            Self::Naive(dt) => dt.and_utc().timestamp(),
        }
    }

    /// Nanoseconds past [`Self::sort_key`].
    #[must_use]
    pub fn subsec_nanos(&self) -> u32 {
        match self {
            Self::Aware(dt) => dt.nanosecond(),
            Self::Naive(dt) => dt.nanosecond(),
        }
    }

    /// Exact position on the timeline as `(unix seconds, nanoseconds)`.
    #[must_use]
    pub fn instant(&self) -> (i64, u32) {
        (self.sort_key(), self.subsec_nanos())
    }

    /// Text form written to the database. Round-trips through [`Self::from_db_string`].
    ///
    /// A fractional part is written only when present.
    #[must_use]
    pub fn to_db_string(&self) -> String {
        match self {
            Self::Aware(dt) => dt.to_rfc3339_opts(SecondsFormat::AutoSi, false),
            Self::Naive(dt) => dt.format(NAIVE_DB_FORMAT).to_string(),
        }
    }

    /// Parse the database text form, keeping any fractional seconds.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is neither RFC 3339 nor a naive ISO time.
    pub fn from_db_string(value: &str) -> Result<Self> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
            return Ok(Self::Aware(dt));
        }
        NaiveDateTime::parse_from_str(value, NAIVE_DB_FORMAT)
            .map(Self::Naive)
            .map_err(|_| TweetStoreError::invalid_date(value, "stored timestamp"))
    }

    /// Parse a user-supplied bound such as `2018-10-10T00:00:00Z`.
    ///
    /// Values without an offset become naive timestamps. Fractional seconds
    /// are kept, so `2018-10-10T20:00:00.5Z` sorts after `20:00:00`.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is not RFC 3339 or `YYYY-MM-DDTHH:MM:SS`.
    pub fn parse_bound(value: &str) -> Result<Self> {
        Self::from_db_string(value.trim())
            .map_err(|_| TweetStoreError::invalid_date(value, "range bound"))
    }
}

impl Ord for Timestamp {
    fn cmp(&self, other: &Self) -> Ordering {
        self.instant()
            .cmp(&other.instant())
            .then_with(|| self.is_aware_value().cmp(&other.is_aware_value()))
    }
}

impl PartialOrd for Timestamp {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Timestamp {
    const fn is_aware_value(&self) -> bool {
        matches!(self, Self::Aware(_))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_db_string())
    }
}

impl From<Timestamp> for String {
    fn from(value: Timestamp) -> Self {
        value.to_db_string()
    }
}

impl TryFrom<String> for Timestamp {
    type Error = TweetStoreError;

    fn try_from(value: String) -> Result<Self> {
        Self::from_db_string(&value)
    }
}

/// Parse a feed date into a [`Timestamp`] in the given mode.
///
/// `context` names the field being parsed, for error messages.
///
/// # Errors
///
/// Returns [`TweetStoreError::InvalidDate`] if the text matches none of the
/// accepted layouts.
pub fn parse_feed_datetime(value: &str, mode: TimeMode, context: &str) -> Result<Timestamp> {
    let trimmed = value.trim();

    let wall = DateTime::parse_from_str(trimmed, FEED_FORMAT)
        .or_else(|_| DateTime::parse_from_rfc2822(trimmed))
        .map(|dt| dt.naive_local())
        .ok()
        .or_else(|| {
            NAIVE_FEED_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
        })
        .ok_or_else(|| TweetStoreError::invalid_date(value, context))?;

    match mode {
        TimeMode::Aware(offset) => offset
            .from_local_datetime(&wall)
            .single()
            .map(Timestamp::aware)
            .ok_or_else(|| TweetStoreError::invalid_date(value, context)),
        TimeMode::Naive => Ok(Timestamp::naive(wall)),
    }
}
