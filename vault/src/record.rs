//! Visit records and their one-line encoding

use std::fmt;

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone, Timelike};

/// Timestamp format used in record lines and entry names
pub const RECORD_TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// One customer visit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub full_name: String,
    pub phone_number: String,
    /// Local wall-clock time, second precision
    pub timestamp: NaiveDateTime,
}

impl Record {
    /// Build a record stamped with `now`, truncated to the second
    pub fn new(
        full_name: impl Into<String>,
        phone_number: impl Into<String>,
        now: DateTime<Local>,
    ) -> Self {
        let timestamp = now.naive_local();
        let timestamp = timestamp.with_nanosecond(0).unwrap_or(timestamp);

        Self {
            full_name: full_name.into(),
            phone_number: phone_number.into(),
            timestamp,
        }
    }

    /// The calendar day this record belongs to
    pub fn day(&self) -> NaiveDate {
        self.timestamp.date()
    }

    /// `FullName,PhoneNumber,yyyyMMddHHmmss`
    pub fn to_line(&self) -> String {
        format!(
            "{},{},{}",
            self.full_name,
            self.phone_number,
            self.timestamp.format(RECORD_TIMESTAMP_FORMAT)
        )
    }

    /// Parse a record line; the timestamp is the last field so names
    /// written before comma validation still decode
    pub fn parse_line(line: &str) -> Result<Self, String> {
        let line = line.trim_end_matches(['\r', '\n']);

        let (rest, stamp) = line
            .rsplit_once(',')
            .ok_or_else(|| "missing timestamp field".to_string())?;
        let (full_name, phone_number) = rest
            .rsplit_once(',')
            .ok_or_else(|| "missing phone number field".to_string())?;

        let timestamp = NaiveDateTime::parse_from_str(stamp, RECORD_TIMESTAMP_FORMAT)
            .map_err(|e| format!("bad timestamp {stamp:?}: {e}"))?;

        if full_name.is_empty() || phone_number.is_empty() {
            return Err("empty name or phone number".to_string());
        }

        Ok(Self {
            full_name: full_name.to_string(),
            phone_number: phone_number.to_string(),
            timestamp,
        })
    }

    /// Entry name inside the daily archive
    pub fn entry_name(&self) -> String {
        format!("{}.txt", self.timestamp.format(RECORD_TIMESTAMP_FORMAT))
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_line())
    }
}

/// Resolve a local wall-clock time, taking the earlier instant when a DST
/// change makes it ambiguous
pub fn local_time(naive: NaiveDateTime) -> Option<DateTime<Local>> {
    Local.from_local_datetime(&naive).earliest()
}
