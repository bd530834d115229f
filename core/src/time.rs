//! Time related utils.

use chrono::Utc;

use crate::{Error, Result};

/// DateTime in UTC, second precision is all signing needs.
pub type DateTime = chrono::DateTime<Utc>;

/// Create a [`DateTime`] of current time.
pub fn now() -> DateTime {
    Utc::now()
}

/// Date format: `20220313`
pub fn format_date(t: DateTime) -> String {
    t.format("%Y%m%d").to_string()
}

/// Compact ISO 8601 format: `20220313T072004Z`
pub fn format_iso8601(t: DateTime) -> String {
    t.format("%Y%m%dT%H%M%SZ").to_string()
}

/// HTTP date format: `Sun, 06 Nov 1994 08:49:37 GMT`
pub fn format_http_date(t: DateTime) -> String {
    t.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Parse an HTTP date as carried in a `Date` header.
pub fn parse_http_date(s: &str) -> Result<DateTime> {
    let t = chrono::DateTime::parse_from_rfc2822(s)
        .map_err(|e| Error::unexpected(format!("invalid http date: {s}")).with_source(e))?;
    Ok(t.with_timezone(&Utc))
}
