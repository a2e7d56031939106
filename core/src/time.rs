//! Time related utils.

use crate::{Error, Result};
use chrono::NaiveDateTime;
use chrono::Utc;

/// DateTime is the alias for `chrono::DateTime<Utc>`.
pub type DateTime = chrono::DateTime<Utc>;

/// Layout used by the EG1 scheme: "20140321T19:34:21+0000"
const EDGEGRID_TIMESTAMP: &str = "%Y%m%dT%H:%M:%S+0000";
const EDGEGRID_TIMESTAMP_LEN: usize = "20140321T19:34:21+0000".len();

/// Create datetime of now.
pub fn now() -> DateTime {
    Utc::now()
}

/// Format time into the EG1 timestamp layout: "20140321T19:34:21+0000"
pub fn format_edgegrid_timestamp(t: DateTime) -> String {
    t.format(EDGEGRID_TIMESTAMP).to_string()
}

/// Parse an EG1 timestamp.
///
/// The layout is fixed width and always UTC, anything else is rejected.
pub fn parse_edgegrid_timestamp(s: &str) -> Result<DateTime> {
    if s.len() != EDGEGRID_TIMESTAMP_LEN {
        return Err(Error::timestamp_invalid(format!(
            "timestamp `{s}` must look like 20140321T19:34:21+0000"
        )));
    }

    NaiveDateTime::parse_from_str(s, EDGEGRID_TIMESTAMP)
        .map(|v| v.and_utc())
        .map_err(|e| {
            Error::timestamp_invalid(format!("timestamp `{s}` can't be parsed")).with_source(e)
        })
}

/// Format time into common log format: "21/Mar/2014:19:34:21 +0000"
pub fn format_common_log(t: DateTime) -> String {
    t.format("%d/%b/%Y:%H:%M:%S %z").to_string()
}

/// Format time into RFC 3339: "2014-03-21T19:34:21Z"
pub fn format_rfc3339(t: DateTime) -> String {
    t.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}
