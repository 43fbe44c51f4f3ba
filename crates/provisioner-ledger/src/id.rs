use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, LedgerResult};

const RUN_ID_FORMAT: &str = "%Y%m%d%H%M%S%3f";
const RUN_ID_LEN: usize = 17;

static LAST_ISSUED_MILLIS: AtomicI64 = AtomicI64::new(0);

/// Run identifier: UTC creation time as `YYYYMMDDHHMMSSmmm`.
///
/// Fixed width, so lexicographic order is chronological order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RunId(String);

impl RunId {
    /// Issue an id strictly greater than every id issued before in this
    /// process.
    pub fn next() -> Self {
        let now = Utc::now().timestamp_millis();
        let previous = LAST_ISSUED_MILLIS
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(now.max(last + 1))
            })
            .unwrap_or(now);
        Self::from_millis(now.max(previous + 1))
    }

    pub fn from_time(time: DateTime<Utc>) -> Self {
        Self(time.format(RUN_ID_FORMAT).to_string())
    }

    pub fn parse(raw: &str) -> LedgerResult<Self> {
        let raw = raw.trim();
        if raw.len() != RUN_ID_LEN || !raw.bytes().all(|byte| byte.is_ascii_digit()) {
            return Err(LedgerError::InvalidRunId(raw.to_string()));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn from_millis(millis: i64) -> Self {
        match DateTime::<Utc>::from_timestamp_millis(millis) {
            Some(time) => Self::from_time(time),
            None => Self::from_time(Utc::now()),
        }
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for RunId {
    type Error = LedgerError;

    fn try_from(value: String) -> LedgerResult<Self> {
        Self::parse(&value)
    }
}

impl From<RunId> for String {
    fn from(value: RunId) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn formats_fixed_width_utc() {
        let time = Utc
            .with_ymd_and_hms(2024, 3, 9, 7, 5, 1)
            .single()
            .expect("valid time");
        assert_eq!(RunId::from_time(time).as_str(), "20240309070501000");
    }

    #[test]
    fn issued_ids_strictly_increase() {
        let ids: Vec<RunId> = (0..50).map(|_| RunId::next()).collect();
        for pair in ids.windows(2) {
            assert!(pair[0] < pair[1], "{} !< {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn parse_rejects_malformed_ids() {
        assert!(RunId::parse("20240309070501000").is_ok());
        assert!(RunId::parse("2024-03-09").is_err());
        assert!(RunId::parse("2024030907050100x").is_err());
    }

    #[test]
    fn serde_goes_through_parse() {
        let id: RunId = serde_json::from_str("\"20240309070501000\"").expect("valid");
        assert_eq!(id.as_str(), "20240309070501000");
        assert!(serde_json::from_str::<RunId>("\"nope\"").is_err());
    }
}
