use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use http::HeaderMap;
use log::debug;

use crate::constants::ERROR_CODE_TIME_TOO_SKEWED;
use crate::error::ServiceError;
use crate::time::{now, parse_http_date, DateTime};

/// Process-wide signed offset between the service clock and the local clock.
///
/// Default zero. Every signature reads it to compute the timestamp actually
/// signed; it is written at most once per skew-triggering rejection. Readers
/// may observe a stale offset for the duration of one in-flight correction,
/// which is acceptable since the correction is self-healing.
#[derive(Debug, Clone, Default)]
pub struct ClockOffset {
    millis: Arc<AtomicI64>,
}

impl ClockOffset {
    /// Create a new offset handle at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// The current time as the service sees it.
    pub fn now(&self) -> DateTime {
        now() + chrono::TimeDelta::milliseconds(self.millis.load(Ordering::Relaxed))
    }

    /// The stored offset in milliseconds.
    pub fn offset_millis(&self) -> i64 {
        self.millis.load(Ordering::Relaxed)
    }

    /// Record the offset implied by a server-reported time.
    pub fn record(&self, server_time: DateTime) {
        let offset = server_time
            .signed_duration_since(now())
            .num_milliseconds();
        debug!("recording clock offset of {offset}ms");
        self.millis.store(offset, Ordering::Relaxed);
    }
}

/// Detect a clock-skew rejection.
///
/// The service signals skew with a single designated error code; the
/// server's own clock comes from the `Date` header of the same response.
/// Returns the server time when both are present.
pub fn detect_skew(err: &ServiceError, headers: &HeaderMap) -> Option<DateTime> {
    if err.code != ERROR_CODE_TIME_TOO_SKEWED {
        return None;
    }

    headers
        .get(http::header::DATE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| parse_http_date(v).ok())
}
