use vexdb_core::{CoreError, CoreResult, Timestamp};

/// Monotonic gate over logical request timestamps.
///
/// A timestamp is accepted only if it is strictly greater than the watermark, the
/// last accepted timestamp. The barrier holds no lock of its own: callers keep it
/// inside the same critical section as the state it guards, so acceptance and the
/// guarded mutation become visible together.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimestampBarrier {
    watermark: Timestamp,
}

impl TimestampBarrier {
    /// Creates a barrier that accepts any timestamp above zero.
    #[must_use]
    pub const fn new() -> Self {
        Self { watermark: 0 }
    }

    /// Last accepted timestamp.
    #[must_use]
    pub const fn watermark(&self) -> Timestamp {
        self.watermark
    }

    /// Accepts `ts` and advances the watermark iff `ts > watermark`.
    pub fn validate(&mut self, ts: Timestamp) -> bool {
        if ts > self.watermark {
            self.watermark = ts;
            true
        } else {
            false
        }
    }

    /// Checks `ts` without advancing.
    ///
    /// # Errors
    ///
    /// Returns `StaleOrDuplicateTimestamp` when `ts <= watermark`.
    pub fn admit(&self, ts: Timestamp) -> CoreResult<()> {
        if ts > self.watermark {
            Ok(())
        } else {
            Err(CoreError::stale_timestamp(ts, self.watermark))
        }
    }

    /// Advances to a timestamp previously admitted under the same lock.
    pub fn commit(&mut self, ts: Timestamp) {
        debug_assert!(ts > self.watermark, "commit of unadmitted timestamp {ts}");
        self.watermark = self.watermark.max(ts);
    }
}
