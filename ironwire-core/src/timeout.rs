// ironwire-core/src/timeout.rs
// Shared time budget for one logical call (CSOT)

use std::time::{Duration, Instant};

use crate::error::{DriverError, Result};

/// Time budget shared by every round trip of one logical call.
///
/// Created once per caller invocation and threaded by mutable reference
/// through retries and cursor continuations, so every attempt observes the
/// same shrinking budget. Never cloned between attempts.
///
/// Two deadline policies exist:
/// - cursor-lifetime (default): one deadline spans initialization, every
///   `getMore`, and all retries in between;
/// - per-iteration: tailable await-data cursors get a fresh deadline before
///   each continuation ([`TimeoutContext::refresh_for_get_more`]).
#[derive(Debug)]
pub struct TimeoutContext {
    deadline: Option<Instant>,
    /// The original timeout, kept so per-iteration mode can re-arm the deadline.
    timeout: Option<Duration>,
    min_round_trip_time: Duration,
    timeout_for_cursor_lifetime: bool,
}

impl TimeoutContext {
    /// No overall limit. Round trips only fail on their own transport errors.
    pub fn unlimited() -> Self {
        TimeoutContext {
            deadline: None,
            timeout: None,
            min_round_trip_time: Duration::ZERO,
            timeout_for_cursor_lifetime: true,
        }
    }

    /// One deadline covering the whole logical call, cursor lifetime included.
    pub fn with_timeout(timeout: Duration) -> Self {
        TimeoutContext {
            deadline: Some(Instant::now() + timeout),
            timeout: Some(timeout),
            min_round_trip_time: Duration::ZERO,
            timeout_for_cursor_lifetime: true,
        }
    }

    /// Fresh deadline per cursor iteration (tailable await-data mode).
    pub fn per_iteration(timeout: Duration) -> Self {
        TimeoutContext {
            deadline: Some(Instant::now() + timeout),
            timeout: Some(timeout),
            min_round_trip_time: Duration::ZERO,
            timeout_for_cursor_lifetime: false,
        }
    }

    /// Reserve slack for the expected network round trip, subtracted from the
    /// remaining budget before a per-command `maxTimeMS` is derived.
    pub fn with_min_round_trip_time(mut self, rtt: Duration) -> Self {
        self.min_round_trip_time = rtt;
        self
    }

    /// Time left before the deadline, clamped to zero. `None` means no limit.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Whether the budget is already exhausted.
    pub fn expired(&self) -> bool {
        matches!(self.remaining(), Some(rem) if rem.is_zero())
    }

    /// Derive the `maxTimeMS` value for the next command.
    ///
    /// Returns `Ok(None)` when no deadline was set. Fails with
    /// [`DriverError::OperationTimeout`] when the remaining budget, minus the
    /// reserved round-trip slack, leaves less than one whole millisecond:
    /// sending a command with a zero budget would only waste a round trip.
    pub fn max_time_ms_for_next_command(&self) -> Result<Option<u64>> {
        let Some(remaining) = self.remaining() else {
            return Ok(None);
        };
        let usable = remaining.saturating_sub(self.min_round_trip_time);
        let millis = usable.as_millis() as u64;
        if millis == 0 {
            return Err(DriverError::OperationTimeout);
        }
        Ok(Some(millis))
    }

    /// Re-arm the deadline before a cursor continuation.
    ///
    /// No-op in cursor-lifetime mode; in per-iteration mode the deadline
    /// becomes `now + original timeout`.
    pub fn refresh_for_get_more(&mut self) {
        if self.timeout_for_cursor_lifetime {
            return;
        }
        if let Some(timeout) = self.timeout {
            self.deadline = Some(Instant::now() + timeout);
        }
    }

    /// Whether one deadline spans the whole cursor lifetime.
    pub fn is_cursor_lifetime(&self) -> bool {
        self.timeout_for_cursor_lifetime
    }
}
