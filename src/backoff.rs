// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Retry and backoff policies.
//!
//! Three independent timers keep a device from hammering a broker:
//!
//! - [`reconnect_interval`] - pause between connection attempts, a step
//!   function of the number of failed attempts
//! - [`retry_delay`] - pause before retrying a failed publish, a step
//!   function of how long publishes have been failing
//! - [`ErrorStreak`] - tracks the current run of publish failures and
//!   signals when it has lasted long enough to force a reconnect

use std::time::Duration;

/// A publish-error streak this long forces a disconnect.
pub const SUSTAINED_FAILURE_LIMIT: Duration = Duration::from_secs(60);

/// Returns the pause between connection attempts after `failures` failed attempts.
///
/// | failures | interval |
/// |----------|----------|
/// | 0-4      | 5 s      |
/// | 5-9      | 10 s     |
/// | 10-14    | 20 s     |
/// | 15-19    | 30 s     |
/// | 20+      | 60 s     |
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use homie_lib::backoff::reconnect_interval;
///
/// assert_eq!(reconnect_interval(0), Duration::from_secs(5));
/// assert_eq!(reconnect_interval(12), Duration::from_secs(20));
/// assert_eq!(reconnect_interval(500), Duration::from_secs(60));
/// ```
#[must_use]
pub const fn reconnect_interval(failures: u32) -> Duration {
    let secs = match failures {
        0..5 => 5,
        5..10 => 10,
        10..15 => 20,
        15..20 => 30,
        _ => 60,
    };
    Duration::from_secs(secs)
}

/// Returns the pause before retrying a failed publish, given how long the
/// current failure streak has lasted.
///
/// Under 5 s of failures: 1 s. Under 20 s: 5 s. Beyond: 10 s.
#[must_use]
pub const fn retry_delay(streak_length: Duration) -> Duration {
    let secs = streak_length.as_secs();
    if secs >= 20 {
        Duration::from_secs(10)
    } else if secs >= 5 {
        Duration::from_secs(5)
    } else {
        Duration::from_secs(1)
    }
}

/// The current run of consecutive publish failures.
///
/// Any success ends the streak.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ErrorStreak {
    since: Option<Duration>,
}

impl ErrorStreak {
    /// Creates a streak with no failures.
    #[must_use]
    pub const fn new() -> Self {
        Self { since: None }
    }

    /// Returns whether publishes are currently failing.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.since.is_some()
    }

    /// Returns when the streak started.
    #[must_use]
    pub const fn since(&self) -> Option<Duration> {
        self.since
    }

    /// Records a failure at `now`.
    ///
    /// Returns `true` when the streak has lasted [`SUSTAINED_FAILURE_LIMIT`]
    /// and the session should be torn down.
    pub fn record_failure(&mut self, now: Duration) -> bool {
        match self.since {
            None => {
                self.since = Some(now);
                false
            }
            Some(since) => now.saturating_sub(since) >= SUSTAINED_FAILURE_LIMIT,
        }
    }

    /// Ends the streak.
    pub fn clear(&mut self) {
        self.since = None;
    }

    /// Returns the retry delay for the streak as of `now`.
    #[must_use]
    pub fn retry_delay(&self, now: Duration) -> Duration {
        retry_delay(self.since.map_or(Duration::ZERO, |since| now.saturating_sub(since)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    #[test]
    fn reconnect_tiers() {
        let expected = [
            (0, 5_000),
            (4, 5_000),
            (5, 10_000),
            (9, 10_000),
            (10, 20_000),
            (14, 20_000),
            (15, 30_000),
            (19, 30_000),
            (20, 60_000),
        ];
        for (failures, millis) in expected {
            assert_eq!(
                reconnect_interval(failures),
                Duration::from_millis(millis),
                "failures = {failures}"
            );
        }
    }

    #[test]
    fn reconnect_interval_never_decreases() {
        let mut previous = Duration::ZERO;
        for failures in 0..100 {
            let interval = reconnect_interval(failures);
            assert!(interval >= previous);
            previous = interval;
        }
    }

    #[test]
    fn retry_tiers() {
        assert_eq!(retry_delay(secs(0)), secs(1));
        assert_eq!(retry_delay(Duration::from_millis(4_999)), secs(1));
        assert_eq!(retry_delay(secs(5)), secs(5));
        assert_eq!(retry_delay(secs(19)), secs(5));
        assert_eq!(retry_delay(secs(20)), secs(10));
        assert_eq!(retry_delay(secs(3600)), secs(10));
    }

    #[test]
    fn streak_escalates_and_resets() {
        let mut streak = ErrorStreak::new();
        assert!(!streak.record_failure(secs(100)));
        assert_eq!(streak.retry_delay(secs(101)), secs(1));
        assert_eq!(streak.retry_delay(secs(106)), secs(5));
        assert_eq!(streak.retry_delay(secs(125)), secs(10));

        streak.clear();
        assert!(!streak.is_active());
        assert_eq!(streak.retry_delay(secs(200)), secs(1));
    }

    #[test]
    fn streak_start_is_first_failure() {
        let mut streak = ErrorStreak::new();
        streak.record_failure(secs(10));
        streak.record_failure(secs(30));
        assert_eq!(streak.since(), Some(secs(10)));
    }

    #[test]
    fn sustained_failure_after_a_minute() {
        let mut streak = ErrorStreak::new();
        assert!(!streak.record_failure(secs(0)));
        assert!(!streak.record_failure(secs(30)));
        assert!(!streak.record_failure(Duration::from_millis(59_999)));
        assert!(streak.record_failure(secs(60)));
    }
}
