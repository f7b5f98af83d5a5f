//! Retry pacing for the TCP accept loop and the UDP receive loop.

use std::time::Duration;

use serde::{Deserialize, Serialize};

const FLOOR: Duration = Duration::from_millis(1);

/// Exponential delay between consecutive socket failures.
///
/// Defaults to 10 ms, doubling up to 1 s.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
    /// Pause after the first failure.
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_secs(1),
        }
    }
}

impl BackoffConfig {
    /// Raise both delays to at least 1 ms and order them.
    ///
    /// ```
    /// use std::time::Duration;
    ///
    /// use syslog_wire::server::BackoffConfig;
    ///
    /// let pacing = BackoffConfig {
    ///     initial_delay: Duration::from_millis(5),
    ///     max_delay: Duration::ZERO,
    /// }
    /// .normalized();
    /// assert_eq!(pacing.initial_delay, Duration::from_millis(1));
    /// assert_eq!(pacing.max_delay, Duration::from_millis(5));
    /// ```
    #[must_use]
    pub fn normalized(self) -> Self {
        let a = self.initial_delay.max(FLOOR);
        let b = self.max_delay.max(FLOOR);
        Self {
            initial_delay: a.min(b),
            max_delay: a.max(b),
        }
    }

    #[must_use]
    pub(crate) fn next_delay(&self, delay: Duration) -> Duration { delay.saturating_mul(2).min(self.max_delay) }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(10, 20)]
    #[case(600, 1000)]
    #[case(1000, 1000)]
    fn delay_doubles_up_to_the_cap(#[case] current_ms: u64, #[case] next_ms: u64) {
        let pacing = BackoffConfig::default();
        assert_eq!(
            pacing.next_delay(Duration::from_millis(current_ms)),
            Duration::from_millis(next_ms)
        );
    }
}
