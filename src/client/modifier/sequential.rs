//! Per-severity sequence numbers.

use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};

use super::{MessageModifier, ModifierDelimiters};
use crate::{
    error::ConfigError,
    priority::{Facility, Severity},
};

/// Range and formatting of a [`SequentialModifier`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SequentialConfig {
    /// First number emitted, and the number emitted after a wrap.
    pub first: u64,
    /// Exclusive upper bound; the counter wraps on reaching it.
    pub last: u64,
    /// Left-pad numbers to the width of `last`.
    pub use_padding: bool,
    pub pad_char: char,
    pub delimiters: ModifierDelimiters,
}

impl Default for SequentialConfig {
    fn default() -> Self {
        Self {
            first: 0,
            last: 9_999,
            use_padding: true,
            pad_char: '0',
            delimiters: ModifierDelimiters::new(" #", ""),
        }
    }
}

/// Appends a sequence number that advances independently for each severity.
#[derive(Debug)]
pub struct SequentialModifier {
    config: SequentialConfig,
    width: usize,
    counters: [Mutex<u64>; 8],
}

impl SequentialModifier {
    /// Build a modifier from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidSequenceRange`] unless `first < last`.
    pub fn new(config: SequentialConfig) -> Result<Self, ConfigError> {
        if config.first >= config.last {
            return Err(ConfigError::InvalidSequenceRange {
                first: config.first,
                last: config.last,
            });
        }
        let width = config.last.to_string().len();
        let first = config.first;
        Ok(Self {
            config,
            width,
            counters: std::array::from_fn(|_| Mutex::new(first)),
        })
    }

    #[must_use]
    pub fn config(&self) -> &SequentialConfig { &self.config }

    /// Return the current number for `severity` and advance its counter,
    /// wrapping to `first` when it reaches `last`.
    pub fn next_sequence(&self, severity: Severity) -> u64 {
        let mut counter = self.counter(severity);
        let current = *counter;
        let next = current + 1;
        *counter = if next >= self.config.last { self.config.first } else { next };
        current
    }

    /// Set the next number emitted for `severity`; values outside
    /// `[first, last)` are ignored.
    pub fn set_next_sequence(&self, severity: Severity, value: u64) {
        if (self.config.first..self.config.last).contains(&value) {
            *self.counter(severity) = value;
        }
    }

    fn counter(&self, severity: Severity) -> std::sync::MutexGuard<'_, u64> {
        self.counters[usize::from(severity.code())]
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn format(&self, number: u64) -> String {
        let digits = number.to_string();
        if !self.config.use_padding || digits.len() >= self.width {
            return digits;
        }
        let mut padded: String = std::iter::repeat_n(self.config.pad_char, self.width - digits.len()).collect();
        padded.push_str(&digits);
        padded
    }
}

impl Default for SequentialModifier {
    fn default() -> Self {
        let config = SequentialConfig::default();
        Self {
            width: config.last.to_string().len(),
            counters: std::array::from_fn(|_| Mutex::new(config.first)),
            config,
        }
    }
}

impl MessageModifier for SequentialModifier {
    fn modify(&self, _facility: Facility, severity: Severity, message: &str) -> String {
        let number = self.format(self.next_sequence(severity));
        self.config.delimiters.wrap(message, &number)
    }
}
