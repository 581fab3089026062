//! Validated transaction record and the errors raised when one is refused.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Largest accepted value. Any realistic number of retained values at or
/// below it sums to a finite `f64`, so aggregates stay numeric.
pub const MAX_VALUE: f64 = 1e15;

/// Reasons a transaction is refused at the boundary.
///
/// All variants are deterministic: resubmitting the same payload yields the
/// same error, so callers must not retry.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("transaction value must not be negative (got {value})")]
    NegativeValue { value: f64 },

    #[error("transaction value must be a finite number")]
    NonFiniteValue,

    #[error("transaction value {value} exceeds the maximum of {max}")]
    ValueTooLarge { value: f64, max: f64 },

    #[error("transaction timestamp {timestamp} is in the future (now is {now})")]
    FutureTimestamp {
        timestamp: DateTime<Utc>,
        now: DateTime<Utc>,
    },
}

impl ValidationError {
    /// Stable snake_case tag, used for metric labels and API error reasons.
    pub fn kind(&self) -> &'static str {
        match self {
            ValidationError::NegativeValue { .. } => "negative_value",
            ValidationError::NonFiniteValue => "non_finite_value",
            ValidationError::ValueTooLarge { .. } => "value_too_large",
            ValidationError::FutureTimestamp { .. } => "future_timestamp",
        }
    }
}

/// A monetary event. Only constructible through [`Transaction::new`], so a
/// value held anywhere in the crate already satisfies its invariants.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transaction {
    value: f64,
    timestamp: DateTime<Utc>,
}

impl Transaction {
    /// Validate against `now` and build the record.
    pub fn new(
        value: f64,
        timestamp: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Self, ValidationError> {
        if !value.is_finite() {
            return Err(ValidationError::NonFiniteValue);
        }
        if value < 0.0 {
            return Err(ValidationError::NegativeValue { value });
        }
        if value > MAX_VALUE {
            return Err(ValidationError::ValueTooLarge {
                value,
                max: MAX_VALUE,
            });
        }
        if timestamp > now {
            return Err(ValidationError::FutureTimestamp { timestamp, now });
        }
        Ok(Self { value, timestamp })
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}
