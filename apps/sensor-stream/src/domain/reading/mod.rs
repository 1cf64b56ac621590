//! Sensor Reading Types
//!
//! The single record emitted by the service: one temperature sample with
//! an identifier and the wall-clock instant it was taken.
//!
//! # Value Range
//!
//! Sampled readings are uniform over `[20.0, 35.0)` (see [`VALUE_RANGE`]).
//! The randomness itself is supplied through [`ValueSource`] so callers
//! decide between a thread-local generator and a seeded one.

use std::ops::Range;

use chrono::{DateTime, Utc};

// =============================================================================
// Constants
// =============================================================================

/// Lower bound (inclusive) of a sampled reading value.
pub const VALUE_MIN: f64 = 20.0;

/// Upper bound (exclusive) of a sampled reading value.
pub const VALUE_MAX: f64 = 35.0;

/// Half-open range sampled reading values are drawn from.
pub const VALUE_RANGE: Range<f64> = VALUE_MIN..VALUE_MAX;

/// Reading identifier (tick counter of the emitting subscription).
pub type ReadingId = i64;

// =============================================================================
// Value Source
// =============================================================================

/// Source of uniformly distributed reading values.
///
/// Implementations must return a value inside `range` (lower bound
/// inclusive, upper bound exclusive).
#[cfg_attr(test, mockall::automock)]
pub trait ValueSource: Send {
    /// Draw the next value from `range`.
    fn sample(&mut self, range: Range<f64>) -> f64;
}

impl<S: ValueSource + ?Sized> ValueSource for Box<S> {
    fn sample(&mut self, range: Range<f64>) -> f64 {
        (**self).sample(range)
    }
}

// =============================================================================
// Reading
// =============================================================================

/// One sensor sample.
///
/// Fields are private; a reading never changes after construction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    id: ReadingId,
    value: f64,
    timestamp: DateTime<Utc>,
}

impl Reading {
    /// Create a reading from explicit parts.
    #[must_use]
    pub const fn new(id: ReadingId, value: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            id,
            value,
            timestamp,
        }
    }

    /// Create a reading with a value drawn from `source` and the current
    /// wall-clock time.
    ///
    /// A value outside [`VALUE_RANGE`] returned by a misbehaving source is
    /// clamped back into the range.
    pub fn sample<S: ValueSource + ?Sized>(id: ReadingId, source: &mut S) -> Self {
        let value = clamp_to_range(source.sample(VALUE_RANGE));
        Self::new(id, value, Utc::now())
    }

    /// Reading identifier.
    #[must_use]
    pub const fn id(&self) -> ReadingId {
        self.id
    }

    /// Measured value.
    #[must_use]
    pub const fn value(&self) -> f64 {
        self.value
    }

    /// Instant the reading was taken.
    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    #[cfg(test)]
    pub(crate) fn in_range(&self) -> bool {
        VALUE_RANGE.contains(&self.value)
    }
}

fn clamp_to_range(value: f64) -> f64 {
    if value.is_nan() || value < VALUE_MIN {
        VALUE_MIN
    } else if value >= VALUE_MAX {
        VALUE_MAX.next_down()
    } else {
        value
    }
}

// =============================================================================
// Tests
// =============================================================================
