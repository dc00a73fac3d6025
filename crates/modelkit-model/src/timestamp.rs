//! Clock abstraction and auto-timestamp rendering.

use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Datelike, Duration, Utc};
use modelkit_core::{SemanticType, TimePrecision, Value};

/// Source of the current time.
pub trait Clock: Send + Sync {
    /// Current instant, UTC.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    /// Clock stopped at `now`.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// Clock stopped at a Unix timestamp (seconds).
    pub fn at_unix(seconds: i64) -> Self {
        Self::new(DateTime::from_timestamp(seconds, 0).unwrap_or_default())
    }

    /// Move to `now`.
    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = now;
    }

    /// Move forward by `seconds`.
    pub fn advance(&self, seconds: i64) {
        let mut guard = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *guard += Duration::seconds(seconds);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Render `now` for a timestamp column of type `ty`.
///
/// `bigint` columns hold Unix time scaled by `precision`; `int` columns hold
/// whole seconds. Returns `None` for types that cannot carry a timestamp.
pub fn format_timestamp(
    ty: SemanticType,
    precision: TimePrecision,
    now: DateTime<Utc>,
) -> Option<Value> {
    let value = match ty {
        SemanticType::Date => Value::Text(now.format("%Y-%m-%d").to_string()),
        SemanticType::Time => Value::Text(now.format("%H:%M:%S").to_string()),
        SemanticType::DateTime | SemanticType::Timestamp => {
            Value::Text(now.format("%Y-%m-%d %H:%M:%S").to_string())
        }
        SemanticType::Year => Value::Int(i64::from(now.year())),
        SemanticType::Int => Value::Int(now.timestamp()),
        SemanticType::BigInt => {
            let scaled = i128::from(now.timestamp_micros()) * i128::from(precision.multiplier())
                / 1_000_000;
            Value::Int(i64::try_from(scaled).unwrap_or(i64::MAX))
        }
        _ => return None,
    };
    Some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instant() -> DateTime<Utc> {
        // 2024-03-05 06:07:08.123456 UTC
        DateTime::from_timestamp(1_709_618_828, 123_456_000).unwrap()
    }

    #[test]
    fn test_text_formats() {
        let now = instant();
        let p = TimePrecision::default();
        assert_eq!(
            format_timestamp(SemanticType::Date, p, now),
            Some(Value::from("2024-03-05"))
        );
        assert_eq!(
            format_timestamp(SemanticType::Time, p, now),
            Some(Value::from("06:07:08"))
        );
        assert_eq!(
            format_timestamp(SemanticType::DateTime, p, now),
            Some(Value::from("2024-03-05 06:07:08"))
        );
        assert_eq!(
            format_timestamp(SemanticType::Timestamp, p, now),
            Some(Value::from("2024-03-05 06:07:08"))
        );
        assert_eq!(
            format_timestamp(SemanticType::Year, p, now),
            Some(Value::Int(2024))
        );
    }

    #[test]
    fn test_numeric_formats() {
        let now = instant();
        assert_eq!(
            format_timestamp(SemanticType::Int, TimePrecision::MILLIS, now),
            Some(Value::Int(1_709_618_828))
        );
        assert_eq!(
            format_timestamp(SemanticType::BigInt, TimePrecision::MILLIS, now),
            Some(Value::Int(1_709_618_828_123))
        );
        assert_eq!(
            format_timestamp(SemanticType::BigInt, TimePrecision::MICROS, now),
            Some(Value::Int(1_709_618_828_123_456))
        );
        assert_eq!(
            format_timestamp(SemanticType::BigInt, TimePrecision::new(1), now),
            Some(Value::Int(1_709_618_828))
        );
        assert_eq!(format_timestamp(SemanticType::Varchar, TimePrecision::MILLIS, now), None);
    }

    #[test]
    fn test_fixed_clock_advances() {
        let clock = FixedClock::at_unix(100);
        assert_eq!(clock.now().timestamp(), 100);
        clock.advance(5);
        assert_eq!(clock.now().timestamp(), 105);
        clock.set(instant());
        assert_eq!(clock.now(), instant());
    }
}
