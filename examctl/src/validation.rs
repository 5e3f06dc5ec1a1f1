//! Business-rule checks for reservation creation and status changes.
//!
//! These are pure functions over already-loaded schedule data so the same
//! rules apply identically in user-facing handlers and the admin confirmation
//! transaction.

use chrono::{DateTime, Duration, Utc};

use crate::errors::{Error, Result, messages};

/// Reject reservation sizes outside `1..=limit`.
pub fn check_reserved_count(reserved_count: i32, limit: i32) -> Result<()> {
    if reserved_count < 1 {
        return Err(Error::BadRequest {
            message: "reserved_count must be at least 1".to_string(),
        });
    }
    if reserved_count > limit {
        return Err(Error::BadRequest {
            message: messages::max_reserved_count(limit),
        });
    }
    Ok(())
}

/// Reject requests that do not fit in the schedule's remaining confirmed capacity.
///
/// Filling the schedule exactly is allowed; only exceeding it is rejected.
pub fn check_capacity(max_capacity: i32, confirmed_reserved_count: i32, requested: i32) -> Result<()> {
    let remaining = max_capacity - confirmed_reserved_count;
    if requested > remaining {
        return Err(Error::BadRequest {
            message: messages::EXCEEDS_REMAINING_CAPACITY.to_string(),
        });
    }
    Ok(())
}

/// Reject reservations made closer to the exam start than the configured lead time.
pub fn check_lead_time(start_at: DateTime<Utc>, now: DateTime<Utc>, lead_time_days: u32) -> Result<()> {
    let earliest_allowed_start = now + Duration::days(i64::from(lead_time_days));
    if start_at < earliest_allowed_start {
        return Err(Error::BadRequest {
            message: messages::lead_time(lead_time_days),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserved_count_bounds() {
        assert!(check_reserved_count(1, 50_000).is_ok());
        assert!(check_reserved_count(50_000, 50_000).is_ok());
        assert!(check_reserved_count(0, 50_000).is_err());
        assert!(check_reserved_count(50_001, 50_000).is_err());
    }

    #[test]
    fn test_capacity_exact_fill_allowed() {
        // 30 remaining out of 50: requesting exactly 30 is fine
        assert!(check_capacity(50, 20, 30).is_ok());
    }

    #[test]
    fn test_capacity_exceeded_rejected() {
        let err = check_capacity(50, 20, 31).unwrap_err();
        assert_eq!(err.user_message(), messages::EXCEEDS_REMAINING_CAPACITY);
    }

    #[test]
    fn test_capacity_full_schedule_rejects_any() {
        assert!(check_capacity(50, 50, 1).is_err());
    }

    #[test]
    fn test_lead_time_boundaries() {
        let now = Utc::now();

        // One day past the cutoff: fine
        assert!(check_lead_time(now + Duration::days(4), now, 3).is_ok());
        // One day inside the cutoff: rejected
        let err = check_lead_time(now + Duration::days(2), now, 3).unwrap_err();
        assert_eq!(err.user_message(), messages::lead_time(3));
    }

    #[test]
    fn test_lead_time_past_exam_rejected() {
        let now = Utc::now();
        assert!(check_lead_time(now - Duration::days(1), now, 3).is_err());
    }
}
