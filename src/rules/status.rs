use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

use crate::error::RuleError;

const MILLIS_PER_HOUR: f64 = 3_600_000.0;

/// Daily attendance classification.
///
/// The kebab-case form (`half-day`) is used on the wire and in the
/// `attendance.status` column.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum AttendanceStatus {
    Present,
    Absent,
    Late,
    HalfDay,
}

/// Thresholds the resolver classifies a day against.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttendancePolicy {
    /// A check-in strictly after this time of day is late.
    pub late_cutoff: NaiveTime,
    /// A completed day shorter than this many hours is a half day.
    pub half_day_hours: f64,
}

impl Default for AttendancePolicy {
    fn default() -> Self {
        Self {
            late_cutoff: NaiveTime::from_hms_opt(9, 0, 0).unwrap_or(NaiveTime::MIN),
            half_day_hours: 8.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Resolution {
    pub status: AttendanceStatus,
    pub total_hours: f64,
}

/// Elapsed time between check-in and check-out in fractional hours.
pub fn worked_hours(check_in: NaiveDateTime, check_out: NaiveDateTime) -> Result<f64, RuleError> {
    if check_out < check_in {
        return Err(RuleError::InvalidTimeOrder {
            check_in,
            check_out,
        });
    }

    let millis = (check_out - check_in).num_milliseconds();
    Ok(millis as f64 / MILLIS_PER_HOUR)
}

/// Classifies a day that has a check-in.
///
/// Rules, in order:
/// - with a check-out, hours are the elapsed time and a day shorter than
///   `half_day_hours` is a half day, whether or not the arrival was late;
/// - a check-in after `late_cutoff` is late;
/// - anything else is present.
///
/// An open day (no check-out yet) reports zero hours.
pub fn resolve_status(
    check_in: NaiveDateTime,
    check_out: Option<NaiveDateTime>,
    policy: &AttendancePolicy,
) -> Result<Resolution, RuleError> {
    let total_hours = match check_out {
        Some(out) => worked_hours(check_in, out)?,
        None => 0.0,
    };

    let status = if check_out.is_some() && total_hours < policy.half_day_hours {
        AttendanceStatus::HalfDay
    } else if check_in.time() > policy.late_cutoff {
        AttendanceStatus::Late
    } else {
        AttendanceStatus::Present
    };

    Ok(Resolution {
        status,
        total_hours,
    })
}

/// Status of a day for which no record exists.
///
/// Only past days on or after the join date count as absences; today and
/// future days are still open, days before joining have no status.
pub fn resolve_missing_day(
    day: NaiveDate,
    joined_on: NaiveDate,
    today: NaiveDate,
) -> Option<AttendanceStatus> {
    if day >= joined_on && day < today {
        Some(AttendanceStatus::Absent)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 10).unwrap()
    }

    fn at(h: u32, m: u32) -> NaiveDateTime {
        day().and_hms_opt(h, m, 0).unwrap()
    }

    fn policy(cutoff_h: u32, cutoff_m: u32, hours: f64) -> AttendancePolicy {
        AttendancePolicy {
            late_cutoff: NaiveTime::from_hms_opt(cutoff_h, cutoff_m, 0).unwrap(),
            half_day_hours: hours,
        }
    }

    #[test]
    fn late_check_in_without_check_out() {
        let r = resolve_status(at(9, 5), None, &policy(9, 0, 8.0)).unwrap();
        assert_eq!(r.status, AttendanceStatus::Late);
        assert_eq!(r.total_hours, 0.0);
    }

    #[test]
    fn on_time_full_day_is_present() {
        let r = resolve_status(at(9, 0), Some(at(17, 30)), &policy(9, 0, 8.0)).unwrap();
        assert_eq!(r.status, AttendanceStatus::Present);
        assert_eq!(r.total_hours, 8.5);
    }

    #[test]
    fn short_day_is_half_day() {
        let r = resolve_status(at(9, 0), Some(at(12, 0)), &policy(9, 0, 8.0)).unwrap();
        assert_eq!(r.status, AttendanceStatus::HalfDay);
        assert_eq!(r.total_hours, 3.0);
    }

    #[test]
    fn short_day_after_late_arrival_is_half_day() {
        let r = resolve_status(at(10, 0), Some(at(13, 0)), &policy(9, 0, 8.0)).unwrap();
        assert_eq!(r.status, AttendanceStatus::HalfDay);
    }

    #[test]
    fn late_arrival_with_full_day_stays_late() {
        let r = resolve_status(at(9, 30), Some(at(18, 0)), &policy(9, 0, 8.0)).unwrap();
        assert_eq!(r.status, AttendanceStatus::Late);
        assert_eq!(r.total_hours, 8.5);
    }

    #[test]
    fn check_in_exactly_at_cutoff_is_not_late() {
        let r = resolve_status(at(9, 0), None, &policy(9, 0, 8.0)).unwrap();
        assert_eq!(r.status, AttendanceStatus::Present);
    }

    #[test]
    fn check_out_before_check_in_is_rejected() {
        let err = resolve_status(at(17, 0), Some(at(9, 0)), &policy(9, 0, 8.0)).unwrap_err();
        assert_eq!(
            err,
            RuleError::InvalidTimeOrder {
                check_in: at(17, 0),
                check_out: at(9, 0),
            }
        );
    }

    #[test]
    fn hours_use_millisecond_precision() {
        let start = at(9, 0);
        let end = start + chrono::Duration::milliseconds(5_400_000);
        assert_eq!(worked_hours(start, end).unwrap(), 1.5);
        assert_eq!(worked_hours(start, start).unwrap(), 0.0);
    }

    #[test]
    fn hours_are_never_negative_for_ordered_input() {
        let start = at(8, 0);
        for minutes in [0i64, 1, 59, 60, 61, 479, 480, 720] {
            let end = start + chrono::Duration::minutes(minutes);
            let hours = worked_hours(start, end).unwrap();
            assert!(hours >= 0.0);
            assert_eq!(hours, minutes as f64 / 60.0);
        }
    }

    #[test]
    fn resolution_is_repeatable() {
        let p = policy(9, 15, 6.0);
        let first = resolve_status(at(9, 20), Some(at(14, 0)), &p).unwrap();
        let second = resolve_status(at(9, 20), Some(at(14, 0)), &p).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn missing_day_is_absent_only_between_join_and_today() {
        let joined = NaiveDate::from_ymd_opt(2025, 3, 5).unwrap();
        let today = day();

        assert_eq!(
            resolve_missing_day(NaiveDate::from_ymd_opt(2025, 3, 5).unwrap(), joined, today),
            Some(AttendanceStatus::Absent)
        );
        assert_eq!(
            resolve_missing_day(NaiveDate::from_ymd_opt(2025, 3, 4).unwrap(), joined, today),
            None
        );
        assert_eq!(resolve_missing_day(today, joined, today), None);
        assert_eq!(
            resolve_missing_day(NaiveDate::from_ymd_opt(2025, 3, 11).unwrap(), joined, today),
            None
        );
    }

    #[test]
    fn status_string_forms() {
        assert_eq!(AttendanceStatus::HalfDay.to_string(), "half-day");
        assert_eq!(AttendanceStatus::HalfDay.as_ref(), "half-day");
        assert_eq!(
            AttendanceStatus::from_str("late").unwrap(),
            AttendanceStatus::Late
        );
        assert_eq!(
            serde_json::to_string(&AttendanceStatus::HalfDay).unwrap(),
            "\"half-day\""
        );
    }
}
