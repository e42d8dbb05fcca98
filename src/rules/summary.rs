use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{Datelike, Duration, NaiveDate};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    model::{attendance::AttendanceRecord, user::UserProfile},
    rules::status::{AttendanceStatus, resolve_missing_day},
};

/// Per-status day counts for one user over one month.
#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MonthlySummary {
    #[schema(example = 14)]
    pub present: u32,
    #[schema(example = 1)]
    pub absent: u32,
    #[schema(example = 2)]
    pub late: u32,
    #[schema(example = 1)]
    pub half_day: u32,
    #[schema(example = 141.25)]
    pub total_hours: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct TodayStats {
    pub present: u32,
    pub absent: u32,
    pub late: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct DayCounts {
    #[schema(example = "2025-03-10", value_type = String, format = "date")]
    pub date: NaiveDate,
    /// Short weekday label used as the chart axis.
    #[schema(example = "Mon")]
    pub day: String,
    pub present: u32,
    pub absent: u32,
    pub late: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct DepartmentCount {
    #[schema(example = "Finance")]
    pub department: String,
    pub present: u32,
}

/// First and last day of the month containing `day`.
pub fn month_bounds(day: NaiveDate) -> (NaiveDate, NaiveDate) {
    let first = day.with_day(1).unwrap_or(day);
    let next_month = if first.month() == 12 {
        NaiveDate::from_ymd_opt(first.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(first.year(), first.month() + 1, 1)
    };
    let last = next_month
        .and_then(|d| d.pred_opt())
        .unwrap_or(first);
    (first, last)
}

/// Aggregates one user's records for the month containing `month`.
///
/// Days without a record count as absent when they fall between the join
/// date and yesterday.
pub fn monthly_summary(
    records: &[AttendanceRecord],
    month: NaiveDate,
    joined_on: NaiveDate,
    today: NaiveDate,
) -> MonthlySummary {
    let (first, last) = month_bounds(month);
    let mut summary = MonthlySummary::default();
    let mut recorded = HashSet::new();

    for record in records
        .iter()
        .filter(|r| r.date >= first && r.date <= last)
    {
        if !recorded.insert(record.date) {
            continue;
        }
        match record.status {
            AttendanceStatus::Present => summary.present += 1,
            AttendanceStatus::Absent => summary.absent += 1,
            AttendanceStatus::Late => summary.late += 1,
            AttendanceStatus::HalfDay => summary.half_day += 1,
        }
        summary.total_hours += record.total_hours;
    }

    summary.absent += first
        .iter_days()
        .take_while(|d| *d <= last)
        .filter(|d| !recorded.contains(d))
        .filter(|d| resolve_missing_day(*d, joined_on, today).is_some())
        .count() as u32;

    summary
}

fn checked_in(record: &AttendanceRecord) -> bool {
    record.check_in_time.is_some() && record.status != AttendanceStatus::Absent
}

fn joined_by(user: &UserProfile, day: NaiveDate) -> bool {
    user.created_at.date() <= day
}

/// Head counts for `today` across the roster.
///
/// Anyone on the roster without a check-in today counts as absent.
pub fn today_stats(roster: &[UserProfile], today: &[AttendanceRecord]) -> TodayStats {
    let members: HashSet<u64> = roster.iter().map(|u| u.id).collect();
    let arrived: Vec<&AttendanceRecord> = today
        .iter()
        .filter(|r| members.contains(&r.user_id) && checked_in(r))
        .collect();

    let present = arrived.len() as u32;
    let late = arrived
        .iter()
        .filter(|r| r.status == AttendanceStatus::Late)
        .count() as u32;

    TodayStats {
        present,
        absent: (roster.len() as u32).saturating_sub(present),
        late,
    }
}

/// Present/absent counts for the seven days ending on `today`, oldest first.
pub fn weekly_trend(
    roster: &[UserProfile],
    records: &[AttendanceRecord],
    today: NaiveDate,
) -> Vec<DayCounts> {
    let mut arrivals: HashMap<NaiveDate, HashMap<u64, AttendanceStatus>> = HashMap::new();
    for record in records.iter().filter(|r| checked_in(r)) {
        arrivals
            .entry(record.date)
            .or_default()
            .insert(record.user_id, record.status);
    }

    (0..7)
        .rev()
        .map(|offset| today - Duration::days(offset))
        .map(|date| {
            let eligible: Vec<&UserProfile> =
                roster.iter().filter(|u| joined_by(u, date)).collect();
            let arrived: Vec<AttendanceStatus> = arrivals
                .get(&date)
                .map(|by_user| {
                    eligible
                        .iter()
                        .filter_map(|u| by_user.get(&u.id).copied())
                        .collect()
                })
                .unwrap_or_default();
            let present = arrived.len() as u32;

            DayCounts {
                date,
                day: date.format("%a").to_string(),
                present,
                absent: (eligible.len() as u32).saturating_sub(present),
                late: arrived
                    .iter()
                    .filter(|s| **s == AttendanceStatus::Late)
                    .count() as u32,
            }
        })
        .collect()
}

/// Today's check-ins per department, for every department on the roster.
pub fn department_stats(roster: &[UserProfile], today: &[AttendanceRecord]) -> Vec<DepartmentCount> {
    let arrived: HashSet<u64> = today
        .iter()
        .filter(|r| checked_in(r))
        .map(|r| r.user_id)
        .collect();

    let mut counts: BTreeMap<&str, u32> = BTreeMap::new();
    for user in roster {
        let entry = counts.entry(user.department.as_str()).or_insert(0);
        if arrived.contains(&user.id) {
            *entry += 1;
        }
    }

    counts
        .into_iter()
        .map(|(department, present)| DepartmentCount {
            department: department.to_string(),
            present,
        })
        .collect()
}

/// Splits the roster into today's absentees and late arrivals.
pub fn absent_and_late<'a>(
    roster: &'a [UserProfile],
    today: &[AttendanceRecord],
) -> (Vec<&'a UserProfile>, Vec<&'a UserProfile>) {
    let by_user: HashMap<u64, &AttendanceRecord> = today
        .iter()
        .filter(|r| checked_in(r))
        .map(|r| (r.user_id, r))
        .collect();

    let absent = roster
        .iter()
        .filter(|u| !by_user.contains_key(&u.id))
        .collect();
    let late = roster
        .iter()
        .filter(|u| {
            by_user
                .get(&u.id)
                .is_some_and(|r| r.status == AttendanceStatus::Late)
        })
        .collect();

    (absent, late)
}
