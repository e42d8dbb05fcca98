use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{error::ApiError, rules::status::AttendanceStatus};

/// Raw `attendance` row.
#[derive(Debug, sqlx::FromRow)]
pub struct AttendanceRow {
    pub id: u64,
    pub user_id: u64,
    pub date: NaiveDate,
    pub check_in: Option<NaiveDateTime>,
    pub check_out: Option<NaiveDateTime>,
    pub status: String,
    pub total_hours: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    #[schema(example = 41)]
    pub id: u64,
    #[schema(example = 12)]
    pub user_id: u64,
    #[schema(example = "2025-03-10", value_type = String, format = "date")]
    pub date: NaiveDate,
    #[schema(example = "2025-03-10T09:02:11", value_type = Option<String>, format = "date-time")]
    pub check_in_time: Option<NaiveDateTime>,
    #[schema(example = "2025-03-10T17:45:03", value_type = Option<String>, format = "date-time")]
    pub check_out_time: Option<NaiveDateTime>,
    pub status: AttendanceStatus,
    #[schema(example = 8.71)]
    pub total_hours: f64,
}

impl TryFrom<AttendanceRow> for AttendanceRecord {
    type Error = ApiError;

    fn try_from(row: AttendanceRow) -> Result<Self, Self::Error> {
        let status = AttendanceStatus::from_str(&row.status).map_err(|_| {
            ApiError::internal(format!(
                "attendance {} has unknown status '{}'",
                row.id, row.status
            ))
        })?;

        Ok(AttendanceRecord {
            id: row.id,
            user_id: row.user_id,
            date: row.date,
            check_in_time: row.check_in,
            check_out_time: row.check_out,
            status,
            total_hours: row.total_hours,
        })
    }
}

pub fn records_from_rows(rows: Vec<AttendanceRow>) -> Result<Vec<AttendanceRecord>, ApiError> {
    rows.into_iter().map(AttendanceRecord::try_from).collect()
}

/// Owner details attached to records in the manager views.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RecordOwner {
    pub id: u64,
    pub name: String,
    pub employee_id: String,
    pub department: String,
}

/// Attendance row joined with its owner.
#[derive(Debug, sqlx::FromRow)]
pub struct TeamAttendanceRow {
    #[sqlx(flatten)]
    pub attendance: AttendanceRow,
    pub name: String,
    pub employee_id: String,
    pub department: String,
}

/// Attendance record as the manager views show it: `userId` carries the
/// owner object rather than the bare id.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TeamAttendanceRecord {
    #[schema(example = 41)]
    pub id: u64,
    #[serde(rename = "userId")]
    pub owner: RecordOwner,
    #[schema(example = "2025-03-10", value_type = String, format = "date")]
    pub date: NaiveDate,
    #[schema(example = "2025-03-10T09:02:11", value_type = Option<String>, format = "date-time")]
    pub check_in_time: Option<NaiveDateTime>,
    #[schema(example = "2025-03-10T17:45:03", value_type = Option<String>, format = "date-time")]
    pub check_out_time: Option<NaiveDateTime>,
    pub status: AttendanceStatus,
    #[schema(example = 8.71)]
    pub total_hours: f64,
}

impl TryFrom<TeamAttendanceRow> for TeamAttendanceRecord {
    type Error = ApiError;

    fn try_from(row: TeamAttendanceRow) -> Result<Self, Self::Error> {
        let record = AttendanceRecord::try_from(row.attendance)?;

        Ok(TeamAttendanceRecord {
            id: record.id,
            owner: RecordOwner {
                id: record.user_id,
                name: row.name,
                employee_id: row.employee_id,
                department: row.department,
            },
            date: record.date,
            check_in_time: record.check_in_time,
            check_out_time: record.check_out_time,
            status: record.status,
            total_hours: record.total_hours,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn team_row() -> TeamAttendanceRow {
        let date = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
        TeamAttendanceRow {
            attendance: AttendanceRow {
                id: 1,
                user_id: 12,
                date,
                check_in: date.and_hms_opt(9, 20, 0),
                check_out: None,
                status: "late".into(),
                total_hours: 0.0,
            },
            name: "Jane".into(),
            employee_id: "EMP012".into(),
            department: "Finance".into(),
        }
    }

    #[test]
    fn team_record_has_single_owner_object() {
        let record = TeamAttendanceRecord::try_from(team_row()).unwrap();
        let text = serde_json::to_string(&record).unwrap();

        assert_eq!(text.matches("\"userId\"").count(), 1);

        let json: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(json["userId"]["id"], 12);
        assert_eq!(json["userId"]["employeeId"], "EMP012");
        assert_eq!(json["status"], "late");
        assert_eq!(json["checkInTime"], "2025-03-10T09:20:00");
    }

    #[test]
    fn unknown_status_is_rejected() {
        let mut row = team_row();
        row.attendance.status = "on-leave".into();
        assert!(TeamAttendanceRecord::try_from(row).is_err());
    }
}
