use crate::{
    api::{
        attendance::{
            fetch_day_record, fetch_records_between, fetch_user_records, load_profile, now,
            summarize_month,
        },
        users::fetch_employees,
    },
    auth::auth::AuthUser,
    error::ApiResult,
    model::{attendance::AttendanceRecord, user::UserProfile},
    rules::summary::{
        DayCounts, DepartmentCount, MonthlySummary, TodayStats, absent_and_late,
        department_stats, month_bounds, today_stats, weekly_trend,
    },
};
use actix_web::{HttpResponse, web};
use chrono::{Duration, NaiveDate};
use serde::Serialize;
use sqlx::MySqlPool;
use utoipa::ToSchema;

const RECENT_RECORDS: usize = 7;

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeDashboard {
    pub today: Option<AttendanceRecord>,
    pub summary: MonthlySummary,
    pub recent: Vec<AttendanceRecord>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ManagerDashboard {
    pub total_employees: u32,
    pub today_stats: TodayStats,
    pub weekly_trend: Vec<DayCounts>,
    pub department_stats: Vec<DepartmentCount>,
    pub absent_employees: Vec<UserProfile>,
    pub late_employees: Vec<UserProfile>,
}

/// Builds the manager view from the roster and the last week's records.
pub fn build_manager_dashboard(
    roster: &[UserProfile],
    week: &[AttendanceRecord],
    today: NaiveDate,
) -> ManagerDashboard {
    let todays: Vec<AttendanceRecord> = week
        .iter()
        .filter(|r| r.date == today)
        .cloned()
        .collect();

    let (absent, late) = absent_and_late(roster, &todays);

    ManagerDashboard {
        total_employees: roster.len() as u32,
        today_stats: today_stats(roster, &todays),
        weekly_trend: weekly_trend(roster, week, today),
        department_stats: department_stats(roster, &todays),
        absent_employees: absent.into_iter().cloned().collect(),
        late_employees: late.into_iter().cloned().collect(),
    }
}

/// Caller's dashboard: today, this month, recent days
#[utoipa::path(
    get,
    path = "/api/dashboard/employee",
    responses(
        (status = 200, description = "Employee dashboard", body = EmployeeDashboard),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Dashboard"
)]
pub async fn employee_dashboard(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> ApiResult<HttpResponse> {
    let today = now().date();
    let user = load_profile(pool.get_ref(), auth.user_id).await?;

    let today_record = fetch_day_record(pool.get_ref(), user.id, today).await?;
    let summary = summarize_month(pool.get_ref(), &user, today, today).await?;

    let (first, _) = month_bounds(today - Duration::days(31));
    let mut recent = fetch_user_records(pool.get_ref(), user.id, first, today).await?;
    recent.truncate(RECENT_RECORDS);

    Ok(HttpResponse::Ok().json(EmployeeDashboard {
        today: today_record,
        summary,
        recent,
    }))
}

/// Team overview (manager only)
#[utoipa::path(
    get,
    path = "/api/dashboard/manager",
    responses(
        (status = 200, description = "Manager dashboard", body = ManagerDashboard),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Dashboard"
)]
pub async fn manager_dashboard(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> ApiResult<HttpResponse> {
    auth.require_manager()?;

    let today = now().date();
    let roster = fetch_employees(pool.get_ref()).await?;
    let week = fetch_records_between(pool.get_ref(), today - Duration::days(6), today).await?;

    Ok(HttpResponse::Ok().json(build_manager_dashboard(&roster, &week, today)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{model::role::Role, rules::status::AttendanceStatus};

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, d).unwrap()
    }

    fn user(id: u64, department: &str) -> UserProfile {
        UserProfile {
            id,
            name: format!("User {id}"),
            email: format!("u{id}@company.com"),
            role: Role::Employee,
            employee_id: format!("EMP{id:03}"),
            department: department.into(),
            created_at: date(1).and_hms_opt(9, 0, 0).unwrap(),
        }
    }

    fn record(user_id: u64, day: NaiveDate, status: AttendanceStatus) -> AttendanceRecord {
        AttendanceRecord {
            id: user_id * 100 + u64::from(chrono::Datelike::day(&day)),
            user_id,
            date: day,
            check_in_time: day.and_hms_opt(9, 30, 0),
            check_out_time: None,
            status,
            total_hours: 0.0,
        }
    }

    #[test]
    fn manager_dashboard_serializes_in_camel_case() {
        let roster = vec![user(1, "Finance"), user(2, "DevOps")];
        let week = vec![
            record(1, date(9), AttendanceStatus::Present),
            record(1, date(10), AttendanceStatus::Late),
        ];

        let dashboard = build_manager_dashboard(&roster, &week, date(10));
        let json = serde_json::to_value(&dashboard).unwrap();

        assert_eq!(json["totalEmployees"], 2);
        assert_eq!(json["todayStats"]["present"], 1);
        assert_eq!(json["todayStats"]["absent"], 1);
        assert_eq!(json["todayStats"]["late"], 1);
        assert_eq!(json["weeklyTrend"].as_array().unwrap().len(), 7);
        assert_eq!(json["absentEmployees"][0]["employeeId"], "EMP002");
        assert_eq!(json["lateEmployees"][0]["employeeId"], "EMP001");
        assert_eq!(json["departmentStats"][1]["department"], "Finance");
        assert_eq!(json["departmentStats"][1]["present"], 1);
    }
}
