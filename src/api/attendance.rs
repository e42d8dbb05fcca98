use crate::{
    auth::{auth::AuthUser, handlers::find_user_by_id},
    config::Config,
    error::{ApiError, ApiResult, is_duplicate_key},
    model::{
        attendance::{
            AttendanceRecord, AttendanceRow, TeamAttendanceRecord, TeamAttendanceRow,
            records_from_rows,
        },
        user::UserProfile,
    },
    rules::{
        status::{AttendanceStatus, resolve_status},
        summary::{MonthlySummary, month_bounds, monthly_summary},
    },
};
use actix_web::{HttpResponse, web};
use chrono::{Local, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::{MySql, MySqlPool};
use tracing::{error, info};
use utoipa::{IntoParams, ToSchema};

pub(crate) const ATTENDANCE_COLUMNS: &str =
    "id, user_id, date, check_in, check_out, status, total_hours";

/// Wall clock used for check-in, check-out and "today".
pub(crate) fn now() -> NaiveDateTime {
    Local::now().naive_local()
}

#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct MonthQuery {
    /// Month as `YYYY-MM`; defaults to the current month
    #[schema(example = "2025-03")]
    pub month: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TeamAttendanceFilter {
    /// Only records of this day (`YYYY-MM-DD`)
    #[schema(example = "2025-03-10", value_type = Option<String>, format = "date")]
    pub date: Option<NaiveDate>,
    /// Only records of this employee identifier
    #[schema(example = "EMP004")]
    pub employee_id: Option<String>,
    /// Only records with this status
    pub status: Option<AttendanceStatus>,
}

/// First day of the requested month, or of the current one.
pub(crate) fn parse_month(month: Option<&str>, today: NaiveDate) -> ApiResult<NaiveDate> {
    match month {
        None => Ok(month_bounds(today).0),
        Some(raw) => NaiveDate::parse_from_str(&format!("{}-01", raw.trim()), "%Y-%m-%d")
            .map_err(|_| ApiError::bad_request("month must be formatted as YYYY-MM")),
    }
}

pub(crate) async fn fetch_day_record(
    pool: &MySqlPool,
    user_id: u64,
    date: NaiveDate,
) -> ApiResult<Option<AttendanceRecord>> {
    let sql = format!("SELECT {ATTENDANCE_COLUMNS} FROM attendance WHERE user_id = ? AND date = ?");
    let row = sqlx::query_as::<_, AttendanceRow>(&sql)
        .bind(user_id)
        .bind(date)
        .fetch_optional(pool)
        .await?;

    row.map(AttendanceRecord::try_from).transpose()
}

/// A user's records between `from` and `to` inclusive, newest first.
pub(crate) async fn fetch_user_records(
    pool: &MySqlPool,
    user_id: u64,
    from: NaiveDate,
    to: NaiveDate,
) -> ApiResult<Vec<AttendanceRecord>> {
    let sql = format!(
        "SELECT {ATTENDANCE_COLUMNS} FROM attendance \
         WHERE user_id = ? AND date BETWEEN ? AND ? ORDER BY date DESC"
    );
    let rows = sqlx::query_as::<_, AttendanceRow>(&sql)
        .bind(user_id)
        .bind(from)
        .bind(to)
        .fetch_all(pool)
        .await?;

    records_from_rows(rows)
}

async fn fetch_all_user_records(pool: &MySqlPool, user_id: u64) -> ApiResult<Vec<AttendanceRecord>> {
    let sql = format!(
        "SELECT {ATTENDANCE_COLUMNS} FROM attendance WHERE user_id = ? ORDER BY date DESC"
    );
    let rows = sqlx::query_as::<_, AttendanceRow>(&sql)
        .bind(user_id)
        .fetch_all(pool)
        .await?;

    records_from_rows(rows)
}

/// Everyone's records between `from` and `to` inclusive.
pub(crate) async fn fetch_records_between(
    pool: &MySqlPool,
    from: NaiveDate,
    to: NaiveDate,
) -> ApiResult<Vec<AttendanceRecord>> {
    let sql = format!("SELECT {ATTENDANCE_COLUMNS} FROM attendance WHERE date BETWEEN ? AND ?");
    let rows = sqlx::query_as::<_, AttendanceRow>(&sql)
        .bind(from)
        .bind(to)
        .fetch_all(pool)
        .await?;

    records_from_rows(rows)
}

pub(crate) async fn load_profile(pool: &MySqlPool, user_id: u64) -> ApiResult<UserProfile> {
    let row = find_user_by_id(pool, user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    UserProfile::try_from(row)
}

/// Summary for one user's month, counting unrecorded past days as absences.
pub(crate) async fn summarize_month(
    pool: &MySqlPool,
    user: &UserProfile,
    month: NaiveDate,
    today: NaiveDate,
) -> ApiResult<MonthlySummary> {
    let (first, last) = month_bounds(month);
    let records = fetch_user_records(pool, user.id, first, last).await?;
    Ok(monthly_summary(&records, month, user.created_at.date(), today))
}

/// Check-in endpoint
#[utoipa::path(
    post,
    path = "/api/attendance/checkin",
    responses(
        (status = 201, description = "Checked in", body = AttendanceRecord),
        (status = 400, description = "Already checked in today", body = Object, example = json!({
            "message": "Already checked in today"
        })),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn check_in(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> ApiResult<HttpResponse> {
    let now = now();
    let today = now.date();
    let resolution = resolve_status(now, None, &config.attendance_policy())?;

    let result = sqlx::query(
        r#"
        INSERT INTO attendance (user_id, date, check_in, status, total_hours)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(auth.user_id)
    .bind(today)
    .bind(now)
    .bind(resolution.status.as_ref())
    .bind(resolution.total_hours)
    .execute(pool.get_ref())
    .await;

    match result {
        Ok(_) => {}
        Err(e) if is_duplicate_key(&e) => {
            return Err(ApiError::bad_request("Already checked in today"));
        }
        Err(e) => {
            error!(error = %e, user_id = auth.user_id, "Check-in failed");
            return Err(e.into());
        }
    }

    info!(user_id = auth.user_id, status = %resolution.status, "Checked in");

    let record = fetch_day_record(pool.get_ref(), auth.user_id, today)
        .await?
        .ok_or_else(|| ApiError::internal("Check-in record missing after insert"))?;

    Ok(HttpResponse::Created().json(record))
}

/// Check-out endpoint
#[utoipa::path(
    post,
    path = "/api/attendance/checkout",
    responses(
        (status = 200, description = "Checked out", body = AttendanceRecord),
        (status = 400, description = "Not checked in, already checked out, or clock went backwards", body = Object, example = json!({
            "message": "You have not checked in today"
        })),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn check_out(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> ApiResult<HttpResponse> {
    let now = now();
    let today = now.date();

    let mut tx = pool.begin().await?;

    let sql = format!(
        "SELECT {ATTENDANCE_COLUMNS} FROM attendance WHERE user_id = ? AND date = ? FOR UPDATE"
    );
    let row = sqlx::query_as::<_, AttendanceRow>(&sql)
        .bind(auth.user_id)
        .bind(today)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| ApiError::bad_request("You have not checked in today"))?;

    let record = AttendanceRecord::try_from(row)?;

    if record.check_out_time.is_some() {
        return Err(ApiError::bad_request("You have already checked out today"));
    }

    let check_in = record
        .check_in_time
        .ok_or_else(|| ApiError::bad_request("You have not checked in today"))?;

    let resolution = resolve_status(check_in, Some(now), &config.attendance_policy())?;

    sqlx::query(
        r#"
        UPDATE attendance
        SET check_out = ?, status = ?, total_hours = ?
        WHERE id = ?
        AND check_out IS NULL
        "#,
    )
    .bind(now)
    .bind(resolution.status.as_ref())
    .bind(resolution.total_hours)
    .bind(record.id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    info!(
        user_id = auth.user_id,
        status = %resolution.status,
        hours = resolution.total_hours,
        "Checked out"
    );

    Ok(HttpResponse::Ok().json(AttendanceRecord {
        check_out_time: Some(now),
        status: resolution.status,
        total_hours: resolution.total_hours,
        ..record
    }))
}

/// Today's record for the caller, or `null`
#[utoipa::path(
    get,
    path = "/api/attendance/today",
    responses(
        (status = 200, description = "Today's record, or null before check-in", body = AttendanceRecord),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn today(auth: AuthUser, pool: web::Data<MySqlPool>) -> ApiResult<HttpResponse> {
    let record = fetch_day_record(pool.get_ref(), auth.user_id, now().date()).await?;
    Ok(HttpResponse::Ok().json(record))
}

/// Caller's attendance history, newest first
#[utoipa::path(
    get,
    path = "/api/attendance/my-history",
    params(MonthQuery),
    responses(
        (status = 200, description = "Records", body = [AttendanceRecord]),
        (status = 400, description = "Bad month"),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn my_history(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<MonthQuery>,
) -> ApiResult<HttpResponse> {
    let records = match query.month.as_deref() {
        Some(month) => {
            let (first, last) = month_bounds(parse_month(Some(month), now().date())?);
            fetch_user_records(pool.get_ref(), auth.user_id, first, last).await?
        }
        None => fetch_all_user_records(pool.get_ref(), auth.user_id).await?,
    };

    Ok(HttpResponse::Ok().json(records))
}

/// Caller's monthly summary
#[utoipa::path(
    get,
    path = "/api/attendance/my-summary",
    params(MonthQuery),
    responses(
        (status = 200, description = "Summary", body = MonthlySummary),
        (status = 400, description = "Bad month"),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn my_summary(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<MonthQuery>,
) -> ApiResult<HttpResponse> {
    let today = now().date();
    let month = parse_month(query.month.as_deref(), today)?;
    let user = load_profile(pool.get_ref(), auth.user_id).await?;

    let summary = summarize_month(pool.get_ref(), &user, month, today).await?;
    Ok(HttpResponse::Ok().json(summary))
}

/// One employee's profile with their records, newest first.
#[derive(Debug, Serialize, ToSchema)]
pub struct EmployeeAttendance {
    pub user: UserProfile,
    pub records: Vec<AttendanceRecord>,
}

// Helper enum for typed SQLx binding
enum FilterValue {
    Date(NaiveDate),
    Str(String),
}

/// All attendance records with their owners (manager only)
#[utoipa::path(
    get,
    path = "/api/attendance/all",
    params(TeamAttendanceFilter),
    responses(
        (status = 200, description = "Records", body = [TeamAttendanceRecord]),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn all_attendance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<TeamAttendanceFilter>,
) -> ApiResult<HttpResponse> {
    auth.require_manager()?;

    let mut where_sql = String::from(" WHERE 1=1");
    let mut args: Vec<FilterValue> = Vec::new();

    if let Some(date) = query.date {
        where_sql.push_str(" AND a.date = ?");
        args.push(FilterValue::Date(date));
    }

    if let Some(employee_id) = query.employee_id.as_deref() {
        where_sql.push_str(" AND u.employee_id = ?");
        args.push(FilterValue::Str(employee_id.trim().to_string()));
    }

    if let Some(status) = query.status {
        where_sql.push_str(" AND a.status = ?");
        args.push(FilterValue::Str(status.to_string()));
    }

    let sql = format!(
        r#"
        SELECT a.id, a.user_id, a.date, a.check_in, a.check_out, a.status, a.total_hours,
               u.name, u.employee_id, u.department
        FROM attendance a
        JOIN users u ON u.id = a.user_id
        {}
        ORDER BY a.date DESC, u.employee_id ASC
        "#,
        where_sql
    );

    let mut q = sqlx::query_as::<MySql, TeamAttendanceRow>(&sql);
    for arg in args {
        q = match arg {
            FilterValue::Date(d) => q.bind(d),
            FilterValue::Str(s) => q.bind(s),
        };
    }

    let rows = q.fetch_all(pool.get_ref()).await?;
    let records = rows
        .into_iter()
        .map(TeamAttendanceRecord::try_from)
        .collect::<ApiResult<Vec<_>>>()?;

    Ok(HttpResponse::Ok().json(records))
}

/// One employee's records (manager only)
#[utoipa::path(
    get,
    path = "/api/attendance/employee/{user_id}",
    params(
        ("user_id" = u64, Path, description = "User id of the employee"),
        MonthQuery
    ),
    responses(
        (status = 200, description = "Employee and records", body = EmployeeAttendance),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "User not found", body = Object, example = json!({
            "message": "User not found"
        }))
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn employee_attendance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    query: web::Query<MonthQuery>,
) -> ApiResult<HttpResponse> {
    auth.require_manager()?;

    let user = load_profile(pool.get_ref(), path.into_inner()).await?;

    let records = match query.month.as_deref() {
        Some(month) => {
            let (first, last) = month_bounds(parse_month(Some(month), now().date())?);
            fetch_user_records(pool.get_ref(), user.id, first, last).await?
        }
        None => fetch_all_user_records(pool.get_ref(), user.id).await?,
    };

    Ok(HttpResponse::Ok().json(EmployeeAttendance { user, records }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn month_defaults_to_current() {
        assert_eq!(parse_month(None, date(2025, 3, 17)).unwrap(), date(2025, 3, 1));
    }

    #[test]
    fn month_is_parsed() {
        assert_eq!(
            parse_month(Some("2024-12"), date(2025, 3, 17)).unwrap(),
            date(2024, 12, 1)
        );
    }

    #[test]
    fn bad_month_is_rejected() {
        for bad in ["2024-13", "March", "2024/03", ""] {
            assert!(parse_month(Some(bad), date(2025, 3, 17)).is_err(), "{bad}");
        }
    }

    #[test]
    fn team_filter_accepts_camel_case() {
        let filter: TeamAttendanceFilter = serde_json::from_value(json!({
            "date": "2025-03-10",
            "employeeId": "EMP004",
            "status": "half-day"
        }))
        .unwrap();

        assert_eq!(filter.date, Some(date(2025, 3, 10)));
        assert_eq!(filter.employee_id.as_deref(), Some("EMP004"));
        assert_eq!(filter.status, Some(AttendanceStatus::HalfDay));
    }

    #[test]
    fn employee_attendance_body_has_user_and_records() {
        let day = date(2025, 3, 10);
        let body = EmployeeAttendance {
            user: UserProfile {
                id: 12,
                name: "Jane".into(),
                email: "jane@company.com".into(),
                role: crate::model::role::Role::Employee,
                employee_id: "EMP012".into(),
                department: "Finance".into(),
                created_at: day.and_hms_opt(8, 0, 0).unwrap(),
            },
            records: vec![AttendanceRecord {
                id: 1,
                user_id: 12,
                date: day,
                check_in_time: day.and_hms_opt(8, 55, 0),
                check_out_time: day.and_hms_opt(17, 0, 0),
                status: AttendanceStatus::Present,
                total_hours: 8.08,
            }],
        };

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["user"]["employeeId"], "EMP012");
        assert_eq!(json["records"].as_array().unwrap().len(), 1);
        assert_eq!(json["records"][0]["userId"], 12);
    }
}
