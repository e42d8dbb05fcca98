use crate::api::attendance::{EmployeeAttendance, MonthQuery, TeamAttendanceFilter};
use crate::api::dashboard::{EmployeeDashboard, ManagerDashboard};
use crate::model::attendance::{AttendanceRecord, RecordOwner, TeamAttendanceRecord};
use crate::model::role::Role;
use crate::model::user::UserProfile;
use crate::models::{AuthResponse, LoginReqDto, RegisterReq};
use crate::rules::status::AttendanceStatus;
use crate::rules::summary::{DayCounts, DepartmentCount, MonthlySummary, TodayStats};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Attendance Tracker API",
        version = "1.0.0",
        description = r#"
## Employee Attendance Tracker

Backend for a check-in/check-out attendance system with employee and manager views.

### Key Features
- **Authentication**
  - Register employees and managers; employee IDs (`EMP001`, `MGR001`, ...) are issued automatically
  - Email/password login with access and refresh tokens
- **Attendance**
  - Daily check-in and check-out
  - Each day is classified as present, late, half-day or absent
  - Personal history and monthly summaries
- **Dashboards**
  - Employee overview of today and the current month
  - Manager overview: today's head count, weekly trend, per-department counts, absentees and late arrivals

### Security
Endpoints other than login, registration and the department catalogue require a
**JWT Bearer** access token. Team-wide views are restricted to managers.

---
Built with **Rust**, **Actix Web**, **SQLx**, and **Utoipa**.
"#,
    ),
    paths(
        crate::auth::handlers::register,
        crate::auth::handlers::register_manager,
        crate::auth::handlers::login,
        crate::auth::handlers::me,
        crate::auth::handlers::refresh_token,
        crate::auth::handlers::logout,

        crate::api::attendance::check_in,
        crate::api::attendance::check_out,
        crate::api::attendance::today,
        crate::api::attendance::my_history,
        crate::api::attendance::my_summary,
        crate::api::attendance::all_attendance,
        crate::api::attendance::employee_attendance,

        crate::api::dashboard::employee_dashboard,
        crate::api::dashboard::manager_dashboard,

        crate::api::users::list_employees,
        crate::api::users::departments_in_use,

        crate::api::data::departments
    ),
    components(
        schemas(
            RegisterReq,
            LoginReqDto,
            AuthResponse,
            Role,
            UserProfile,
            AttendanceStatus,
            AttendanceRecord,
            RecordOwner,
            TeamAttendanceRecord,
            EmployeeAttendance,
            MonthQuery,
            TeamAttendanceFilter,
            MonthlySummary,
            TodayStats,
            DayCounts,
            DepartmentCount,
            EmployeeDashboard,
            ManagerDashboard
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Registration, login and tokens"),
        (name = "Attendance", description = "Check-in, check-out and history"),
        (name = "Dashboard", description = "Employee and manager overviews"),
        (name = "Users", description = "Team directory"),
        (name = "Data", description = "Public reference data"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_route() {
        let doc = ApiDoc::openapi();
        let paths: Vec<&String> = doc.paths.paths.keys().collect();

        for expected in [
            "/api/auth/register",
            "/api/auth/register/manager",
            "/api/auth/login",
            "/api/attendance/checkin",
            "/api/attendance/checkout",
            "/api/attendance/my-summary",
            "/api/dashboard/manager",
            "/api/data/departments",
        ] {
            assert!(
                paths.iter().any(|p| p.as_str() == expected),
                "{expected} missing from OpenAPI document"
            );
        }
    }

    #[test]
    fn bearer_scheme_is_registered() {
        let doc = ApiDoc::openapi();
        let components = doc.components.unwrap();
        assert!(components.security_schemes.contains_key("bearer_auth"));
    }

    #[test]
    fn employee_attendance_response_is_documented() {
        let doc = ApiDoc::openapi();
        let components = doc.components.unwrap();
        assert!(components.schemas.contains_key("EmployeeAttendance"));
    }
}
