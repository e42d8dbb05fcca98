use crate::{
    auth::auth::AuthUser,
    error::ApiResult,
    model::{
        role::Role,
        user::{UserProfile, UserRow},
    },
};
use actix_web::{HttpResponse, web};
use sqlx::MySqlPool;

/// Every user with the employee role, oldest first.
pub(crate) async fn fetch_employees(pool: &MySqlPool) -> ApiResult<Vec<UserProfile>> {
    let rows = sqlx::query_as::<_, UserRow>(
        r#"
        SELECT id, name, email, password, role, employee_id, department, created_at
        FROM users
        WHERE role = ?
        ORDER BY employee_id ASC
        "#,
    )
    .bind(Role::Employee.as_ref())
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(UserProfile::try_from).collect()
}

/// All employees (manager only)
#[utoipa::path(
    get,
    path = "/api/users",
    responses(
        (status = 200, description = "Employees", body = [UserProfile]),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn list_employees(auth: AuthUser, pool: web::Data<MySqlPool>) -> ApiResult<HttpResponse> {
    auth.require_manager()?;

    let employees = fetch_employees(pool.get_ref()).await?;
    Ok(HttpResponse::Ok().json(employees))
}

/// Departments that currently have members
#[utoipa::path(
    get,
    path = "/api/users/departments",
    responses(
        (status = 200, description = "Department names", body = [String]),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn departments_in_use(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> ApiResult<HttpResponse> {
    let departments: Vec<String> =
        sqlx::query_scalar("SELECT DISTINCT department FROM users ORDER BY department")
            .fetch_all(pool.get_ref())
            .await?;

    Ok(HttpResponse::Ok().json(departments))
}
