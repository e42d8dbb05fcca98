use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::Serialize;
use utoipa::ToSchema;

use crate::{error::ApiError, model::role::Role};

/// Raw `users` row.
#[derive(Debug, sqlx::FromRow)]
pub struct UserRow {
    pub id: u64,
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: String,
    pub employee_id: String,
    pub department: String,
    pub created_at: NaiveDateTime,
}

/// Public view of a user, never carrying the password hash.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[schema(example = 12)]
    pub id: u64,
    #[schema(example = "Jane Doe")]
    pub name: String,
    #[schema(example = "jane@company.com")]
    pub email: String,
    pub role: Role,
    #[schema(example = "EMP012")]
    pub employee_id: String,
    #[schema(example = "Software Engineering")]
    pub department: String,
    #[schema(example = "2025-03-01T08:12:00", value_type = String, format = "date-time")]
    pub created_at: NaiveDateTime,
}

impl TryFrom<UserRow> for UserProfile {
    type Error = ApiError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let role = Role::from_str(&row.role).map_err(|_| {
            ApiError::internal(format!("user {} has unknown role '{}'", row.id, row.role))
        })?;

        Ok(UserProfile {
            id: row.id,
            name: row.name,
            email: row.email,
            role,
            employee_id: row.employee_id,
            department: row.department,
            created_at: row.created_at,
        })
    }
}
