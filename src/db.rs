use anyhow::{Context, Result};
use sqlx::{MySql, MySqlPool, Transaction};
use tracing::debug;

use crate::{
    error::{ApiError, ApiResult},
    rules::identifier::next_identifier,
};

pub async fn init_db(database_url: &str) -> Result<MySqlPool> {
    let pool = MySqlPool::connect(database_url)
        .await
        .context("Failed to connect to database")?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run database migrations")?;

    Ok(pool)
}

/// Issues the next employee identifier for `prefix` inside `tx`.
///
/// The per-prefix counter row is seeded by migration and locked here with
/// `SELECT ... FOR UPDATE`, so two registrations for the same role queue on
/// the row instead of both reading the same last value. The row must not be
/// touched before the `FOR UPDATE` read: two shared locks upgrading to
/// exclusive deadlock. The lock is held until `tx` commits, after the user
/// row using the identifier is inserted.
pub async fn allocate_employee_id(
    tx: &mut Transaction<'_, MySql>,
    prefix: &str,
    width: usize,
) -> ApiResult<String> {
    let last_issued: Option<Option<String>> = sqlx::query_scalar(
        "SELECT last_issued FROM employee_id_sequences WHERE prefix = ? FOR UPDATE",
    )
    .bind(prefix)
    .fetch_optional(&mut **tx)
    .await?;

    let last_issued = last_issued
        .ok_or_else(|| ApiError::internal(format!("No id sequence for prefix '{prefix}'")))?;

    let next = next_identifier(prefix, last_issued.as_deref(), width)?;

    sqlx::query("UPDATE employee_id_sequences SET last_issued = ? WHERE prefix = ?")
        .bind(&next)
        .bind(prefix)
        .execute(&mut **tx)
        .await?;

    debug!(prefix, employee_id = %next, "Allocated employee id");

    Ok(next)
}

#[cfg(test)]
mod tests {
    use crate::model::role::Role;

    const SEED: &str = include_str!("../migrations/20250301000001_seed_id_sequences.sql");

    #[test]
    fn every_role_prefix_has_a_seeded_counter() {
        for role in [Role::Employee, Role::Manager] {
            let row = format!("('{}', NULL)", role.id_prefix());
            assert!(SEED.contains(&row), "{} counter not seeded", role.id_prefix());
        }
    }
}
