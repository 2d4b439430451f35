use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::auth::Role;
use crate::errors::{AppError, AppResult};
use crate::models::user::DbUser;

const USER_COLUMNS: &str =
    "id, name, email, password_hash, role_claim, created_at, updated_at, deleted_at";

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub async fn find_by_email(pool: &SqlitePool, email: &str) -> AppResult<Option<DbUser>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = ? AND deleted_at IS NULL");
    let user = sqlx::query_as::<_, DbUser>(&sql)
        .bind(normalize_email(email))
        .fetch_optional(pool)
        .await?;
    Ok(user)
}

pub async fn find_by_id(pool: &SqlitePool, user_id: Uuid) -> AppResult<Option<DbUser>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ? AND deleted_at IS NULL");
    let user = sqlx::query_as::<_, DbUser>(&sql)
        .bind(user_id.to_string())
        .fetch_optional(pool)
        .await?;
    Ok(user)
}

pub async fn require_by_email(pool: &SqlitePool, email: &str) -> AppResult<DbUser> {
    find_by_email(pool, email)
        .await?
        .ok_or_else(|| AppError::not_found(format!("no user with email {email}")))
}

/// Inserts the user and its profile row in one transaction.
pub async fn create_with_profile(
    pool: &SqlitePool,
    name: &str,
    email: &str,
    password_hash: &str,
    role: Role,
) -> AppResult<DbUser> {
    let email = normalize_email(email);
    let user_id = Uuid::new_v4();
    let now = Utc::now();

    let mut tx = pool.begin().await?;
    sqlx::query(
        "INSERT INTO users (id, name, email, password_hash, role_claim, created_at, updated_at) VALUES (?, ?, ?, ?, NULL, ?, ?)",
    )
    .bind(user_id.to_string())
    .bind(name.trim())
    .bind(&email)
    .bind(password_hash)
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await
    .map_err(email_conflict)?;

    sqlx::query("INSERT INTO profiles (id, role, updated_at) VALUES (?, ?, ?)")
        .bind(user_id.to_string())
        .bind(role.as_str())
        .bind(now)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    find_by_id(pool, user_id)
        .await?
        .ok_or_else(|| AppError::internal("user vanished after insert"))
}

/// `idx_users_email_active` rejects a second live account per email.
fn email_conflict(err: sqlx::Error) -> AppError {
    match err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => AppError::conflict("email already in use"),
        other => AppError::from(other),
    }
}

/// Sets or clears the embedded role claim carried in future sessions.
pub async fn set_role_claim(pool: &SqlitePool, user_id: Uuid, role: Option<Role>) -> AppResult<()> {
    let result = sqlx::query("UPDATE users SET role_claim = ?, updated_at = ? WHERE id = ? AND deleted_at IS NULL")
        .bind(role.map(|r| r.as_str()))
        .bind(Utc::now())
        .bind(user_id.to_string())
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::not_found("user not found"));
    }
    Ok(())
}

/// Upserts the profile role used when a session has no claim.
pub async fn set_profile_role(pool: &SqlitePool, user_id: Uuid, role: Option<Role>) -> AppResult<()> {
    sqlx::query(
        "INSERT INTO profiles (id, role, updated_at) VALUES (?, ?, ?) \
         ON CONFLICT(id) DO UPDATE SET role = excluded.role, updated_at = excluded.updated_at",
    )
    .bind(user_id.to_string())
    .bind(role.map(|r| r.as_str()))
    .bind(Utc::now())
    .execute(pool)
    .await?;
    Ok(())
}
