use crate::{
    auth::{
        auth::AuthUser,
        jwt::{
            access_from_refresh, generate_access_token, generate_refresh_token,
            rotate_refresh_token, verify_token,
        },
        password::{hash_password, verify_password},
    },
    config::Config,
    db::allocate_employee_id,
    error::{ApiError, ApiResult, is_duplicate_key},
    model::{
        role::Role,
        user::{UserProfile, UserRow},
    },
    models::{AuthResponse, Claims, LoginReqDto, RegisterReq, TokenType},
    utils::{email_cache, email_filter},
};
use actix_web::{HttpRequest, HttpResponse, web};
use serde_json::json;
use sqlx::MySqlPool;
use tracing::{debug, error, info, instrument};

const USER_COLUMNS: &str =
    "id, name, email, password, role, employee_id, department, created_at";

pub(crate) async fn find_user_by_id(pool: &MySqlPool, id: u64) -> ApiResult<Option<UserRow>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?");
    Ok(sqlx::query_as::<_, UserRow>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?)
}

async fn find_user_by_email(pool: &MySqlPool, email: &str) -> ApiResult<Option<UserRow>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?");
    Ok(sqlx::query_as::<_, UserRow>(&sql)
        .bind(email)
        .fetch_optional(pool)
        .await?)
}

/// true  => email AVAILABLE
/// false => email TAKEN
pub async fn is_email_available(email: &str, pool: &MySqlPool) -> bool {
    let email = email_filter::normalize(email);

    // cuckoo filter: a miss is definitive
    if !email_filter::might_exist(&email) {
        return true;
    }

    // moka cache: a hit is definitive
    if email_cache::is_taken(&email).await {
        return false;
    }

    let exists = sqlx::query_scalar::<_, i64>(
        "SELECT EXISTS(SELECT 1 FROM users WHERE email = ? LIMIT 1)",
    )
    .bind(&email)
    .fetch_one(pool)
    .await
    .map(|found| found != 0)
    .unwrap_or(true); // fail-safe

    if exists {
        email_cache::mark_taken(&email).await;
    }

    !exists
}

fn token_error(e: jsonwebtoken::errors::Error) -> ApiError {
    ApiError::internal(format!("Failed to sign token: {e}"))
}

async fn store_refresh_token(pool: &MySqlPool, claims: &Claims) -> ApiResult<()> {
    sqlx::query(
        r#"
        INSERT INTO refresh_tokens (user_id, jti, expires_at)
        VALUES (?, ?, FROM_UNIXTIME(?))
        "#,
    )
    .bind(claims.user_id)
    .bind(&claims.jti)
    .bind(claims.exp as i64)
    .execute(pool)
    .await?;
    Ok(())
}

/// Signs an access/refresh pair for `user` and records the refresh token.
async fn issue_tokens(
    pool: &MySqlPool,
    config: &Config,
    user: UserProfile,
) -> ApiResult<AuthResponse> {
    let token = generate_access_token(&user, &config.jwt_secret, config.access_token_ttl)
        .map_err(token_error)?;

    let (refresh_token, refresh_claims) =
        generate_refresh_token(&user, &config.jwt_secret, config.refresh_token_ttl)
            .map_err(token_error)?;

    debug!(user_id = user.id, jti = %refresh_claims.jti, "Storing refresh token");
    store_refresh_token(pool, &refresh_claims).await?;

    Ok(AuthResponse {
        user,
        token,
        refresh_token,
    })
}

fn validate_registration(req: &RegisterReq) -> ApiResult<()> {
    if req.name.trim().is_empty()
        || req.email.trim().is_empty()
        || req.password.is_empty()
        || req.department.trim().is_empty()
    {
        return Err(ApiError::bad_request(
            "Name, email, password and department are required",
        ));
    }

    if !req.email.contains('@') {
        return Err(ApiError::bad_request("Invalid email address"));
    }

    Ok(())
}

async fn register_with_role(
    req: RegisterReq,
    role: Role,
    pool: &MySqlPool,
    config: &Config,
) -> ApiResult<HttpResponse> {
    validate_registration(&req)?;

    let email = email_filter::normalize(&req.email);

    if !is_email_available(&email, pool).await {
        info!("Registration rejected: email taken");
        return Err(ApiError::bad_request("User already exists"));
    }

    let hashed = hash_password(&req.password)
        .map_err(|e| ApiError::internal(format!("Failed to hash password: {e}")))?;

    let mut tx = pool.begin().await?;

    let employee_id = allocate_employee_id(&mut tx, role.id_prefix(), config.employee_id_width).await?;

    let inserted = sqlx::query(
        r#"
        INSERT INTO users (name, email, password, role, employee_id, department)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(req.name.trim())
    .bind(&email)
    .bind(&hashed)
    .bind(role.as_ref())
    .bind(&employee_id)
    .bind(req.department.trim())
    .execute(&mut *tx)
    .await;

    let user_id = match inserted {
        Ok(result) => result.last_insert_id(),
        Err(e) if is_duplicate_key(&e) => {
            // lost a race on the email; rolled back with tx
            email_cache::mark_taken(&email).await;
            return Err(ApiError::bad_request("User already exists"));
        }
        Err(e) => {
            error!(error = %e, "Failed to insert user");
            return Err(e.into());
        }
    };

    tx.commit().await?;

    email_filter::insert(&email);
    email_cache::mark_taken(&email).await;

    let row = find_user_by_id(pool, user_id)
        .await?
        .ok_or_else(|| ApiError::internal("Registered user vanished"))?;
    let profile = UserProfile::try_from(row)?;

    info!(user_id, employee_id = %profile.employee_id, role = %role, "User registered");

    let body = issue_tokens(pool, config, profile).await?;
    Ok(HttpResponse::Created().json(body))
}

/// Register an employee (or a manager when `role` says so)
#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = RegisterReq,
    responses(
        (status = 201, description = "User registered", body = AuthResponse),
        (status = 400, description = "Missing fields or user already exists", body = Object, example = json!({
            "message": "User already exists"
        })),
        (status = 500, description = "Internal server error")
    ),
    tag = "Auth"
)]
#[instrument(name = "auth_register", skip(req, pool, config), fields(email = %req.email))]
pub async fn register(
    req: web::Json<RegisterReq>,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> ApiResult<HttpResponse> {
    let req = req.into_inner();
    let role = req.role.unwrap_or_default();
    register_with_role(req, role, pool.get_ref(), config.get_ref()).await
}

/// Register a manager
#[utoipa::path(
    post,
    path = "/api/auth/register/manager",
    request_body = RegisterReq,
    responses(
        (status = 201, description = "Manager registered", body = AuthResponse),
        (status = 400, description = "Missing fields or user already exists"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Auth"
)]
#[instrument(name = "auth_register_manager", skip(req, pool, config), fields(email = %req.email))]
pub async fn register_manager(
    req: web::Json<RegisterReq>,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> ApiResult<HttpResponse> {
    register_with_role(req.into_inner(), Role::Manager, pool.get_ref(), config.get_ref()).await
}

/// Log in with email and password
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginReqDto,
    responses(
        (status = 200, description = "Logged in", body = AuthResponse),
        (status = 401, description = "Invalid email or password", body = Object, example = json!({
            "message": "Invalid email or password"
        }))
    ),
    tag = "Auth"
)]
#[instrument(name = "auth_login", skip(req, pool, config), fields(email = %req.email))]
pub async fn login(
    req: web::Json<LoginReqDto>,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> ApiResult<HttpResponse> {
    info!("Login request received");

    if req.email.trim().is_empty() || req.password.is_empty() {
        return Err(ApiError::bad_request("Email and password are required"));
    }

    let email = email_filter::normalize(&req.email);

    let Some(row) = find_user_by_email(pool.get_ref(), &email).await? else {
        info!("Invalid credentials: user not found");
        return Err(ApiError::unauthorized("Invalid email or password"));
    };

    if let Err(e) = verify_password(&req.password, &row.password) {
        info!(error = %e, "Invalid credentials: password mismatch");
        return Err(ApiError::unauthorized("Invalid email or password"));
    }

    let profile = UserProfile::try_from(row)?;
    let user_id = profile.id;
    let body = issue_tokens(pool.get_ref(), config.get_ref(), profile).await?;

    // non-fatal
    if let Err(e) = sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = ?")
        .bind(user_id)
        .execute(pool.get_ref())
        .await
    {
        error!(error = %e, "Failed to update last_login_at");
    }

    email_cache::mark_taken(&email).await;

    info!(user_id, "Login successful");
    Ok(HttpResponse::Ok().json(body))
}

/// Current user's profile
#[utoipa::path(
    get,
    path = "/api/auth/me",
    responses(
        (status = 200, description = "Profile", body = UserProfile),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "User not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn me(auth: AuthUser, pool: web::Data<MySqlPool>) -> ApiResult<HttpResponse> {
    let row = find_user_by_id(pool.get_ref(), auth.user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(HttpResponse::Ok().json(UserProfile::try_from(row)?))
}

fn bearer(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
}

/// Exchange a refresh token for a new token pair
#[utoipa::path(
    post,
    path = "/api/auth/refresh",
    responses(
        (status = 200, description = "New token pair", body = Object, example = json!({
            "token": "<access>",
            "refreshToken": "<refresh>"
        })),
        (status = 401, description = "Missing, invalid or revoked refresh token")
    ),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn refresh_token(
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> ApiResult<HttpResponse> {
    let token = bearer(&req).ok_or_else(|| ApiError::unauthorized("No token"))?;

    let claims = verify_token(token, &config.jwt_secret)
        .map_err(|_| ApiError::unauthorized("Invalid token"))?;

    if claims.token_type != TokenType::Refresh {
        return Err(ApiError::unauthorized("Invalid token"));
    }

    let mut tx = pool.begin().await?;

    let record: Option<(u64, bool)> = sqlx::query_as(
        "SELECT id, revoked FROM refresh_tokens WHERE jti = ? FOR UPDATE",
    )
    .bind(&claims.jti)
    .fetch_optional(&mut *tx)
    .await?;

    let record_id = match record {
        Some((id, false)) => id,
        _ => return Err(ApiError::unauthorized("Token revoked")),
    };

    sqlx::query("UPDATE refresh_tokens SET revoked = TRUE WHERE id = ?")
        .bind(record_id)
        .execute(&mut *tx)
        .await?;

    let (new_refresh_token, new_claims) =
        rotate_refresh_token(&claims, &config.jwt_secret, config.refresh_token_ttl)
            .map_err(token_error)?;

    sqlx::query(
        r#"
        INSERT INTO refresh_tokens (user_id, jti, expires_at)
        VALUES (?, ?, FROM_UNIXTIME(?))
        "#,
    )
    .bind(new_claims.user_id)
    .bind(&new_claims.jti)
    .bind(new_claims.exp as i64)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    let access_token = access_from_refresh(&new_claims, &config.jwt_secret, config.access_token_ttl)
        .map_err(token_error)?;

    Ok(HttpResponse::Ok().json(json!({
        "token": access_token,
        "refreshToken": new_refresh_token
    })))
}

/// Revoke a refresh token. Always answers 204.
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    responses((status = 204, description = "Logged out")),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn logout(
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> HttpResponse {
    let Some(token) = bearer(&req) else {
        return HttpResponse::NoContent().finish();
    };

    let claims = match verify_token(token, &config.jwt_secret) {
        Ok(c) if c.token_type == TokenType::Refresh => c,
        _ => return HttpResponse::NoContent().finish(),
    };

    // idempotent
    if let Err(e) = sqlx::query("UPDATE refresh_tokens SET revoked = TRUE WHERE jti = ?")
        .bind(&claims.jti)
        .execute(pool.get_ref())
        .await
    {
        error!(error = %e, "Failed to revoke refresh token");
    }

    HttpResponse::NoContent().finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req(name: &str, email: &str, password: &str, department: &str) -> RegisterReq {
        RegisterReq {
            name: name.into(),
            email: email.into(),
            password: password.into(),
            department: department.into(),
            role: None,
        }
    }

    #[test]
    fn registration_requires_all_fields() {
        assert!(validate_registration(&req("Jane", "jane@company.com", "pw", "Finance")).is_ok());
        assert!(validate_registration(&req(" ", "jane@company.com", "pw", "Finance")).is_err());
        assert!(validate_registration(&req("Jane", "", "pw", "Finance")).is_err());
        assert!(validate_registration(&req("Jane", "jane@company.com", "", "Finance")).is_err());
        assert!(validate_registration(&req("Jane", "jane@company.com", "pw", "")).is_err());
    }

    #[test]
    fn registration_rejects_malformed_email() {
        assert!(validate_registration(&req("Jane", "jane.company.com", "pw", "Finance")).is_err());
    }

    #[test]
    fn role_defaults_to_employee() {
        let r = req("Jane", "jane@company.com", "pw", "Finance");
        assert_eq!(r.role.unwrap_or_default(), Role::Employee);
    }
}
