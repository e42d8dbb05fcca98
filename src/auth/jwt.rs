use std::time::{SystemTime, UNIX_EPOCH};

use crate::{
    model::user::UserProfile,
    models::{Claims, TokenType},
};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use uuid::Uuid;

fn now() -> usize {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as usize)
        .unwrap_or(0)
}

fn claims_for(user: &UserProfile, token_type: TokenType, ttl: usize) -> Claims {
    Claims {
        user_id: user.id,
        sub: user.email.clone(),
        role: user.role,
        employee_id: user.employee_id.clone(),
        exp: now() + ttl,
        jti: Uuid::new_v4().to_string(),
        token_type,
    }
}

/// Signs `claims` with HS256.
pub fn sign(claims: &Claims, secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
    encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

pub fn generate_access_token(
    user: &UserProfile,
    secret: &str,
    ttl: usize,
) -> Result<String, jsonwebtoken::errors::Error> {
    sign(&claims_for(user, TokenType::Access, ttl), secret)
}

pub fn generate_refresh_token(
    user: &UserProfile,
    secret: &str,
    ttl: usize,
) -> Result<(String, Claims), jsonwebtoken::errors::Error> {
    let claims = claims_for(user, TokenType::Refresh, ttl);
    let token = sign(&claims, secret)?;
    Ok((token, claims))
}

/// Rotates a refresh token, keeping the identity in `previous`.
pub fn rotate_refresh_token(
    previous: &Claims,
    secret: &str,
    ttl: usize,
) -> Result<(String, Claims), jsonwebtoken::errors::Error> {
    let claims = Claims {
        exp: now() + ttl,
        jti: Uuid::new_v4().to_string(),
        token_type: TokenType::Refresh,
        sub: previous.sub.clone(),
        employee_id: previous.employee_id.clone(),
        ..*previous
    };
    let token = sign(&claims, secret)?;
    Ok((token, claims))
}

/// Access token for the identity carried by a refresh token.
pub fn access_from_refresh(
    refresh: &Claims,
    secret: &str,
    ttl: usize,
) -> Result<String, jsonwebtoken::errors::Error> {
    let claims = Claims {
        exp: now() + ttl,
        jti: Uuid::new_v4().to_string(),
        token_type: TokenType::Access,
        sub: refresh.sub.clone(),
        employee_id: refresh.employee_id.clone(),
        ..*refresh
    };
    sign(&claims, secret)
}

pub fn verify_token(token: &str, secret: &str) -> Result<Claims, String> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::role::Role;
    use chrono::NaiveDate;

    fn profile() -> UserProfile {
        UserProfile {
            id: 7,
            name: "Jane".into(),
            email: "jane@company.com".into(),
            role: Role::Manager,
            employee_id: "MGR002".into(),
            department: "Finance".into(),
            created_at: NaiveDate::from_ymd_opt(2025, 1, 2)
                .unwrap()
                .and_hms_opt(8, 0, 0)
                .unwrap(),
        }
    }

    #[test]
    fn access_token_carries_identity() {
        let token = generate_access_token(&profile(), "secret", 60).unwrap();
        let claims = verify_token(&token, "secret").unwrap();

        assert_eq!(claims.user_id, 7);
        assert_eq!(claims.sub, "jane@company.com");
        assert_eq!(claims.role, Role::Manager);
        assert_eq!(claims.employee_id, "MGR002");
        assert_eq!(claims.token_type, TokenType::Access);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = generate_access_token(&profile(), "secret", 60).unwrap();
        assert!(verify_token(&token, "other").is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let mut claims = claims_for(&profile(), TokenType::Access, 0);
        // beyond the default 60s leeway
        claims.exp = now().saturating_sub(3600);
        let token = sign(&claims, "secret").unwrap();
        assert!(verify_token(&token, "secret").is_err());
    }

    #[test]
    fn rotation_issues_fresh_jti() {
        let (_, first) = generate_refresh_token(&profile(), "secret", 600).unwrap();
        let (token, second) = rotate_refresh_token(&first, "secret", 600).unwrap();

        assert_ne!(first.jti, second.jti);
        assert_eq!(second.user_id, first.user_id);
        assert_eq!(verify_token(&token, "secret").unwrap().token_type, TokenType::Refresh);

        let access = access_from_refresh(&second, "secret", 60).unwrap();
        assert_eq!(verify_token(&access, "secret").unwrap().token_type, TokenType::Access);
    }
}
