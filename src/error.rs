use actix_web::{
    Error, HttpResponse, ResponseError,
    body::{BoxBody, MessageBody},
    dev::{ServiceRequest, ServiceResponse},
    http::StatusCode,
    middleware::Next,
};
use chrono::NaiveDateTime;
use derive_more::{Display, From};
use serde_json::json;

/// Validation failures raised by the attendance and identifier rules.
#[derive(Debug, Clone, PartialEq, Display)]
pub enum RuleError {
    #[display(fmt = "check-out {} precedes check-in {}", check_out, check_in)]
    InvalidTimeOrder {
        check_in: NaiveDateTime,
        check_out: NaiveDateTime,
    },

    #[display(fmt = "identifier '{}' does not match prefix '{}' followed by digits", identifier, prefix)]
    MalformedIdentifier { prefix: String, identifier: String },
}

impl std::error::Error for RuleError {}

/// Error type returned by every HTTP handler.
///
/// Renders as `{"message": ...}` with a status matching the variant, which is
/// the body shape the frontend reads.
#[derive(Debug, Display, From)]
pub enum ApiError {
    #[display(fmt = "{}", _0)]
    Rule(RuleError),

    #[display(fmt = "database error: {}", _0)]
    Database(sqlx::Error),

    #[display(fmt = "{}", _0)]
    #[from(ignore)]
    BadRequest(String),

    #[display(fmt = "{}", _0)]
    #[from(ignore)]
    Unauthorized(String),

    #[display(fmt = "{}", _0)]
    #[from(ignore)]
    Forbidden(String),

    #[display(fmt = "{}", _0)]
    #[from(ignore)]
    NotFound(String),

    #[display(fmt = "{}", _0)]
    #[from(ignore)]
    Internal(String),
}

impl std::error::Error for ApiError {}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        ApiError::BadRequest(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        ApiError::Unauthorized(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        ApiError::Forbidden(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        ApiError::NotFound(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        ApiError::Internal(msg.into())
    }
}

/// MySQL reports unique-key violations with SQLSTATE 23000.
pub fn is_duplicate_key(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().as_deref() == Some("23000"),
        _ => false,
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Rule(RuleError::InvalidTimeOrder { .. }) => StatusCode::BAD_REQUEST,
            // a stored identifier that cannot be parsed is corrupt data, not caller input
            ApiError::Rule(RuleError::MalformedIdentifier { .. }) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ApiError::Database(e) if is_duplicate_key(e) => StatusCode::CONFLICT,
            ApiError::Database(sqlx::Error::RowNotFound) => StatusCode::NOT_FOUND,
            ApiError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();

        let message = match self {
            ApiError::Database(e) if status == StatusCode::INTERNAL_SERVER_ERROR => {
                tracing::error!(error = %e, "Database error");
                "Internal Server Error".to_string()
            }
            ApiError::Database(e) if status == StatusCode::CONFLICT => {
                tracing::debug!(error = %e, "Duplicate key");
                "Resource already exists".to_string()
            }
            ApiError::Database(_) => "Resource not found".to_string(),
            ApiError::Rule(e @ RuleError::MalformedIdentifier { .. }) => {
                tracing::error!(error = %e, "Stored identifier failed to parse");
                "Internal Server Error".to_string()
            }
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal error");
                "Internal Server Error".to_string()
            }
            other => other.to_string(),
        };

        HttpResponse::build(status).json(json!({ "message": message }))
    }
}

/// Turns errors raised by inner middleware (rate limiter, auth) into
/// responses, so outer layers such as CORS still decorate them.
pub async fn render_errors(
    req: ServiceRequest,
    next: Next<impl MessageBody + 'static>,
) -> Result<ServiceResponse<BoxBody>, Error> {
    let http_req = req.request().clone();

    match next.call(req).await {
        Ok(res) => Ok(res.map_into_boxed_body()),
        Err(e) => Ok(ServiceResponse::from_err(e, http_req)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 10)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn invalid_time_order_is_a_bad_request() {
        let err: ApiError = RuleError::InvalidTimeOrder {
            check_in: at(9, 0),
            check_out: at(8, 0),
        }
        .into();

        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(err.to_string().contains("precedes"));
    }

    #[test]
    fn malformed_identifier_hides_details_from_client() {
        let err: ApiError = RuleError::MalformedIdentifier {
            prefix: "EMP".into(),
            identifier: "EMPx1".into(),
        }
        .into();

        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            err.error_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn helper_constructors_map_to_statuses() {
        assert_eq!(ApiError::bad_request("x").status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::unauthorized("x").status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::forbidden("x").status_code(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::not_found("x").status_code(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::Database(sqlx::Error::RowNotFound).status_code(), StatusCode::NOT_FOUND);
    }
}
