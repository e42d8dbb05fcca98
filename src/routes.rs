use crate::{
    api::{attendance, dashboard, data, users},
    auth::{handlers, middleware::auth_middleware},
    config::Config,
};
use actix_cors::Cors;
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::{http::header, middleware::from_fn, web};
use std::sync::Arc;

// Per-route limiter: `requests_per_min` tokens, refilled evenly over a minute
fn build_limiter(requests_per_min: u32) -> Governor<PeerIpKeyExtractor, NoOpMiddleware> {
    let burst = requests_per_min.max(1);
    let per_ms = 60_000 / burst as u64;
    let cfg = GovernorConfigBuilder::default()
        .per_millisecond(per_ms.max(1))
        .burst_size(burst)
        .key_extractor(PeerIpKeyExtractor)
        .finish()
        .unwrap_or_default();
    Governor::new(&cfg)
}

/// CORS for the browser frontend. `*` allows any origin, otherwise a
/// comma-separated list of exact origins.
pub fn build_cors(allowed_origin: &str) -> Cors {
    let cors = Cors::default()
        .allowed_methods(vec!["GET", "POST", "OPTIONS"])
        .allowed_headers(vec![header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
        .max_age(86_400);

    if allowed_origin.trim() == "*" {
        return cors.allow_any_origin();
    }

    let origins: Vec<String> = allowed_origin
        .split(',')
        .map(|o| o.trim().to_string())
        .filter(|o| !o.is_empty())
        .collect();

    cors.allowed_origin_fn(move |origin, _| {
        origin
            .to_str()
            .map(|o| origins.iter().any(|allowed| allowed == o))
            .unwrap_or(false)
    })
}

pub fn configure(cfg: &mut web::ServiceConfig, config: Config) {
    let login_limiter = Arc::new(build_limiter(config.rate_login_per_min));
    let register_limiter = Arc::new(build_limiter(config.rate_register_per_min));
    let refresh_limiter = Arc::new(build_limiter(config.rate_refresh_per_min));
    let protected_limiter = Arc::new(build_limiter(config.rate_protected_per_min));

    let prefix = config.api_prefix.trim_end_matches('/');

    // Auth: public except /me, which checks the token in its extractor
    cfg.service(
        web::scope(&format!("{prefix}/auth"))
            .service(
                web::resource("/login")
                    .wrap(login_limiter.clone())
                    .route(web::post().to(handlers::login)),
            )
            .service(
                web::resource("/register")
                    .wrap(register_limiter.clone())
                    .route(web::post().to(handlers::register)),
            )
            .service(
                web::resource("/register/manager")
                    .wrap(register_limiter)
                    .route(web::post().to(handlers::register_manager)),
            )
            .service(
                web::resource("/refresh")
                    .wrap(refresh_limiter)
                    .route(web::post().to(handlers::refresh_token)),
            )
            .service(
                web::resource("/logout")
                    .wrap(login_limiter)
                    .route(web::post().to(handlers::logout)),
            )
            .service(
                web::resource("/me")
                    .wrap(protected_limiter.clone())
                    .route(web::get().to(handlers::me)),
            ),
    );

    // Public reference data
    cfg.service(
        web::scope(&format!("{prefix}/data"))
            .service(web::resource("/departments").route(web::get().to(data::departments))),
    );

    // Protected routes
    cfg.service(
        web::scope(prefix)
            .wrap(from_fn(auth_middleware))
            .wrap(protected_limiter)
            .service(
                web::scope("/attendance")
                    .service(web::resource("/checkin").route(web::post().to(attendance::check_in)))
                    .service(web::resource("/checkout").route(web::post().to(attendance::check_out)))
                    .service(web::resource("/today").route(web::get().to(attendance::today)))
                    .service(web::resource("/my-history").route(web::get().to(attendance::my_history)))
                    .service(web::resource("/my-summary").route(web::get().to(attendance::my_summary)))
                    .service(web::resource("/all").route(web::get().to(attendance::all_attendance)))
                    .service(
                        web::resource("/employee/{user_id}")
                            .route(web::get().to(attendance::employee_attendance)),
                    ),
            )
            .service(
                web::scope("/dashboard")
                    .service(web::resource("/employee").route(web::get().to(dashboard::employee_dashboard)))
                    .service(web::resource("/manager").route(web::get().to(dashboard::manager_dashboard))),
            )
            .service(
                web::scope("/users")
                    .service(web::resource("").route(web::get().to(users::list_employees)))
                    .service(web::resource("/departments").route(web::get().to(users::departments_in_use))),
            ),
    );
}

// LOGIN / REGISTER
//  ├─ token (access, 15 min)
//  └─ refreshToken (7 days)

// API REQUEST
//  └─ Authorization: Bearer token

// ACCESS EXPIRED
//  └─ POST /auth/refresh with refreshToken
//       └─ returns a new pair, old refresh token revoked

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::render_errors;
    use actix_web::{
        App, Error, HttpResponse,
        body::BoxBody,
        dev::{ServiceRequest, ServiceResponse},
        http::{Method, StatusCode},
        middleware::Next,
        test,
    };

    const FRONTEND: &str = "http://localhost:5173";

    async fn deny(
        _req: ServiceRequest,
        _next: Next<BoxBody>,
    ) -> Result<ServiceResponse<BoxBody>, Error> {
        Err(actix_web::error::ErrorUnauthorized("denied"))
    }

    fn allow_origin(resp: &ServiceResponse<impl actix_web::body::MessageBody>) -> Option<String> {
        resp.headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    }

    #[actix_web::test]
    async fn preflight_is_answered_for_configured_origin() {
        let app = test::init_service(
            App::new()
                .wrap(build_cors(FRONTEND))
                .route("/api/attendance/checkin", web::post().to(HttpResponse::Created)),
        )
        .await;

        let req = test::TestRequest::default()
            .method(Method::OPTIONS)
            .uri("/api/attendance/checkin")
            .insert_header((header::ORIGIN, FRONTEND))
            .insert_header((header::ACCESS_CONTROL_REQUEST_METHOD, "POST"))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert!(resp.status().is_success());
        assert_eq!(allow_origin(&resp).as_deref(), Some(FRONTEND));
    }

    #[actix_web::test]
    async fn wildcard_setting_accepts_any_origin() {
        let app = test::init_service(
            App::new()
                .wrap(build_cors("*"))
                .route("/ping", web::get().to(HttpResponse::Ok)),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/ping")
            .insert_header((header::ORIGIN, "http://elsewhere.test"))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::OK);
        assert!(allow_origin(&resp).is_some());
    }

    #[actix_web::test]
    async fn errors_from_inner_layers_keep_cors_headers() {
        let app = test::init_service(
            App::new()
                .wrap(from_fn(deny))
                .wrap(from_fn(render_errors))
                .wrap(build_cors(FRONTEND))
                .route("/api/attendance/today", web::get().to(HttpResponse::Ok)),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/api/attendance/today")
            .insert_header((header::ORIGIN, FRONTEND))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(allow_origin(&resp).as_deref(), Some(FRONTEND));
    }
}
