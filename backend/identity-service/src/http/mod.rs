/// HTTP API
///
/// Public endpoints issue and refresh tokens. Everything under `/api/v1`
/// sits behind JWT authentication; individual resources add role checks.
mod handlers;

pub use handlers::*;

use actix_cors::Cors;
use actix_middleware::{
    security_headers, JwtAuthMiddleware, RbacMiddleware, RequestLogging, RequireJson,
};
use actix_web::{
    body::MessageBody,
    dev::{ServiceFactory, ServiceRequest, ServiceResponse},
    http::{header, Uri},
    web, App, Error, Resource, Scope,
};
use crypto_core::TokenCodec;
use std::sync::Arc;
use tracing::warn;

use crate::error::IdentityError;
use crate::models::user::{ROLE_ADMIN, ROLE_MODERATOR, ROLE_USER};
use crate::services::AuthService;

/// Preflight cache lifetime (seconds)
const CORS_MAX_AGE: usize = 24 * 60 * 60;

/// Shared HTTP server state
#[derive(Clone)]
pub struct AppState {
    pub auth: AuthService,
    pub codec: Arc<dyn TokenCodec>,
    /// Exact `Authorization` header prefix, e.g. `"Bearer "`
    pub token_prefix: String,
}

/// Complete application: routes plus CORS, security headers, JSON
/// content-type enforcement and request logging.
pub fn build_app(
    state: AppState,
    allowed_origins: &[String],
) -> App<
    impl ServiceFactory<
        ServiceRequest,
        Config = (),
        Response = ServiceResponse<impl MessageBody>,
        Error = Error,
        InitError = (),
    >,
> {
    App::new()
        .wrap(RequireJson)
        .wrap(security_headers())
        .wrap(cors(allowed_origins))
        .wrap(RequestLogging)
        .app_data(web::Data::new(state.clone()))
        .configure(move |cfg| configure(cfg, &state))
}

/// Register all routes
pub fn configure(cfg: &mut web::ServiceConfig, state: &AppState) {
    cfg.app_data(json_config())
        .service(resource("/health").route(web::get().to(health)))
        .service(
            web::scope("/auth")
                .service(resource("/login").route(web::post().to(login)))
                .service(resource("/refresh-token").route(web::post().to(refresh_token))),
        )
        .service(
            protected_scope("/api/v1", Arc::clone(&state.codec), &state.token_prefix).service(
                resource("/me")
                    .route(web::get().to(current_identity))
                    .wrap(RbacMiddleware::allow([ROLE_USER, ROLE_MODERATOR, ROLE_ADMIN])),
            ),
        )
        .default_service(web::to(not_found));
}

/// Resource answering unsupported methods with a JSON 405
pub fn resource(path: &str) -> Resource {
    web::resource(path).default_service(web::to(method_not_allowed))
}

/// Scope whose services all require a valid access token
pub fn protected_scope(
    path: &str,
    codec: Arc<dyn TokenCodec>,
    token_prefix: &str,
) -> Scope<
    impl ServiceFactory<
        ServiceRequest,
        Config = (),
        Response = ServiceResponse,
        Error = Error,
        InitError = (),
    >,
> {
    web::scope(path).wrap(JwtAuthMiddleware::new(codec, token_prefix))
}

/// CORS policy for the configured browser origins.
///
/// Requests carrying any other `Origin` are rejected; requests without an
/// `Origin` header pass through. `*` admits every origin.
pub fn cors(allowed_origins: &[String]) -> Cors {
    let mut cors = Cors::default()
        .allowed_methods(["GET", "POST", "PUT", "PATCH", "DELETE", "OPTIONS"])
        .allowed_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::ACCEPT,
            header::ORIGIN,
            header::ACCEPT_ENCODING,
            header::HeaderName::from_static("x-requested-with"),
        ])
        .expose_headers([header::CONTENT_LENGTH])
        .supports_credentials()
        .max_age(CORS_MAX_AGE);

    for origin in allowed_origins {
        if origin == "*" {
            cors = cors.allow_any_origin();
        } else if origin.parse::<Uri>().is_ok() {
            cors = cors.allowed_origin(origin);
        } else {
            warn!(origin = %origin, "Ignoring invalid CORS origin");
        }
    }

    cors
}

/// Malformed JSON bodies become 400 responses in the standard error shape
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        IdentityError::BadRequest(format!("Invalid request body: {}", err)).into()
    })
}
