/// Authentication and authorization middleware tests
/// Every rejected request must stop before the handler runs.
use actix_web::{
    body::to_bytes, dev::ServiceResponse, http::StatusCode, test, web, App, Error, HttpResponse,
};
use actix_middleware::{AuthenticatedUser, JwtAuthMiddleware, RbacMiddleware, RequestLogging};
use chrono::Utc;
use crypto_core::test_keys::{TEST_PRIVATE_KEY, TEST_PUBLIC_KEY, TEST_SECRET};
use crypto_core::{Claims, KeyMaterial, TokenCodec, ValidationPolicy};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

const ISSUER: &str = "identity-service";
const AUDIENCE: &str = "api";

fn hs256_codec() -> Arc<dyn TokenCodec> {
    KeyMaterial::shared_secret(TEST_SECRET)
        .and_then(|keys| keys.into_codec(&ValidationPolicy::new(ISSUER, AUDIENCE)))
        .expect("HS256 codec")
}

fn rs256_codec() -> Arc<dyn TokenCodec> {
    KeyMaterial::rsa_key_pair(TEST_PRIVATE_KEY, TEST_PUBLIC_KEY)
        .into_codec(&ValidationPolicy::new(ISSUER, AUDIENCE))
        .expect("RS256 codec")
}

fn claims(roles: &[&str]) -> Claims {
    let now = Utc::now().timestamp();
    Claims {
        sub: "42".to_string(),
        username: "alice".to_string(),
        email: "alice@example.com".to_string(),
        roles: roles.iter().map(|r| r.to_string()).collect(),
        iat: now,
        exp: now + 900,
        iss: ISSUER.to_string(),
        aud: AUDIENCE.to_string(),
    }
}

fn token_with_roles(roles: &[&str]) -> String {
    hs256_codec().sign(&claims(roles)).expect("sign")
}

async fn whoami(user: AuthenticatedUser) -> HttpResponse {
    HttpResponse::Ok().json(user)
}

/// Split a middleware outcome into status and the JSON `error` message.
async fn outcome(result: Result<ServiceResponse, Error>) -> (StatusCode, String) {
    let response = match result {
        Ok(res) => res.into_parts().1,
        Err(err) => err.error_response(),
    };
    let status = response.status();
    let body = to_bytes(response.into_body()).await.unwrap_or_default();
    let message = serde_json::from_slice::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| v["error"].as_str().map(str::to_owned))
        .unwrap_or_default();
    (status, message)
}

// ============ JwtAuthMiddleware ============

#[actix_web::test]
async fn test_missing_header_returns_no_token_provided() {
    let app = test::init_service(
        App::new().service(
            web::scope("/api")
                .wrap(JwtAuthMiddleware::bearer(hs256_codec()))
                .route("/me", web::get().to(whoami)),
        ),
    )
    .await;

    let req = test::TestRequest::get().uri("/api/me").to_request();
    let (status, message) = outcome(test::try_call_service(&app, req).await).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(message, "no token provided");
}

#[actix_web::test]
async fn test_wrong_prefix_returns_invalid_token_format() {
    let app = test::init_service(
        App::new().service(
            web::scope("/api")
                .wrap(JwtAuthMiddleware::bearer(hs256_codec()))
                .route("/me", web::get().to(whoami)),
        ),
    )
    .await;

    for header in [
        format!("Token {}", token_with_roles(&["ROLE_USER"])),
        format!("bearer {}", token_with_roles(&["ROLE_USER"])),
        token_with_roles(&["ROLE_USER"]),
        "Bearer ".to_string(),
    ] {
        let req = test::TestRequest::get()
            .uri("/api/me")
            .insert_header(("Authorization", header.clone()))
            .to_request();
        let (status, message) = outcome(test::try_call_service(&app, req).await).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED, "header {header:?}");
        assert_eq!(message, "invalid token format", "header {header:?}");
    }
}

#[actix_web::test]
async fn test_invalid_token_does_not_reach_handler() {
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);

    let app = test::init_service(
        App::new().service(
            web::scope("/api")
                .wrap(JwtAuthMiddleware::bearer(hs256_codec()))
                .route(
                    "/me",
                    web::get().to(move || {
                        let counter = Arc::clone(&counter);
                        async move {
                            counter.fetch_add(1, Ordering::SeqCst);
                            HttpResponse::Ok().finish()
                        }
                    }),
                ),
        ),
    )
    .await;

    // Signed by RS256 while the gate is configured for HS256.
    let foreign = rs256_codec().sign(&claims(&["ROLE_ADMIN"])).unwrap();

    for token in ["invalid.token.format".to_string(), foreign] {
        let req = test::TestRequest::get()
            .uri("/api/me")
            .insert_header(("Authorization", format!("Bearer {}", token)))
            .to_request();
        let (status, message) = outcome(test::try_call_service(&app, req).await).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(message, "invalid token");
    }

    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[actix_web::test]
async fn test_expired_token_returns_401() {
    let app = test::init_service(
        App::new().service(
            web::scope("/api")
                .wrap(JwtAuthMiddleware::bearer(hs256_codec()))
                .route("/me", web::get().to(whoami)),
        ),
    )
    .await;

    let mut expired = claims(&["ROLE_USER"]);
    expired.iat -= 7200;
    expired.exp = expired.iat + 60;
    let token = hs256_codec().sign(&expired).unwrap();

    let req = test::TestRequest::get()
        .uri("/api/me")
        .insert_header(("Authorization", format!("Bearer {}", token)))
        .to_request();
    let (status, _) = outcome(test::try_call_service(&app, req).await).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn test_valid_token_injects_identity() {
    let app = test::init_service(
        App::new().service(
            web::scope("/api")
                .wrap(JwtAuthMiddleware::bearer(hs256_codec()))
                .route("/me", web::get().to(whoami)),
        ),
    )
    .await;

    let req = test::TestRequest::get()
        .uri("/api/me")
        .insert_header((
            "Authorization",
            format!("Bearer {}", token_with_roles(&["ROLE_USER"])),
        ))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["subject"], "42");
    assert_eq!(body["username"], "alice");
    assert_eq!(body["roles"], serde_json::json!(["ROLE_USER"]));
}

#[actix_web::test]
async fn test_custom_prefix_is_exact() {
    let app = test::init_service(
        App::new().service(
            web::scope("/api")
                .wrap(JwtAuthMiddleware::new(hs256_codec(), "JWT "))
                .route("/me", web::get().to(whoami)),
        ),
    )
    .await;

    let token = token_with_roles(&["ROLE_USER"]);

    let req = test::TestRequest::get()
        .uri("/api/me")
        .insert_header(("Authorization", format!("JWT {}", token)))
        .to_request();
    let (status, _) = outcome(test::try_call_service(&app, req).await).await;
    assert_eq!(status, StatusCode::OK);

    let req = test::TestRequest::get()
        .uri("/api/me")
        .insert_header(("Authorization", format!("Bearer {}", token)))
        .to_request();
    let (status, message) = outcome(test::try_call_service(&app, req).await).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(message, "invalid token format");
}

#[actix_web::test]
async fn test_extractor_without_middleware_is_unauthorized() {
    let app = test::init_service(App::new().route("/me", web::get().to(whoami))).await;

    let req = test::TestRequest::get().uri("/me").to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

// ============ RbacMiddleware ============

/// Middleware registered last runs first, so RBAC is wrapped before JWT.
macro_rules! gated_app {
    ($roles:expr) => {
        test::init_service(
            App::new().wrap(RequestLogging).service(
                web::scope("/api")
                    .wrap(RbacMiddleware::allow($roles))
                    .wrap(JwtAuthMiddleware::bearer(hs256_codec()))
                    .route("/admin", web::get().to(whoami)),
            ),
        )
        .await
    };
}

#[actix_web::test]
async fn test_user_token_on_admin_route_is_forbidden() {
    let app = gated_app!(["ROLE_ADMIN"]);

    let req = test::TestRequest::get()
        .uri("/api/admin")
        .insert_header((
            "Authorization",
            format!("Bearer {}", token_with_roles(&["ROLE_USER"])),
        ))
        .to_request();
    let (status, message) = outcome(test::try_call_service(&app, req).await).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(message, "access denied");
}

#[actix_web::test]
async fn test_admin_with_extra_roles_is_allowed() {
    let app = gated_app!(["ROLE_ADMIN"]);

    let req = test::TestRequest::get()
        .uri("/api/admin")
        .insert_header((
            "Authorization",
            format!("Bearer {}", token_with_roles(&["ROLE_ADMIN", "ROLE_USER"])),
        ))
        .to_request();
    let (status, _) = outcome(test::try_call_service(&app, req).await).await;

    assert_eq!(status, StatusCode::OK);
}

#[actix_web::test]
async fn test_token_without_roles_is_forbidden() {
    let app = gated_app!(["ROLE_USER", "ROLE_ADMIN"]);

    let req = test::TestRequest::get()
        .uri("/api/admin")
        .insert_header(("Authorization", format!("Bearer {}", token_with_roles(&[]))))
        .to_request();
    let (status, message) = outcome(test::try_call_service(&app, req).await).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(message, "no roles");
}

#[actix_web::test]
async fn test_rbac_without_authentication_is_internal_error() {
    let app = test::init_service(
        App::new().service(
            web::scope("/api")
                .wrap(RbacMiddleware::allow(["ROLE_ADMIN"]))
                .route("/admin", web::get().to(whoami)),
        ),
    )
    .await;

    let req = test::TestRequest::get().uri("/api/admin").to_request();
    let (status, _) = outcome(test::try_call_service(&app, req).await).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[actix_web::test]
async fn test_empty_allow_list_passes_through() {
    let app = test::init_service(
        App::new().service(
            web::scope("/open")
                .wrap(RbacMiddleware::allow(Vec::<String>::new()))
                .route("", web::get().to(|| async { HttpResponse::Ok().finish() })),
        ),
    )
    .await;

    let req = test::TestRequest::get().uri("/open").to_request();
    let (status, _) = outcome(test::try_call_service(&app, req).await).await;

    assert_eq!(status, StatusCode::OK);
}
