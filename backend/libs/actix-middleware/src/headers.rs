//! Response hardening and request content-type enforcement.

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::{header::CONTENT_TYPE, Method},
    middleware::DefaultHeaders,
    Error,
};
use futures::future::LocalBoxFuture;
use std::future::{ready, Ready};

use crate::error::AuthFailure;

const JSON_CONTENT_TYPE: &str = "application/json";

/// Security headers added to every response that does not set them itself.
pub fn security_headers() -> DefaultHeaders {
    DefaultHeaders::new()
        .add(("X-Content-Type-Options", "nosniff"))
        .add(("X-Frame-Options", "DENY"))
        .add(("X-XSS-Protection", "1; mode=block"))
        .add(("Referrer-Policy", "no-referrer"))
        .add((
            "Content-Security-Policy",
            "default-src 'none'; frame-ancestors 'none'",
        ))
        .add((
            "Strict-Transport-Security",
            "max-age=31536000; includeSubDomains",
        ))
}

/// Rejects POST and PUT requests whose `Content-Type` is not JSON (415).
#[derive(Clone, Copy, Default)]
pub struct RequireJson;

impl<S, B> Transform<S, ServiceRequest> for RequireJson
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = RequireJsonService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RequireJsonService { service }))
    }
}

pub struct RequireJsonService<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for RequireJsonService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        if !has_acceptable_body(&req) {
            let rejected: Result<Self::Response, Self::Error> = Err(
                AuthFailure::UnsupportedMediaType("Content-Type must be application/json").into(),
            );
            return Box::pin(ready(rejected));
        }

        Box::pin(self.service.call(req))
    }
}

fn has_acceptable_body(req: &ServiceRequest) -> bool {
    if req.method() != Method::POST && req.method() != Method::PUT {
        return true;
    }

    req.headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with(JSON_CONTENT_TYPE))
}
