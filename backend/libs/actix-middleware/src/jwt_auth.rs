use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header::AUTHORIZATION,
    Error, HttpMessage,
};
use crypto_core::TokenCodec;
use futures::future::{ready, Ready};
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::sync::Arc;

use crate::error::AuthFailure;
use crate::identity::AuthenticatedUser;

pub const DEFAULT_TOKEN_PREFIX: &str = "Bearer ";

/// JWT Authentication Middleware
///
/// Verifies the bearer token with the shared codec and inserts an
/// [`AuthenticatedUser`] into the request extensions. Requests that fail
/// never reach the wrapped service.
#[derive(Clone)]
pub struct JwtAuthMiddleware {
    codec: Arc<dyn TokenCodec>,
    prefix: Arc<str>,
}

impl JwtAuthMiddleware {
    /// `prefix` must match the start of the header exactly, e.g. `"Bearer "`.
    pub fn new(codec: Arc<dyn TokenCodec>, prefix: impl Into<String>) -> Self {
        Self {
            codec,
            prefix: Arc::from(prefix.into()),
        }
    }

    pub fn bearer(codec: Arc<dyn TokenCodec>) -> Self {
        Self::new(codec, DEFAULT_TOKEN_PREFIX)
    }
}

impl<S, B> Transform<S, ServiceRequest> for JwtAuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = JwtAuthMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(JwtAuthMiddlewareService {
            service: Rc::new(service),
            codec: Arc::clone(&self.codec),
            prefix: Arc::clone(&self.prefix),
        }))
    }
}

pub struct JwtAuthMiddlewareService<S> {
    service: Rc<S>,
    codec: Arc<dyn TokenCodec>,
    prefix: Arc<str>,
}

impl<S, B> Service<ServiceRequest> for JwtAuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let codec = Arc::clone(&self.codec);
        let prefix = Arc::clone(&self.prefix);

        Box::pin(async move {
            let user = authenticate(&req, codec.as_ref(), &prefix)?;
            req.extensions_mut().insert(user);

            service.call(req).await
        })
    }
}

fn authenticate(
    req: &ServiceRequest,
    codec: &dyn TokenCodec,
    prefix: &str,
) -> Result<AuthenticatedUser, AuthFailure> {
    let header = req
        .headers()
        .get(AUTHORIZATION)
        .ok_or(AuthFailure::Unauthorized("no token provided"))?;

    let token = header
        .to_str()
        .ok()
        .and_then(|value| value.strip_prefix(prefix))
        .filter(|token| !token.is_empty())
        .ok_or(AuthFailure::Unauthorized("invalid token format"))?;

    let claims = codec.verify(token).map_err(|e| {
        tracing::warn!(path = %req.path(), error = %e, "JWT validation failed");
        AuthFailure::Unauthorized("invalid token")
    })?;

    Ok(AuthenticatedUser::from(claims))
}
