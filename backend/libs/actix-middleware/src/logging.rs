//! Logging middleware
//!
//! Logs HTTP request/response information using tracing. Wrap it outside
//! the authentication middleware so rejected requests are logged too.

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error, HttpMessage,
};
use futures::future::LocalBoxFuture;
use std::future::{ready, Ready};
use std::time::Instant;

use crate::identity::AuthenticatedUser;

/// Middleware that logs HTTP requests and responses
#[derive(Clone, Default)]
pub struct RequestLogging;

impl<S, B> Transform<S, ServiceRequest> for RequestLogging
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = RequestLoggingService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RequestLoggingService { service }))
    }
}

pub struct RequestLoggingService<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for RequestLoggingService<S>
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
        let start = Instant::now();
        let method = req.method().clone();
        let path = req.path().to_string();

        let fut = self.service.call(req);

        Box::pin(async move {
            let result = fut.await;
            let duration_ms = start.elapsed().as_millis() as u64;

            match &result {
                Ok(res) => {
                    let subject = res
                        .request()
                        .extensions()
                        .get::<AuthenticatedUser>()
                        .map(|user| user.subject.clone());

                    tracing::info!(
                        method = %method,
                        path = %path,
                        status = res.status().as_u16(),
                        duration_ms,
                        subject = subject.as_deref().unwrap_or("-"),
                        "HTTP request completed"
                    );
                }
                Err(err) => {
                    tracing::info!(
                        method = %method,
                        path = %path,
                        status = err.as_response_error().status_code().as_u16(),
                        duration_ms,
                        error = %err,
                        "HTTP request rejected"
                    );
                }
            }

            result
        })
    }
}
