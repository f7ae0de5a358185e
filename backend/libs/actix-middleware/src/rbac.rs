//! Role-based access control.
//!
//! Must be mounted inside [`crate::JwtAuthMiddleware`]: it reads the
//! [`AuthenticatedUser`] that middleware leaves in the request extensions.
//! Roles are matched as exact, case-sensitive strings with no hierarchy.

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error, HttpMessage,
};
use futures::future::{ready, Ready};
use std::collections::BTreeSet;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::sync::Arc;
use thiserror::Error;

use crate::error::AuthFailure;
use crate::identity::AuthenticatedUser;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AccessDenied {
    #[error("no authenticated identity in request")]
    MissingIdentity,

    #[error("no roles")]
    NoRoles,

    #[error("access denied")]
    InsufficientRole,
}

impl From<AccessDenied> for AuthFailure {
    fn from(denied: AccessDenied) -> Self {
        match denied {
            AccessDenied::MissingIdentity => AuthFailure::Internal("Internal server error"),
            AccessDenied::NoRoles => AuthFailure::Forbidden("no roles"),
            AccessDenied::InsufficientRole => AuthFailure::Forbidden("access denied"),
        }
    }
}

/// Decide whether `user` may pass a gate allowing `allowed`.
///
/// An empty allow-list admits every request, authenticated or not.
pub fn check_access(
    allowed: &BTreeSet<String>,
    user: Option<&AuthenticatedUser>,
) -> Result<(), AccessDenied> {
    if allowed.is_empty() {
        return Ok(());
    }

    let user = user.ok_or(AccessDenied::MissingIdentity)?;

    if user.roles.is_empty() {
        return Err(AccessDenied::NoRoles);
    }

    if user.roles.iter().any(|role| allowed.contains(role)) {
        Ok(())
    } else {
        Err(AccessDenied::InsufficientRole)
    }
}

/// Admits requests whose identity holds at least one of the allowed roles.
#[derive(Debug, Clone)]
pub struct RbacMiddleware {
    allowed: Arc<BTreeSet<String>>,
}

impl RbacMiddleware {
    pub fn allow<I, R>(roles: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<String>,
    {
        Self {
            allowed: Arc::new(roles.into_iter().map(Into::into).collect()),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for RbacMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = RbacMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RbacMiddlewareService {
            service: Rc::new(service),
            allowed: Arc::clone(&self.allowed),
        }))
    }
}

pub struct RbacMiddlewareService<S> {
    service: Rc<S>,
    allowed: Arc<BTreeSet<String>>,
}

impl<S, B> Service<ServiceRequest> for RbacMiddlewareService<S>
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

        let decision = {
            let extensions = req.extensions();
            check_access(&self.allowed, extensions.get::<AuthenticatedUser>())
        };

        Box::pin(async move {
            if let Err(denied) = decision {
                match denied {
                    AccessDenied::MissingIdentity => tracing::error!(
                        path = %req.path(),
                        "RBAC gate reached without an authenticated identity"
                    ),
                    _ => tracing::info!(path = %req.path(), reason = %denied, "access denied"),
                }
                return Err(AuthFailure::from(denied).into());
            }

            service.call(req).await
        })
    }
}
