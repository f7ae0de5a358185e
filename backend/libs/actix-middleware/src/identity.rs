use actix_web::{dev::Payload, FromRequest, HttpMessage, HttpRequest};
use crypto_core::Claims;
use futures::future::{ready, Ready};
use serde::Serialize;
use std::collections::BTreeSet;

use crate::error::AuthFailure;

/// Identity resolved from a verified access token.
///
/// Inserted into request extensions by [`crate::JwtAuthMiddleware`]; handlers
/// take it as an extractor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthenticatedUser {
    pub subject: String,
    pub username: String,
    pub email: String,
    pub roles: BTreeSet<String>,
}

impl AuthenticatedUser {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    /// Numeric user id, when the subject is one.
    pub fn user_id(&self) -> Option<i64> {
        self.subject.parse().ok()
    }
}

impl From<Claims> for AuthenticatedUser {
    fn from(claims: Claims) -> Self {
        Self {
            subject: claims.sub,
            username: claims.username,
            email: claims.email,
            roles: claims.roles.into_iter().collect(),
        }
    }
}

impl FromRequest for AuthenticatedUser {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        match req.extensions().get::<AuthenticatedUser>() {
            Some(user) => ready(Ok(user.clone())),
            None => ready(Err(AuthFailure::Unauthorized("user not authenticated").into())),
        }
    }
}
