//! # Actix Middleware Library
//!
//! Request-time authentication and authorization for the identity service
//! and any Actix service that trusts its tokens.
//!
//! ## Modules
//! - `jwt_auth`: bearer token verification, injects [`AuthenticatedUser`]
//! - `rbac`: role allow-list enforcement
//! - `identity`: the identity context handed to handlers
//! - `logging`: structured request logging
//! - `headers`: security response headers, JSON content-type enforcement
//! - `error`: JSON error responses raised by the middlewares

pub mod error;
pub mod headers;
pub mod identity;
pub mod jwt_auth;
pub mod logging;
pub mod rbac;

pub use error::AuthFailure;
pub use headers::{security_headers, RequireJson};
pub use identity::AuthenticatedUser;
pub use jwt_auth::JwtAuthMiddleware;
pub use logging::RequestLogging;
pub use rbac::{check_access, AccessDenied, RbacMiddleware};
