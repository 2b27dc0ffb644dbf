//! HTTP routes and middleware.

pub mod routes;
pub mod security;

pub use routes::router;
pub use security::{security_headers_middleware, SecurityHeaders};
