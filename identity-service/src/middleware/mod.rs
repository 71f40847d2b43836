pub mod auth;
pub mod service;

pub use auth::BearerToken;
pub use service::{service_auth_middleware, SERVICE_API_KEY_HEADER};
