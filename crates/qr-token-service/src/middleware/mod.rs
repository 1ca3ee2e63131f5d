//! HTTP 中间件

pub mod auth;
pub mod pos_key;

pub use auth::{AuthUser, auth_middleware};
pub use pos_key::pos_key_middleware;
