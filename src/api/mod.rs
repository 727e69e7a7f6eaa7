//! HTTP API
//!
//! JSON surface over [`crate::engine::CrashEngine`]. Reads are public;
//! mutating routes act as the identity bound to the request's bearer key.

pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod security;
pub mod server;

pub use handlers::AppState;
pub use routes::create_router;
pub use security::{hash_api_key, CredentialRegistry};
pub use server::ApiServer;
