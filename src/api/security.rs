//! Bearer-Key Authentication
//!
//! Mutating routes act as the identity bound to the request's
//! `Authorization: Bearer <key>` header. Only SHA-256 hashes of the keys are
//! configured, never the keys themselves.

use super::{errors::ApiError, handlers::AppState, middleware::RequestId};
use crate::config::ApiCredential;
use crate::crash::types::Address;
use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Hash API key using SHA256
pub fn hash_api_key(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    hex::encode(hasher.finalize())
}

/// Key hashes mapped to the identities they authenticate
#[derive(Debug, Clone, Default)]
pub struct CredentialRegistry {
    principals: HashMap<String, Address>,
}

impl CredentialRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(credentials: &[ApiCredential]) -> Self {
        let principals = credentials
            .iter()
            .map(|c| (c.key_hash.to_ascii_lowercase(), Address::new(c.principal.clone())))
            .collect();
        Self { principals }
    }

    /// Register a raw key for `principal`.
    pub fn with_key(mut self, raw_key: &str, principal: Address) -> Self {
        self.principals.insert(hash_api_key(raw_key), principal);
        self
    }

    pub fn resolve(&self, raw_key: &str) -> Option<&Address> {
        self.principals.get(&hash_api_key(raw_key))
    }

    pub fn len(&self) -> usize {
        self.principals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.principals.is_empty()
    }
}

/// Identity proven by the request's bearer key
#[derive(Debug, Clone)]
pub struct Caller(pub Address);

/// Resolve the bearer key, if any, into a [`Caller`] extension.
///
/// Requests without an `Authorization` header pass through anonymously and
/// are refused by the routes that need a caller. A header that does not
/// carry a known key is refused here with 401.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let presented = request.headers().get(header::AUTHORIZATION).map(|value| {
        value
            .to_str()
            .ok()
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(|key| key.trim().to_string())
    });

    let principal = match presented {
        None => return next.run(request).await,
        Some(key) => key.and_then(|k| state.credentials.resolve(&k).cloned()),
    };

    match principal {
        Some(principal) => {
            debug!(caller = %principal, "authenticated request");
            request.extensions_mut().insert(Caller(principal));
            next.run(request).await
        }
        None => {
            let request_id = request
                .extensions()
                .get::<RequestId>()
                .map(|r| r.0.clone())
                .unwrap_or_default();
            warn!(request_id = %request_id, path = %request.uri().path(), "invalid API key");
            ApiError::unauthenticated(request_id, "Invalid API key".to_string()).into_response()
        }
    }
}
