//! Planning backend HTTP client.
//!
//! [`PlanningApi`] is the seam the planning session talks to;
//! [`HttpPlanningApi`] implements it over reqwest against the `/api`
//! endpoints. Authentication is a pluggable [`TokenSource`].
//!
//! # Usage
//!
//! ```ignore
//! use cutplan_client::{HttpPlanningApi, StaticToken};
//!
//! let api = HttpPlanningApi::new("http://localhost:3000", Arc::new(StaticToken::new(jwt)));
//! let combos = api.combinations("ORD-001").await?;
//! ```

pub mod api;
pub mod dto;
pub mod http;

pub use api::PlanningApi;
pub use dto::*;
pub use http::HttpPlanningApi;

// ── Error ───────────────────────────────────────────────────────────

/// Client-side API error.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Non-2xx HTTP status.
    #[error("HTTP {status}: {message}")]
    Server { status: u16, message: String },

    /// Transport failure (connect, timeout, TLS).
    #[error("network: {0}")]
    Network(#[from] reqwest::Error),

    /// The backend answered `{"success": false, "msg": ...}`.
    #[error("backend: {0}")]
    Backend(String),

    #[error("auth: {0}")]
    Auth(String),

    #[error("decode: {0}")]
    Decode(String),
}

// ── TokenSource ─────────────────────────────────────────────────────

/// Pluggable token provider, called before every request.
///
/// Returns `Ok(None)` to skip the Authorization header.
#[async_trait::async_trait]
pub trait TokenSource: Send + Sync + 'static {
    async fn token(&self) -> Result<Option<String>, ApiError>;
}

/// No authentication: anonymous requests.
pub struct NoAuth;

#[async_trait::async_trait]
impl TokenSource for NoAuth {
    async fn token(&self) -> Result<Option<String>, ApiError> {
        Ok(None)
    }
}

/// Bearer token obtained by the login flow outside this crate.
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

#[async_trait::async_trait]
impl TokenSource for StaticToken {
    async fn token(&self) -> Result<Option<String>, ApiError> {
        if self.0.is_empty() {
            return Ok(None);
        }
        Ok(Some(self.0.clone()))
    }
}
