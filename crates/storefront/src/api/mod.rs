//! GraphQL transport for the Kron storefront backend.
//!
//! # Architecture
//!
//! - Hand-written operations in `graphql/*.graphql`, sent through the
//!   `graphql_client` request/response envelopes over `reqwest`
//! - Bearer token taken from the [`SessionStore`]: the user's access token,
//!   else the guest token
//! - An authentication-class failure triggers one silent session recovery
//!   (refresh, else new guest session) and one retry of the request
//! - Transient failures are retried with exponential backoff
//! - Product pages are cached in memory via `moka`
//!
//! # Example
//!
//! ```rust,ignore
//! use kron_storefront::api::{ApiClient, ProductsQuery};
//!
//! let client = ApiClient::new(&config.api, store)?;
//! let page = client.products(&ProductsQuery::search("лопата", 50)).await?;
//! ```

mod cache;
mod client;
mod conversions;
mod queries;
mod retry;
mod session;
pub mod types;

pub use cache::QueryCache;
pub use client::ApiClient;
pub use retry::{RetryPolicy, retry_with_backoff, with_session_recovery};
pub use session::SessionStore;
pub use types::{PageInfo, ProductPage, ProductSort, ProductsQuery, TokenPair, Viewer, ViewerUser};

use thiserror::Error;

/// GraphQL error code marking an expired or missing session.
pub const UNAUTHENTICATED_CODE: &str = "UNAUTHENTICATED";

/// Errors that can occur when talking to the storefront API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success HTTP status other than 401 and 429.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// HTTP 401.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// GraphQL query returned errors.
    #[error("GraphQL errors: {}", format_graphql_errors(.0))]
    GraphQL(Vec<GraphQLError>),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Response was well-formed but carried unusable values.
    #[error("Invalid response data: {0}")]
    InvalidData(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Rate limited by the backend.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// Login, guest login or token refresh was rejected.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// No way to establish a session (no refresh token and no region).
    #[error("Session unavailable: {0}")]
    Session(String),
}

impl ApiError {
    /// Whether this error means the session token is missing or expired.
    #[must_use]
    pub fn is_unauthenticated(&self) -> bool {
        match self {
            Self::Unauthorized(_) => true,
            Self::GraphQL(errors) => errors.iter().any(GraphQLError::is_unauthenticated),
            _ => false,
        }
    }

    /// Whether retrying the same request may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(e) => e.is_connect() || e.is_timeout(),
            Self::Status { status, .. } => *status >= 500,
            Self::RateLimited(_) => true,
            _ => false,
        }
    }
}

/// A GraphQL error returned by the API.
#[derive(Debug, Clone, Default)]
pub struct GraphQLError {
    /// Error message.
    pub message: String,
    /// Source locations in the query.
    pub locations: Vec<GraphQLErrorLocation>,
    /// Path to the error in the response.
    pub path: Vec<serde_json::Value>,
    /// `extensions.code`, if the server sent one.
    pub code: Option<String>,
}

impl GraphQLError {
    /// Error carrying only a message.
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }

    /// Whether the error is tagged `UNAUTHENTICATED` or its message says so.
    #[must_use]
    pub fn is_unauthenticated(&self) -> bool {
        if self.code.as_deref() == Some(UNAUTHENTICATED_CODE) {
            return true;
        }
        let message = self.message.to_lowercase();
        message.contains("unauthenticated") || message.contains("not authenticated")
    }
}

/// Location in a GraphQL query where an error occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraphQLErrorLocation {
    /// Line number (1-indexed).
    pub line: i64,
    /// Column number (1-indexed).
    pub column: i64,
}

fn format_graphql_errors(errors: &[GraphQLError]) -> String {
    if errors.is_empty() {
        return "(no error details provided)".to_string();
    }

    errors
        .iter()
        .enumerate()
        .map(|(i, e)| {
            let mut parts = Vec::new();

            if !e.message.is_empty() {
                parts.push(e.message.clone());
            }

            if !e.path.is_empty() {
                let path_str = e
                    .path
                    .iter()
                    .map(|p| match p {
                        serde_json::Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect::<Vec<_>>()
                    .join(".");
                parts.push(format!("path: {path_str}"));
            }

            if let Some(loc) = e.locations.first() {
                parts.push(format!("at line {}:{}", loc.line, loc.column));
            }

            if parts.is_empty() {
                format!("[error {}]: (no details)", i + 1)
            } else {
                parts.join(" ")
            }
        })
        .collect::<Vec<_>>()
        .join("; ")
}
