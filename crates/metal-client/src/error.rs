//! Equinix Metal client errors

use thiserror::Error;

/// Errors that can occur when interacting with the Equinix Metal API
#[derive(Debug, Error)]
pub enum MetalError {
    /// HTTP request/response error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Equinix Metal API returned an error
    #[error("Equinix Metal API error: {0}")]
    Api(String),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Authentication failed (invalid token, expired, etc.)
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid request (e.g., missing required fields)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Credentials payload could not be used to build a client
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),
}

impl MetalError {
    /// True when the API reported the resource as missing
    pub fn is_not_found(&self) -> bool {
        matches!(self, MetalError::NotFound(_))
    }
}
