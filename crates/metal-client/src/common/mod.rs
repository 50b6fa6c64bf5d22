//! Common utilities for the Equinix Metal API client
//!
//! Provides the authenticated HTTP wrapper shared by all API calls.

use crate::error::MetalError;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;

/// Header carrying the Metal API token
pub const AUTH_HEADER: &str = "X-Auth-Token";

/// HTTP client wrapper with authentication
pub struct HttpClient {
    client: Client,
    base_url: String,
    token: String,
}

impl HttpClient {
    /// Create a new HTTP client wrapper
    pub fn new(client: Client, base_url: String, token: String) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        }
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build a full URL from a path
    pub fn build_url(&self, path: &str) -> String {
        if path.starts_with("http") {
            path.to_string()
        } else {
            format!("{}{}", self.base_url, path)
        }
    }

    /// Make a GET request
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, MetalError> {
        let url = self.build_url(path);
        debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .header(AUTH_HEADER, &self.token)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(MetalError::Http)?;

        let response = check_status("GET", path, response).await?;
        response.json().await.map_err(MetalError::Http)
    }

    /// Make a POST request, `body` is optional for action endpoints
    pub async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<T, MetalError> {
        let url = self.build_url(path);
        debug!(
            "POST {} with body: {}",
            url,
            body.map(|b| b.to_string()).unwrap_or_default()
        );

        let mut request = self
            .client
            .post(&url)
            .header(AUTH_HEADER, &self.token)
            .header("Accept", "application/json");
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request.send().await.map_err(MetalError::Http)?;

        let response = check_status("POST", path, response).await?;
        response.json().await.map_err(MetalError::Http)
    }

    /// Make a PUT request
    pub async fn put<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<T, MetalError> {
        let url = self.build_url(path);
        debug!("PUT {} with body: {}", url, body);

        let response = self
            .client
            .put(&url)
            .header(AUTH_HEADER, &self.token)
            .header("Accept", "application/json")
            .json(body)
            .send()
            .await
            .map_err(MetalError::Http)?;

        let response = check_status("PUT", path, response).await?;
        response.json().await.map_err(MetalError::Http)
    }

    /// Make a DELETE request
    pub async fn delete(&self, path: &str) -> Result<(), MetalError> {
        let url = self.build_url(path);
        debug!("DELETE {}", url);

        let response = self
            .client
            .delete(&url)
            .header(AUTH_HEADER, &self.token)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(MetalError::Http)?;

        check_status("DELETE", path, response).await?;
        Ok(())
    }

    /// Build query string from filters
    pub fn build_query_string(&self, filters: &[(&str, &str)]) -> String {
        filters
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&")
    }
}

/// Maps non-success statuses to `MetalError`
async fn check_status(method: &str, path: &str, response: Response) -> Result<Response, MetalError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    match status {
        StatusCode::NOT_FOUND => Err(MetalError::NotFound(format!(
            "Resource not found: {} - {}",
            path, body
        ))),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(MetalError::Authentication(format!(
            "{} {} rejected: {} - {}",
            method, path, status, body
        ))),
        StatusCode::UNPROCESSABLE_ENTITY => Err(MetalError::InvalidRequest(format!(
            "{} {} failed: {} - {}",
            method, path, status, body
        ))),
        _ => Err(MetalError::Api(format!(
            "{} {} failed: {} - {}",
            method, path, status, body
        ))),
    }
}
