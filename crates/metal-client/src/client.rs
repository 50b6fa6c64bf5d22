//! Equinix Metal API client
//!
//! Implements the subset of the Metal v1 REST API used to manage devices:
//! `/devices/{id}`, `/projects/{id}/devices` and the `/ports/{id}/...` actions.

use crate::common::HttpClient;
use crate::error::MetalError;
use crate::metal_trait::MetalClientTrait;
use crate::models::*;
use crate::network::plan_conversion;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info};

/// Default Equinix Metal API endpoint
pub const DEFAULT_BASE_URL: &str = "https://api.equinix.com/metal/v1";

/// Default request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Related collections fetched alongside a device
const DEVICE_INCLUDES: &[(&str, &str)] = &[("include", "network_ports,ip_addresses")];

/// Equinix Metal API client
pub struct MetalClient {
    http: HttpClient,
    project_id: String,
}

impl MetalClient {
    /// Create a new Metal client
    ///
    /// # Arguments
    /// * `base_url` - API base URL (e.g., "https://api.equinix.com/metal/v1")
    /// * `token` - API key sent as `X-Auth-Token`
    /// * `project_id` - Project that new devices are created in
    /// * `timeout` - Per-request timeout
    pub fn new(
        base_url: String,
        token: String,
        project_id: String,
        timeout: Duration,
    ) -> Result<Self, MetalError> {
        if token.is_empty() {
            return Err(MetalError::InvalidCredentials("API token is empty".to_string()));
        }

        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("metal-device-controller/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(MetalError::Http)?;

        Ok(Self {
            http: HttpClient::new(client, base_url, token),
            project_id,
        })
    }

    /// Create a client from a parsed credentials document
    pub fn from_credentials(
        base_url: String,
        credentials: Credentials,
        timeout: Duration,
    ) -> Result<Self, MetalError> {
        Self::new(base_url, credentials.api_key, credentials.project_id, timeout)
    }

    fn device_path(&self, id: &str) -> String {
        format!(
            "/devices/{}?{}",
            urlencoding::encode(id),
            self.http.build_query_string(DEVICE_INCLUDES)
        )
    }
}

#[async_trait::async_trait]
impl MetalClientTrait for MetalClient {
    fn base_url(&self) -> &str {
        self.http.base_url()
    }

    fn project_id(&self) -> &str {
        &self.project_id
    }

    async fn get_device(&self, id: &str) -> Result<Device, MetalError> {
        self.http.get(&self.device_path(id)).await
    }

    async fn create_device(&self, request: &DeviceCreateRequest) -> Result<Device, MetalError> {
        if self.project_id.is_empty() {
            return Err(MetalError::InvalidRequest(
                "cannot create a device without a project ID".to_string(),
            ));
        }

        let path = format!(
            "/projects/{}/devices?{}",
            urlencoding::encode(&self.project_id),
            self.http.build_query_string(DEVICE_INCLUDES)
        );
        let body = serde_json::to_value(request)?;
        let device: Device = self.http.post(&path, Some(&body)).await?;
        info!(device_id = %device.id, hostname = %device.hostname, "Created Metal device");
        Ok(device)
    }

    async fn update_device(&self, id: &str, request: &DeviceUpdateRequest) -> Result<Device, MetalError> {
        let body = serde_json::to_value(request)?;
        self.http.put(&self.device_path(id), &body).await
    }

    async fn convert_network_type(&self, id: &str, network_type: &str) -> Result<Device, MetalError> {
        let device = self.get_device(id).await?;
        let plan = plan_conversion(&device, network_type)?;
        if plan.is_empty() {
            debug!(device_id = %id, network_type, "Device already in requested network type");
            return Ok(device);
        }

        for action in &plan {
            let port = device.port_by_name(&action.port).ok_or_else(|| {
                MetalError::InvalidRequest(format!("device {} has no port {}", id, action.port))
            })?;
            debug!(device_id = %id, port = %action.port, operation = ?action.operation, "Applying port action");
            let _: Port = self.http.post(&action.path(&port.id), None).await?;
        }

        info!(device_id = %id, network_type, steps = plan.len(), "Converted device network type");
        self.get_device(id).await
    }

    async fn delete_device(&self, id: &str, force: bool) -> Result<(), MetalError> {
        let path = format!(
            "/devices/{}?force_delete={}",
            urlencoding::encode(id),
            force
        );
        self.http.delete(&path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_empty_token() {
        let result = MetalClient::new(
            DEFAULT_BASE_URL.to_string(),
            String::new(),
            "proj".to_string(),
            DEFAULT_TIMEOUT,
        );
        assert!(matches!(result, Err(MetalError::InvalidCredentials(_))));
    }

    #[test]
    fn test_device_path_includes_ports_and_addresses() {
        let client = MetalClient::new(
            DEFAULT_BASE_URL.to_string(),
            "token".to_string(),
            "proj".to_string(),
            DEFAULT_TIMEOUT,
        )
        .unwrap();
        assert_eq!(
            client.device_path("abc"),
            "/devices/abc?include=network_ports%2Cip_addresses"
        );
        assert_eq!(client.project_id(), "proj");
        assert_eq!(client.base_url(), DEFAULT_BASE_URL);
    }

    #[test]
    fn test_from_credentials() {
        let credentials = Credentials {
            api_key: "token".to_string(),
            project_id: "proj-9".to_string(),
        };
        let client =
            MetalClient::from_credentials(DEFAULT_BASE_URL.to_string(), credentials, DEFAULT_TIMEOUT)
                .unwrap();
        assert_eq!(client.project_id(), "proj-9");
    }
}
