//! MetalClientTrait for mocking
//!
//! This trait abstracts the MetalClient to enable mocking in unit tests.
//! The concrete MetalClient implements this trait, and tests can use mock implementations.

use crate::error::MetalError;
use crate::models::*;

/// Trait for Equinix Metal API client operations
///
/// All async methods must be `Send` to work with Tokio's work-stealing runtime.
#[async_trait::async_trait]
pub trait MetalClientTrait: Send + Sync {
    /// Get the base URL
    fn base_url(&self) -> &str;

    /// Project that new devices are created in
    fn project_id(&self) -> &str;

    /// Fetch a device including its network ports and IP addresses
    async fn get_device(&self, id: &str) -> Result<Device, MetalError>;

    /// Create a device in the client's project
    async fn create_device(&self, request: &DeviceCreateRequest) -> Result<Device, MetalError>;

    /// Update mutable device attributes
    async fn update_device(&self, id: &str, request: &DeviceUpdateRequest) -> Result<Device, MetalError>;

    /// Reconfigure the device ports into `network_type`
    async fn convert_network_type(&self, id: &str, network_type: &str) -> Result<Device, MetalError>;

    /// Delete a device. A missing device is reported as `MetalError::NotFound`.
    async fn delete_device(&self, id: &str, force: bool) -> Result<(), MetalError>;
}
