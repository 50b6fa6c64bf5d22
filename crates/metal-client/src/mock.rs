//! Mock MetalClient for unit testing
//!
//! This module provides a mock implementation of MetalClientTrait that can be used
//! in unit tests without reaching the Equinix Metal API.

use crate::error::MetalError;
use crate::metal_trait::MetalClientTrait;
use crate::models::*;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Operations the mock can be told to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOperation {
    GetDevice,
    CreateDevice,
    UpdateDevice,
    ConvertNetworkType,
    DeleteDevice,
}

/// A call received by the mock, in order
#[derive(Debug, Clone, PartialEq)]
pub enum MockCall {
    GetDevice(String),
    CreateDevice(DeviceCreateRequest),
    UpdateDevice(String, DeviceUpdateRequest),
    ConvertNetworkType(String, String),
    DeleteDevice { id: String, force: bool },
}

/// Mock MetalClient for testing
///
/// Devices live in memory. Failures are scripted per operation and are
/// returned on every call until cleared.
#[derive(Clone)]
pub struct MockMetalClient {
    base_url: String,
    project_id: String,
    devices: Arc<Mutex<HashMap<String, Device>>>,
    failures: Arc<Mutex<HashMap<MockOperation, String>>>,
    calls: Arc<Mutex<Vec<MockCall>>>,
    next_id: Arc<Mutex<u64>>,
}

impl MockMetalClient {
    /// Create a new mock client
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            base_url: "http://mock-metal".to_string(),
            project_id: project_id.into(),
            devices: Arc::new(Mutex::new(HashMap::new())),
            failures: Arc::new(Mutex::new(HashMap::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
            next_id: Arc::new(Mutex::new(1)),
        }
    }

    /// Add a device to the mock store (for test setup)
    pub fn add_device(&self, device: Device) {
        self.devices.lock().unwrap().insert(device.id.clone(), device);
    }

    /// Current stored copy of a device
    pub fn device(&self, id: &str) -> Option<Device> {
        self.devices.lock().unwrap().get(id).cloned()
    }

    /// Make `operation` fail with `MetalError::Api(message)`
    pub fn fail(&self, operation: MockOperation, message: impl Into<String>) {
        self.failures.lock().unwrap().insert(operation, message.into());
    }

    /// Stop failing `operation`
    pub fn clear_failure(&self, operation: MockOperation) {
        self.failures.lock().unwrap().remove(&operation);
    }

    /// All calls received so far
    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of calls received so far
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn record(&self, call: MockCall) {
        self.calls.lock().unwrap().push(call);
    }

    fn check_failure(&self, operation: MockOperation) -> Result<(), MetalError> {
        match self.failures.lock().unwrap().get(&operation) {
            Some(message) => Err(MetalError::Api(message.clone())),
            None => Ok(()),
        }
    }

    fn not_found(id: &str) -> MetalError {
        MetalError::NotFound(format!("Device {} not found", id))
    }
}

#[async_trait::async_trait]
impl MetalClientTrait for MockMetalClient {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    fn project_id(&self) -> &str {
        &self.project_id
    }

    async fn get_device(&self, id: &str) -> Result<Device, MetalError> {
        self.record(MockCall::GetDevice(id.to_string()));
        self.check_failure(MockOperation::GetDevice)?;
        self.device(id).ok_or_else(|| Self::not_found(id))
    }

    async fn create_device(&self, request: &DeviceCreateRequest) -> Result<Device, MetalError> {
        self.record(MockCall::CreateDevice(request.clone()));
        self.check_failure(MockOperation::CreateDevice)?;

        let id = {
            let mut next_id = self.next_id.lock().unwrap();
            let id = format!("device-{}", *next_id);
            *next_id += 1;
            id
        };
        let device = Device {
            id: id.clone(),
            href: format!("/metal/v1/devices/{}", id),
            hostname: request.hostname.clone(),
            description: request.description.clone(),
            state: "queued".to_string(),
            always_pxe: request.always_pxe.unwrap_or(false),
            ipxe_script_url: request.ipxe_script_url.clone(),
            userdata: request.userdata.clone(),
            billing_cycle: request.billing_cycle.clone(),
            locked: request.locked.unwrap_or(false),
            tags: request.tags.clone(),
            plan: Some(NestedPlan { slug: request.plan.clone() }),
            metro: request.metro.clone().map(|code| NestedMetro { code }),
            operating_system: Some(NestedOperatingSystem {
                slug: request.operating_system.clone(),
            }),
            ..Default::default()
        };
        self.add_device(device.clone());
        Ok(device)
    }

    async fn update_device(&self, id: &str, request: &DeviceUpdateRequest) -> Result<Device, MetalError> {
        self.record(MockCall::UpdateDevice(id.to_string(), request.clone()));
        self.check_failure(MockOperation::UpdateDevice)?;

        let mut devices = self.devices.lock().unwrap();
        let device = devices.get_mut(id).ok_or_else(|| Self::not_found(id))?;
        if let Some(hostname) = &request.hostname {
            device.hostname = hostname.clone();
        }
        if let Some(description) = &request.description {
            device.description = Some(description.clone());
        }
        if let Some(billing_cycle) = &request.billing_cycle {
            device.billing_cycle = Some(billing_cycle.clone());
        }
        if let Some(userdata) = &request.userdata {
            device.userdata = Some(userdata.clone());
        }
        if let Some(locked) = request.locked {
            device.locked = locked;
        }
        if let Some(tags) = &request.tags {
            device.tags = tags.clone();
        }
        if let Some(always_pxe) = request.always_pxe {
            device.always_pxe = always_pxe;
        }
        if let Some(url) = &request.ipxe_script_url {
            device.ipxe_script_url = Some(url.clone());
        }
        Ok(device.clone())
    }

    async fn convert_network_type(&self, id: &str, network_type: &str) -> Result<Device, MetalError> {
        self.record(MockCall::ConvertNetworkType(id.to_string(), network_type.to_string()));
        self.check_failure(MockOperation::ConvertNetworkType)?;

        let mut devices = self.devices.lock().unwrap();
        let device = devices.get_mut(id).ok_or_else(|| Self::not_found(id))?;
        device.network_type = Some(network_type.to_string());
        Ok(device.clone())
    }

    async fn delete_device(&self, id: &str, force: bool) -> Result<(), MetalError> {
        self.record(MockCall::DeleteDevice {
            id: id.to_string(),
            force,
        });
        self.check_failure(MockOperation::DeleteDevice)?;

        match self.devices.lock().unwrap().remove(id) {
            Some(_) => Ok(()),
            None => Err(Self::not_found(id)),
        }
    }
}
