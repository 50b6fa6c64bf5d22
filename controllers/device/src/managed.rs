//! Managed resource types shared by the connecter and the external client.

use std::collections::BTreeMap;

use crds::{Device, DeviceParameters, DeviceStatus};
use kube::Resource;

use crate::error::ControllerError;

/// Connection details published to the resource's connection Secret
pub type ConnectionDetails = BTreeMap<String, Vec<u8>>;

pub const CONNECTION_ENDPOINT: &str = "endpoint";
pub const CONNECTION_PORT: &str = "port";
pub const CONNECTION_USERNAME: &str = "username";
pub const CONNECTION_PASSWORD: &str = "password";

/// A resource handed to the reconciler
///
/// Only `Device` is managed here. `Foreign` stands for any other kind that
/// reaches the reconciler and is rejected with `ControllerError::NotDevice`.
#[derive(Debug, Clone)]
pub enum ManagedResource {
    Device(Box<Device>),
    Foreign { api_version: String, kind: String },
}

impl ManagedResource {
    /// Returns the Device, or `NotDevice` for any other kind
    pub fn as_device(&self) -> Result<&Device, ControllerError> {
        match self {
            ManagedResource::Device(device) => Ok(device),
            ManagedResource::Foreign { .. } => Err(ControllerError::NotDevice),
        }
    }

    /// `apiVersion` and `kind` of the resource
    pub fn type_meta(&self) -> (String, String) {
        match self {
            ManagedResource::Device(_) => (
                Device::api_version(&()).into_owned(),
                Device::kind(&()).into_owned(),
            ),
            ManagedResource::Foreign { api_version, kind } => (api_version.clone(), kind.clone()),
        }
    }
}

impl From<Device> for ManagedResource {
    fn from(device: Device) -> Self {
        ManagedResource::Device(Box::new(device))
    }
}

/// Result of an external operation plus the status it produced
///
/// `status` is `None` when the operation left the status untouched. It is
/// populated even when `result` is an error, so transitions such as
/// `Creating` or `Deleting` are persisted before the error is reported.
#[derive(Debug)]
pub struct Outcome<T> {
    pub status: Option<DeviceStatus>,
    pub result: Result<T, ControllerError>,
}

impl<T> Outcome<T> {
    /// Status untouched
    pub fn unchanged(result: Result<T, ControllerError>) -> Self {
        Self { status: None, result }
    }

    /// Status untouched, operation failed
    pub fn failed(error: ControllerError) -> Self {
        Self::unchanged(Err(error))
    }

    /// New status snapshot alongside the result
    pub fn with_status(status: DeviceStatus, result: Result<T, ControllerError>) -> Self {
        Self {
            status: Some(status),
            result,
        }
    }
}

/// What `observe` learned about the remote device
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExternalObservation {
    pub exists: bool,
    pub up_to_date: bool,
    pub connection_details: ConnectionDetails,
    /// Parameters after late initialization, present only when they changed
    pub late_initialized: Option<DeviceParameters>,
}

impl ExternalObservation {
    /// The device does not exist at the provider
    pub fn absent() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExternalCreation {
    pub connection_details: ConnectionDetails,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExternalUpdate {
    pub connection_details: ConnectionDetails,
}
