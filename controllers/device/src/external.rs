//! External reconciler for Equinix Metal devices.
//!
//! `ExternalClient` implements Observe, Create, Update and Delete against the
//! Metal API. None of the operations mutate the resource they are given: each
//! returns an `Outcome` carrying the status snapshot the caller should
//! persist, so a failed remote call still records `Creating` or `Deleting`.

use std::sync::Arc;

use crds::{Condition, DeviceObservation, DeviceParameters, NetworkType};
use metal_client::{
    Device as RemoteDevice, DeviceCreateRequest, DeviceUpdateRequest, MetalClientTrait, MetalError,
};
use tracing::{debug, info, warn};

use crate::error::ControllerError;
use crate::managed::{
    ConnectionDetails, ExternalCreation, ExternalObservation, ExternalUpdate, ManagedResource, Outcome,
    CONNECTION_ENDPOINT, CONNECTION_PASSWORD, CONNECTION_PORT, CONNECTION_USERNAME,
};
use crate::network_type;
use crate::state::{is_provisioning, map_state};

/// SSH user on freshly provisioned devices
pub const ROOT_USERNAME: &str = "root";
/// SSH port published alongside the endpoint
pub const SSH_PORT: &str = "22";

/// Device client bound to one set of credentials
#[derive(Clone)]
pub struct ExternalClient {
    client: Arc<dyn MetalClientTrait>,
}

impl ExternalClient {
    pub fn new(client: Arc<dyn MetalClientTrait>) -> Self {
        Self { client }
    }

    /// Fetches the remote device and reports whether it exists and matches `spec.forProvider`
    pub async fn observe(&self, resource: &ManagedResource) -> Outcome<ExternalObservation> {
        let device = match resource.as_device() {
            Ok(device) => device,
            Err(e) => return Outcome::failed(e),
        };
        let Some(id) = device.external_id() else {
            debug!("No external ID recorded, device does not exist yet");
            return Outcome::unchanged(Ok(ExternalObservation::absent()));
        };

        let remote = match self.client.get_device(id).await {
            Ok(remote) => remote,
            Err(e) if e.is_not_found() => {
                debug!(device_id = %id, "Device not found at provider");
                return Outcome::unchanged(Ok(ExternalObservation::absent()));
            }
            Err(e) => return Outcome::failed(ControllerError::GetDevice(e)),
        };

        let network_type = observed_network_type(&remote);
        let mapped = map_state(&remote.state);

        let mut status = device.status.clone().unwrap_or_default();
        status.at_provider = DeviceObservation {
            id: status.at_provider.id.clone(),
            href: non_empty(&remote.href),
            hostname: non_empty(&remote.hostname),
            state: Some(mapped.state),
            provision_percentage: remote.provisioning_percentage.map(format_percentage),
            network_type: Some(network_type),
            locked: Some(remote.locked),
            ipv4: remote.public_ipv4().map(str::to_string),
            ipv6: remote.public_ipv6().map(str::to_string),
            metro: remote.metro.as_ref().and_then(|m| non_empty(&m.code)),
        };
        status.set_condition(mapped.condition);

        let mut parameters = device.spec.for_provider.clone();
        late_initialize(&mut parameters, &remote, network_type);
        let up_to_date = is_up_to_date(&parameters, &remote, network_type);
        let late_initialized = (parameters != device.spec.for_provider).then_some(parameters);

        Outcome::with_status(
            status,
            Ok(ExternalObservation {
                exists: true,
                up_to_date,
                connection_details: connection_details(&remote),
                late_initialized,
            }),
        )
    }

    /// Creates the remote device and records its ID
    pub async fn create(&self, resource: &ManagedResource) -> Outcome<ExternalCreation> {
        let device = match resource.as_device() {
            Ok(device) => device,
            Err(e) => return Outcome::failed(e),
        };

        let mut status = device.status.clone().unwrap_or_default();
        status.set_condition(Condition::creating());

        let request = create_request(&device.spec.for_provider);
        match self.client.create_device(&request).await {
            Ok(created) => {
                info!(device_id = %created.id, hostname = %created.hostname, "Device created");
                status.set_external_id(&created.id);
                Outcome::with_status(
                    status,
                    Ok(ExternalCreation {
                        connection_details: connection_details(&created),
                    }),
                )
            }
            Err(e) => Outcome::with_status(status, Err(ControllerError::CreateDevice(e))),
        }
    }

    /// Converges network type and mutable attributes
    ///
    /// Both changes are attempted even when the first one fails; the first
    /// failure is reported.
    pub async fn update(&self, resource: &ManagedResource) -> Outcome<ExternalUpdate> {
        let device = match resource.as_device() {
            Ok(device) => device,
            Err(e) => return Outcome::failed(e),
        };
        let Some(id) = device.external_id() else {
            return Outcome::failed(ControllerError::GetDevice(MetalError::NotFound(
                "no external ID recorded".to_string(),
            )));
        };

        let remote = match self.client.get_device(id).await {
            Ok(remote) => remote,
            Err(e) => return Outcome::failed(ControllerError::GetDevice(e)),
        };

        let parameters = &device.spec.for_provider;
        let mut first_error = None;

        if let Some(desired) = network_type_change(parameters, &remote) {
            info!(device_id = %id, network_type = %desired, "Converting device network type");
            if let Err(e) = self.client.convert_network_type(id, desired.as_str()).await {
                warn!(device_id = %id, error = %e, "Network type conversion failed");
                first_error.get_or_insert(e);
            }
        }

        let request = attribute_changes(parameters, &remote);
        if !request.is_empty() {
            debug!(device_id = %id, ?request, "Updating device attributes");
            if let Err(e) = self.client.update_device(id, &request).await {
                warn!(device_id = %id, error = %e, "Device attribute update failed");
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Outcome::failed(ControllerError::UpdateDevice(e)),
            None => Outcome::unchanged(Ok(ExternalUpdate {
                connection_details: connection_details(&remote),
            })),
        }
    }

    /// Deletes the remote device; a device that is already gone counts as deleted
    pub async fn delete(&self, resource: &ManagedResource) -> Outcome<()> {
        let device = match resource.as_device() {
            Ok(device) => device,
            Err(e) => return Outcome::failed(e),
        };

        let mut status = device.status.clone().unwrap_or_default();
        status.set_condition(Condition::deleting());

        let Some(id) = device.external_id() else {
            debug!("No external ID recorded, nothing to delete");
            return Outcome::with_status(status, Ok(()));
        };

        match self.client.delete_device(id, false).await {
            Ok(()) => {
                info!(device_id = %id, "Device deleted");
                Outcome::with_status(status, Ok(()))
            }
            Err(e) if e.is_not_found() => Outcome::with_status(status, Ok(())),
            Err(e) => Outcome::with_status(status, Err(ControllerError::DeleteDevice(e))),
        }
    }
}

/// Network type of the remote device
///
/// While provisioning, the API-reported type lags behind the port layout, so
/// the type is derived from the ports instead.
pub fn observed_network_type(remote: &RemoteDevice) -> NetworkType {
    let resolved = || network_type::resolve(&remote.network_ports, &remote.ip_addresses);
    if is_provisioning(&remote.state) {
        return resolved();
    }
    remote
        .network_type
        .as_deref()
        .and_then(|t| t.parse().ok())
        .unwrap_or_else(resolved)
}

/// Target network type when it differs from the remote one
fn network_type_change(parameters: &DeviceParameters, remote: &RemoteDevice) -> Option<NetworkType> {
    if is_provisioning(&remote.state) {
        return None;
    }
    parameters
        .network_type
        .filter(|desired| *desired != observed_network_type(remote))
}

/// Fills unset parameters from the remote device
///
/// The network type is left unset while the device is provisioning.
pub fn late_initialize(parameters: &mut DeviceParameters, remote: &RemoteDevice, network_type: NetworkType) {
    fn string(field: &mut Option<String>, value: Option<&str>) {
        if field.is_none() {
            *field = value.filter(|v| !v.is_empty()).map(str::to_string);
        }
    }

    string(&mut parameters.hostname, Some(remote.hostname.as_str()));
    string(&mut parameters.billing_cycle, remote.billing_cycle.as_deref());
    string(&mut parameters.userdata, remote.userdata.as_deref());
    string(&mut parameters.ipxe_script_url, remote.ipxe_script_url.as_deref());
    string(&mut parameters.description, remote.description.as_deref());
    string(&mut parameters.plan, remote.plan.as_ref().map(|p| p.slug.as_str()));
    string(&mut parameters.metro, remote.metro.as_ref().map(|m| m.code.as_str()));
    string(
        &mut parameters.operating_system,
        remote.operating_system.as_ref().map(|o| o.slug.as_str()),
    );
    parameters.locked.get_or_insert(remote.locked);
    parameters.always_pxe.get_or_insert(remote.always_pxe);
    if !is_provisioning(&remote.state) {
        parameters.network_type.get_or_insert(network_type);
    }
    if parameters.tags.is_none() && !remote.tags.is_empty() {
        parameters.tags = Some(remote.tags.clone());
    }
}

/// True when no declared field differs from the remote device
///
/// Network type drift is ignored while the device is provisioning.
pub fn is_up_to_date(parameters: &DeviceParameters, remote: &RemoteDevice, network_type: NetworkType) -> bool {
    let network_type_matches = is_provisioning(&remote.state)
        || parameters.network_type.is_none_or(|desired| desired == network_type);
    network_type_matches && attribute_changes(parameters, remote).is_empty()
}

/// Update request carrying only the declared fields that differ remotely
pub fn attribute_changes(parameters: &DeviceParameters, remote: &RemoteDevice) -> DeviceUpdateRequest {
    fn changed_string(desired: &Option<String>, observed: Option<&str>) -> Option<String> {
        desired
            .as_ref()
            .filter(|d| d.as_str() != observed.unwrap_or_default())
            .cloned()
    }
    fn changed<T: PartialEq + Clone>(desired: &Option<T>, observed: &T) -> Option<T> {
        desired.as_ref().filter(|d| *d != observed).cloned()
    }
    fn changed_tags(desired: &Option<Vec<String>>, observed: &[String]) -> Option<Vec<String>> {
        let sorted = |tags: &[String]| {
            let mut tags = tags.to_vec();
            tags.sort_unstable();
            tags
        };
        desired
            .as_ref()
            .filter(|d| sorted(d) != sorted(observed))
            .cloned()
    }

    DeviceUpdateRequest {
        hostname: changed_string(&parameters.hostname, Some(remote.hostname.as_str())),
        description: changed_string(&parameters.description, remote.description.as_deref()),
        billing_cycle: changed_string(&parameters.billing_cycle, remote.billing_cycle.as_deref()),
        userdata: changed_string(&parameters.userdata, remote.userdata.as_deref()),
        locked: changed(&parameters.locked, &remote.locked),
        tags: changed_tags(&parameters.tags, &remote.tags),
        always_pxe: changed(&parameters.always_pxe, &remote.always_pxe),
        ipxe_script_url: changed_string(&parameters.ipxe_script_url, remote.ipxe_script_url.as_deref()),
    }
}

/// Create request built from the declared parameters
pub fn create_request(parameters: &DeviceParameters) -> DeviceCreateRequest {
    DeviceCreateRequest {
        hostname: parameters.hostname.clone().unwrap_or_default(),
        plan: parameters.plan.clone().unwrap_or_default(),
        metro: parameters.metro.clone(),
        facility: parameters.facility.clone().into_iter().collect(),
        operating_system: parameters.operating_system.clone().unwrap_or_default(),
        billing_cycle: parameters.billing_cycle.clone(),
        userdata: parameters.userdata.clone(),
        ipxe_script_url: parameters.ipxe_script_url.clone(),
        always_pxe: parameters.always_pxe,
        locked: parameters.locked,
        tags: parameters.tags.clone().unwrap_or_default(),
        description: parameters.description.clone(),
        hardware_reservation_id: parameters.hardware_reservation_id.clone(),
    }
}

/// SSH connection details for the device
pub fn connection_details(remote: &RemoteDevice) -> ConnectionDetails {
    let mut details = ConnectionDetails::new();
    if let Some(endpoint) = remote.public_ipv4() {
        details.insert(CONNECTION_ENDPOINT.to_string(), endpoint.as_bytes().to_vec());
        details.insert(CONNECTION_PORT.to_string(), SSH_PORT.as_bytes().to_vec());
    }
    if let Some(password) = remote.root_password.as_deref().filter(|p| !p.is_empty()) {
        details.insert(CONNECTION_USERNAME.to_string(), ROOT_USERNAME.as_bytes().to_vec());
        details.insert(CONNECTION_PASSWORD.to_string(), password.as_bytes().to_vec());
    }
    details
}

/// Formats a percentage as a decimal quantity ("100", "42.5")
fn format_percentage(percentage: f32) -> String {
    let formatted = format!("{:.2}", percentage);
    formatted
        .trim_end_matches('0')
        .trim_end_matches('.')
        .to_string()
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}
