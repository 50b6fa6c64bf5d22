//! Equinix Metal API models
//!
//! These models match the Equinix Metal v1 REST API payloads.
//! Only the fields the device controller reads or writes are modelled.

use serde::{Deserialize, Serialize};

use crate::error::MetalError;

/// Port type of a physical network port
pub const PORT_TYPE_NETWORK: &str = "NetworkPort";
/// Port type of the bond port
pub const PORT_TYPE_BOND: &str = "NetworkBondPort";

/// Network type strings accepted by the API
pub const NETWORK_TYPE_LAYER2_INDIVIDUAL: &str = "layer2-individual";
pub const NETWORK_TYPE_LAYER2_BONDED: &str = "layer2-bonded";
pub const NETWORK_TYPE_LAYER3: &str = "layer3";
pub const NETWORK_TYPE_HYBRID: &str = "hybrid";

/// Device model matching the Metal `Device` schema
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Device {
    pub id: String,
    #[serde(default)]
    pub href: String,
    #[serde(default)]
    pub hostname: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub provisioning_percentage: Option<f32>,
    #[serde(default)]
    pub always_pxe: bool,
    #[serde(default)]
    pub ipxe_script_url: Option<String>,
    #[serde(default)]
    pub userdata: Option<String>,
    #[serde(default)]
    pub billing_cycle: Option<String>,
    #[serde(default)]
    pub locked: bool,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Network type as reported by the API, absent on older devices
    #[serde(default)]
    pub network_type: Option<String>,
    #[serde(default)]
    pub network_ports: Vec<Port>,
    #[serde(default)]
    pub ip_addresses: Vec<IpAddressAssignment>,
    /// Only populated shortly after provisioning
    #[serde(default)]
    pub root_password: Option<String>,
    #[serde(default)]
    pub plan: Option<NestedPlan>,
    #[serde(default)]
    pub metro: Option<NestedMetro>,
    #[serde(default)]
    pub facility: Option<NestedFacility>,
    #[serde(default)]
    pub operating_system: Option<NestedOperatingSystem>,
}

impl Device {
    /// Finds a network port by name (e.g., "bond0", "eth1")
    pub fn port_by_name(&self, name: &str) -> Option<&Port> {
        self.network_ports.iter().find(|p| p.name == name)
    }

    /// First public IPv4 address assigned to the device
    pub fn public_ipv4(&self) -> Option<&str> {
        self.ip_addresses
            .iter()
            .find(|ip| ip.public && ip.address_family == 4)
            .map(|ip| ip.address.as_str())
    }

    /// First public IPv6 address assigned to the device
    pub fn public_ipv6(&self) -> Option<&str> {
        self.ip_addresses
            .iter()
            .find(|ip| ip.public && ip.address_family == 6)
            .map(|ip| ip.address.as_str())
    }
}

/// Network port attached to a device
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Port {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub type_: String,
    #[serde(default)]
    pub data: PortData,
    #[serde(default)]
    pub bond: Option<BondData>,
    #[serde(default)]
    pub network_type: Option<String>,
}

impl Port {
    pub fn is_network_port(&self) -> bool {
        self.type_ == PORT_TYPE_NETWORK
    }

    pub fn is_bond_port(&self) -> bool {
        self.type_ == PORT_TYPE_BOND
    }

    pub fn is_bonded(&self) -> bool {
        self.data.bonded
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PortData {
    #[serde(default)]
    pub bonded: bool,
    #[serde(default)]
    pub mac: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BondData {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// IP address assigned to a device
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct IpAddressAssignment {
    #[serde(default)]
    pub id: String,
    pub address: String,
    #[serde(default)]
    pub address_family: u8, // 4 or 6
    #[serde(default)]
    pub public: bool,
    #[serde(default)]
    pub management: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NestedPlan {
    #[serde(default)]
    pub slug: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NestedMetro {
    #[serde(default)]
    pub code: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NestedFacility {
    #[serde(default)]
    pub code: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NestedOperatingSystem {
    #[serde(default)]
    pub slug: String,
}

/// Request body for `POST /projects/{id}/devices`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DeviceCreateRequest {
    pub hostname: String,
    pub plan: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metro: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub facility: Vec<String>,
    pub operating_system: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub billing_cycle: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub userdata: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ipxe_script_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub always_pxe: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locked: Option<bool>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hardware_reservation_id: Option<String>,
}

/// Request body for `PUT /devices/{id}`
///
/// Only the populated fields are sent.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DeviceUpdateRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub billing_cycle: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub userdata: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locked: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub always_pxe: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ipxe_script_url: Option<String>,
}

impl DeviceUpdateRequest {
    /// True when no field would be sent
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Credentials document stored in the ProviderConfig Secret
///
/// ```json
/// {"apiKey": "...", "projectID": "..."}
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Credentials {
    #[serde(rename = "apiKey")]
    pub api_key: String,
    #[serde(rename = "projectID")]
    pub project_id: String,
}

impl Credentials {
    /// Parses the credentials JSON document
    pub fn from_json(data: &[u8]) -> Result<Self, MetalError> {
        let credentials: Credentials = serde_json::from_slice(data)
            .map_err(|e| MetalError::InvalidCredentials(format!("malformed credentials: {}", e)))?;
        if credentials.api_key.is_empty() {
            return Err(MetalError::InvalidCredentials("apiKey is empty".to_string()));
        }
        Ok(credentials)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_deserializes_ports_and_addresses() {
        let device: Device = serde_json::from_value(serde_json::json!({
            "id": "dev-1",
            "hostname": "edge-01",
            "state": "active",
            "network_ports": [
                {"id": "p0", "name": "bond0", "type": "NetworkBondPort", "data": {"bonded": true}},
                {"id": "p1", "name": "eth0", "type": "NetworkPort", "data": {"bonded": true},
                 "bond": {"id": "p0", "name": "bond0"}}
            ],
            "ip_addresses": [
                {"address": "10.0.0.2", "address_family": 4, "public": false, "management": true},
                {"address": "147.75.1.2", "address_family": 4, "public": true, "management": true},
                {"address": "2604::2", "address_family": 6, "public": true, "management": true}
            ]
        }))
        .unwrap();

        assert_eq!(device.port_by_name("eth0").unwrap().bond.as_ref().unwrap().name.as_deref(), Some("bond0"));
        assert!(device.port_by_name("bond0").unwrap().is_bond_port());
        assert_eq!(device.public_ipv4(), Some("147.75.1.2"));
        assert_eq!(device.public_ipv6(), Some("2604::2"));
        assert!(device.root_password.is_none());
    }

    #[test]
    fn test_update_request_omits_unset_fields() {
        let request = DeviceUpdateRequest {
            hostname: Some("edge-02".to_string()),
            ..Default::default()
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json, serde_json::json!({"hostname": "edge-02"}));
        assert!(!request.is_empty());
        assert!(DeviceUpdateRequest::default().is_empty());
    }

    #[test]
    fn test_credentials_from_json() {
        let creds = Credentials::from_json(br#"{"apiKey":"secret","projectID":"proj-1"}"#).unwrap();
        assert_eq!(creds.api_key, "secret");
        assert_eq!(creds.project_id, "proj-1");
    }

    #[test]
    fn test_credentials_reject_garbage() {
        assert!(matches!(
            Credentials::from_json(b"not json"),
            Err(MetalError::InvalidCredentials(_))
        ));
        assert!(matches!(
            Credentials::from_json(br#"{"apiKey":"","projectID":"p"}"#),
            Err(MetalError::InvalidCredentials(_))
        ));
    }
}
