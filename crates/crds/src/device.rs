//! Device Custom Resource Definition
//!
//! Declares an Equinix Metal bare-metal server. `spec.forProvider` holds the
//! user's desired settings; `status.atProvider` is what the controller last
//! observed at the provider.

use std::fmt;
use std::str::FromStr;

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::conditions::{set_condition, Condition};
use crate::references::{ProviderConfigReference, SecretReference};

/// DeviceSpec defines the desired state of an Equinix Metal device
#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[kube(
    group = "metal.equinix.com",
    version = "v1alpha2",
    kind = "Device",
    status = "DeviceStatus",
    printcolumn = r#"{"name":"STATE", "type":"string", "jsonPath":".status.atProvider.state"}"#,
    printcolumn = r#"{"name":"PROVISION", "type":"string", "jsonPath":".status.atProvider.provisionPercentage"}"#,
    printcolumn = r#"{"name":"IPV4", "type":"string", "jsonPath":".status.atProvider.ipv4"}"#,
    printcolumn = r#"{"name":"AGE", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct DeviceSpec {
    /// Desired device settings
    pub for_provider: DeviceParameters,

    /// ProviderConfig holding the credentials used to manage this device
    #[serde(default)]
    pub provider_config_ref: ProviderConfigReference,

    /// Secret that receives the device's connection details
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub write_connection_secret_to_ref: Option<SecretReference>,

    /// What happens to the remote device when this resource is deleted
    #[serde(default)]
    pub deletion_policy: DeletionPolicy,
}

/// Device settings accepted by the Equinix Metal API
///
/// Every field is optional. Unset fields are late-initialized from the
/// observed device so that later comparisons only flag user changes.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeviceParameters {
    /// Hostname
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,

    /// Plan slug (e.g., "c3.small.x86")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<String>,

    /// Metro code (e.g., "da")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metro: Option<String>,

    /// Facility code, used when no metro is given
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub facility: Option<String>,

    /// Operating system slug (e.g., "ubuntu_22_04")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operating_system: Option<String>,

    /// Billing cycle (hourly, daily, monthly, yearly)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub billing_cycle: Option<String>,

    /// Userdata passed to the device on first boot
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub userdata: Option<String>,

    /// iPXE script URL, required for custom_ipxe installs
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "ipxeScriptUrl")]
    #[schemars(rename = "ipxeScriptUrl")]
    pub ipxe_script_url: Option<String>,

    /// Boot from iPXE on every boot, not only the first
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "alwaysPxe")]
    #[schemars(rename = "alwaysPxe")]
    pub always_pxe: Option<bool>,

    /// Network topology of the device
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_type: Option<NetworkType>,

    /// Lock the device against deletion at the provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locked: Option<bool>,

    /// Tags applied to the device
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,

    /// Free-form description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Hardware reservation to provision onto ("next-available" or an ID)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hardware_reservation_id: Option<String>,
}

/// Device network topology
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Hash)]
pub enum NetworkType {
    #[serde(rename = "layer2-individual")]
    Layer2Individual,
    #[serde(rename = "layer2-bonded")]
    Layer2Bonded,
    #[serde(rename = "layer3")]
    Layer3,
    #[serde(rename = "hybrid")]
    Hybrid,
}

impl NetworkType {
    /// API representation of the network type
    pub fn as_str(&self) -> &'static str {
        match self {
            NetworkType::Layer2Individual => "layer2-individual",
            NetworkType::Layer2Bonded => "layer2-bonded",
            NetworkType::Layer3 => "layer3",
            NetworkType::Hybrid => "hybrid",
        }
    }
}

impl fmt::Display for NetworkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string is not a known network type
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown network type: {0}")]
pub struct UnknownNetworkType(pub String);

impl FromStr for NetworkType {
    type Err = UnknownNetworkType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "layer2-individual" => Ok(NetworkType::Layer2Individual),
            "layer2-bonded" => Ok(NetworkType::Layer2Bonded),
            "layer3" => Ok(NetworkType::Layer3),
            "hybrid" => Ok(NetworkType::Hybrid),
            other => Err(UnknownNetworkType(other.to_string())),
        }
    }
}

/// Deletion policy for the external resource
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
pub enum DeletionPolicy {
    /// Delete the device at the provider
    #[default]
    Delete,
    /// Leave the device running at the provider
    Orphan,
}

/// DeviceObservation is the provider-side state of the device
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeviceObservation {
    /// Device ID at the provider, set once on creation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// API href of the device
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,

    /// Observed hostname
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,

    /// Lifecycle state (queued, provisioning, active, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,

    /// Provisioning progress as a decimal quantity between 0 and 100
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provision_percentage: Option<String>,

    /// Observed network topology
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_type: Option<NetworkType>,

    /// Whether the device is locked
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locked: Option<bool>,

    /// Public IPv4 address
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipv4: Option<String>,

    /// Public IPv6 address
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipv6: Option<String>,

    /// Metro the device runs in
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metro: Option<String>,
}

/// DeviceStatus defines the observed state of a Device resource
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct DeviceStatus {
    /// Provider-side observation
    #[serde(default)]
    pub at_provider: DeviceObservation,

    /// Ready and Synced conditions
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

impl DeviceStatus {
    /// Sets a condition, replacing any condition of the same type
    pub fn set_condition(&mut self, condition: Condition) {
        set_condition(&mut self.conditions, condition);
    }

    /// Records the provider ID. An empty ID never overwrites a recorded one.
    pub fn set_external_id(&mut self, id: &str) {
        if !id.is_empty() {
            self.at_provider.id = Some(id.to_string());
        }
    }

    /// Compares observations and conditions, ignoring condition timestamps
    pub fn equivalent(&self, other: &Self) -> bool {
        self.at_provider == other.at_provider
            && self.conditions.len() == other.conditions.len()
            && self
                .conditions
                .iter()
                .all(|c| other.conditions.iter().any(|o| c.equivalent(o)))
    }
}

impl Device {
    /// Provider ID recorded in status, if any
    pub fn external_id(&self) -> Option<&str> {
        self.status
            .as_ref()
            .and_then(|s| s.at_provider.id.as_deref())
            .filter(|id| !id.is_empty())
    }
}
