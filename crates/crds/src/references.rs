//! Object references used by the Metal CRDs
//!
//! Managed resources point at a cluster-scoped `ProviderConfig` by name and,
//! optionally, at a namespaced Secret that receives connection details.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Name of the `ProviderConfig` used when a resource does not name one
pub const DEFAULT_PROVIDER_CONFIG: &str = "default";

/// Reference to a cluster-scoped `ProviderConfig`
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfigReference {
    /// Name of the referenced ProviderConfig
    pub name: String,
}

impl Default for ProviderConfigReference {
    fn default() -> Self {
        Self {
            name: DEFAULT_PROVIDER_CONFIG.to_string(),
        }
    }
}

/// Namespaced reference to a Kubernetes Secret
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SecretReference {
    /// Namespace of the Secret
    pub namespace: String,

    /// Name of the Secret
    pub name: String,
}

/// Selects a single key of a Kubernetes Secret
///
/// An empty `key` is rejected by the credentials extraction with
/// "cannot extract from secret key when none specified".
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SecretKeySelector {
    /// Namespace of the Secret
    pub namespace: String,

    /// Name of the Secret
    pub name: String,

    /// Key within the Secret data
    #[serde(default)]
    pub key: String,
}

impl SecretKeySelector {
    /// The Secret this selector points into
    pub fn secret_ref(&self) -> SecretReference {
        SecretReference {
            namespace: self.namespace.clone(),
            name: self.name.clone(),
        }
    }
}

/// Reference to any Kubernetes object by API version, kind and name
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TypedReference {
    /// API version of the referent (e.g., "metal.equinix.com/v1alpha2")
    pub api_version: String,

    /// Kind of the referent (e.g., "Device")
    pub kind: String,

    /// Name of the referent
    pub name: String,

    /// UID of the referent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
}
