//! ProviderConfig and ProviderConfigUsage CRDs
//!
//! A ProviderConfig tells the controller where to find Equinix Metal
//! credentials. A ProviderConfigUsage records that a managed resource depends
//! on a ProviderConfig, so the config is not removed while still in use.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::references::{ProviderConfigReference, SecretKeySelector, TypedReference};

/// ProviderConfigSpec configures how the controller authenticates
#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[kube(
    group = "metal.equinix.com",
    version = "v1beta1",
    kind = "ProviderConfig",
    status = "ProviderConfigStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfigSpec {
    /// Where credentials come from
    pub credentials: ProviderCredentials,
}

/// Credentials used to reach the Equinix Metal API
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProviderCredentials {
    /// Credentials source
    pub source: CredentialsSource,

    /// Secret key holding the credentials JSON when `source` is `Secret`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_ref: Option<SecretKeySelector>,
}

/// Supported credentials sources
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub enum CredentialsSource {
    /// Read credentials from a Kubernetes Secret
    Secret,
    /// No credentials
    None,
}

/// ProviderConfigStatus reports how many resources use the config
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfigStatus {
    /// Number of managed resources using this config
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub users: Option<i64>,
}

/// ProviderConfigUsageSpec ties a managed resource to the config it uses
#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[kube(
    group = "metal.equinix.com",
    version = "v1beta1",
    kind = "ProviderConfigUsage",
    printcolumn = r#"{"name":"CONFIG-NAME", "type":"string", "jsonPath":".spec.providerConfigRef.name"}"#,
    printcolumn = r#"{"name":"RESOURCE-KIND", "type":"string", "jsonPath":".spec.resourceRef.kind"}"#,
    printcolumn = r#"{"name":"RESOURCE-NAME", "type":"string", "jsonPath":".spec.resourceRef.name"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfigUsageSpec {
    /// The ProviderConfig in use
    pub provider_config_ref: ProviderConfigReference,

    /// The managed resource using it
    pub resource_ref: TypedReference,
}
