//! Credential resolution and client construction.
//!
//! `Connecter::connect` turns a managed resource into an `ExternalClient`:
//! 1. records that the resource uses its ProviderConfig
//! 2. reads the ProviderConfig and the credentials Secret it points at
//! 3. hands the credentials to a `ClientFactory`
//!
//! The cluster reads and writes sit behind `CredentialStore` and
//! `UsageTracker` so tests can run without an API server.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use crds::{
    CredentialsSource, Device, ProviderConfig, ProviderConfigReference, ProviderConfigUsage,
    ProviderConfigUsageSpec, ProviderCredentials, TypedReference,
};
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::api::{Patch, PatchParams};
use kube::{Api, Client, Resource, ResourceExt};
use metal_client::{Credentials, MetalClient, MetalClientTrait, MetalError};
use tracing::{debug, warn};

use crate::error::{ControllerError, CredentialStoreError, CredentialsError, ProviderConfigError};
use crate::external::ExternalClient;
use crate::managed::ManagedResource;

/// Field manager used for server-side apply
pub const FIELD_MANAGER: &str = "device-controller";

/// Label carrying the ProviderConfig name on usage objects
pub const PROVIDER_CONFIG_LABEL: &str = "metal.equinix.com/provider-config";

/// Reads provider objects from the cluster
#[async_trait::async_trait]
pub trait CredentialStore: Send + Sync {
    async fn get_provider_config(&self, name: &str) -> Result<ProviderConfig, CredentialStoreError>;
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Secret, CredentialStoreError>;
}

/// Records which managed resources use a ProviderConfig
#[async_trait::async_trait]
pub trait UsageTracker: Send + Sync {
    async fn track(
        &self,
        provider_config: &ProviderConfigReference,
        resource: &TypedReference,
    ) -> Result<(), CredentialStoreError>;
}

/// Builds a Metal client from a raw credentials document
pub trait ClientFactory: Send + Sync {
    fn new_client(&self, credentials: &[u8]) -> Result<Arc<dyn MetalClientTrait>, MetalError>;
}

/// `CredentialStore` backed by the Kubernetes API
#[derive(Clone)]
pub struct KubeCredentialStore {
    client: Client,
}

impl KubeCredentialStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl CredentialStore for KubeCredentialStore {
    async fn get_provider_config(&self, name: &str) -> Result<ProviderConfig, CredentialStoreError> {
        let api: Api<ProviderConfig> = Api::all(self.client.clone());
        api.get(name).await.map_err(CredentialStoreError::Get)
    }

    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Secret, CredentialStoreError> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        api.get(name).await.map_err(CredentialStoreError::Get)
    }
}

/// `UsageTracker` that server-side applies a ProviderConfigUsage per resource
#[derive(Clone)]
pub struct KubeUsageTracker {
    client: Client,
}

impl KubeUsageTracker {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

/// Usage objects are named after the resource UID, or kind and name without one
fn usage_name(resource: &TypedReference) -> String {
    match &resource.uid {
        Some(uid) if !uid.is_empty() => uid.clone(),
        _ => format!("{}-{}", resource.kind.to_lowercase(), resource.name),
    }
}

/// Builds the ProviderConfigUsage recording that `resource` uses `provider_config`
pub fn usage_for(
    provider_config: &ProviderConfigReference,
    resource: &TypedReference,
) -> ProviderConfigUsage {
    let mut usage = ProviderConfigUsage::new(
        &usage_name(resource),
        ProviderConfigUsageSpec {
            provider_config_ref: provider_config.clone(),
            resource_ref: resource.clone(),
        },
    );
    usage.metadata.labels = Some(BTreeMap::from([(
        PROVIDER_CONFIG_LABEL.to_string(),
        provider_config.name.clone(),
    )]));
    if let Some(uid) = &resource.uid {
        usage.metadata.owner_references = Some(vec![OwnerReference {
            api_version: resource.api_version.clone(),
            kind: resource.kind.clone(),
            name: resource.name.clone(),
            uid: uid.clone(),
            ..Default::default()
        }]);
    }
    usage
}

#[async_trait::async_trait]
impl UsageTracker for KubeUsageTracker {
    async fn track(
        &self,
        provider_config: &ProviderConfigReference,
        resource: &TypedReference,
    ) -> Result<(), CredentialStoreError> {
        let usage = usage_for(provider_config, resource);
        let name = usage.name_any();
        let api: Api<ProviderConfigUsage> = Api::all(self.client.clone());
        api.patch(&name, &PatchParams::apply(FIELD_MANAGER).force(), &Patch::Apply(&usage))
            .await
            .map_err(CredentialStoreError::Apply)?;
        debug!(usage = %name, provider_config = %provider_config.name, "Tracked ProviderConfig usage");
        Ok(())
    }
}

/// Default factory: parses `{"apiKey", "projectID"}` and builds a `MetalClient`
#[derive(Debug, Clone)]
pub struct MetalClientFactory {
    base_url: String,
    timeout: Duration,
}

impl MetalClientFactory {
    pub fn new(base_url: String, timeout: Duration) -> Self {
        Self { base_url, timeout }
    }
}

impl ClientFactory for MetalClientFactory {
    fn new_client(&self, credentials: &[u8]) -> Result<Arc<dyn MetalClientTrait>, MetalError> {
        let credentials = Credentials::from_json(credentials)?;
        let client = MetalClient::from_credentials(self.base_url.clone(), credentials, self.timeout)?;
        Ok(Arc::new(client))
    }
}

/// Typed reference to a Device, used for usage tracking
pub fn device_reference(device: &Device) -> TypedReference {
    TypedReference {
        api_version: Device::api_version(&()).into_owned(),
        kind: Device::kind(&()).into_owned(),
        name: device.name_any(),
        uid: device.uid(),
    }
}

/// Reads the credentials document the ProviderConfig points at
pub async fn extract_credentials(
    store: &dyn CredentialStore,
    credentials: &ProviderCredentials,
) -> Result<Vec<u8>, CredentialsError> {
    match credentials.source {
        CredentialsSource::Secret => {
            let selector = credentials
                .secret_ref
                .as_ref()
                .filter(|s| !s.key.is_empty())
                .ok_or(CredentialsError::SecretKeyNotSpecified)?;
            let secret = store
                .get_secret(&selector.namespace, &selector.name)
                .await
                .map_err(CredentialsError::GetCredentialsSecret)?;
            secret
                .data
                .and_then(|mut data| data.remove(&selector.key))
                .map(|bytes| bytes.0)
                .ok_or_else(|| CredentialsError::SecretKeyMissing {
                    namespace: selector.namespace.clone(),
                    name: selector.name.clone(),
                    key: selector.key.clone(),
                })
        }
        other => Err(CredentialsError::UnsupportedCredentialsSource(format!("{:?}", other))),
    }
}

/// Produces an `ExternalClient` bound to a resource's credentials
#[derive(Clone)]
pub struct Connecter {
    store: Arc<dyn CredentialStore>,
    usage: Arc<dyn UsageTracker>,
    factory: Arc<dyn ClientFactory>,
}

impl Connecter {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        usage: Arc<dyn UsageTracker>,
        factory: Arc<dyn ClientFactory>,
    ) -> Self {
        Self {
            store,
            usage,
            factory,
        }
    }

    /// Resolves credentials for `resource` and builds its external client
    pub async fn connect(&self, resource: &ManagedResource) -> Result<ExternalClient, ControllerError> {
        let device = match resource.as_device() {
            Ok(device) => device,
            Err(e) => {
                let (api_version, kind) = resource.type_meta();
                warn!(%api_version, %kind, "Refusing to connect a resource that is not a Device");
                return Err(e);
            }
        };
        let provider_config_ref = &device.spec.provider_config_ref;

        self.usage
            .track(provider_config_ref, &device_reference(device))
            .await
            .map_err(|e| ControllerError::GetProviderConfigSecret(ProviderConfigError::TrackUsage(e)))?;

        let provider_config = self
            .store
            .get_provider_config(&provider_config_ref.name)
            .await
            .map_err(|e| ControllerError::GetProviderConfigSecret(ProviderConfigError::GetProviderConfig(e)))?;

        let credentials = extract_credentials(self.store.as_ref(), &provider_config.spec.credentials)
            .await
            .map_err(|e| ControllerError::GetProviderConfigSecret(ProviderConfigError::GetCredentials(e)))?;

        let client = self
            .factory
            .new_client(&credentials)
            .map_err(ControllerError::NewClient)?;

        debug!(device = %device.name_any(), provider_config = %provider_config_ref.name, "Connected to Equinix Metal");
        Ok(ExternalClient::new(client))
    }
}
