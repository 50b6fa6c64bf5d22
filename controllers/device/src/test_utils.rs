//! Test utilities for unit testing the connecter and reconcilers
//!
//! Builders for Device resources and remote device fixtures, plus in-memory
//! stand-ins for the cluster seams.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use crds::{
    CredentialsSource, Device, DeviceParameters, DeviceSpec, DeviceStatus, NetworkType, ProviderConfig,
    ProviderConfigReference, ProviderConfigSpec, ProviderCredentials, SecretKeySelector, SecretReference,
    TypedReference,
};
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::ByteString;
use metal_client::{
    Device as RemoteDevice, IpAddressAssignment, MetalClientTrait, MetalError, MockMetalClient, NestedMetro,
    NestedOperatingSystem, NestedPlan, Port, PortData, PORT_TYPE_BOND, PORT_TYPE_NETWORK,
};

use crate::connecter::{ClientFactory, Connecter, CredentialStore, UsageTracker};
use crate::error::{ControllerError, CredentialStoreError};
use crate::managed::ConnectionDetails;
use crate::reconciler::DeviceWriter;

pub const TEST_PROJECT: &str = "project-1";
pub const TEST_DEVICE_ID: &str = "device-abc";
pub const TEST_PUBLIC_IPV4: &str = "147.75.1.2";
pub const CREDENTIALS_NAMESPACE: &str = "crossplane-system";
pub const CREDENTIALS_SECRET: &str = "metal-creds";
pub const CREDENTIALS_KEY: &str = "credentials";
pub const CREDENTIALS_JSON: &str = r#"{"apiKey":"token-123","projectID":"project-1"}"#;

/// Root error used wherever a fake must fail
pub fn boom() -> kube::Error {
    kube::Error::Service("boom".into())
}

/// Helper to create a test Device with declared parameters and no status
pub fn create_test_device(name: &str) -> Device {
    let mut device = Device::new(
        name,
        DeviceSpec {
            for_provider: DeviceParameters {
                hostname: Some("edge-01".to_string()),
                plan: Some("c3.small.x86".to_string()),
                metro: Some("da".to_string()),
                operating_system: Some("ubuntu_22_04".to_string()),
                billing_cycle: Some("hourly".to_string()),
                ..Default::default()
            },
            provider_config_ref: ProviderConfigReference::default(),
            write_connection_secret_to_ref: None,
            deletion_policy: Default::default(),
        },
    );
    device.metadata.uid = Some(format!("uid-{}", name));
    device
}

/// Helper to create a test Device that already records a provider ID
pub fn create_test_device_with_id(name: &str, id: &str) -> Device {
    let mut device = create_test_device(name);
    let mut status = DeviceStatus::default();
    status.set_external_id(id);
    device.status = Some(status);
    device
}

/// Points the device's connection details at a Secret
pub fn with_connection_secret(mut device: Device) -> Device {
    device.spec.write_connection_secret_to_ref = Some(SecretReference {
        namespace: "default".to_string(),
        name: "edge-01-conn".to_string(),
    });
    device
}

pub fn network_port(id: &str, name: &str, bonded: bool) -> Port {
    Port {
        id: id.to_string(),
        name: name.to_string(),
        type_: PORT_TYPE_NETWORK.to_string(),
        data: PortData { bonded, mac: None },
        ..Default::default()
    }
}

pub fn bond_port(network_type: &str) -> Port {
    Port {
        id: "port-bond0".to_string(),
        name: "bond0".to_string(),
        type_: PORT_TYPE_BOND.to_string(),
        data: PortData { bonded: true, mac: None },
        bond: None,
        network_type: Some(network_type.to_string()),
    }
}

pub fn public_ipv4(management: bool) -> IpAddressAssignment {
    IpAddressAssignment {
        id: "ip-1".to_string(),
        address: TEST_PUBLIC_IPV4.to_string(),
        address_family: 4,
        public: true,
        management,
    }
}

/// Active layer3 device matching `create_test_device` after late init
pub fn remote_device(id: &str, state: &str) -> RemoteDevice {
    RemoteDevice {
        id: id.to_string(),
        href: format!("/metal/v1/devices/{}", id),
        hostname: "edge-01".to_string(),
        state: state.to_string(),
        provisioning_percentage: Some(100.0),
        billing_cycle: Some("hourly".to_string()),
        network_type: Some("layer3".to_string()),
        network_ports: vec![
            bond_port("layer3"),
            network_port("port-eth0", "eth0", true),
            network_port("port-eth1", "eth1", true),
        ],
        ip_addresses: vec![public_ipv4(true)],
        plan: Some(NestedPlan {
            slug: "c3.small.x86".to_string(),
        }),
        metro: Some(NestedMetro { code: "da".to_string() }),
        operating_system: Some(NestedOperatingSystem {
            slug: "ubuntu_22_04".to_string(),
        }),
        ..Default::default()
    }
}

/// Layer2-bonded device: all ports bonded, no management address
pub fn remote_device_l2_bonded(id: &str) -> RemoteDevice {
    RemoteDevice {
        network_type: Some("layer2-bonded".to_string()),
        network_ports: vec![
            bond_port("layer2-bonded"),
            network_port("port-eth0", "eth0", true),
            network_port("port-eth1", "eth1", true),
        ],
        ip_addresses: Vec::new(),
        ..remote_device(id, "active")
    }
}

/// Parameters a `create_test_device` ends up with once late-initialized
/// against `remote_device`
pub fn late_initialized_parameters() -> DeviceParameters {
    DeviceParameters {
        hostname: Some("edge-01".to_string()),
        plan: Some("c3.small.x86".to_string()),
        metro: Some("da".to_string()),
        operating_system: Some("ubuntu_22_04".to_string()),
        billing_cycle: Some("hourly".to_string()),
        locked: Some(false),
        always_pxe: Some(false),
        network_type: Some(NetworkType::Layer3),
        ..Default::default()
    }
}

/// Device whose spec already holds every late-initialized field
pub fn create_settled_device(name: &str, id: &str) -> Device {
    let mut device = create_test_device_with_id(name, id);
    device.spec.for_provider = late_initialized_parameters();
    device
}

pub fn provider_config(name: &str, secret_ref: Option<SecretKeySelector>) -> ProviderConfig {
    ProviderConfig::new(
        name,
        ProviderConfigSpec {
            credentials: ProviderCredentials {
                source: CredentialsSource::Secret,
                secret_ref,
            },
        },
    )
}

pub fn credentials_selector() -> SecretKeySelector {
    SecretKeySelector {
        namespace: CREDENTIALS_NAMESPACE.to_string(),
        name: CREDENTIALS_SECRET.to_string(),
        key: CREDENTIALS_KEY.to_string(),
    }
}

pub fn credentials_secret() -> Secret {
    Secret {
        metadata: ObjectMeta {
            name: Some(CREDENTIALS_SECRET.to_string()),
            namespace: Some(CREDENTIALS_NAMESPACE.to_string()),
            ..Default::default()
        },
        data: Some(BTreeMap::from([(
            CREDENTIALS_KEY.to_string(),
            ByteString(CREDENTIALS_JSON.as_bytes().to_vec()),
        )])),
        ..Default::default()
    }
}

/// In-memory `CredentialStore`
#[derive(Default)]
pub struct FakeCredentialStore {
    pub provider_configs: BTreeMap<String, ProviderConfig>,
    pub secrets: BTreeMap<(String, String), Secret>,
    pub fail_provider_config: bool,
    pub fail_secret: bool,
}

impl FakeCredentialStore {
    /// Store holding the `default` ProviderConfig and its credentials Secret
    pub fn with_default_credentials() -> Self {
        let mut store = Self::default();
        store.provider_configs.insert(
            "default".to_string(),
            provider_config("default", Some(credentials_selector())),
        );
        store.secrets.insert(
            (CREDENTIALS_NAMESPACE.to_string(), CREDENTIALS_SECRET.to_string()),
            credentials_secret(),
        );
        store
    }
}

#[async_trait::async_trait]
impl CredentialStore for FakeCredentialStore {
    async fn get_provider_config(&self, name: &str) -> Result<ProviderConfig, CredentialStoreError> {
        if self.fail_provider_config {
            return Err(CredentialStoreError::Get(boom()));
        }
        self.provider_configs
            .get(name)
            .cloned()
            .ok_or_else(|| CredentialStoreError::Get(boom()))
    }

    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Secret, CredentialStoreError> {
        if self.fail_secret {
            return Err(CredentialStoreError::Get(boom()));
        }
        self.secrets
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| CredentialStoreError::Get(boom()))
    }
}

/// `UsageTracker` that records every tracked reference
#[derive(Default)]
pub struct FakeUsageTracker {
    pub fail: bool,
    pub tracked: Mutex<Vec<(String, TypedReference)>>,
}

#[async_trait::async_trait]
impl UsageTracker for FakeUsageTracker {
    async fn track(
        &self,
        provider_config: &ProviderConfigReference,
        resource: &TypedReference,
    ) -> Result<(), CredentialStoreError> {
        if self.fail {
            return Err(CredentialStoreError::Apply(boom()));
        }
        self.tracked
            .lock()
            .unwrap()
            .push((provider_config.name.clone(), resource.clone()));
        Ok(())
    }
}

/// `ClientFactory` handing out a shared `MockMetalClient`
pub struct FakeClientFactory {
    pub client: MockMetalClient,
    pub fail: bool,
    pub received: Mutex<Vec<Vec<u8>>>,
}

impl FakeClientFactory {
    pub fn new(client: MockMetalClient) -> Self {
        Self {
            client,
            fail: false,
            received: Mutex::new(Vec::new()),
        }
    }
}

impl ClientFactory for FakeClientFactory {
    fn new_client(&self, credentials: &[u8]) -> Result<Arc<dyn MetalClientTrait>, MetalError> {
        self.received.lock().unwrap().push(credentials.to_vec());
        if self.fail {
            return Err(MetalError::InvalidCredentials("boom".to_string()));
        }
        Ok(Arc::new(self.client.clone()))
    }
}

/// Connecter wired to the default fakes around `client`
pub fn create_test_connecter(client: MockMetalClient) -> Connecter {
    Connecter::new(
        Arc::new(FakeCredentialStore::with_default_credentials()),
        Arc::new(FakeUsageTracker::default()),
        Arc::new(FakeClientFactory::new(client)),
    )
}

/// A write the reconciler made to the cluster
#[derive(Debug, Clone)]
pub enum WriterCall {
    Parameters(DeviceParameters),
    Status(DeviceStatus),
    ConnectionDetails(SecretReference, ConnectionDetails),
}

/// `DeviceWriter` that records writes instead of sending them
#[derive(Default)]
pub struct RecordingDeviceWriter {
    pub fail_status: bool,
    pub calls: Mutex<Vec<WriterCall>>,
}

impl RecordingDeviceWriter {
    pub fn calls(&self) -> Vec<WriterCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Last status written, if any
    pub fn last_status(&self) -> Option<DeviceStatus> {
        self.calls().into_iter().rev().find_map(|call| match call {
            WriterCall::Status(status) => Some(status),
            _ => None,
        })
    }

    pub fn status_writes(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, WriterCall::Status(_)))
            .count()
    }
}

#[async_trait::async_trait]
impl DeviceWriter for RecordingDeviceWriter {
    async fn update_parameters(&self, _device: &Device, parameters: &DeviceParameters) -> Result<(), ControllerError> {
        self.calls
            .lock()
            .unwrap()
            .push(WriterCall::Parameters(parameters.clone()));
        Ok(())
    }

    async fn update_status(&self, _device: &Device, status: &DeviceStatus) -> Result<(), ControllerError> {
        if self.fail_status {
            return Err(ControllerError::UpdateStatus(boom()));
        }
        self.calls.lock().unwrap().push(WriterCall::Status(status.clone()));
        Ok(())
    }

    async fn publish_connection_details(
        &self,
        _device: &Device,
        secret: &SecretReference,
        details: &ConnectionDetails,
    ) -> Result<(), ControllerError> {
        self.calls
            .lock()
            .unwrap()
            .push(WriterCall::ConnectionDetails(secret.clone(), details.clone()));
        Ok(())
    }
}
