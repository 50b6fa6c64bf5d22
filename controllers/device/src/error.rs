//! Controller-specific error types.
//!
//! Remote failures are wrapped with the stage that produced them, and the
//! original error stays reachable through `std::error::Error::source`.

use kube::Error as KubeError;
use metal_client::MetalError;
use thiserror::Error;

/// Errors that can occur in the Device controller.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// The managed resource handed to the reconciler is not a Device
    #[error("managed resource is not a Device custom resource")]
    NotDevice,

    /// Credentials for the referenced ProviderConfig could not be resolved
    #[error("cannot get ProviderConfig Secret")]
    GetProviderConfigSecret(#[source] ProviderConfigError),

    /// The client factory rejected the credentials
    #[error("cannot create new Equinix Metal client")]
    NewClient(#[source] MetalError),

    #[error("cannot get device")]
    GetDevice(#[source] MetalError),

    #[error("cannot create device")]
    CreateDevice(#[source] MetalError),

    #[error("cannot update device")]
    UpdateDevice(#[source] MetalError),

    #[error("cannot delete device")]
    DeleteDevice(#[source] MetalError),

    /// Writing late-initialized parameters back to the Device failed
    #[error("cannot update managed resource")]
    UpdateManaged(#[source] KubeError),

    /// Writing the Device status failed
    #[error("cannot update managed resource status")]
    UpdateStatus(#[source] KubeError),

    /// Writing the connection Secret failed
    #[error("cannot publish connection details")]
    PublishConnectionDetails(#[source] KubeError),

    /// Kubernetes API error
    #[error("Kubernetes error: {0}")]
    Kube(#[from] KubeError),

    /// Finalizer bookkeeping failed
    #[error("finalizer error")]
    FinalizerError(#[source] Box<kube_runtime::finalizer::Error<ControllerError>>),

    /// Watch error
    #[error("Watch error: {0}")]
    Watch(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Failures while resolving the ProviderConfig a resource points at
#[derive(Debug, Error)]
pub enum ProviderConfigError {
    #[error("cannot apply ProviderConfigUsage")]
    TrackUsage(#[source] CredentialStoreError),

    #[error("cannot get ProviderConfig")]
    GetProviderConfig(#[source] CredentialStoreError),

    #[error("cannot get credentials")]
    GetCredentials(#[source] CredentialsError),
}

/// Failures while extracting credentials from a ProviderConfig
#[derive(Debug, Error)]
pub enum CredentialsError {
    #[error("cannot extract from secret key when none specified")]
    SecretKeyNotSpecified,

    #[error("cannot get credentials secret")]
    GetCredentialsSecret(#[source] CredentialStoreError),

    #[error("secret {namespace}/{name} has no key {key}")]
    SecretKeyMissing {
        namespace: String,
        name: String,
        key: String,
    },

    #[error("unsupported credentials source: {0}")]
    UnsupportedCredentialsSource(String),
}

/// Failures reading or writing provider objects in the cluster
#[derive(Debug, Error)]
pub enum CredentialStoreError {
    #[error("cannot get object")]
    Get(#[source] KubeError),

    #[error("cannot apply object")]
    Apply(#[source] KubeError),
}

/// Renders an error and all of its sources as `outer: inner: root`
pub fn error_chain(error: &(dyn std::error::Error + 'static)) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
