//! Managed reconciliation of Device resources.
//!
//! One pass connects to Equinix Metal, observes the device and then creates
//! or updates it. Deletion goes through `finalize`. Every pass ends by
//! recording the `Synced` condition, and status is only written when it
//! actually changed so the watch does not retrigger on our own writes.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use crds::{Condition, DeletionPolicy, Device, DeviceParameters, DeviceStatus, SecretReference};
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use k8s_openapi::ByteString;
use kube::api::{Patch, PatchParams};
use kube::{Api, Client, Resource, ResourceExt};
use kube_runtime::controller::Action;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::connecter::{Connecter, FIELD_MANAGER};
use crate::error::{error_chain, ControllerError};
use crate::managed::{ConnectionDetails, ManagedResource};

/// Secret type used for published connection details
pub const CONNECTION_SECRET_TYPE: &str = "connection.crossplane.io/v1alpha1";

/// Requeue delay while a freshly created device is still coming up
pub const CREATE_REQUEUE: Duration = Duration::from_secs(30);

/// Writes reconciliation results back to the cluster
#[async_trait::async_trait]
pub trait DeviceWriter: Send + Sync {
    /// Persists late-initialized `spec.forProvider`
    async fn update_parameters(&self, device: &Device, parameters: &DeviceParameters) -> Result<(), ControllerError>;

    /// Persists the status subresource
    async fn update_status(&self, device: &Device, status: &DeviceStatus) -> Result<(), ControllerError>;

    /// Writes connection details into the referenced Secret
    async fn publish_connection_details(
        &self,
        device: &Device,
        secret: &SecretReference,
        details: &ConnectionDetails,
    ) -> Result<(), ControllerError>;
}

/// `DeviceWriter` backed by the Kubernetes API
#[derive(Clone)]
pub struct KubeDeviceWriter {
    client: Client,
}

impl KubeDeviceWriter {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

/// Owner reference that ties a connection Secret to its Device
fn owner_reference(device: &Device) -> Option<OwnerReference> {
    device.uid().map(|uid| OwnerReference {
        api_version: Device::api_version(&()).into_owned(),
        kind: Device::kind(&()).into_owned(),
        name: device.name_any(),
        uid,
        controller: Some(true),
        ..Default::default()
    })
}

/// Server-side apply body for the status subresource
///
/// Applied as `FIELD_MANAGER`, so observation fields that are no longer set
/// are removed from the stored status.
pub fn status_patch(status: &DeviceStatus) -> serde_json::Value {
    json!({
        "apiVersion": Device::api_version(&()),
        "kind": Device::kind(&()),
        "status": status,
    })
}

/// Builds the connection Secret for `device`
pub fn connection_secret(device: &Device, secret: &SecretReference, details: &ConnectionDetails) -> Secret {
    Secret {
        metadata: ObjectMeta {
            name: Some(secret.name.clone()),
            namespace: Some(secret.namespace.clone()),
            owner_references: owner_reference(device).map(|o| vec![o]),
            ..Default::default()
        },
        type_: Some(CONNECTION_SECRET_TYPE.to_string()),
        data: Some(
            details
                .iter()
                .map(|(k, v)| (k.clone(), ByteString(v.clone())))
                .collect::<BTreeMap<_, _>>(),
        ),
        ..Default::default()
    }
}

#[async_trait::async_trait]
impl DeviceWriter for KubeDeviceWriter {
    async fn update_parameters(&self, device: &Device, parameters: &DeviceParameters) -> Result<(), ControllerError> {
        let api: Api<Device> = Api::all(self.client.clone());
        let patch = json!({ "spec": { "forProvider": parameters } });
        api.patch(&device.name_any(), &PatchParams::default(), &Patch::Merge(&patch))
            .await
            .map_err(ControllerError::UpdateManaged)?;
        Ok(())
    }

    async fn update_status(&self, device: &Device, status: &DeviceStatus) -> Result<(), ControllerError> {
        let api: Api<Device> = Api::all(self.client.clone());
        let patch = status_patch(status);
        api.patch_status(&device.name_any(), &PatchParams::apply(FIELD_MANAGER).force(), &Patch::Apply(&patch))
            .await
            .map_err(ControllerError::UpdateStatus)?;
        Ok(())
    }

    async fn publish_connection_details(
        &self,
        device: &Device,
        secret: &SecretReference,
        details: &ConnectionDetails,
    ) -> Result<(), ControllerError> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), &secret.namespace);
        let object = connection_secret(device, secret, details);
        api.patch(&secret.name, &PatchParams::apply(FIELD_MANAGER).force(), &Patch::Apply(&object))
            .await
            .map_err(ControllerError::PublishConnectionDetails)?;
        Ok(())
    }
}

/// Drives Connect, Observe, Create, Update and Delete for Devices
#[derive(Clone)]
pub struct ManagedReconciler {
    connecter: Connecter,
    writer: Arc<dyn DeviceWriter>,
    poll_interval: Duration,
}

impl ManagedReconciler {
    pub fn new(connecter: Connecter, writer: Arc<dyn DeviceWriter>, poll_interval: Duration) -> Self {
        Self {
            connecter,
            writer,
            poll_interval,
        }
    }

    /// Converges the remote device towards `device.spec`
    pub async fn reconcile(&self, device: &Device) -> Result<Action, ControllerError> {
        let mut status = device.status.clone().unwrap_or_default();
        let result = self.sync(device, &mut status).await;
        self.finish(device, status, result).await
    }

    /// Deletes the remote device unless the deletion policy orphans it
    pub async fn finalize(&self, device: &Device) -> Result<Action, ControllerError> {
        if device.spec.deletion_policy == DeletionPolicy::Orphan {
            info!(device = %device.name_any(), "Deletion policy is Orphan, leaving remote device in place");
            return Ok(Action::await_change());
        }

        let mut status = device.status.clone().unwrap_or_default();
        let result = self.delete(device, &mut status).await.map(|()| Action::await_change());
        self.finish(device, status, result).await
    }

    async fn sync(&self, device: &Device, status: &mut DeviceStatus) -> Result<Action, ControllerError> {
        let resource = ManagedResource::from(device.clone());
        let external = self.connecter.connect(&resource).await?;

        let observed = external.observe(&resource).await;
        if let Some(new_status) = observed.status {
            *status = new_status;
        }
        let observation = observed.result?;

        if let Some(parameters) = &observation.late_initialized {
            debug!(device = %device.name_any(), "Persisting late-initialized parameters");
            self.writer.update_parameters(device, parameters).await?;
        }

        if !observation.exists {
            info!(device = %device.name_any(), "Creating device");
            let created = external.create(&resource).await;
            if let Some(new_status) = created.status {
                *status = new_status;
            }
            let creation = created.result?;
            self.publish(device, &creation.connection_details).await?;
            return Ok(Action::requeue(CREATE_REQUEUE.min(self.poll_interval)));
        }

        if observation.up_to_date {
            debug!(device = %device.name_any(), "Device is up to date");
            self.publish(device, &observation.connection_details).await?;
        } else {
            info!(device = %device.name_any(), "Updating device");
            let updated = external.update(&resource).await;
            if let Some(new_status) = updated.status {
                *status = new_status;
            }
            let update = updated.result?;
            self.publish(device, &update.connection_details).await?;
        }

        Ok(Action::requeue(self.poll_interval))
    }

    async fn delete(&self, device: &Device, status: &mut DeviceStatus) -> Result<(), ControllerError> {
        let resource = ManagedResource::from(device.clone());
        let external = self.connecter.connect(&resource).await?;

        info!(device = %device.name_any(), "Deleting device");
        let deleted = external.delete(&resource).await;
        if let Some(new_status) = deleted.status {
            *status = new_status;
        }
        deleted.result
    }

    /// Records the Synced condition and persists status if it changed
    async fn finish(
        &self,
        device: &Device,
        mut status: DeviceStatus,
        result: Result<Action, ControllerError>,
    ) -> Result<Action, ControllerError> {
        match result {
            Ok(action) => {
                status.set_condition(Condition::reconcile_success());
                self.persist_status(device, &status).await?;
                Ok(action)
            }
            Err(error) => {
                status.set_condition(Condition::reconcile_error(error_chain(&error)));
                if let Err(persist_error) = self.persist_status(device, &status).await {
                    warn!(device = %device.name_any(), error = %error_chain(&persist_error), "Failed to record reconcile error");
                }
                Err(error)
            }
        }
    }

    async fn persist_status(&self, device: &Device, status: &DeviceStatus) -> Result<(), ControllerError> {
        let unchanged = device
            .status
            .as_ref()
            .is_some_and(|current| current.equivalent(status));
        if unchanged {
            return Ok(());
        }
        self.writer.update_status(device, status).await
    }

    async fn publish(&self, device: &Device, details: &ConnectionDetails) -> Result<(), ControllerError> {
        let Some(secret) = &device.spec.write_connection_secret_to_ref else {
            return Ok(());
        };
        if details.is_empty() {
            return Ok(());
        }
        self.writer.publish_connection_details(device, secret, details).await
    }
}
