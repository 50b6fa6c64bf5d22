//! Main controller implementation.
//!
//! Wires the Kubernetes client, the credential seams and the Metal client
//! factory into a `ManagedReconciler` and runs the Device watcher.

use std::sync::Arc;

use crds::Device;
use kube::{Api, Client};
use tokio::task::JoinHandle;
use tracing::info;

use crate::config::Config;
use crate::connecter::{Connecter, KubeCredentialStore, KubeUsageTracker, MetalClientFactory};
use crate::error::ControllerError;
use crate::reconciler::{KubeDeviceWriter, ManagedReconciler};
use crate::watcher::{watch_devices, Context};

/// Main controller for Equinix Metal devices.
#[derive(Debug)]
pub struct Controller {
    device_watcher: JoinHandle<Result<(), ControllerError>>,
}

impl Controller {
    /// Creates a new controller instance and starts watching Devices.
    pub async fn new(config: Config) -> Result<Self, ControllerError> {
        info!("Initializing Device Controller");

        let kube_client = Client::try_default().await?;

        let connecter = Connecter::new(
            Arc::new(KubeCredentialStore::new(kube_client.clone())),
            Arc::new(KubeUsageTracker::new(kube_client.clone())),
            Arc::new(MetalClientFactory::new(config.metal_api_url, config.request_timeout)),
        );
        let reconciler = ManagedReconciler::new(
            connecter,
            Arc::new(KubeDeviceWriter::new(kube_client.clone())),
            config.poll_interval,
        );

        let device_api: Api<Device> = Api::all(kube_client);
        let ctx = Arc::new(Context::new(device_api, reconciler));
        let device_watcher = tokio::spawn(async move { watch_devices(ctx).await });

        Ok(Self { device_watcher })
    }

    /// Runs the controller until shutdown.
    pub async fn run(self) -> Result<(), ControllerError> {
        info!("Device Controller running");

        self.device_watcher
            .await
            .map_err(|e| ControllerError::Watch(format!("Device watcher panicked: {}", e)))?
            .map_err(|e| ControllerError::Watch(format!("Device watcher error: {}", e)))?;

        info!("Device Controller stopped");
        Ok(())
    }
}
