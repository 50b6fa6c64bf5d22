//! Equinix Metal Device Controller
//!
//! Reconciles `Device` custom resources against the Equinix Metal API:
//! - creates devices that do not exist yet and records their provider ID
//! - converges network type and mutable attributes of existing devices
//! - reports provisioning state through the Ready and Synced conditions
//! - deletes devices through a finalizer unless the deletion policy is Orphan

mod backoff;
mod config;
mod connecter;
mod controller;
mod error;
mod external;
mod managed;
mod network_type;
mod reconciler;
mod state;
mod watcher;

#[cfg(test)]
mod test_utils;

use config::Config;
use controller::Controller;
use crate::error::ControllerError;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), ControllerError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("device_controller=info,metal_client=info")),
        )
        .init();

    info!("Starting Equinix Metal Device Controller");

    let config = Config::from_env()?;

    info!("Configuration:");
    info!("  Metal API URL: {}", config.metal_api_url);
    info!("  Poll interval: {:?}", config.poll_interval);
    info!("  Request timeout: {:?}", config.request_timeout);

    let controller = Controller::new(config).await?;
    controller.run().await?;

    Ok(())
}
