//! Kubernetes resource watcher.
//!
//! Watches Device resources with `kube_runtime::Controller` and routes each
//! event through the finalizer: live objects are reconciled, objects being
//! deleted are finalized. Failed passes are requeued with a per-resource
//! Fibonacci backoff.

use std::sync::Arc;
use std::time::Duration;

use crds::Device;
use futures::StreamExt;
use kube::{Api, ResourceExt};
use kube_runtime::controller::{Action, Config as ControllerConfig};
use kube_runtime::finalizer::{finalizer, Event as Finalizer};
use kube_runtime::{watcher, Controller};
use tracing::{debug, error, info, warn};

use crate::backoff::BackoffTracker;
use crate::error::{error_chain, ControllerError};
use crate::reconciler::ManagedReconciler;

/// Finalizer guarding remote deletion
pub const DEVICE_FINALIZER: &str = "finalizer.managedresource.crossplane.io";

/// Shared state handed to every reconcile call
pub struct Context {
    api: Api<Device>,
    reconciler: ManagedReconciler,
    backoff: BackoffTracker,
}

impl Context {
    pub fn new(api: Api<Device>, reconciler: ManagedReconciler) -> Self {
        Self {
            api,
            reconciler,
            backoff: BackoffTracker::new(),
        }
    }
}

async fn reconcile(device: Arc<Device>, ctx: Arc<Context>) -> Result<Action, ControllerError> {
    let key = device.name_any();
    let deleting = device.metadata.deletion_timestamp.is_some();
    debug!(device = %key, deleting, "Reconciling Device");

    let reconciler = &ctx.reconciler;
    let action = finalizer(&ctx.api, DEVICE_FINALIZER, device, |event| async move {
        match event {
            Finalizer::Apply(device) => reconciler.reconcile(&device).await,
            Finalizer::Cleanup(device) => reconciler.finalize(&device).await,
        }
    })
    .await
    .map_err(|e| ControllerError::FinalizerError(Box::new(e)))?;

    if deleting {
        ctx.backoff.forget(&key);
    } else {
        ctx.backoff.reset(&key);
    }
    Ok(action)
}

fn error_policy(device: Arc<Device>, error: &ControllerError, ctx: Arc<Context>) -> Action {
    let key = device.name_any();
    let (backoff_seconds, error_count) = ctx.backoff.record_error(&key);
    warn!(
        device = %key,
        error_count,
        backoff_seconds,
        error = %error_chain(error),
        "Reconciliation failed, requeueing with backoff"
    );
    Action::requeue(Duration::from_secs(backoff_seconds))
}

/// Runs the Device controller until a shutdown signal arrives
pub async fn watch_devices(ctx: Arc<Context>) -> Result<(), ControllerError> {
    info!("Starting Device watcher");

    // Debounce batches bursts of events (including our own status writes)
    let controller_config = ControllerConfig::default()
        .debounce(Duration::from_secs(5))
        .concurrency(3);

    Controller::new(ctx.api.clone(), watcher::Config::default())
        .with_config(controller_config)
        .shutdown_on_signal()
        .run(reconcile, error_policy, ctx)
        .for_each(|res| async move {
            match res {
                Ok((object, _)) => debug!(device = %object.name, "Reconciled Device"),
                Err(e) => error!("Device controller error: {}", error_chain(&e)),
            }
        })
        .await;

    info!("Device watcher stopped");
    Ok(())
}
