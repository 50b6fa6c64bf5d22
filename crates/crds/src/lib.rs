//! Equinix Metal CRD Definitions
//!
//! Kubernetes Custom Resource Definitions for the Metal device controller.

pub mod conditions;
pub mod device;
pub mod provider_config;
pub mod references;

pub use conditions::*;
pub use device::*;
pub use provider_config::*;
pub use references::*;
