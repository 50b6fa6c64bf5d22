//! Equinix Metal REST API Client
//!
//! A Rust client library for the device endpoints of the Equinix Metal API.
//!
//! # Example
//!
//! ```no_run
//! use metal_client::{MetalClient, MetalClientTrait, DEFAULT_BASE_URL, DEFAULT_TIMEOUT};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = MetalClient::new(
//!     DEFAULT_BASE_URL.to_string(),
//!     "your-api-token".to_string(),
//!     "your-project-id".to_string(),
//!     DEFAULT_TIMEOUT,
//! )?;
//!
//! // Fetch a device with its ports and IP addresses
//! let device = client.get_device("e2c6b4a0-0000-0000-0000-000000000000").await?;
//!
//! // Move it to hybrid networking
//! client.convert_network_type(&device.id, "hybrid").await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod common;
pub mod error;
#[path = "trait.rs"]
pub mod metal_trait;
pub mod models;
pub mod network;
#[cfg(feature = "test-util")]
pub mod mock;

pub use client::{MetalClient, DEFAULT_BASE_URL, DEFAULT_TIMEOUT};
pub use common::HttpClient;
pub use error::MetalError;
pub use metal_trait::MetalClientTrait;
pub use models::*;
pub use network::{plan_conversion, PortAction, PortOperation};
#[cfg(feature = "test-util")]
pub use mock::{MockCall, MockMetalClient, MockOperation};
