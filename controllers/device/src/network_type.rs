//! Network topology resolution
//!
//! Derives a device's network type from its port bonding and IP assignments.
//! Used while the device is still provisioning, when the API-reported type is
//! not yet reliable, and as the fallback when the API reports none.

use crds::NetworkType;
use metal_client::{IpAddressAssignment, Port};

/// Resolves the network type from ports and IP assignments
///
/// Only ports of type `NetworkPort` count; the bond port itself is ignored.
pub fn resolve(ports: &[Port], ip_addresses: &[IpAddressAssignment]) -> NetworkType {
    let members: Vec<&Port> = ports.iter().filter(|p| p.is_network_port()).collect();
    if members.is_empty() {
        return NetworkType::Layer2Individual;
    }

    let bonded = members.iter().filter(|p| p.is_bonded()).count();
    let all_bonded = bonded == members.len();
    let has_management_ip = ip_addresses.iter().any(|ip| ip.management);

    match (has_management_ip, all_bonded, bonded) {
        (true, true, _) => NetworkType::Layer3,
        (true, false, 0) => NetworkType::Layer2Individual,
        (true, false, _) => NetworkType::Hybrid,
        (false, true, _) => NetworkType::Layer2Bonded,
        (false, false, _) => NetworkType::Layer2Individual,
    }
}
