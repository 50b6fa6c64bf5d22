//! Network type conversion planning
//!
//! The Metal API has no single "set network type" call. A conversion is a
//! sequence of port actions (bond, disbond, convert to layer 2 or 3) applied
//! to `bond0` and its member ports. `plan_conversion` derives that sequence
//! from the current port layout, so it is idempotent: a device already in the
//! target layout yields an empty plan.

use crate::error::MetalError;
use crate::models::*;

/// Name of the bond port on every multi-port server
pub const BOND_PORT: &str = "bond0";
/// Port that is split out of the bond in hybrid mode
pub const HYBRID_PORT: &str = "eth1";

/// A single port operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortOperation {
    /// Add the port to its bond, or every port when `bulk`
    Bond { bulk: bool },
    /// Remove the port from its bond, or every port when `bulk`
    Disbond { bulk: bool },
    /// Switch the bond to layer 2
    ToLayer2,
    /// Switch the bond to layer 3
    ToLayer3,
}

/// Operation applied to a named port
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortAction {
    pub port: String,
    pub operation: PortOperation,
}

impl PortAction {
    fn new(port: &str, operation: PortOperation) -> Self {
        Self {
            port: port.to_string(),
            operation,
        }
    }

    /// API path for this action against port `port_id`
    pub fn path(&self, port_id: &str) -> String {
        let port_id = urlencoding::encode(port_id);
        match self.operation {
            PortOperation::Bond { bulk } => format!("/ports/{}/bond?bulk_enable={}", port_id, bulk),
            PortOperation::Disbond { bulk } => {
                format!("/ports/{}/disbond?bulk_disable={}", port_id, bulk)
            }
            PortOperation::ToLayer2 => format!("/ports/{}/convert/layer-2", port_id),
            PortOperation::ToLayer3 => format!("/ports/{}/convert/layer-3", port_id),
        }
    }
}

/// Plans the port actions that move `device` to `target` network type
pub fn plan_conversion(device: &Device, target: &str) -> Result<Vec<PortAction>, MetalError> {
    let bond = device.port_by_name(BOND_PORT).ok_or_else(|| {
        MetalError::InvalidRequest(format!("device {} has no {} port", device.id, BOND_PORT))
    })?;
    let members: Vec<&Port> = device.network_ports.iter().filter(|p| p.is_network_port()).collect();
    let none_bonded = members.iter().all(|p| !p.is_bonded());
    let unbonded: Vec<&str> = members
        .iter()
        .filter(|p| !p.is_bonded())
        .map(|p| p.name.as_str())
        .collect();
    let bond_is_layer3 = match bond.network_type.as_deref() {
        Some(t) => t == NETWORK_TYPE_LAYER3 || t == NETWORK_TYPE_HYBRID,
        None => device.ip_addresses.iter().any(|ip| ip.management),
    };

    let mut plan = Vec::new();
    let bond_all = |plan: &mut Vec<PortAction>| {
        if none_bonded && !members.is_empty() {
            plan.push(PortAction::new(BOND_PORT, PortOperation::Bond { bulk: true }));
        } else {
            for name in &unbonded {
                plan.push(PortAction::new(name, PortOperation::Bond { bulk: false }));
            }
        }
    };

    match target {
        NETWORK_TYPE_LAYER3 => {
            bond_all(&mut plan);
            if !bond_is_layer3 {
                plan.push(PortAction::new(BOND_PORT, PortOperation::ToLayer3));
            }
        }
        NETWORK_TYPE_LAYER2_BONDED => {
            bond_all(&mut plan);
            if bond_is_layer3 {
                plan.push(PortAction::new(BOND_PORT, PortOperation::ToLayer2));
            }
        }
        NETWORK_TYPE_HYBRID => {
            let split = device.port_by_name(HYBRID_PORT).ok_or_else(|| {
                MetalError::InvalidRequest(format!(
                    "device {} has no {} port for hybrid mode",
                    device.id, HYBRID_PORT
                ))
            })?;
            if none_bonded {
                plan.push(PortAction::new(BOND_PORT, PortOperation::Bond { bulk: true }));
            }
            if !bond_is_layer3 {
                plan.push(PortAction::new(BOND_PORT, PortOperation::ToLayer3));
            }
            if split.is_bonded() || none_bonded {
                plan.push(PortAction::new(HYBRID_PORT, PortOperation::Disbond { bulk: false }));
            }
        }
        NETWORK_TYPE_LAYER2_INDIVIDUAL => {
            if bond_is_layer3 {
                if !none_bonded {
                    for name in &unbonded {
                        plan.push(PortAction::new(name, PortOperation::Bond { bulk: false }));
                    }
                }
                plan.push(PortAction::new(BOND_PORT, PortOperation::ToLayer2));
            }
            if !none_bonded || bond_is_layer3 {
                plan.push(PortAction::new(BOND_PORT, PortOperation::Disbond { bulk: true }));
            }
        }
        other => {
            return Err(MetalError::InvalidRequest(format!(
                "unsupported network type: {}",
                other
            )));
        }
    }

    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn port(id: &str, name: &str, type_: &str, bonded: bool, network_type: Option<&str>) -> Port {
        Port {
            id: id.to_string(),
            name: name.to_string(),
            type_: type_.to_string(),
            data: PortData { bonded, mac: None },
            bond: None,
            network_type: network_type.map(str::to_string),
        }
    }

    fn device(bond_type: &str, eth0: bool, eth1: bool) -> Device {
        Device {
            id: "dev-1".to_string(),
            network_ports: vec![
                port("p0", "bond0", PORT_TYPE_BOND, eth0 || eth1, Some(bond_type)),
                port("p1", "eth0", PORT_TYPE_NETWORK, eth0, None),
                port("p2", "eth1", PORT_TYPE_NETWORK, eth1, None),
            ],
            ..Default::default()
        }
    }

    fn ops(plan: &[PortAction]) -> Vec<(&str, PortOperation)> {
        plan.iter().map(|a| (a.port.as_str(), a.operation)).collect()
    }

    #[test]
    fn test_layer3_to_layer3_is_noop() {
        let plan = plan_conversion(&device(NETWORK_TYPE_LAYER3, true, true), NETWORK_TYPE_LAYER3).unwrap();
        assert!(plan.is_empty());
    }

    #[test]
    fn test_layer3_to_hybrid_splits_eth1() {
        let plan = plan_conversion(&device(NETWORK_TYPE_LAYER3, true, true), NETWORK_TYPE_HYBRID).unwrap();
        assert_eq!(ops(&plan), vec![("eth1", PortOperation::Disbond { bulk: false })]);
    }

    #[test]
    fn test_hybrid_to_layer3_rebonds_eth1() {
        let plan = plan_conversion(&device(NETWORK_TYPE_HYBRID, true, false), NETWORK_TYPE_LAYER3).unwrap();
        assert_eq!(ops(&plan), vec![("eth1", PortOperation::Bond { bulk: false })]);
    }

    #[test]
    fn test_layer2_individual_to_layer3_bonds_then_converts() {
        let plan = plan_conversion(
            &device(NETWORK_TYPE_LAYER2_INDIVIDUAL, false, false),
            NETWORK_TYPE_LAYER3,
        )
        .unwrap();
        assert_eq!(
            ops(&plan),
            vec![
                ("bond0", PortOperation::Bond { bulk: true }),
                ("bond0", PortOperation::ToLayer3),
            ]
        );
    }

    #[test]
    fn test_layer3_to_layer2_individual_converts_then_disbonds() {
        let plan = plan_conversion(
            &device(NETWORK_TYPE_LAYER3, true, true),
            NETWORK_TYPE_LAYER2_INDIVIDUAL,
        )
        .unwrap();
        assert_eq!(
            ops(&plan),
            vec![
                ("bond0", PortOperation::ToLayer2),
                ("bond0", PortOperation::Disbond { bulk: true }),
            ]
        );
    }

    #[test]
    fn test_layer2_bonded_from_layer3() {
        let plan = plan_conversion(&device(NETWORK_TYPE_LAYER3, true, true), NETWORK_TYPE_LAYER2_BONDED).unwrap();
        assert_eq!(ops(&plan), vec![("bond0", PortOperation::ToLayer2)]);
    }

    #[test]
    fn test_missing_bond_port_is_rejected() {
        let device = Device {
            id: "dev-1".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            plan_conversion(&device, NETWORK_TYPE_LAYER3),
            Err(MetalError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_unknown_target_is_rejected() {
        assert!(plan_conversion(&device(NETWORK_TYPE_LAYER3, true, true), "layer4").is_err());
    }

    #[test]
    fn test_action_paths() {
        assert_eq!(
            PortAction::new("bond0", PortOperation::Bond { bulk: true }).path("p0"),
            "/ports/p0/bond?bulk_enable=true"
        );
        assert_eq!(
            PortAction::new("eth1", PortOperation::Disbond { bulk: false }).path("p2"),
            "/ports/p2/disbond?bulk_disable=false"
        );
        assert_eq!(
            PortAction::new("bond0", PortOperation::ToLayer3).path("p0"),
            "/ports/p0/convert/layer-3"
        );
    }
}
