//! Prints the CRD manifests for the Metal controller as a multi-document YAML stream.
//!
//! Usage: `cargo run -p crds --bin crdgen > deploy/crds.yaml`

use crds::{Device, ProviderConfig, ProviderConfigUsage};
use kube::CustomResourceExt;

fn main() -> Result<(), serde_yaml::Error> {
    let crds = [
        Device::crd(),
        ProviderConfig::crd(),
        ProviderConfigUsage::crd(),
    ];

    for crd in crds {
        println!("---");
        print!("{}", serde_yaml::to_string(&crd)?);
    }

    Ok(())
}
