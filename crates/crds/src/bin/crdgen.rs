//! Prints the `PackageBuild` CustomResourceDefinition as YAML.
//!
//! ```sh
//! cargo run -p crds --bin crdgen > deploy/crd.yaml
//! ```

use crds::PackageBuild;
use kube::CustomResourceExt;

fn main() -> anyhow::Result<()> {
    let crd = PackageBuild::crd();
    print!("{}", serde_yaml::to_string(&crd)?);
    Ok(())
}
