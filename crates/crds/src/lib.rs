//! Multiarch Builder CRD Definitions
//!
//! The `PackageBuild` custom resource owned by this project, plus typed views
//! of the OpenShift build kinds the package build controller creates.

pub mod openshift;
pub mod package_build;

pub use package_build::*;
