//! Typed views of the OpenShift kinds the package build controller manages.
//!
//! These types are served by the OpenShift API server, not installed by this
//! project, so they carry no schema and `crdgen` never emits them. Only the
//! fields the controller writes or inspects are modelled; everything else the
//! server returns is ignored on read.

pub mod build;
pub mod build_config;
pub mod image_stream;

pub use build::*;
pub use build_config::*;
pub use image_stream::*;

use serde::{Deserialize, Serialize};

/// Label OpenShift puts on every `Build` started from a `BuildConfig`.
pub const BUILD_CONFIG_LABEL: &str = "openshift.io/build-config.name";

/// Annotation carrying the sequence number of a `Build` within its `BuildConfig`.
pub const BUILD_NUMBER_ANNOTATION: &str = "openshift.io/build.number";

/// Reference to another object by kind and name (OpenShift `ObjectReference` subset).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ObjectReference {
    pub kind: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

impl ObjectReference {
    pub fn new(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            name: name.into(),
            namespace: None,
        }
    }
}

/// Reference to an object in the same namespace.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct LocalObjectReference {
    pub name: String,
}
