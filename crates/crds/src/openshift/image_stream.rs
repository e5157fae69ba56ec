//! ImageStream (`image.openshift.io/v1`)

use kube::CustomResource;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[kube(
    group = "image.openshift.io",
    version = "v1",
    kind = "ImageStream",
    namespaced,
    derive = "PartialEq",
    schema = "disabled"
)]
#[serde(rename_all = "camelCase")]
pub struct ImageStreamSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lookup_policy: Option<ImageLookupPolicy>,
}

/// Whether pods in the namespace may reference the stream by bare name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ImageLookupPolicy {
    pub local: bool,
}
