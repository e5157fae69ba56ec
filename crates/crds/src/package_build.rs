//! PackageBuild CRD
//!
//! Declares a Spack package build: the environment manifest to build and the
//! image stream that receives the resulting container image.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Default)]
#[kube(
    group = "multiarch.builder.io",
    version = "v1alpha1",
    kind = "PackageBuild",
    namespaced,
    status = "PackageBuildStatus",
    shortname = "pb",
    printcolumn = r#"{"name":"State", "type":"string", "jsonPath":".status.state"}"#,
    printcolumn = r#"{"name":"ImageStream", "type":"string", "jsonPath":".spec.imageStream"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct PackageBuildSpec {
    /// Image stream that receives the built image
    #[serde(default, alias = "imagestream")]
    pub image_stream: String,

    /// Spack environments to build (only the first entry is materialized)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub environment: Vec<SpackEnvironment>,
}

/// A named Spack environment manifest (`spack.yaml` contents).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct SpackEnvironment {
    /// Environment name, used as the ConfigMap key
    pub name: String,

    /// Environment manifest consumed by the Spack builder
    pub data: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct PackageBuildStatus {
    /// Lifecycle state
    #[serde(default)]
    pub state: InstallStatus,

    /// Reason for the current state, set when the build errors
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// When `state` last changed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<chrono::DateTime<chrono::Utc>>,
}

/// Installation state of a package build.
///
/// Serializes lowercase. An empty string reads as `Empty` so that objects
/// written with a blank state keep their implicit default.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum InstallStatus {
    /// Build resources have not been created yet
    #[default]
    #[serde(alias = "")]
    Empty,

    /// Build resources have been created
    Applied,

    /// Build resources have been validated
    Validated,

    /// Build resources are failing
    Error,
}

impl InstallStatus {
    fn rank(self) -> u8 {
        match self {
            Self::Empty => 0,
            Self::Applied => 1,
            Self::Validated => 2,
            Self::Error => 3,
        }
    }

    /// Whether a resource at `self` may be moved to `next`.
    ///
    /// Moves are forward only along `Empty -> Applied -> Validated`; `Error`
    /// is reachable from every other state and never left.
    #[must_use]
    pub fn can_advance_to(self, next: InstallStatus) -> bool {
        match (self, next) {
            (Self::Error, _) => false,
            (_, Self::Error) => true,
            _ => next.rank() > self.rank(),
        }
    }

    /// Wire representation of the state.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::Applied => "applied",
            Self::Validated => "validated",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for InstallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl PackageBuild {
    /// Effective install state; `Empty` when status was never written.
    #[must_use]
    pub fn install_status(&self) -> InstallStatus {
        self.status
            .as_ref()
            .map(|status| status.state)
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_status_reads_as_empty() {
        let build = PackageBuild::new("pkg1", PackageBuildSpec::default());
        assert_eq!(build.install_status(), InstallStatus::Empty);
    }

    #[test]
    fn test_blank_state_reads_as_empty() {
        let status: PackageBuildStatus = serde_json::from_str(r#"{"state": ""}"#).unwrap();
        assert_eq!(status.state, InstallStatus::Empty);
    }

    #[test]
    fn test_state_wire_format_is_lowercase() {
        let status = PackageBuildStatus {
            state: InstallStatus::Validated,
            ..Default::default()
        };
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["state"], "validated");

        let parsed: PackageBuildStatus = serde_json::from_str(r#"{"state": "applied"}"#).unwrap();
        assert_eq!(parsed.state, InstallStatus::Applied);
    }

    #[test]
    fn test_legacy_imagestream_key_is_accepted() {
        let spec: PackageBuildSpec = serde_json::from_str(
            r#"{"imagestream": "pkg1-img", "environment": [{"name": "env", "data": "spack: {}"}]}"#,
        )
        .unwrap();
        assert_eq!(spec.image_stream, "pkg1-img");
        assert_eq!(spec.environment.len(), 1);

        let json = serde_json::to_value(&spec).unwrap();
        assert_eq!(json["imageStream"], "pkg1-img");
    }

    #[test]
    fn test_forward_transitions_only() {
        use InstallStatus::*;

        assert!(Empty.can_advance_to(Applied));
        assert!(Applied.can_advance_to(Validated));
        assert!(Empty.can_advance_to(Validated));

        assert!(!Validated.can_advance_to(Applied));
        assert!(!Validated.can_advance_to(Empty));
        assert!(!Applied.can_advance_to(Applied));
    }

    #[test]
    fn test_error_is_a_sink() {
        use InstallStatus::*;

        for state in [Empty, Applied, Validated] {
            assert!(state.can_advance_to(Error), "{state} should reach error");
        }
        for next in [Empty, Applied, Validated, Error] {
            assert!(!Error.can_advance_to(next), "error must not move to {next}");
        }
    }
}
