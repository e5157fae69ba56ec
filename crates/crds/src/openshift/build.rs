//! Build (`build.openshift.io/v1`)
//!
//! One execution of a `BuildConfig`. Read-only from the controller's side.

use super::BUILD_NUMBER_ANNOTATION;
use kube::CustomResource;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[kube(
    group = "build.openshift.io",
    version = "v1",
    kind = "Build",
    namespaced,
    derive = "PartialEq",
    status = "BuildStatus",
    schema = "disabled"
)]
#[serde(rename_all = "camelCase")]
pub struct BuildSpec {
    /// Name of the service account the build runs as
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_account: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct BuildStatus {
    #[serde(default)]
    pub phase: BuildPhase,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum BuildPhase {
    #[default]
    New,
    Pending,
    Running,
    Complete,
    Failed,
    Error,
    Cancelled,
    #[serde(other)]
    Unknown,
}

impl BuildPhase {
    /// Build finished without producing an image.
    #[must_use]
    pub fn is_failure(self) -> bool {
        matches!(self, Self::Failed | Self::Error | Self::Cancelled)
    }

    /// Build has not reached a terminal phase yet.
    #[must_use]
    pub fn is_in_progress(self) -> bool {
        matches!(self, Self::New | Self::Pending | Self::Running)
    }
}

impl Build {
    /// Phase reported by the build subsystem (`New` until status is written).
    #[must_use]
    pub fn phase(&self) -> BuildPhase {
        self.status.as_ref().map(|s| s.phase).unwrap_or_default()
    }

    /// Sequence number from the build-number annotation, if present and numeric.
    #[must_use]
    pub fn number(&self) -> Option<u64> {
        self.metadata
            .annotations
            .as_ref()?
            .get(BUILD_NUMBER_ANNOTATION)?
            .parse()
            .ok()
    }

    /// Human readable failure description.
    #[must_use]
    pub fn failure_message(&self) -> String {
        let name = self.metadata.name.as_deref().unwrap_or("<unknown>");
        let detail = self
            .status
            .as_ref()
            .and_then(|s| s.message.as_deref().or(s.reason.as_deref()))
            .unwrap_or("no reason reported");
        format!("build {} ended in phase {:?}: {}", name, self.phase(), detail)
    }
}

/// Most recent build of a set, by build number then creation time.
pub fn latest_build(builds: &[Build]) -> Option<&Build> {
    builds.iter().max_by(|a, b| {
        a.number()
            .cmp(&b.number())
            .then_with(|| a.metadata.creation_timestamp.cmp(&b.metadata.creation_timestamp))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn build(name: &str, number: u64, phase: BuildPhase) -> Build {
        let mut build = Build::new(name, BuildSpec::default());
        build.metadata.annotations = Some(BTreeMap::from([(
            BUILD_NUMBER_ANNOTATION.to_string(),
            number.to_string(),
        )]));
        build.status = Some(BuildStatus {
            phase,
            ..Default::default()
        });
        build
    }

    #[test]
    fn test_latest_build_uses_build_number() {
        let builds = vec![
            build("pkg1-buildconfig-2", 2, BuildPhase::Failed),
            build("pkg1-buildconfig-10", 10, BuildPhase::Running),
            build("pkg1-buildconfig-9", 9, BuildPhase::Complete),
        ];
        let latest = latest_build(&builds).unwrap();
        assert_eq!(latest.metadata.name.as_deref(), Some("pkg1-buildconfig-10"));
        assert!(latest.phase().is_in_progress());
    }

    #[test]
    fn test_latest_build_of_nothing() {
        assert!(latest_build(&[]).is_none());
    }

    #[test]
    fn test_unknown_phase_is_tolerated() {
        let status: BuildStatus = serde_json::from_str(r#"{"phase": "Paused"}"#).unwrap();
        assert_eq!(status.phase, BuildPhase::Unknown);
        assert!(!status.phase.is_failure());
        assert!(!status.phase.is_in_progress());
    }

    #[test]
    fn test_failure_message_prefers_message_over_reason() {
        let mut failed = build("pkg1-buildconfig-1", 1, BuildPhase::Failed);
        failed.status = Some(BuildStatus {
            phase: BuildPhase::Failed,
            reason: Some("DockerBuildFailed".to_string()),
            message: Some("Docker build strategy has failed.".to_string()),
        });
        let message = failed.failure_message();
        assert!(message.contains("pkg1-buildconfig-1"));
        assert!(message.contains("Docker build strategy has failed."));
    }
}
