//! BuildConfig (`build.openshift.io/v1`)
//!
//! Describes how the cluster build subsystem turns sources into an image.

use super::{LocalObjectReference, ObjectReference};
use kube::CustomResource;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[kube(
    group = "build.openshift.io",
    version = "v1",
    kind = "BuildConfig",
    namespaced,
    derive = "PartialEq",
    status = "BuildConfigStatus",
    schema = "disabled"
)]
#[serde(rename_all = "camelCase")]
pub struct BuildConfigSpec {
    /// How concurrent builds of this config are scheduled
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_policy: Option<RunPolicy>,

    /// Events that start a new build
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub triggers: Vec<BuildTriggerPolicy>,

    pub source: BuildSource,

    pub strategy: BuildStrategy,

    pub output: BuildOutput,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub successful_builds_history_limit: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_builds_history_limit: Option<i32>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum RunPolicy {
    #[default]
    Serial,
    Parallel,
    SerialLatestOnly,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BuildTriggerPolicy {
    #[serde(rename = "type")]
    pub trigger_type: BuildTriggerType,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum BuildTriggerType {
    ConfigChange,
    ImageChange,
    GitHub,
    Generic,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct BuildSource {
    #[serde(rename = "type")]
    pub source_type: BuildSourceType,

    /// Inline Dockerfile
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dockerfile: Option<String>,

    /// ConfigMaps copied into the build context
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub config_maps: Vec<ConfigMapBuildSource>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum BuildSourceType {
    Git,
    #[default]
    Dockerfile,
    Binary,
    Image,
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ConfigMapBuildSource {
    pub config_map: LocalObjectReference,

    /// Directory, relative to the build context, receiving the ConfigMap keys
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_dir: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct BuildStrategy {
    #[serde(rename = "type")]
    pub strategy_type: BuildStrategyType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docker_strategy: Option<DockerBuildStrategy>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum BuildStrategyType {
    #[default]
    Docker,
    Source,
    Custom,
    #[serde(rename = "JenkinsPipeline")]
    Jenkins,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct DockerBuildStrategy {
    /// Base image replacing the first `FROM` of the Dockerfile
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<ObjectReference>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct BuildOutput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<ObjectReference>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct BuildConfigStatus {
    /// Sequence number of the most recently started build
    #[serde(default)]
    pub last_version: i64,
}

impl BuildConfig {
    /// Number of the last build the build subsystem started, `0` before the first.
    #[must_use]
    pub fn last_version(&self) -> u64 {
        self.status
            .as_ref()
            .map(|s| u64::try_from(s.last_version).unwrap_or(0))
            .unwrap_or(0)
    }
}
