//! BuildStore trait for mocking
//!
//! The reconciler only ever talks to the cluster through this trait. The
//! concrete `KubeStore` implements it over the Kubernetes API, and tests use
//! the in-memory `MockStore`.

use crate::error::StoreError;
use crds::PackageBuild;
use crds::openshift::{Build, BuildConfig, ImageStream};
use k8s_openapi::api::core::v1::ConfigMap;

/// Object store operations used by the package build controller
///
/// Reads return `Ok(None)` for absent objects. Creates and replaces take the
/// namespace from the object's metadata. All async methods must be `Send` to
/// work with Tokio's work-stealing runtime.
#[async_trait::async_trait]
pub trait BuildStore: Send + Sync {
    // PackageBuild
    async fn get_package_build(&self, namespace: &str, name: &str) -> Result<Option<PackageBuild>, StoreError>;

    /// Write `status` only, guarded by `metadata.resourceVersion`.
    ///
    /// Fails with [`StoreError::Conflict`] when the stored object has moved on.
    async fn update_package_build_status(&self, build: &PackageBuild) -> Result<PackageBuild, StoreError>;

    // ConfigMap
    async fn get_config_map(&self, namespace: &str, name: &str) -> Result<Option<ConfigMap>, StoreError>;
    async fn create_config_map(&self, config_map: &ConfigMap) -> Result<ConfigMap, StoreError>;
    async fn delete_config_map(&self, namespace: &str, name: &str) -> Result<(), StoreError>;

    // BuildConfig
    async fn get_build_config(&self, namespace: &str, name: &str) -> Result<Option<BuildConfig>, StoreError>;
    async fn create_build_config(&self, build_config: &BuildConfig) -> Result<BuildConfig, StoreError>;
    async fn replace_build_config(&self, build_config: &BuildConfig) -> Result<BuildConfig, StoreError>;

    // ImageStream
    async fn get_image_stream(&self, namespace: &str, name: &str) -> Result<Option<ImageStream>, StoreError>;
    async fn create_image_stream(&self, image_stream: &ImageStream) -> Result<ImageStream, StoreError>;

    // Build
    /// Builds started from the named BuildConfig, in no particular order.
    async fn list_builds(&self, namespace: &str, build_config: &str) -> Result<Vec<Build>, StoreError>;
}
