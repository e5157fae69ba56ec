//! Mock BuildStore for unit testing
//!
//! Keeps objects in memory keyed by `(namespace, name)` and behaves like the
//! API server where the reconciler depends on it: creates fail with
//! `AlreadyExists`, status writes and replaces are checked against the stored
//! resource version, and every write bumps that version.
//!
//! Tests can count calls per [`StoreOperation`] and inject one-shot failures
//! with [`MockStore::fail_after`].

use crate::error::StoreError;
use crate::store_trait::BuildStore;
use crds::PackageBuild;
use crds::openshift::{BUILD_CONFIG_LABEL, Build, BuildConfig, ImageStream};
use k8s_openapi::api::core::v1::ConfigMap;
use kube::Resource;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

type Key = (String, String);

/// Store calls that can be counted or made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOperation {
    GetPackageBuild,
    UpdatePackageBuildStatus,
    GetConfigMap,
    CreateConfigMap,
    DeleteConfigMap,
    GetBuildConfig,
    CreateBuildConfig,
    ReplaceBuildConfig,
    GetImageStream,
    CreateImageStream,
    ListBuilds,
}

impl StoreOperation {
    /// Whether the operation mutates the store.
    pub fn is_write(self) -> bool {
        matches!(
            self,
            Self::UpdatePackageBuildStatus
                | Self::CreateConfigMap
                | Self::DeleteConfigMap
                | Self::CreateBuildConfig
                | Self::ReplaceBuildConfig
                | Self::CreateImageStream
        )
    }
}

struct InjectedFailure {
    operation: StoreOperation,
    skip: usize,
    error: StoreError,
}

#[derive(Default)]
struct MockState {
    package_builds: HashMap<Key, PackageBuild>,
    config_maps: HashMap<Key, ConfigMap>,
    build_configs: HashMap<Key, BuildConfig>,
    image_streams: HashMap<Key, ImageStream>,
    builds: HashMap<Key, Build>,
    next_version: u64,
    calls: HashMap<StoreOperation, usize>,
    failures: Vec<InjectedFailure>,
}

impl MockState {
    /// Count the call and fire the first armed failure for it, if any.
    fn record(&mut self, operation: StoreOperation) -> Result<(), StoreError> {
        *self.calls.entry(operation).or_default() += 1;

        let Some(index) = self.failures.iter().position(|f| f.operation == operation) else {
            return Ok(());
        };
        if self.failures[index].skip > 0 {
            self.failures[index].skip -= 1;
            return Ok(());
        }
        Err(self.failures.remove(index).error)
    }

    fn next_version(&mut self) -> String {
        self.next_version += 1;
        self.next_version.to_string()
    }

    /// Stamp server-side fields on a freshly created object.
    fn admit<K: Resource>(&mut self, obj: &mut K) {
        let version = self.next_version();
        let meta = obj.meta_mut();
        meta.uid = Some(format!("uid-{version}"));
        meta.resource_version = Some(version);
    }
}

fn key_of<K: Resource>(obj: &K) -> Result<Key, StoreError> {
    let meta = obj.meta();
    let namespace = meta
        .namespace
        .clone()
        .ok_or(StoreError::MissingField("metadata.namespace"))?;
    let name = meta
        .name
        .clone()
        .ok_or(StoreError::MissingField("metadata.name"))?;
    Ok((namespace, name))
}

fn key(namespace: &str, name: &str) -> Key {
    (namespace.to_string(), name.to_string())
}

fn create_in<K: Resource + Clone>(
    state: &mut MockState,
    select: impl Fn(&mut MockState) -> &mut HashMap<Key, K>,
    obj: &K,
) -> Result<K, StoreError> {
    let key = key_of(obj)?;
    if select(state).contains_key(&key) {
        return Err(StoreError::AlreadyExists(format!("{}/{}", key.0, key.1)));
    }
    let mut stored = obj.clone();
    state.admit(&mut stored);
    select(state).insert(key, stored.clone());
    Ok(stored)
}

/// Mock BuildStore for testing
#[derive(Clone, Default)]
pub struct MockStore {
    state: Arc<Mutex<MockState>>,
}

impl MockStore {
    /// Create an empty mock store
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a PackageBuild to the mock store (for test setup)
    ///
    /// Assigns uid and resource version like a real create would.
    pub fn add_package_build(&self, build: PackageBuild) -> PackageBuild {
        let mut state = self.lock();
        let mut stored = build;
        state.admit(&mut stored);
        if let Ok(key) = key_of(&stored) {
            state.package_builds.insert(key, stored.clone());
        }
        stored
    }

    /// Add a ConfigMap to the mock store (for test setup)
    pub fn add_config_map(&self, config_map: ConfigMap) {
        let mut state = self.lock();
        let mut stored = config_map;
        state.admit(&mut stored);
        if let Ok(key) = key_of(&stored) {
            state.config_maps.insert(key, stored);
        }
    }

    /// Add a BuildConfig to the mock store (for test setup)
    pub fn add_build_config(&self, build_config: BuildConfig) {
        let mut state = self.lock();
        let mut stored = build_config;
        state.admit(&mut stored);
        if let Ok(key) = key_of(&stored) {
            state.build_configs.insert(key, stored);
        }
    }

    /// Add a Build to the mock store (for test setup)
    pub fn add_build(&self, build: Build) {
        let mut state = self.lock();
        let mut stored = build;
        state.admit(&mut stored);
        if let Ok(key) = key_of(&stored) {
            state.builds.insert(key, stored);
        }
    }

    /// Remove a PackageBuild, as a user deleting it would
    pub fn remove_package_build(&self, namespace: &str, name: &str) -> Option<PackageBuild> {
        self.lock().package_builds.remove(&key(namespace, name))
    }

    /// Bump the stored resource version of a PackageBuild, as a concurrent
    /// spec edit would
    pub fn touch_package_build(&self, namespace: &str, name: &str) {
        let mut state = self.lock();
        let version = state.next_version();
        if let Some(stored) = state.package_builds.get_mut(&key(namespace, name)) {
            stored.metadata.resource_version = Some(version);
        }
    }

    pub fn package_build(&self, namespace: &str, name: &str) -> Option<PackageBuild> {
        self.lock().package_builds.get(&key(namespace, name)).cloned()
    }

    pub fn config_map(&self, namespace: &str, name: &str) -> Option<ConfigMap> {
        self.lock().config_maps.get(&key(namespace, name)).cloned()
    }

    pub fn build_config(&self, namespace: &str, name: &str) -> Option<BuildConfig> {
        self.lock().build_configs.get(&key(namespace, name)).cloned()
    }

    pub fn image_stream(&self, namespace: &str, name: &str) -> Option<ImageStream> {
        self.lock().image_streams.get(&key(namespace, name)).cloned()
    }

    pub fn config_map_count(&self) -> usize {
        self.lock().config_maps.len()
    }

    pub fn build_config_count(&self) -> usize {
        self.lock().build_configs.len()
    }

    /// Number of times `operation` was called
    pub fn calls(&self, operation: StoreOperation) -> usize {
        self.lock().calls.get(&operation).copied().unwrap_or(0)
    }

    /// Total number of mutating calls
    pub fn write_calls(&self) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|(operation, _)| operation.is_write())
            .map(|(_, count)| count)
            .sum()
    }

    /// Forget all recorded calls
    pub fn reset_calls(&self) {
        self.lock().calls.clear();
    }

    /// Make the call to `operation` after `skip` successful ones fail once
    /// with `error`
    pub fn fail_after(&self, operation: StoreOperation, skip: usize, error: StoreError) {
        self.lock().failures.push(InjectedFailure {
            operation,
            skip,
            error,
        });
    }
}

#[async_trait::async_trait]
impl BuildStore for MockStore {
    async fn get_package_build(&self, namespace: &str, name: &str) -> Result<Option<PackageBuild>, StoreError> {
        let mut state = self.lock();
        state.record(StoreOperation::GetPackageBuild)?;
        Ok(state.package_builds.get(&key(namespace, name)).cloned())
    }

    async fn update_package_build_status(&self, build: &PackageBuild) -> Result<PackageBuild, StoreError> {
        let mut state = self.lock();
        state.record(StoreOperation::UpdatePackageBuildStatus)?;

        let key = key_of(build)?;
        let version = state.next_version();
        let stored = state
            .package_builds
            .get_mut(&key)
            .ok_or_else(|| StoreError::NotFound(format!("packagebuilds {}/{}", key.0, key.1)))?;
        if stored.metadata.resource_version != build.metadata.resource_version {
            return Err(StoreError::Conflict(format!(
                "packagebuilds {}/{}: the object has been modified",
                key.0, key.1
            )));
        }
        stored.status = build.status.clone();
        stored.metadata.resource_version = Some(version);
        Ok(stored.clone())
    }

    async fn get_config_map(&self, namespace: &str, name: &str) -> Result<Option<ConfigMap>, StoreError> {
        let mut state = self.lock();
        state.record(StoreOperation::GetConfigMap)?;
        Ok(state.config_maps.get(&key(namespace, name)).cloned())
    }

    async fn create_config_map(&self, config_map: &ConfigMap) -> Result<ConfigMap, StoreError> {
        let mut state = self.lock();
        state.record(StoreOperation::CreateConfigMap)?;
        create_in(&mut state, |s| &mut s.config_maps, config_map)
    }

    async fn delete_config_map(&self, namespace: &str, name: &str) -> Result<(), StoreError> {
        let mut state = self.lock();
        state.record(StoreOperation::DeleteConfigMap)?;
        state
            .config_maps
            .remove(&key(namespace, name))
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(format!("configmaps {namespace}/{name}")))
    }

    async fn get_build_config(&self, namespace: &str, name: &str) -> Result<Option<BuildConfig>, StoreError> {
        let mut state = self.lock();
        state.record(StoreOperation::GetBuildConfig)?;
        Ok(state.build_configs.get(&key(namespace, name)).cloned())
    }

    async fn create_build_config(&self, build_config: &BuildConfig) -> Result<BuildConfig, StoreError> {
        let mut state = self.lock();
        state.record(StoreOperation::CreateBuildConfig)?;
        create_in(&mut state, |s| &mut s.build_configs, build_config)
    }

    async fn replace_build_config(&self, build_config: &BuildConfig) -> Result<BuildConfig, StoreError> {
        let mut state = self.lock();
        state.record(StoreOperation::ReplaceBuildConfig)?;

        let key = key_of(build_config)?;
        let version = state.next_version();
        let stored = state
            .build_configs
            .get_mut(&key)
            .ok_or_else(|| StoreError::NotFound(format!("buildconfigs {}/{}", key.0, key.1)))?;
        if stored.metadata.resource_version != build_config.metadata.resource_version {
            return Err(StoreError::Conflict(format!(
                "buildconfigs {}/{}: the object has been modified",
                key.0, key.1
            )));
        }
        let uid = stored.metadata.uid.clone();
        *stored = build_config.clone();
        stored.metadata.uid = uid;
        stored.metadata.resource_version = Some(version);
        Ok(stored.clone())
    }

    async fn get_image_stream(&self, namespace: &str, name: &str) -> Result<Option<ImageStream>, StoreError> {
        let mut state = self.lock();
        state.record(StoreOperation::GetImageStream)?;
        Ok(state.image_streams.get(&key(namespace, name)).cloned())
    }

    async fn create_image_stream(&self, image_stream: &ImageStream) -> Result<ImageStream, StoreError> {
        let mut state = self.lock();
        state.record(StoreOperation::CreateImageStream)?;
        create_in(&mut state, |s| &mut s.image_streams, image_stream)
    }

    async fn list_builds(&self, namespace: &str, build_config: &str) -> Result<Vec<Build>, StoreError> {
        let mut state = self.lock();
        state.record(StoreOperation::ListBuilds)?;
        Ok(state
            .builds
            .iter()
            .filter(|((ns, _), build)| {
                ns == namespace
                    && build
                        .metadata
                        .labels
                        .as_ref()
                        .and_then(|labels| labels.get(BUILD_CONFIG_LABEL))
                        .is_some_and(|owner| owner == build_config)
            })
            .map(|(_, build)| build.clone())
            .collect())
    }
}
