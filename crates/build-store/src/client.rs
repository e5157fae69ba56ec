//! Kubernetes-backed store

use crate::error::StoreError;
use crate::store_trait::BuildStore;
use crds::PackageBuild;
use crds::openshift::{BUILD_CONFIG_LABEL, Build, BuildConfig, ImageStream};
use k8s_openapi::NamespaceResourceScope;
use k8s_openapi::api::core::v1::ConfigMap;
use kube::api::{Api, DeleteParams, ListParams, Patch, PatchParams, PostParams};
use kube::{Client, Resource, ResourceExt};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::fmt::Debug;
use tracing::debug;

/// [`BuildStore`] over the Kubernetes API server
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl KubeStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a client from the in-cluster or kubeconfig environment.
    pub async fn try_default() -> Result<Self, StoreError> {
        Ok(Self::new(Client::try_default().await?))
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    fn api<K>(&self, namespace: &str) -> Api<K>
    where
        K: Resource<Scope = NamespaceResourceScope>,
        K::DynamicType: Default,
    {
        Api::namespaced(self.client.clone(), namespace)
    }

    async fn get<K>(&self, namespace: &str, name: &str) -> Result<Option<K>, StoreError>
    where
        K: Resource<Scope = NamespaceResourceScope> + Clone + DeserializeOwned + Debug,
        K::DynamicType: Default,
    {
        Ok(self.api::<K>(namespace).get_opt(name).await?)
    }

    async fn create<K>(&self, obj: &K) -> Result<K, StoreError>
    where
        K: Resource<Scope = NamespaceResourceScope> + Clone + DeserializeOwned + Serialize + Debug,
        K::DynamicType: Default,
    {
        let namespace = obj
            .meta()
            .namespace
            .as_deref()
            .ok_or(StoreError::MissingField("metadata.namespace"))?;
        debug!(namespace = %namespace, name = %obj.name_any(), "Creating object");
        Ok(self.api::<K>(namespace).create(&PostParams::default(), obj).await?)
    }
}

#[async_trait::async_trait]
impl BuildStore for KubeStore {
    async fn get_package_build(&self, namespace: &str, name: &str) -> Result<Option<PackageBuild>, StoreError> {
        self.get(namespace, name).await
    }

    async fn update_package_build_status(&self, build: &PackageBuild) -> Result<PackageBuild, StoreError> {
        let namespace = build
            .metadata
            .namespace
            .as_deref()
            .ok_or(StoreError::MissingField("metadata.namespace"))?;
        let name = build
            .metadata
            .name
            .as_deref()
            .ok_or(StoreError::MissingField("metadata.name"))?;
        let resource_version = build
            .metadata
            .resource_version
            .as_deref()
            .ok_or(StoreError::MissingField("metadata.resourceVersion"))?;

        // A merge patch carrying resourceVersion is rejected with 409 when stale
        let patch = json!({
            "metadata": { "resourceVersion": resource_version },
            "status": build.status,
        });
        let api: Api<PackageBuild> = self.api(namespace);
        Ok(api
            .patch_status(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?)
    }

    async fn get_config_map(&self, namespace: &str, name: &str) -> Result<Option<ConfigMap>, StoreError> {
        self.get(namespace, name).await
    }

    async fn create_config_map(&self, config_map: &ConfigMap) -> Result<ConfigMap, StoreError> {
        self.create(config_map).await
    }

    async fn delete_config_map(&self, namespace: &str, name: &str) -> Result<(), StoreError> {
        let api: Api<ConfigMap> = self.api(namespace);
        api.delete(name, &DeleteParams::default()).await?;
        Ok(())
    }

    async fn get_build_config(&self, namespace: &str, name: &str) -> Result<Option<BuildConfig>, StoreError> {
        self.get(namespace, name).await
    }

    async fn create_build_config(&self, build_config: &BuildConfig) -> Result<BuildConfig, StoreError> {
        self.create(build_config).await
    }

    async fn replace_build_config(&self, build_config: &BuildConfig) -> Result<BuildConfig, StoreError> {
        let namespace = build_config
            .metadata
            .namespace
            .as_deref()
            .ok_or(StoreError::MissingField("metadata.namespace"))?;
        let name = build_config
            .metadata
            .name
            .as_deref()
            .ok_or(StoreError::MissingField("metadata.name"))?;
        let api: Api<BuildConfig> = self.api(namespace);
        Ok(api.replace(name, &PostParams::default(), build_config).await?)
    }

    async fn get_image_stream(&self, namespace: &str, name: &str) -> Result<Option<ImageStream>, StoreError> {
        self.get(namespace, name).await
    }

    async fn create_image_stream(&self, image_stream: &ImageStream) -> Result<ImageStream, StoreError> {
        self.create(image_stream).await
    }

    async fn list_builds(&self, namespace: &str, build_config: &str) -> Result<Vec<Build>, StoreError> {
        let api: Api<Build> = self.api(namespace);
        let params = ListParams::default().labels(&format!("{BUILD_CONFIG_LABEL}={build_config}"));
        Ok(api.list(&params).await?.items)
    }
}
