//! Create-or-repair of the objects a PackageBuild owns.
//!
//! Absent children are created; an `AlreadyExists` from a concurrent creator
//! counts as success. An existing ConfigMap or BuildConfig must carry a
//! controller owner reference to the PackageBuild; one that does not is a
//! name collision and is never touched. Owned children matching the desired
//! payload are left alone. Drifted ConfigMaps are recreated (they are
//! immutable) and drifted BuildConfigs are replaced in place. ImageStreams may
//! be shared and are never overwritten.

use super::Reconciler;
use crate::builders::DesiredChildren;
use crate::error::ControllerError;
use build_store::StoreError;
use crds::openshift::{BuildConfig, ImageStream};
use k8s_openapi::api::core::v1::ConfigMap;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use tracing::{debug, error, info, warn};

/// What an ensure step did to a child
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildOutcome {
    Created,
    Unchanged,
    Replaced,
}

fn child_key(meta: &ObjectMeta) -> Result<(&str, &str), ControllerError> {
    let namespace = meta
        .namespace
        .as_deref()
        .ok_or(ControllerError::MissingObjectKey("metadata.namespace"))?;
    let name = meta
        .name
        .as_deref()
        .ok_or(ControllerError::MissingObjectKey("metadata.name"))?;
    Ok((namespace, name))
}

fn controller_uid(meta: &ObjectMeta) -> Option<&str> {
    meta.owner_references
        .as_ref()?
        .iter()
        .find(|owner| owner.controller == Some(true))
        .map(|owner| owner.uid.as_str())
}

/// Refuse to manage an existing object the desired child's owner does not control.
fn check_owned(kind: &str, existing: &ObjectMeta, desired: &ObjectMeta) -> Result<(), ControllerError> {
    let (namespace, name) = child_key(desired)?;
    let owner = controller_uid(desired).ok_or(ControllerError::MissingObjectKey("metadata.uid"))?;
    if controller_uid(existing) == Some(owner) {
        return Ok(());
    }
    error!("{} {}/{} exists but is not controlled by its PackageBuild", kind, namespace, name);
    Err(ControllerError::ForeignChild(format!("{} {}/{}", kind, namespace, name)))
}

/// Map a create result, treating a lost creation race as success.
fn created<T>(kind: &str, namespace: &str, name: &str, result: Result<T, StoreError>) -> Result<ChildOutcome, ControllerError> {
    match result {
        Ok(_) => {
            info!("Created {} {}/{}", kind, namespace, name);
            Ok(ChildOutcome::Created)
        }
        Err(StoreError::AlreadyExists(_)) => {
            debug!("{} {}/{} already exists", kind, namespace, name);
            Ok(ChildOutcome::Unchanged)
        }
        Err(e) => {
            error!("Failed to create {} {}/{}: {}", kind, namespace, name, e);
            Err(e.into())
        }
    }
}

impl Reconciler {
    /// Bring every owned child in line with `desired`.
    pub(crate) async fn ensure_children(&self, desired: &DesiredChildren) -> Result<(), ControllerError> {
        let outcomes = [
            self.ensure_config_map(&desired.config_map).await?,
            self.ensure_image_stream(&desired.image_stream).await?,
            self.ensure_build_config(&desired.build_config).await?,
        ];
        if outcomes.iter().all(|outcome| *outcome == ChildOutcome::Unchanged) {
            let (namespace, name) = child_key(&desired.config_map.metadata)?;
            debug!("Children next to ConfigMap {}/{} are up to date", namespace, name);
        }
        Ok(())
    }

    pub(crate) async fn ensure_config_map(&self, desired: &ConfigMap) -> Result<ChildOutcome, ControllerError> {
        let (namespace, name) = child_key(&desired.metadata)?;

        let Some(existing) = self.store.get_config_map(namespace, name).await? else {
            return created("ConfigMap", namespace, name, self.store.create_config_map(desired).await);
        };
        check_owned("ConfigMap", &existing.metadata, &desired.metadata)?;
        if existing.data == desired.data {
            debug!("ConfigMap {}/{} is up to date", namespace, name);
            return Ok(ChildOutcome::Unchanged);
        }

        warn!("ConfigMap {}/{} drifted from its PackageBuild, recreating it", namespace, name);
        match self.store.delete_config_map(namespace, name).await {
            Ok(()) | Err(StoreError::NotFound(_)) => {}
            Err(e) => {
                error!("Failed to delete ConfigMap {}/{}: {}", namespace, name, e);
                return Err(e.into());
            }
        }
        created("ConfigMap", namespace, name, self.store.create_config_map(desired).await)?;
        Ok(ChildOutcome::Replaced)
    }

    pub(crate) async fn ensure_image_stream(&self, desired: &ImageStream) -> Result<ChildOutcome, ControllerError> {
        let (namespace, name) = child_key(&desired.metadata)?;

        if self.store.get_image_stream(namespace, name).await?.is_some() {
            debug!("ImageStream {}/{} exists", namespace, name);
            return Ok(ChildOutcome::Unchanged);
        }
        created("ImageStream", namespace, name, self.store.create_image_stream(desired).await)
    }

    pub(crate) async fn ensure_build_config(&self, desired: &BuildConfig) -> Result<ChildOutcome, ControllerError> {
        let (namespace, name) = child_key(&desired.metadata)?;

        let Some(existing) = self.store.get_build_config(namespace, name).await? else {
            return created("BuildConfig", namespace, name, self.store.create_build_config(desired).await);
        };
        check_owned("BuildConfig", &existing.metadata, &desired.metadata)?;
        if existing.spec == desired.spec {
            debug!("BuildConfig {}/{} is up to date", namespace, name);
            return Ok(ChildOutcome::Unchanged);
        }

        warn!("BuildConfig {}/{} drifted from its PackageBuild, replacing it", namespace, name);
        let mut replacement = desired.clone();
        replacement.metadata.resource_version = existing.metadata.resource_version;
        match self.store.replace_build_config(&replacement).await {
            Ok(_) => {
                info!("Replaced BuildConfig {}/{}", namespace, name);
                Ok(ChildOutcome::Replaced)
            }
            Err(e) => {
                error!("Failed to replace BuildConfig {}/{}: {}", namespace, name, e);
                Err(e.into())
            }
        }
    }
}
