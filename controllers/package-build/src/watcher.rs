//! Kubernetes resource watchers.
//!
//! Wires the reconciler into `kube_runtime::Controller`, which supplies the
//! deduplicating work queue, per-object serialization and bounded concurrency.
//! The controller watches `PackageBuild` objects and the children they own.

use crate::config::Settings;
use crate::error::ControllerError;
use crate::reconciler::Reconciler;
use crds::PackageBuild;
use crds::openshift::{BuildConfig, ImageStream};
use futures::StreamExt;
use k8s_openapi::NamespaceResourceScope;
use k8s_openapi::api::apps::v1::DaemonSet;
use k8s_openapi::api::core::v1::Pod;
use kube::{Api, Client, Resource, ResourceExt};
use kube_runtime::reflector::ObjectRef;
use kube_runtime::{Controller, watcher, controller::{Action, Config as ControllerConfig}};
use std::sync::Arc;
use tracing::{debug, error, info};

fn scoped_api<K>(client: &Client, namespace: Option<&str>) -> Api<K>
where
    K: Resource<Scope = NamespaceResourceScope>,
    K::DynamicType: Default,
{
    match namespace {
        Some(ns) => Api::namespaced(client.clone(), ns),
        None => Api::all(client.clone()),
    }
}

/// Maps a child to the PackageBuild controlling it.
///
/// Objects without a name, a namespace or a controlling PackageBuild owner are
/// dropped rather than triggering a reconcile.
pub(crate) fn owner_key<K: Resource>(child: K) -> Option<ObjectRef<PackageBuild>> {
    let namespace = child.namespace()?;
    child.meta().name.as_ref()?;

    let kind = PackageBuild::kind(&());
    let api_version = PackageBuild::api_version(&());
    let owner = child.owner_references().iter().find(|owner| {
        owner.controller == Some(true)
            && owner.kind == *kind
            && owner.api_version == *api_version
    })?;

    Some(ObjectRef::new(&owner.name).within(&namespace))
}

async fn reconcile(build: Arc<PackageBuild>, reconciler: Arc<Reconciler>) -> Result<Action, ControllerError> {
    // Only the key is used; the reconciler re-reads current state
    let namespace = build
        .namespace()
        .ok_or(ControllerError::MissingObjectKey("metadata.namespace"))?;
    reconciler.reconcile(&namespace, &build.name_any()).await
}

fn error_policy(build: Arc<PackageBuild>, error: &ControllerError, reconciler: Arc<Reconciler>) -> Action {
    let key = format!("{}/{}", build.namespace().unwrap_or_default(), build.name_any());
    let delay = reconciler.error_backoff(&key);
    error!("Reconciliation error for PackageBuild {}: {} (retrying in {:?})", key, error, delay);
    Action::requeue(delay)
}

/// Watches PackageBuild resources and their children until shutdown.
pub async fn watch_package_builds(
    client: Client,
    reconciler: Arc<Reconciler>,
    settings: Settings,
) -> Result<(), ControllerError> {
    info!("Starting PackageBuild watcher");

    let namespace = settings.watch_namespace.as_deref();
    let package_builds: Api<PackageBuild> = scoped_api(&client, namespace);
    let pods: Api<Pod> = scoped_api(&client, namespace);
    let daemon_sets: Api<DaemonSet> = scoped_api(&client, namespace);
    let build_configs: Api<BuildConfig> = scoped_api(&client, namespace);
    let image_streams: Api<ImageStream> = scoped_api(&client, namespace);

    let controller_config = ControllerConfig::default()
        .debounce(settings.debounce)
        .concurrency(settings.concurrency);

    Controller::new(package_builds, watcher::Config::default())
        .owns(pods, watcher::Config::default())
        .owns(daemon_sets, watcher::Config::default())
        .watches(build_configs, watcher::Config::default(), owner_key::<BuildConfig>)
        .watches(image_streams, watcher::Config::default(), owner_key::<ImageStream>)
        .with_config(controller_config)
        .shutdown_on_signal()
        .run(reconcile, error_policy, reconciler)
        .for_each(|res| async move {
            match res {
                Ok((obj, action)) => debug!("Reconciled PackageBuild {}: {:?}", obj, action),
                Err(e) => error!("Controller error for PackageBuild: {}", e),
            }
        })
        .await;

    info!("PackageBuild watcher stopped");
    Ok(())
}
