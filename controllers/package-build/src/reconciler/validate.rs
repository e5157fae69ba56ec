//! `Applied -> Validated | Error`, and the drift check of validated builds

use super::{IDLE_INTERVAL, Reconciler, SETTLE_INTERVAL, object_key};
use crate::builders::{self, DesiredChildren};
use crate::error::ControllerError;
use crds::openshift::{Build, BuildConfig, BuildPhase, latest_build};
use crds::{InstallStatus, PackageBuild};
use kube_runtime::controller::Action;
use tracing::{debug, info, warn};

impl Reconciler {
    /// Validates an applied PackageBuild against its most recent build.
    ///
    /// A failed build moves the resource to `Error` and a running one is
    /// checked again shortly. The resource validates once the newest listed
    /// build is complete and no newer one has been started, or when the
    /// BuildConfig has started none. A started build that is not listed yet
    /// is waited for.
    pub(crate) async fn validate_build(&self, build: &PackageBuild) -> Result<Action, ControllerError> {
        let (namespace, name) = object_key(build)?;
        info!("Validating package build {}/{}", namespace, name);

        let desired = DesiredChildren::for_package_build(build, &self.settings)?;
        self.ensure_children(&desired).await?;

        match self.latest_build(namespace, name).await? {
            Some(latest) if latest.phase().is_failure() => {
                self.fail_from_build(build, &latest).await
            }
            Some(latest) if latest.phase() != BuildPhase::Complete => {
                info!(
                    "PackageBuild {}/{} waiting for build {} ({:?})",
                    namespace,
                    name,
                    latest.metadata.name.as_deref().unwrap_or("<unknown>"),
                    latest.phase()
                );
                Ok(Action::requeue(SETTLE_INTERVAL))
            }
            latest => {
                let started = self.last_started_build(namespace, name).await?;
                let listed = latest.as_ref().and_then(Build::number).unwrap_or(0);
                if started > listed {
                    info!(
                        "PackageBuild {}/{} waiting for build {} to be listed",
                        namespace, name, started
                    );
                    return Ok(Action::requeue(SETTLE_INTERVAL));
                }
                self.transition(build, InstallStatus::Validated, None).await?;
                Ok(Action::requeue(SETTLE_INTERVAL))
            }
        }
    }

    /// Re-checks a validated PackageBuild without ever moving it backwards.
    pub(crate) async fn observe_validated(&self, build: &PackageBuild) -> Result<Action, ControllerError> {
        let (namespace, name) = object_key(build)?;

        let desired = DesiredChildren::for_package_build(build, &self.settings)?;
        self.ensure_children(&desired).await?;

        if let Some(latest) = self.latest_build(namespace, name).await? {
            if latest.phase().is_failure() {
                return self.fail_from_build(build, &latest).await;
            }
        }

        debug!("PackageBuild {}/{} is validated", namespace, name);
        Ok(Action::requeue(IDLE_INTERVAL))
    }

    async fn fail_from_build(&self, build: &PackageBuild, latest: &Build) -> Result<Action, ControllerError> {
        let (namespace, name) = object_key(build)?;
        let message = latest.failure_message();
        warn!("PackageBuild {}/{}: {}", namespace, name, message);
        self.transition(build, InstallStatus::Error, Some(message)).await?;
        Ok(Action::requeue(IDLE_INTERVAL))
    }

    /// Last build number the BuildConfig reports having started.
    async fn last_started_build(&self, namespace: &str, name: &str) -> Result<u64, ControllerError> {
        let config = self
            .store
            .get_build_config(namespace, &builders::build_config_name(name))
            .await?;
        Ok(config.as_ref().map(BuildConfig::last_version).unwrap_or(0))
    }

    /// Most recent build started from this PackageBuild's BuildConfig.
    async fn latest_build(&self, namespace: &str, name: &str) -> Result<Option<Build>, ControllerError> {
        let builds = self
            .store
            .list_builds(namespace, &builders::build_config_name(name))
            .await?;
        Ok(latest_build(&builds).cloned())
    }
}
