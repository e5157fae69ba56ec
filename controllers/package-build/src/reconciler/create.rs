//! `Empty -> Applied`

use super::{Reconciler, SETTLE_INTERVAL, object_key};
use crate::builders::{self, DesiredChildren};
use crate::error::ControllerError;
use crds::{InstallStatus, PackageBuild};
use kube_runtime::controller::Action;
use tracing::{info, warn};

impl Reconciler {
    /// Creates the build resources of a new PackageBuild and marks it applied.
    ///
    /// Every step is safe to repeat: children are rebuilt from the spec and
    /// ensured, so a pass interrupted before the status write simply runs again.
    pub(crate) async fn create_build(&self, build: &PackageBuild) -> Result<Action, ControllerError> {
        let (namespace, name) = object_key(build)?;
        info!("Creating package build {}/{}", namespace, name);

        let desired = DesiredChildren::for_package_build(build, &self.settings)?;
        let ignored = builders::ignored_environments(build);
        if !ignored.is_empty() {
            warn!(
                "PackageBuild {}/{} lists {} environments, only the first is built; ignoring {:?}",
                namespace,
                name,
                build.spec.environment.len(),
                ignored
            );
        }

        self.ensure_children(&desired).await?;
        self.transition(build, InstallStatus::Applied, None).await?;

        Ok(Action::requeue(SETTLE_INTERVAL))
    }
}
