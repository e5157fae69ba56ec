//! Main controller implementation.
//!
//! Builds the Kubernetes client and the reconciler, then runs the
//! PackageBuild watcher until it stops.

use crate::config::Settings;
use crate::error::ControllerError;
use crate::reconciler::Reconciler;
use crate::watcher::watch_package_builds;
use build_store::KubeStore;
use kube::Client;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;

/// Main controller for PackageBuild resources.
pub struct Controller {
    package_build_watcher: JoinHandle<Result<(), ControllerError>>,
}

impl Controller {
    /// Creates a new controller instance and starts its watcher.
    pub async fn new(settings: Settings) -> Result<Self, ControllerError> {
        info!("Initializing PackageBuild Controller");

        let client = Client::try_default().await?;
        let store = KubeStore::new(client.clone());
        let reconciler = Arc::new(Reconciler::new(store, settings.clone()));

        let package_build_watcher = tokio::spawn(watch_package_builds(client, reconciler, settings));

        Ok(Self { package_build_watcher })
    }

    /// Runs the controller until shutdown.
    pub async fn run(self) -> Result<(), ControllerError> {
        info!("PackageBuild Controller running");

        self.package_build_watcher
            .await
            .map_err(|e| ControllerError::Watch(format!("PackageBuild watcher panicked: {}", e)))??;

        info!("PackageBuild Controller stopped");
        Ok(())
    }
}
