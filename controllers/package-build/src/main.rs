//! PackageBuild Controller
//!
//! Drives `PackageBuild` resources through their lifecycle:
//! - Empty: creates the environment ConfigMap, ImageStream and BuildConfig
//! - Applied: waits for the BuildConfig's build and marks the resource validated
//! - Validated: keeps the children in line with the spec
//!
//! Children are owned by their `PackageBuild` and garbage collected with it.

mod backoff;
mod builders;
mod config;
mod controller;
mod error;
mod reconciler;
mod watcher;
#[cfg(test)]
mod test_utils;

use crate::config::Settings;
use crate::error::ControllerError;
use controller::Controller;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), ControllerError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // kube's rustls client needs a process-wide crypto provider
    if rustls::crypto::ring::default_provider().install_default().is_err() {
        warn!("rustls crypto provider was already installed");
    }

    info!("Starting PackageBuild Controller");

    let settings = Settings::from_env()?;

    info!("Configuration:");
    info!("  Namespace: {}", settings.watch_namespace.as_deref().unwrap_or("all namespaces"));
    info!("  Base build image: {}", settings.base_build_image);
    info!("  Build logic ConfigMap: {}", settings.build_logic_config_map);
    info!("  Build history limit: {}", settings.build_history_limit);
    info!("  Concurrency: {}", settings.concurrency);
    info!("  Debounce: {:?}", settings.debounce);

    let controller = Controller::new(settings).await?;
    controller.run().await?;

    Ok(())
}
