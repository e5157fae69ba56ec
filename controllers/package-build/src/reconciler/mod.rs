//! Reconciliation logic for PackageBuild resources.
//!
//! Each pass starts from the namespaced name alone and re-reads everything it
//! needs, so passes can be repeated after a crash or a coalesced event.
//!
//! - `create`: `Empty -> Applied`
//! - `validate`: `Applied -> Validated | Error`, and drift checks once validated
//! - `children`: idempotent create-or-repair of owned objects

mod children;
mod create;
mod validate;


use crate::backoff::FibonacciBackoff;
use crate::config::Settings;
use crate::error::ControllerError;
use build_store::{BuildStore, StoreError};
use chrono::Utc;
use crds::{InstallStatus, PackageBuild, PackageBuildStatus};
use kube_runtime::controller::Action;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Delay before looking again after children or status were just written
pub const SETTLE_INTERVAL: Duration = Duration::from_secs(3);

/// Delay between drift checks on a resource that needs nothing
pub const IDLE_INTERVAL: Duration = Duration::from_secs(5);

/// Status writes attempted before giving up on conflicts
const STATUS_WRITE_ATTEMPTS: usize = 3;

const BACKOFF_MIN_SECONDS: u64 = 1;
const BACKOFF_MAX_SECONDS: u64 = 60;

/// Backoff state for a resource
#[derive(Debug, Clone)]
struct BackoffState {
    backoff: FibonacciBackoff,
    error_count: u32,
}

impl BackoffState {
    fn new() -> Self {
        Self {
            backoff: FibonacciBackoff::new(BACKOFF_MIN_SECONDS, BACKOFF_MAX_SECONDS),
            error_count: 0,
        }
    }

    fn increment_error(&mut self) {
        self.error_count += 1;
    }

    fn reset(&mut self) {
        self.error_count = 0;
        self.backoff.reset();
    }
}

/// Reconciles PackageBuild resources.
pub struct Reconciler {
    pub(crate) store: Box<dyn BuildStore>,
    pub(crate) settings: Settings,
    /// Error count tracking per resource (namespace/name -> BackoffState)
    backoff_states: Arc<Mutex<HashMap<String, BackoffState>>>,
}

/// Namespace and name of a fetched resource.
pub(crate) fn object_key(build: &PackageBuild) -> Result<(&str, &str), ControllerError> {
    let namespace = build
        .metadata
        .namespace
        .as_deref()
        .ok_or(ControllerError::MissingObjectKey("metadata.namespace"))?;
    let name = build
        .metadata
        .name
        .as_deref()
        .ok_or(ControllerError::MissingObjectKey("metadata.name"))?;
    Ok((namespace, name))
}

impl Reconciler {
    /// Creates a new reconciler instance.
    pub fn new(store: impl BuildStore + 'static, settings: Settings) -> Self {
        Self {
            store: Box::new(store),
            settings,
            backoff_states: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Runs one reconcile pass for `namespace/name`.
    pub async fn reconcile(&self, namespace: &str, name: &str) -> Result<Action, ControllerError> {
        let key = format!("{}/{}", namespace, name);

        let build = match self.store.get_package_build(namespace, name).await {
            Ok(Some(build)) => build,
            Ok(None) | Err(StoreError::NotFound(_)) => {
                info!("PackageBuild {} not found, assuming it was deleted", key);
                self.forget(&key);
                return Ok(Action::await_change());
            }
            Err(e) => {
                error!("Failed to get PackageBuild {}: {}", key, e);
                return Err(e.into());
            }
        };

        let state = build.install_status();
        debug!("Reconciling PackageBuild {} in state {}", key, state);

        let result = match state {
            InstallStatus::Empty => self.create_build(&build).await,
            InstallStatus::Applied => self.validate_build(&build).await,
            InstallStatus::Validated => self.observe_validated(&build).await,
            InstallStatus::Error => {
                debug!("PackageBuild {} is in error, nothing to do", key);
                Ok(Action::requeue(IDLE_INTERVAL))
            }
        };

        let result = match result {
            Err(e) if e.is_unrecoverable() => self.fail_build(&build, &e).await,
            other => other,
        };
        if result.is_ok() {
            self.reset_backoff(&key);
        }
        result
    }

    /// Move a resource to `Error` because of `cause`.
    async fn fail_build(&self, build: &PackageBuild, cause: &ControllerError) -> Result<Action, ControllerError> {
        let (namespace, name) = object_key(build)?;
        error!("PackageBuild {}/{} cannot be built: {}", namespace, name, cause);
        self.transition(build, InstallStatus::Error, Some(cause.to_string())).await?;
        Ok(Action::requeue(IDLE_INTERVAL))
    }

    /// Write `next` as the resource's state and return the re-fetched resource.
    ///
    /// Retries on conflict against a fresh copy, re-checking that `next` is
    /// still a forward move. When another writer already moved the resource
    /// past `next` the write is skipped and the fresh copy returned.
    pub(crate) async fn transition(
        &self,
        build: &PackageBuild,
        next: InstallStatus,
        message: Option<String>,
    ) -> Result<PackageBuild, ControllerError> {
        let (namespace, name) = object_key(build)?;
        let mut current = build.clone();

        for attempt in 1..=STATUS_WRITE_ATTEMPTS {
            let state = current.install_status();
            if !state.can_advance_to(next) {
                debug!(
                    "PackageBuild {}/{} is already {}, not moving it to {}",
                    namespace, name, state, next
                );
                return Ok(current);
            }

            let mut desired = current.clone();
            desired.status = Some(PackageBuildStatus {
                state: next,
                message: message.clone(),
                last_transition_time: Some(Utc::now()),
            });

            match self.store.update_package_build_status(&desired).await {
                Ok(_) => {
                    info!("PackageBuild {}/{} moved from {} to {}", namespace, name, state, next);
                    return self.refetch(namespace, name).await;
                }
                Err(StoreError::Conflict(msg)) => {
                    warn!(
                        "Status update conflict for PackageBuild {}/{} (attempt {}/{}): {}",
                        namespace, name, attempt, STATUS_WRITE_ATTEMPTS, msg
                    );
                    current = self.refetch(namespace, name).await?;
                }
                Err(e) => {
                    error!("Failed to update PackageBuild {}/{} status: {}", namespace, name, e);
                    return Err(e.into());
                }
            }
        }

        Err(ControllerError::StatusConflict(format!("{}/{}", namespace, name)))
    }

    /// Fresh copy of a resource that must still exist.
    async fn refetch(&self, namespace: &str, name: &str) -> Result<PackageBuild, ControllerError> {
        match self.store.get_package_build(namespace, name).await {
            Ok(Some(build)) => Ok(build),
            Ok(None) => {
                error!("PackageBuild {}/{} disappeared during reconciliation", namespace, name);
                Err(StoreError::NotFound(format!("PackageBuild {}/{}", namespace, name)).into())
            }
            Err(e) => {
                error!("Failed to refresh PackageBuild {}/{}: {}", namespace, name, e);
                Err(e.into())
            }
        }
    }

    fn backoff_states(&self) -> MutexGuard<'_, HashMap<String, BackoffState>> {
        self.backoff_states.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Delay before retrying `key` after a failed pass.
    pub fn error_backoff(&self, key: &str) -> Duration {
        let mut states = self.backoff_states();
        let state = states.entry(key.to_string()).or_insert_with(BackoffState::new);
        state.increment_error();
        let delay = state.backoff.next_backoff();
        debug!("PackageBuild {} failed {} time(s) in a row", key, state.error_count);
        delay
    }

    fn reset_backoff(&self, key: &str) {
        if let Some(state) = self.backoff_states().get_mut(key) {
            state.reset();
        }
    }

    fn forget(&self, key: &str) {
        self.backoff_states().remove(key);
    }
}
