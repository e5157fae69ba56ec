//! Controller-specific error types.

use build_store::StoreError;
use kube::Error as KubeError;
use thiserror::Error;

/// Errors that can occur in the PackageBuild Controller.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Kubernetes API error
    #[error("Kubernetes error: {0}")]
    Kube(#[from] KubeError),

    /// Resource store error
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// PackageBuild spec cannot be turned into build resources
    #[error("Invalid PackageBuild spec: {0}")]
    InvalidSpec(String),

    /// Object lacks the namespace, name or uid needed to address it
    #[error("Object is missing {0}")]
    MissingObjectKey(&'static str),

    /// A child's name is taken by an object the PackageBuild does not control
    #[error("{0} already exists and is not controlled by this PackageBuild")]
    ForeignChild(String),

    /// Status write kept hitting stale resource versions
    #[error("Status update for PackageBuild {0} kept conflicting")]
    StatusConflict(String),

    /// Resource watch failed
    #[error("Resource watch failed: {0}")]
    Watch(String),
}

impl ControllerError {
    /// Errors that retrying cannot fix; they move the resource to `Error`.
    pub fn is_unrecoverable(&self) -> bool {
        matches!(
            self,
            Self::InvalidSpec(_) | Self::ForeignChild(_) | Self::Store(StoreError::Invalid(_))
        )
    }
}
