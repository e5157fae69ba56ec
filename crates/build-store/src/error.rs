//! Store errors

use thiserror::Error;

/// Errors returned by a [`BuildStore`](crate::BuildStore)
#[derive(Debug, Error)]
pub enum StoreError {
    /// Object does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Create raced with another writer that got there first
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Write carried a stale resource version
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Object was rejected by validation or admission
    #[error("Invalid object: {0}")]
    Invalid(String),

    /// Object handed to the store lacks a field the call needs
    #[error("Missing field: {0}")]
    MissingField(&'static str),

    /// Any other Kubernetes API or transport failure
    #[error("Kubernetes error: {0}")]
    Kube(#[source] kube::Error),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// Classify a kube client error by HTTP status code and reason.
    pub fn from_kube(err: kube::Error) -> Self {
        match err {
            kube::Error::Api(ae) if ae.code == 404 => Self::NotFound(ae.message.clone()),
            kube::Error::Api(ae) if ae.code == 409 && ae.reason == "AlreadyExists" => {
                Self::AlreadyExists(ae.message.clone())
            }
            kube::Error::Api(ae) if ae.code == 409 => Self::Conflict(ae.message.clone()),
            kube::Error::Api(ae) if ae.code == 400 || ae.code == 422 => {
                Self::Invalid(ae.message.clone())
            }
            other => Self::Kube(other),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

impl From<kube::Error> for StoreError {
    fn from(err: kube::Error) -> Self {
        Self::from_kube(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api_error(code: u16, reason: &str) -> kube::Error {
        kube::Error::Api(kube::error::ErrorResponse {
            status: "Failure".to_string(),
            message: format!("{reason} ({code})"),
            reason: reason.to_string(),
            code,
        })
    }

    #[test]
    fn test_not_found() {
        let err = StoreError::from(api_error(404, "NotFound"));
        assert!(err.is_not_found(), "{err}");
    }

    #[test]
    fn test_already_exists_is_not_a_conflict() {
        let err = StoreError::from(api_error(409, "AlreadyExists"));
        assert!(matches!(err, StoreError::AlreadyExists(_)), "{err}");
        assert!(!err.is_conflict());
    }

    #[test]
    fn test_stale_write_is_a_conflict() {
        let err = StoreError::from(api_error(409, "Conflict"));
        assert!(err.is_conflict(), "{err}");
    }

    #[test]
    fn test_rejections_are_invalid() {
        for (code, reason) in [(422, "Invalid"), (400, "BadRequest")] {
            let err = StoreError::from(api_error(code, reason));
            assert!(matches!(err, StoreError::Invalid(_)), "{code}: {err}");
        }
    }

    #[test]
    fn test_other_failures_stay_kube_errors() {
        for (code, reason) in [(500, "InternalError"), (403, "Forbidden")] {
            let err = StoreError::from(api_error(code, reason));
            assert!(matches!(err, StoreError::Kube(kube::Error::Api(ref ae)) if ae.code == code), "{err}");
        }
    }
}
