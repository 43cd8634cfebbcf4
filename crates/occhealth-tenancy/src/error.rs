//! Error types for tenancy operations
//!
//! This module defines the errors raised while loading organization data,
//! persisting selections and administering client relationships.

use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

use crate::config::ConfigError;
use crate::storage::StorageError;

/// Tenancy error types.
///
/// Inside the tenant context store these never reach consumers as errors:
/// load failures become the store's `last_error` flag and caller misuse is a
/// logged no-op. They surface directly only from the loaders and the
/// administration API.
#[derive(Debug, Error)]
pub enum TenancyError {
    /// The backend could not be reached or rejected the query
    #[error("Backend error: {0}")]
    Backend(String),

    /// A backend call exceeded the configured load timeout
    #[error("Backend request timed out after {0:?}")]
    Timeout(Duration),

    /// Persisting the selection failed
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Configuration is invalid
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// No organization with this ID
    #[error("Organization not found: {0}")]
    OrganizationNotFound(Uuid),

    /// No relationship with this ID
    #[error("Relationship not found: {0}")]
    RelationshipNotFound(Uuid),

    /// The organization exists but cannot manage clients
    #[error("Organization {0} is not a service provider")]
    NotServiceProvider(Uuid),

    /// Request data failed validation
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type for tenancy operations.
pub type TenancyResult<T> = Result<T, TenancyError>;

impl TenancyError {
    /// Check if retrying the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, TenancyError::Backend(_) | TenancyError::Timeout(_))
    }

    /// Get error code for API responses.
    pub fn error_code(&self) -> &'static str {
        match self {
            TenancyError::Backend(_) => "BACKEND_ERROR",
            TenancyError::Timeout(_) => "BACKEND_TIMEOUT",
            TenancyError::Storage(_) => "STORAGE_ERROR",
            TenancyError::Config(_) => "CONFIG_ERROR",
            TenancyError::OrganizationNotFound(_) => "ORGANIZATION_NOT_FOUND",
            TenancyError::RelationshipNotFound(_) => "RELATIONSHIP_NOT_FOUND",
            TenancyError::NotServiceProvider(_) => "NOT_SERVICE_PROVIDER",
            TenancyError::InvalidInput(_) => "INVALID_INPUT",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable() {
        assert!(TenancyError::Backend("connection reset".into()).is_retryable());
        assert!(TenancyError::Timeout(Duration::from_secs(1)).is_retryable());
        assert!(!TenancyError::NotServiceProvider(Uuid::nil()).is_retryable());
        assert!(!TenancyError::InvalidInput("name".into()).is_retryable());
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(
            TenancyError::OrganizationNotFound(Uuid::nil()).error_code(),
            "ORGANIZATION_NOT_FOUND"
        );
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only");
        let err: TenancyError = StorageError::from(io).into();
        assert_eq!(err.error_code(), "STORAGE_ERROR");
        assert!(err.to_string().contains("read-only"));
    }
}
