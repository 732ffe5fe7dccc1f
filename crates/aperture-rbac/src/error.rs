//! Error types for the permission model.

use thiserror::Error;

/// Errors raised by administrative operations on a [`crate::SecurityRealm`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RealmError {
    #[error("Role already exists: {0}")]
    RoleExists(String),

    #[error("Role not found: {0}")]
    RoleNotFound(String),

    #[error("Principal already exists: {0}")]
    PrincipalExists(String),

    #[error("Principal not found: {0}")]
    PrincipalNotFound(String),

    #[error("Internal realm error: {0}")]
    Internal(String),
}

impl RealmError {
    pub(crate) fn poisoned() -> Self {
        RealmError::Internal("lock poisoned".to_string())
    }
}

/// Authorization failure.
///
/// Kept distinct from a plain `false` so the boundary layer can decide how
/// to present it (redirect to login vs. show a denial).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AccessError {
    /// No principal is authenticated on the session.
    #[error("Authentication required")]
    Unauthenticated,

    /// Authenticated, but a role or permission requirement is not met.
    #[error("Access denied. {requirement}")]
    AccessDenied { requirement: String },

    #[error("Internal access check error: {0}")]
    Internal(String),
}

impl AccessError {
    pub fn denied(requirement: impl Into<String>) -> Self {
        AccessError::AccessDenied {
            requirement: requirement.into(),
        }
    }

    /// Returns whether this is a denial (as opposed to a missing login).
    pub fn is_denied(&self) -> bool {
        matches!(self, AccessError::AccessDenied { .. })
    }
}

impl From<RealmError> for AccessError {
    fn from(err: RealmError) -> Self {
        AccessError::Internal(err.to_string())
    }
}
