//! Error types for the invocation layer.

use aperture_config::ConfigError;
use aperture_metamodel::MetamodelError;
use aperture_rbac::{AccessError, RealmError};
use thiserror::Error;

/// Errors raised by the object store.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Object is not a domain object: {type_name}")]
    NotADomainObject { type_name: String },

    #[error("Internal store error: {0}")]
    Internal(String),
}

/// Errors raised while publishing a domain event.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EventError {
    /// A listener refused the event during the validate phase.
    #[error("Vetoed: {0}")]
    Vetoed(String),

    #[error("Internal event bus error: {0}")]
    Internal(String),
}

/// Errors raised by [`crate::ActionPipeline`].
///
/// Authorization failures keep their kind through [`InvocationError::Access`]
/// so a caller can tell a missing login from a denial.
#[derive(Debug, Error)]
pub enum InvocationError {
    #[error("Object not found: {0}")]
    NotFound(String),

    /// The current thread is already inside an invocation on this object,
    /// typically a listener calling back into its event source.
    #[error("Object {0} is already in use on this thread")]
    Reentrant(String),

    #[error("Unknown action {action} on {object_type}")]
    UnknownAction { object_type: String, action: String },

    #[error("Unknown property {property} on {object_type}")]
    UnknownProperty {
        object_type: String,
        property: String,
    },

    #[error("Property {property} is not editable")]
    NotEditable { property: String },

    #[error("Invalid value for {property}: {reason}")]
    InvalidValue { property: String, reason: String },

    #[error(transparent)]
    Access(#[from] AccessError),

    #[error("Action {action} vetoed: {reason}")]
    Vetoed { action: String, reason: String },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Metamodel(#[from] MetamodelError),

    /// Failure raised by the action body, passed through unchanged.
    #[error(transparent)]
    Action(anyhow::Error),

    #[error("Internal invocation error: {0}")]
    Internal(String),
}

impl InvocationError {
    pub(crate) fn poisoned() -> Self {
        InvocationError::Internal("lock poisoned".to_string())
    }

    /// Whether this is an authorization failure of either kind.
    pub fn is_access_error(&self) -> bool {
        matches!(
            self,
            InvocationError::Access(AccessError::Unauthenticated | AccessError::AccessDenied { .. })
        )
    }
}

/// Result type for invocation operations.
pub type Result<T> = std::result::Result<T, InvocationError>;

/// Errors raised while wiring an [`crate::Aperture`] from configuration.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Realm(#[from] RealmError),
}
