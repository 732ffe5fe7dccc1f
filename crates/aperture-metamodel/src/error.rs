//! Metamodel error types.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MetamodelError {
    /// The type carries no domain-object marker.
    #[error("{type_name} is not a domain object")]
    NotADomainObject { type_name: String },

    /// Two members of one type share a name.
    #[error("{type_name} declares member {member} more than once")]
    DuplicateMember { type_name: String, member: String },

    #[error("Internal metamodel error: {0}")]
    Internal(String),
}

/// Result type for metamodel operations.
pub type Result<T> = std::result::Result<T, MetamodelError>;
