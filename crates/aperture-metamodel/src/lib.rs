//! # aperture-metamodel: Specifications of domain types
//!
//! Domain types describe themselves once through a [`TypeDescriptor`]
//! ([`Introspect`]) and dispatch their members by name ([`Invocable`]).
//! The [`SpecRegistry`] turns descriptors into cached, immutable
//! [`ObjectSpec`]s:
//!
//! - members tagged as properties become [`PropertySpec`]s
//! - members tagged as collections become [`CollectionSpec`]s
//! - members tagged as actions become [`ActionSpec`]s
//! - untagged members are not exposed but keep their declared requirements
//!
//! A type without the domain-object marker has no specification; asking for
//! one fails with [`MetamodelError::NotADomainObject`].

mod descriptor;
mod error;
mod object;
mod registry;
mod spec;

#[cfg(test)]
mod tests;

pub use descriptor::{
    DomainObjectAttrs, Editing, MemberDescriptor, MemberKind, Nature, PermissionRequirement,
    Requirements, RoleRequirement, SemanticsOf, TypeDescriptor,
};
pub use error::{MetamodelError, Result};
pub use object::{ActionArgs, DomainObject, Introspect, Invocable};
pub use registry::SpecRegistry;
pub use spec::{
    ActionSpec, CollectionSpec, ObjectSpec, PropertySpec, collection_display_name,
    property_display_name,
};
