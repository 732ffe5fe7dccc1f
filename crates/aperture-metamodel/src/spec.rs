//! Object specifications built from type descriptors.

use std::collections::{BTreeMap, HashSet};
use std::fmt::{self, Display};

use aperture_types::{FeatureId, identify, identify_member};
use serde::Serialize;

use crate::descriptor::{Editing, MemberKind, Nature, Requirements, SemanticsOf, TypeDescriptor};
use crate::error::{MetamodelError, Result};

/// Strips an accessor prefix when something remains after it.
fn strip_accessor<'a>(name: &'a str, prefixes: &[&str]) -> &'a str {
    prefixes
        .iter()
        .find_map(|p| name.strip_prefix(p).filter(|rest| !rest.is_empty()))
        .unwrap_or(name)
}

/// Display name of a property member: `getName` → `Name`, `isActive` → `Active`.
pub fn property_display_name(member: &str) -> &str {
    strip_accessor(member, &["get", "is"])
}

/// Display name of a collection member: `getOrders` → `Orders`.
pub fn collection_display_name(member: &str) -> &str {
    strip_accessor(member, &["get"])
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PropertySpec {
    /// Member name as declared.
    pub id: String,
    pub name: String,
    pub editing: Editing,
    pub mandatory: bool,
    pub max_length: Option<u32>,
}

impl Display for PropertySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PropertySpec[{} editing={:?}]", self.name, self.editing)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectionSpec {
    pub id: String,
    pub name: String,
    pub editing: Editing,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionSpec {
    pub id: String,
    /// Actions keep their member name.
    pub name: String,
    pub semantics: SemanticsOf,
    pub command_publishing: bool,
}

impl Display for ActionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ActionSpec[{} semantics={:?}]", self.name, self.semantics)
    }
}

/// Static description of a domain type.
///
/// Built once per type by the [`crate::SpecRegistry`] and shared read-only
/// afterwards. Besides the exposed members it keeps the declared
/// requirements of the type and of every member (tagged or not) so the
/// authorization guard can look them up by member name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectSpec {
    type_name: String,
    object_type: String,
    nature: Nature,
    auditing: bool,
    properties: Vec<PropertySpec>,
    collections: Vec<CollectionSpec>,
    actions: Vec<ActionSpec>,
    type_requirements: Requirements,
    member_requirements: BTreeMap<String, Requirements>,
}

impl ObjectSpec {
    /// Builds a specification from a descriptor.
    ///
    /// Fails with `NotADomainObject` when the descriptor lacks the
    /// domain-object marker, and with `DuplicateMember` when a member name
    /// repeats.
    pub fn build(descriptor: &TypeDescriptor) -> Result<Self> {
        let attrs = descriptor
            .domain_object_attrs()
            .ok_or_else(|| MetamodelError::NotADomainObject {
                type_name: descriptor.type_name().to_string(),
            })?;

        let object_type = attrs
            .object_type
            .clone()
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| descriptor.type_name().to_string());

        let mut spec = Self {
            type_name: descriptor.type_name().to_string(),
            object_type,
            nature: attrs.nature,
            auditing: attrs.auditing,
            properties: Vec::new(),
            collections: Vec::new(),
            actions: Vec::new(),
            type_requirements: descriptor.requirements().clone(),
            member_requirements: BTreeMap::new(),
        };

        let mut seen = HashSet::new();
        for member in descriptor.members() {
            if !seen.insert(member.name.as_str()) {
                return Err(MetamodelError::DuplicateMember {
                    type_name: spec.type_name,
                    member: member.name.clone(),
                });
            }

            match &member.kind {
                Some(MemberKind::Property {
                    editing,
                    mandatory,
                    max_length,
                }) => spec.properties.push(PropertySpec {
                    id: member.name.clone(),
                    name: property_display_name(&member.name).to_string(),
                    editing: *editing,
                    mandatory: *mandatory,
                    max_length: *max_length,
                }),
                Some(MemberKind::Collection { editing }) => {
                    spec.collections.push(CollectionSpec {
                        id: member.name.clone(),
                        name: collection_display_name(&member.name).to_string(),
                        editing: *editing,
                    });
                }
                Some(MemberKind::Action {
                    semantics,
                    command_publishing,
                }) => spec.actions.push(ActionSpec {
                    id: member.name.clone(),
                    name: member.name.clone(),
                    semantics: *semantics,
                    command_publishing: *command_publishing,
                }),
                None => {}
            }

            spec.member_requirements
                .insert(member.name.clone(), member.requirements.clone());
        }

        Ok(spec)
    }

    /// Simple name of the type.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Declared object type, or the simple name when none was declared.
    pub fn object_type(&self) -> &str {
        &self.object_type
    }

    pub fn title(&self) -> &str {
        &self.object_type
    }

    pub fn nature(&self) -> Nature {
        self.nature
    }

    pub fn is_audited(&self) -> bool {
        self.auditing
    }

    pub fn properties(&self) -> &[PropertySpec] {
        &self.properties
    }

    pub fn collections(&self) -> &[CollectionSpec] {
        &self.collections
    }

    pub fn actions(&self) -> &[ActionSpec] {
        &self.actions
    }

    pub fn action(&self, id: &str) -> Option<&ActionSpec> {
        self.actions.iter().find(|a| a.id == id)
    }

    pub fn property(&self, id: &str) -> Option<&PropertySpec> {
        self.properties.iter().find(|p| p.id == id)
    }

    pub fn collection(&self, id: &str) -> Option<&CollectionSpec> {
        self.collections.iter().find(|c| c.id == id)
    }

    /// Whether `member` is declared, tagged or not.
    pub fn has_member(&self, member: &str) -> bool {
        self.member_requirements.contains_key(member)
    }

    /// Feature id of the whole type.
    pub fn feature_id(&self) -> FeatureId {
        identify(&self.object_type)
    }

    /// Feature id of one member.
    pub fn member_feature_id(&self, member: &str) -> FeatureId {
        identify_member(&self.object_type, member)
    }

    pub fn type_requirements(&self) -> &Requirements {
        &self.type_requirements
    }

    /// Requirements declared on `member`, if it is declared.
    pub fn requirements_for(&self, member: &str) -> Option<&Requirements> {
        self.member_requirements.get(member)
    }
}

impl Display for ObjectSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ObjectSpec[{} nature={:?} properties={} actions={} collections={}]",
            self.object_type,
            self.nature,
            self.properties.len(),
            self.actions.len(),
            self.collections.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::MemberDescriptor;
    use aperture_types::AccessMode;
    use test_case::test_case;

    #[test_case("getName", "Name")]
    #[test_case("isActive", "Active")]
    #[test_case("get", "get" ; "bare get prefix is kept")]
    #[test_case("is", "is" ; "bare is prefix is kept")]
    #[test_case("email", "email")]
    #[test_case("getter", "ter")]
    fn test_property_display_name(member: &str, expected: &str) {
        assert_eq!(property_display_name(member), expected);
    }

    #[test_case("getOrders", "Orders")]
    #[test_case("isEmpty", "isEmpty" ; "collections only strip get")]
    #[test_case("orders", "orders")]
    fn test_collection_display_name(member: &str, expected: &str) {
        assert_eq!(collection_display_name(member), expected);
    }

    fn customer() -> TypeDescriptor {
        TypeDescriptor::new("Customer")
            .domain_object(Nature::Entity)
            .auditing(true)
            .member(MemberDescriptor::property("getName").mandatory(true).max_length(100))
            .member(MemberDescriptor::property("isActive").editing(Editing::Disabled))
            .member(MemberDescriptor::collection("getOrders"))
            .member(MemberDescriptor::untagged("setName").requires_permission(AccessMode::Changing))
            .member(
                MemberDescriptor::action("placeOrder")
                    .command_publishing(true)
                    .requires_permission(AccessMode::Changing),
            )
    }

    #[test]
    fn test_build_partitions_members() {
        let spec = ObjectSpec::build(&customer()).unwrap();
        assert_eq!(spec.properties().len(), 2);
        assert_eq!(spec.collections().len(), 1);
        assert_eq!(spec.actions().len(), 1);

        let name = spec.property("getName").unwrap();
        assert_eq!(name.name, "Name");
        assert!(name.mandatory);
        assert_eq!(name.max_length, Some(100));
        assert_eq!(spec.collection("getOrders").unwrap().name, "Orders");

        let action = spec.action("placeOrder").unwrap();
        assert_eq!(action.name, "placeOrder");
        assert_eq!(action.semantics, SemanticsOf::NonIdempotent);
        assert!(action.command_publishing);

        assert!(spec.action("setName").is_none());
        assert!(spec.has_member("setName"));
        assert!(spec.is_audited());
    }

    #[test]
    fn test_declaration_order_is_kept() {
        let spec = ObjectSpec::build(&customer()).unwrap();
        let ids: Vec<&str> = spec.properties().iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["getName", "isActive"]);
    }

    #[test]
    fn test_not_a_domain_object() {
        let err = ObjectSpec::build(&TypeDescriptor::new("Helper")).unwrap_err();
        assert_eq!(
            err,
            MetamodelError::NotADomainObject {
                type_name: "Helper".to_string()
            }
        );
    }

    #[test]
    fn test_duplicate_member_rejected() {
        let d = TypeDescriptor::new("Order")
            .domain_object(Nature::Entity)
            .member(MemberDescriptor::action("ship"))
            .member(MemberDescriptor::property("ship"));
        assert!(matches!(
            ObjectSpec::build(&d),
            Err(MetamodelError::DuplicateMember { .. })
        ));
    }

    #[test]
    fn test_object_type_override_drives_feature_ids() {
        let d = TypeDescriptor::new("CustomerEntity")
            .object_type("Customer")
            .member(MemberDescriptor::action("placeOrder"));
        let spec = ObjectSpec::build(&d).unwrap();
        assert_eq!(spec.type_name(), "CustomerEntity");
        assert_eq!(spec.title(), "Customer");
        assert_eq!(spec.feature_id(), FeatureId::from("Customer"));
        assert_eq!(
            spec.member_feature_id("placeOrder"),
            FeatureId::from("Customer.placeOrder")
        );
    }

    #[test]
    fn test_requirements_lookup() {
        let spec = ObjectSpec::build(&customer()).unwrap();
        let setter = spec.requirements_for("setName").unwrap();
        assert_eq!(setter.permission.as_ref().map(|p| p.mode), Some(AccessMode::Changing));
        assert!(spec.requirements_for("getName").unwrap().is_empty());
        assert!(spec.requirements_for("nope").is_none());
        assert!(spec.type_requirements().is_empty());
    }

    #[test]
    fn test_display() {
        let spec = ObjectSpec::build(&customer()).unwrap();
        assert_eq!(
            spec.to_string(),
            "ObjectSpec[Customer nature=Entity properties=2 actions=1 collections=1]"
        );
    }
}
