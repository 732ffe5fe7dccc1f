//! Declarative metadata a domain type supplies about itself.
//!
//! A [`TypeDescriptor`] is the side table that replaces runtime member
//! scanning: each domain type lists its members once, tags each as a
//! property, collection, or action (or leaves it untagged), and attaches
//! role and permission requirements to the type or to individual members.
//!
//! ```
//! use aperture_metamodel::{MemberDescriptor, Nature, SemanticsOf, TypeDescriptor};
//! use aperture_types::AccessMode;
//!
//! let descriptor = TypeDescriptor::new("Customer")
//!     .domain_object(Nature::Entity)
//!     .requires_permission(AccessMode::Viewing)
//!     .member(MemberDescriptor::property("getName").mandatory(true).max_length(100))
//!     .member(MemberDescriptor::untagged("setName").requires_permission(AccessMode::Changing))
//!     .member(
//!         MemberDescriptor::action("placeOrder")
//!             .semantics(SemanticsOf::NonIdempotent)
//!             .requires_permission(AccessMode::Changing),
//!     );
//!
//! assert!(descriptor.is_domain_object());
//! assert_eq!(descriptor.members().len(), 3);
//! ```

use aperture_types::{AccessMode, FeatureId};
use serde::{Deserialize, Serialize};

// ============================================================================
// Attribute vocabularies
// ============================================================================

/// What kind of domain object a type is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Nature {
    #[default]
    Entity,
    ViewModel,
    Mixin,
}

/// Whether a property or collection may be edited directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Editing {
    #[default]
    Enabled,
    Disabled,
}

/// Side-effect profile of an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum SemanticsOf {
    /// Query only.
    Safe,
    /// Repeatable without further effect.
    Idempotent,
    #[default]
    NonIdempotent,
}

// ============================================================================
// Requirements
// ============================================================================

/// Role requirement: all of, or any of, the listed roles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleRequirement {
    pub roles: Vec<String>,
    pub require_all: bool,
}

/// Feature permission requirement.
///
/// With no explicit feature id the guard derives one from the type (and
/// member, when attached to a member).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionRequirement {
    pub feature_id: Option<FeatureId>,
    pub mode: AccessMode,
}

/// Requirements attached to a type or a member.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Requirements {
    pub role: Option<RoleRequirement>,
    pub permission: Option<PermissionRequirement>,
}

impl Requirements {
    pub fn is_empty(&self) -> bool {
        self.role.is_none() && self.permission.is_none()
    }

    fn require_roles(&mut self, roles: &[&str], require_all: bool) {
        self.role = Some(RoleRequirement {
            roles: roles.iter().map(ToString::to_string).collect(),
            require_all,
        });
    }
}

// ============================================================================
// Members
// ============================================================================

/// The tag on a member, with the attributes that tag carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MemberKind {
    Property {
        editing: Editing,
        mandatory: bool,
        max_length: Option<u32>,
    },
    Collection {
        editing: Editing,
    },
    Action {
        semantics: SemanticsOf,
        command_publishing: bool,
    },
}

/// One declared member of a type.
///
/// Untagged members are not exposed by the specification but may still
/// carry requirements (a setter guarding writes of a property, say).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberDescriptor {
    pub name: String,
    pub kind: Option<MemberKind>,
    pub requirements: Requirements,
}

impl MemberDescriptor {
    fn with_kind(name: impl Into<String>, kind: Option<MemberKind>) -> Self {
        Self {
            name: name.into(),
            kind,
            requirements: Requirements::default(),
        }
    }

    pub fn property(name: impl Into<String>) -> Self {
        Self::with_kind(
            name,
            Some(MemberKind::Property {
                editing: Editing::Enabled,
                mandatory: false,
                max_length: None,
            }),
        )
    }

    pub fn collection(name: impl Into<String>) -> Self {
        Self::with_kind(
            name,
            Some(MemberKind::Collection {
                editing: Editing::Enabled,
            }),
        )
    }

    pub fn action(name: impl Into<String>) -> Self {
        Self::with_kind(
            name,
            Some(MemberKind::Action {
                semantics: SemanticsOf::NonIdempotent,
                command_publishing: false,
            }),
        )
    }

    pub fn untagged(name: impl Into<String>) -> Self {
        Self::with_kind(name, None)
    }

    /// Sets editability. Ignored on actions and untagged members.
    pub fn editing(mut self, value: Editing) -> Self {
        match &mut self.kind {
            Some(MemberKind::Property { editing, .. } | MemberKind::Collection { editing }) => {
                *editing = value;
            }
            _ => {}
        }
        self
    }

    pub fn mandatory(mut self, value: bool) -> Self {
        if let Some(MemberKind::Property { mandatory, .. }) = &mut self.kind {
            *mandatory = value;
        }
        self
    }

    pub fn max_length(mut self, value: u32) -> Self {
        if let Some(MemberKind::Property { max_length, .. }) = &mut self.kind {
            *max_length = Some(value);
        }
        self
    }

    pub fn semantics(mut self, value: SemanticsOf) -> Self {
        if let Some(MemberKind::Action { semantics, .. }) = &mut self.kind {
            *semantics = value;
        }
        self
    }

    pub fn command_publishing(mut self, value: bool) -> Self {
        if let Some(MemberKind::Action {
            command_publishing, ..
        }) = &mut self.kind
        {
            *command_publishing = value;
        }
        self
    }

    /// Requires the caller to hold every listed role.
    pub fn requires_all_roles(mut self, roles: &[&str]) -> Self {
        self.requirements.require_roles(roles, true);
        self
    }

    /// Requires the caller to hold at least one listed role.
    pub fn requires_any_role(mut self, roles: &[&str]) -> Self {
        self.requirements.require_roles(roles, false);
        self
    }

    /// Requires `mode` on this member's derived feature id.
    pub fn requires_permission(mut self, mode: AccessMode) -> Self {
        self.requirements.permission = Some(PermissionRequirement {
            feature_id: None,
            mode,
        });
        self
    }

    /// Requires `mode` on an explicitly named feature.
    pub fn requires_feature(mut self, feature_id: impl Into<FeatureId>, mode: AccessMode) -> Self {
        self.requirements.permission = Some(PermissionRequirement {
            feature_id: Some(feature_id.into()),
            mode,
        });
        self
    }
}

// ============================================================================
// Types
// ============================================================================

/// Attributes of the domain-object marker.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DomainObjectAttrs {
    pub nature: Nature,
    /// Overrides the type's simple name as its object type.
    pub object_type: Option<String>,
    pub auditing: bool,
}

/// Everything a domain type declares about itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDescriptor {
    type_name: String,
    domain_object: Option<DomainObjectAttrs>,
    requirements: Requirements,
    members: Vec<MemberDescriptor>,
}

impl TypeDescriptor {
    /// Starts a descriptor for the type with simple name `type_name`.
    ///
    /// Without a call to [`TypeDescriptor::domain_object`] the type is not a
    /// domain object and no specification can be built for it.
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            domain_object: None,
            requirements: Requirements::default(),
            members: Vec::new(),
        }
    }

    /// Marks the type as a domain object.
    pub fn domain_object(mut self, nature: Nature) -> Self {
        self.domain_object.get_or_insert_with(Default::default).nature = nature;
        self
    }

    /// Overrides the object type name. Implies the domain-object marker.
    pub fn object_type(mut self, name: impl Into<String>) -> Self {
        self.domain_object.get_or_insert_with(Default::default).object_type = Some(name.into());
        self
    }

    /// Implies the domain-object marker.
    pub fn auditing(mut self, value: bool) -> Self {
        self.domain_object.get_or_insert_with(Default::default).auditing = value;
        self
    }

    pub fn requires_all_roles(mut self, roles: &[&str]) -> Self {
        self.requirements.require_roles(roles, true);
        self
    }

    pub fn requires_any_role(mut self, roles: &[&str]) -> Self {
        self.requirements.require_roles(roles, false);
        self
    }

    /// Requires `mode` on the type's own feature id.
    pub fn requires_permission(mut self, mode: AccessMode) -> Self {
        self.requirements.permission = Some(PermissionRequirement {
            feature_id: None,
            mode,
        });
        self
    }

    pub fn requires_feature(mut self, feature_id: impl Into<FeatureId>, mode: AccessMode) -> Self {
        self.requirements.permission = Some(PermissionRequirement {
            feature_id: Some(feature_id.into()),
            mode,
        });
        self
    }

    pub fn member(mut self, member: MemberDescriptor) -> Self {
        self.members.push(member);
        self
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn is_domain_object(&self) -> bool {
        self.domain_object.is_some()
    }

    pub fn domain_object_attrs(&self) -> Option<&DomainObjectAttrs> {
        self.domain_object.as_ref()
    }

    pub fn requirements(&self) -> &Requirements {
        &self.requirements
    }

    pub fn members(&self) -> &[MemberDescriptor] {
        &self.members
    }
}
