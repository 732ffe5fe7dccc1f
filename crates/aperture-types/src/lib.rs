//! # aperture-types: Core types for `Aperture`
//!
//! This crate contains the vocabulary shared by every other crate:
//! - Feature identifiers ([`FeatureId`]) and the [`identify`] / [`identify_member`] helpers
//! - Access modes ([`AccessMode`])
//! - Permission rules ([`PermissionRule`])
//!
//! A feature is the unit of authorization. It is either a whole domain type
//! (`"Customer"`) or one named member of it (`"Customer.placeOrder"`). The
//! same string is used by specifications, declared requirements, and
//! permission grants, so it is the only join key between them.

use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

// ============================================================================
// Feature Identifier
// ============================================================================

/// Identifier of an authorizable feature.
///
/// Has the form `"<TypeName>"` or `"<TypeName>.<memberName>"`. Two ids are
/// equal only if their strings are equal; there is no normalization, so a
/// misspelled grant simply never matches (and therefore never grants).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureId(String);

impl FeatureId {
    /// Creates a feature id from a raw string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Feature id of a whole type.
    pub fn for_type(type_name: &str) -> Self {
        Self(type_name.to_string())
    }

    /// Feature id of one member of a type.
    ///
    /// # Examples
    ///
    /// ```
    /// # use aperture_types::FeatureId;
    /// let id = FeatureId::for_member("Customer", "placeOrder");
    /// assert_eq!(id.as_str(), "Customer.placeOrder");
    /// ```
    pub fn for_member(type_name: &str, member: &str) -> Self {
        Self(format!("{type_name}.{member}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the type portion of the id (everything before the first `.`).
    pub fn type_name(&self) -> &str {
        self.0.split_once('.').map_or(self.0.as_str(), |(t, _)| t)
    }

    /// Returns the member portion of the id, if this is a member feature.
    pub fn member_name(&self) -> Option<&str> {
        self.0.split_once('.').map(|(_, m)| m)
    }

    /// Returns whether this id names a member rather than a whole type.
    pub fn is_member(&self) -> bool {
        self.member_name().is_some()
    }
}

impl Display for FeatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FeatureId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for FeatureId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl AsRef<str> for FeatureId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Derives the feature id of a type from its declared (or simple) name.
pub fn identify(type_name: &str) -> FeatureId {
    FeatureId::for_type(type_name)
}

/// Derives the feature id of a member: `"{type}.{member}"`.
pub fn identify_member(type_name: &str, member: &str) -> FeatureId {
    FeatureId::for_member(type_name, member)
}

// ============================================================================
// Access Mode
// ============================================================================

/// Kind of access requested on a feature.
///
/// Ordered: `Viewing < Changing`. Changing is strictly stronger, so a grant
/// of `Changing` also satisfies a `Viewing` request.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "kebab-case")]
pub enum AccessMode {
    /// Read access.
    #[default]
    Viewing,
    /// Write access.
    Changing,
}

impl AccessMode {
    /// Returns the mode implied by a read or write access.
    pub fn for_write(is_write: bool) -> Self {
        if is_write {
            AccessMode::Changing
        } else {
            AccessMode::Viewing
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            AccessMode::Viewing => "Viewing",
            AccessMode::Changing => "Changing",
        }
    }
}

impl Display for AccessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

// ============================================================================
// Permission Rule
// ============================================================================

/// Whether a permission grants or blocks access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum PermissionRule {
    #[default]
    Allow,
    /// Overrides any `Allow` for the same feature, regardless of which role
    /// carries the allow.
    Veto,
}

impl PermissionRule {
    pub fn display_name(&self) -> &'static str {
        match self {
            PermissionRule::Allow => "Allow",
            PermissionRule::Veto => "Veto",
        }
    }
}

impl Display for PermissionRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_identify_type_and_member() {
        assert_eq!(identify("Customer").as_str(), "Customer");
        assert_eq!(identify_member("Order", "ship").as_str(), "Order.ship");
    }

    #[test]
    fn test_identify_is_stable() {
        assert_eq!(
            identify_member("Customer", "getName"),
            identify_member("Customer", "getName")
        );
    }

    #[test_case("Customer", "Customer", None ; "type feature")]
    #[test_case("Customer.placeOrder", "Customer", Some("placeOrder") ; "member feature")]
    #[test_case("Order.items.count", "Order", Some("items.count") ; "dotted member")]
    fn test_feature_parts(raw: &str, type_name: &str, member: Option<&str>) {
        let id = FeatureId::from(raw);
        assert_eq!(id.type_name(), type_name);
        assert_eq!(id.member_name(), member);
        assert_eq!(id.is_member(), member.is_some());
    }

    #[test]
    fn test_mode_ordering() {
        assert!(AccessMode::Viewing < AccessMode::Changing);
        assert_eq!(AccessMode::for_write(true), AccessMode::Changing);
        assert_eq!(AccessMode::for_write(false), AccessMode::Viewing);
    }

    #[test_case(AccessMode::Viewing, "\"viewing\"")]
    #[test_case(AccessMode::Changing, "\"changing\"")]
    fn test_mode_serde(mode: AccessMode, json: &str) {
        assert_eq!(serde_json::to_string(&mode).unwrap(), json);
        let parsed: AccessMode = serde_json::from_str(json).unwrap();
        assert_eq!(parsed, mode);
    }

    #[test]
    fn test_display_names() {
        assert_eq!(AccessMode::Changing.to_string(), "Changing");
        assert_eq!(PermissionRule::Veto.to_string(), "Veto");
        assert_eq!(FeatureId::from("Order").to_string(), "Order");
    }

    #[test]
    fn test_feature_id_serializes_as_string() {
        let id = FeatureId::for_member("Order", "cancel");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"Order.cancel\"");
    }
}
