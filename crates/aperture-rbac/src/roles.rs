//! Role definitions.
//!
//! A role is a named bundle of permissions. Roles are identified by name,
//! shared between principals, and own the permissions granted through them.

use std::collections::BTreeSet;
use std::fmt::{self, Display};

use aperture_types::{AccessMode, FeatureId};
use serde::{Deserialize, Serialize};

use crate::permissions::Permission;

/// Role in the access control system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    name: String,
    description: String,
    /// Usernames of the principals holding this role (back-reference only).
    members: BTreeSet<String>,
    /// Owned permissions. Set semantics: a structurally equal permission is
    /// stored once.
    permissions: Vec<Permission>,
}

impl Role {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            members: BTreeSet::new(),
            permissions: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = description.into();
    }

    /// Usernames of the principals that hold this role.
    pub fn members(&self) -> impl Iterator<Item = &str> {
        self.members.iter().map(String::as_str)
    }

    pub fn has_member(&self, username: &str) -> bool {
        self.members.contains(username)
    }

    pub(crate) fn add_member(&mut self, username: &str) {
        self.members.insert(username.to_string());
    }

    pub(crate) fn remove_member(&mut self, username: &str) {
        self.members.remove(username);
    }

    pub fn permissions(&self) -> std::slice::Iter<'_, Permission> {
        self.permissions.iter()
    }

    /// Adds a permission to this role.
    ///
    /// The permission is re-bound to this role's name. Returns `false` if a
    /// structurally equal permission was already present.
    pub fn add_permission(&mut self, mut permission: Permission) -> bool {
        permission.role.clone_from(&self.name);
        if self.permissions.contains(&permission) {
            return false;
        }
        self.permissions.push(permission);
        true
    }

    /// Removes one permission. Returns whether it was present.
    pub fn remove_permission(&mut self, permission: &Permission) -> bool {
        let before = self.permissions.len();
        self.permissions.retain(|p| p != permission);
        self.permissions.len() != before
    }

    /// Removes every permission on `feature_id`, whatever its rule or mode.
    ///
    /// Returns the number of permissions removed.
    pub fn revoke_feature(&mut self, feature_id: &FeatureId) -> usize {
        let before = self.permissions.len();
        self.permissions.retain(|p| p.feature_id != *feature_id);
        before - self.permissions.len()
    }

    /// Returns whether some permission of this role grants `mode` on
    /// `feature_id`.
    ///
    /// Vetoes held by this role are not consulted here; a veto-only role
    /// never grants anything.
    pub fn has_permission(&self, feature_id: &FeatureId, mode: AccessMode) -> bool {
        self.permissions.iter().any(|p| p.grants(feature_id, mode))
    }

    /// Returns whether some permission of this role vetoes `mode` on
    /// `feature_id`.
    pub fn vetoes(&self, feature_id: &FeatureId, mode: AccessMode) -> bool {
        self.permissions.iter().any(|p| p.vetoes(feature_id, mode))
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Role[{}]", self.name)
    }
}
