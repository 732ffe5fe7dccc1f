//! Principals: identities that hold roles.

use std::collections::BTreeSet;
use std::fmt::{self, Display};

use aperture_types::{AccessMode, FeatureId};
use serde::{Deserialize, Serialize};

use crate::permissions;
use crate::roles::Role;

/// Account status of a principal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum PrincipalStatus {
    #[default]
    Unlocked,
    Locked,
    Disabled,
}

impl PrincipalStatus {
    /// Only unlocked principals may authenticate.
    pub fn can_authenticate(&self) -> bool {
        matches!(self, PrincipalStatus::Unlocked)
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            PrincipalStatus::Unlocked => "Unlocked",
            PrincipalStatus::Locked => "Locked",
            PrincipalStatus::Disabled => "Disabled",
        }
    }
}

impl Display for PrincipalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// An identity holding zero or more roles.
///
/// Roles are referenced by name; the role values themselves live in the
/// [`crate::SecurityRealm`] and are shared between principals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    username: String,
    pub name: String,
    pub email: String,
    status: PrincipalStatus,
    roles: BTreeSet<String>,
}

impl Principal {
    pub fn new(
        username: impl Into<String>,
        name: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            name: name.into(),
            email: email.into(),
            status: PrincipalStatus::Unlocked,
            roles: BTreeSet::new(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn status(&self) -> PrincipalStatus {
        self.status
    }

    pub fn set_status(&mut self, status: PrincipalStatus) {
        self.status = status;
    }

    pub fn lock(&mut self) {
        self.status = PrincipalStatus::Locked;
    }

    pub fn unlock(&mut self) {
        self.status = PrincipalStatus::Unlocked;
    }

    pub fn disable(&mut self) {
        self.status = PrincipalStatus::Disabled;
    }

    pub fn is_locked(&self) -> bool {
        self.status == PrincipalStatus::Locked
    }

    /// Names of the roles this principal holds.
    pub fn role_names(&self) -> impl Iterator<Item = &str> {
        self.roles.iter().map(String::as_str)
    }

    pub fn has_role(&self, role_name: &str) -> bool {
        self.roles.contains(role_name)
    }

    pub(crate) fn add_role(&mut self, role_name: &str) {
        self.roles.insert(role_name.to_string());
    }

    pub(crate) fn remove_role(&mut self, role_name: &str) -> bool {
        self.roles.remove(role_name)
    }

    /// Returns whether this principal is granted `mode` on `feature_id`.
    ///
    /// `roles` may contain more roles than the principal holds; only the
    /// held ones take part. A veto from any held role wins over every allow.
    pub fn has_permission<'a, I>(&self, roles: I, feature_id: &FeatureId, mode: AccessMode) -> bool
    where
        I: IntoIterator<Item = &'a Role>,
    {
        permissions::is_granted(
            roles.into_iter().filter(|r| self.has_role(r.name())),
            feature_id,
            mode,
        )
    }
}

impl Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Principal[{} ({})]", self.username, self.name)
    }
}
