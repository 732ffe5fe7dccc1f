//! Sessions: the authenticated principal of one caller.
//!
//! A [`Session`] is an explicit value passed to every check. There is no
//! ambient "current user"; two sessions over the same realm are fully
//! independent.

use std::fmt;
use std::sync::Arc;

use aperture_types::{AccessMode, FeatureId};
use tracing::{error, info, warn};

use crate::error::AccessError;
use crate::principal::Principal;
use crate::realm::SecurityRealm;

/// Holds at most one authenticated principal.
#[derive(Clone)]
pub struct Session {
    realm: Arc<SecurityRealm>,
    username: Option<String>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Creates an unauthenticated session over `realm`.
    pub fn new(realm: Arc<SecurityRealm>) -> Self {
        Self {
            realm,
            username: None,
        }
    }

    pub fn realm(&self) -> &Arc<SecurityRealm> {
        &self.realm
    }

    /// Attempts to log in as `username`.
    ///
    /// Succeeds when the principal exists, its status allows authentication,
    /// and the secret is non-blank. Credential verification beyond that is
    /// left to the host. On failure the session keeps its previous login.
    pub fn authenticate(&mut self, username: &str, secret: &str) -> bool {
        let principal = match self.realm.find_principal(username) {
            Ok(p) => p,
            Err(e) => {
                error!(principal = %username, error = %e, "Realm lookup failed during authentication");
                return false;
            }
        };

        let Some(principal) = principal else {
            warn!(principal = %username, "Authentication failed: unknown principal");
            return false;
        };

        if !principal.status().can_authenticate() {
            warn!(
                principal = %username,
                status = %principal.status(),
                "Authentication failed: principal cannot authenticate"
            );
            return false;
        }

        if secret.trim().is_empty() {
            warn!(principal = %username, "Authentication failed: empty secret");
            return false;
        }

        info!(principal = %username, "Principal authenticated");
        self.username = Some(principal.username().to_string());
        true
    }

    /// Clears the login. Idempotent.
    pub fn logout(&mut self) {
        if let Some(username) = self.username.take() {
            info!(principal = %username, "Principal logged out");
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.username.is_some()
    }

    pub fn current_username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    /// Snapshot of the logged-in principal as currently stored in the realm.
    ///
    /// Returns `None` when nobody is logged in or the principal has been
    /// deleted since login.
    pub fn current_principal(&self) -> Option<Principal> {
        let username = self.username.as_deref()?;
        match self.realm.find_principal(username) {
            Ok(p) => p,
            Err(e) => {
                error!(principal = %username, error = %e, "Realm lookup failed");
                None
            }
        }
    }

    // ========================================================================
    // Queries (fail closed)
    // ========================================================================

    /// Whether the logged-in principal holds `role_name`. False when
    /// unauthenticated.
    pub fn has_role(&self, role_name: &str) -> bool {
        self.current_principal()
            .is_some_and(|p| p.has_role(role_name))
    }

    pub fn has_any_role<S: AsRef<str>>(&self, role_names: &[S]) -> bool {
        self.current_principal()
            .is_some_and(|p| role_names.iter().any(|r| p.has_role(r.as_ref())))
    }

    pub fn has_all_roles<S: AsRef<str>>(&self, role_names: &[S]) -> bool {
        self.current_principal()
            .is_some_and(|p| role_names.iter().all(|r| p.has_role(r.as_ref())))
    }

    /// Whether the logged-in principal is granted `mode` on `feature_id`.
    /// False when unauthenticated.
    pub fn has_permission(&self, feature_id: &FeatureId, mode: AccessMode) -> bool {
        let Some(username) = self.username.as_deref() else {
            return false;
        };
        match self.realm.principal_has_permission(username, feature_id, mode) {
            Ok(granted) => granted,
            Err(e) => {
                error!(principal = %username, feature = %feature_id, error = %e, "Permission lookup failed");
                false
            }
        }
    }

    pub fn can_view(&self, feature_id: &FeatureId) -> bool {
        self.has_permission(feature_id, AccessMode::Viewing)
    }

    pub fn can_change(&self, feature_id: &FeatureId) -> bool {
        self.has_permission(feature_id, AccessMode::Changing)
    }

    // ========================================================================
    // Requirements
    // ========================================================================

    pub fn require_authentication(&self) -> Result<(), AccessError> {
        if self.is_authenticated() {
            Ok(())
        } else {
            Err(AccessError::Unauthenticated)
        }
    }

    pub fn require_role(&self, role_name: &str) -> Result<(), AccessError> {
        if self.roles_satisfy(|p| p.has_role(role_name))? {
            Ok(())
        } else {
            Err(AccessError::denied(format!("Required role: {role_name}")))
        }
    }

    pub fn require_any_role<S: AsRef<str>>(&self, role_names: &[S]) -> Result<(), AccessError> {
        if self.roles_satisfy(|p| role_names.iter().any(|r| p.has_role(r.as_ref())))? {
            Ok(())
        } else {
            Err(AccessError::denied(format!(
                "Required any of roles: {}",
                join(role_names)
            )))
        }
    }

    pub fn require_all_roles<S: AsRef<str>>(&self, role_names: &[S]) -> Result<(), AccessError> {
        if self.roles_satisfy(|p| role_names.iter().all(|r| p.has_role(r.as_ref())))? {
            Ok(())
        } else {
            Err(AccessError::denied(format!(
                "Required all roles: {}",
                join(role_names)
            )))
        }
    }

    pub fn require_permission(&self, feature_id: &FeatureId, mode: AccessMode) -> Result<(), AccessError> {
        let username = self.username.as_deref().ok_or(AccessError::Unauthenticated)?;
        if self.realm.principal_has_permission(username, feature_id, mode)? {
            Ok(())
        } else {
            Err(AccessError::denied(format!(
                "Required permission: {feature_id} ({mode})"
            )))
        }
    }

    /// Applies `check` to the logged-in principal. Realm failures surface as
    /// [`AccessError::Internal`]; a principal deleted since login holds no
    /// roles.
    fn roles_satisfy(&self, check: impl FnOnce(&Principal) -> bool) -> Result<bool, AccessError> {
        let username = self.username.as_deref().ok_or(AccessError::Unauthenticated)?;
        Ok(self.realm.find_principal(username)?.is_some_and(|p| check(&p)))
    }
}

fn join<S: AsRef<str>>(names: &[S]) -> String {
    names.iter().map(AsRef::as_ref).collect::<Vec<_>>().join(", ")
}
