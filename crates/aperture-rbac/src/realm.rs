//! The security realm: role, principal, and permission stores.
//!
//! All three stores live behind one lock so that operations touching both
//! sides of a relationship (assigning a role updates the principal and the
//! role's member list) are applied atomically. A write that returns is
//! visible to every later read on any thread.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use aperture_types::{AccessMode, FeatureId, PermissionRule};
use tracing::{debug, info};

use crate::error::RealmError;
use crate::permissions::{self, Decision, Permission};
use crate::principal::{Principal, PrincipalStatus};
use crate::roles::Role;

/// Result type for realm operations.
pub type Result<T> = std::result::Result<T, RealmError>;

#[derive(Debug, Default)]
struct RealmState {
    roles: HashMap<String, Role>,
    principals: HashMap<String, Principal>,
}

/// Shared, thread-safe store of roles, principals, and permissions.
#[derive(Debug, Default)]
pub struct SecurityRealm {
    state: RwLock<RealmState>,
}

impl SecurityRealm {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, RealmState>> {
        self.state.read().map_err(|_| RealmError::poisoned())
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, RealmState>> {
        self.state.write().map_err(|_| RealmError::poisoned())
    }

    // ========================================================================
    // Roles
    // ========================================================================

    /// Creates a role. Fails if a role with the same name exists.
    pub fn create_role(&self, name: &str, description: &str) -> Result<Role> {
        let mut state = self.write()?;
        if state.roles.contains_key(name) {
            return Err(RealmError::RoleExists(name.to_string()));
        }
        let role = Role::new(name, description);
        state.roles.insert(name.to_string(), role.clone());
        info!(role = %name, "Role created");
        Ok(role)
    }

    /// Returns the named role, creating it if absent.
    pub fn get_or_create_role(&self, name: &str, description: &str) -> Result<Role> {
        let mut state = self.write()?;
        let role = state
            .roles
            .entry(name.to_string())
            .or_insert_with(|| Role::new(name, description));
        Ok(role.clone())
    }

    pub fn find_role(&self, name: &str) -> Result<Option<Role>> {
        Ok(self.read()?.roles.get(name).cloned())
    }

    pub fn role_exists(&self, name: &str) -> Result<bool> {
        Ok(self.read()?.roles.contains_key(name))
    }

    /// All roles, sorted by name.
    pub fn roles(&self) -> Result<Vec<Role>> {
        let mut roles: Vec<Role> = self.read()?.roles.values().cloned().collect();
        roles.sort_by(|a, b| a.name().cmp(b.name()));
        Ok(roles)
    }

    /// Roles whose name or description contains `text`, case-insensitively.
    pub fn find_matching_roles(&self, text: &str) -> Result<Vec<Role>> {
        let needle = text.to_lowercase();
        Ok(self
            .roles()?
            .into_iter()
            .filter(|r| {
                r.name().to_lowercase().contains(&needle)
                    || r.description().to_lowercase().contains(&needle)
            })
            .collect())
    }

    /// Deletes a role and removes it from every principal holding it.
    pub fn delete_role(&self, name: &str) -> Result<Role> {
        let mut state = self.write()?;
        let role = state
            .roles
            .remove(name)
            .ok_or_else(|| RealmError::RoleNotFound(name.to_string()))?;
        for principal in state.principals.values_mut() {
            principal.remove_role(name);
        }
        info!(role = %name, "Role deleted");
        Ok(role)
    }

    pub fn role_count(&self) -> Result<usize> {
        Ok(self.read()?.roles.len())
    }

    // ========================================================================
    // Principals
    // ========================================================================

    /// Creates an unlocked principal with no roles.
    pub fn create_principal(&self, username: &str, name: &str, email: &str) -> Result<Principal> {
        let mut state = self.write()?;
        if state.principals.contains_key(username) {
            return Err(RealmError::PrincipalExists(username.to_string()));
        }
        let principal = Principal::new(username, name, email);
        state
            .principals
            .insert(username.to_string(), principal.clone());
        info!(principal = %username, "Principal created");
        Ok(principal)
    }

    pub fn find_principal(&self, username: &str) -> Result<Option<Principal>> {
        Ok(self.read()?.principals.get(username).cloned())
    }

    pub fn find_by_email(&self, email: &str) -> Result<Option<Principal>> {
        Ok(self
            .read()?
            .principals
            .values()
            .find(|p| p.email == email)
            .cloned())
    }

    /// All principals, sorted by username.
    pub fn principals(&self) -> Result<Vec<Principal>> {
        let mut principals: Vec<Principal> = self.read()?.principals.values().cloned().collect();
        principals.sort_by(|a, b| a.username().cmp(b.username()));
        Ok(principals)
    }

    pub fn principals_by_status(&self, status: PrincipalStatus) -> Result<Vec<Principal>> {
        Ok(self
            .principals()?
            .into_iter()
            .filter(|p| p.status() == status)
            .collect())
    }

    pub fn principals_by_role(&self, role_name: &str) -> Result<Vec<Principal>> {
        Ok(self
            .principals()?
            .into_iter()
            .filter(|p| p.has_role(role_name))
            .collect())
    }

    /// Principals whose username, name, or email contains `text`,
    /// case-insensitively.
    pub fn find_matching_principals(&self, text: &str) -> Result<Vec<Principal>> {
        let needle = text.to_lowercase();
        Ok(self
            .principals()?
            .into_iter()
            .filter(|p| {
                p.username().to_lowercase().contains(&needle)
                    || p.name.to_lowercase().contains(&needle)
                    || p.email.to_lowercase().contains(&needle)
            })
            .collect())
    }

    /// Deletes a principal and drops it from the member lists of its roles.
    pub fn delete_principal(&self, username: &str) -> Result<Principal> {
        let mut state = self.write()?;
        let principal = state
            .principals
            .remove(username)
            .ok_or_else(|| RealmError::PrincipalNotFound(username.to_string()))?;
        for role in state.roles.values_mut() {
            role.remove_member(username);
        }
        info!(principal = %username, "Principal deleted");
        Ok(principal)
    }

    pub fn set_status(&self, username: &str, status: PrincipalStatus) -> Result<Principal> {
        let mut state = self.write()?;
        let principal = state
            .principals
            .get_mut(username)
            .ok_or_else(|| RealmError::PrincipalNotFound(username.to_string()))?;
        principal.set_status(status);
        info!(principal = %username, status = %status, "Principal status changed");
        Ok(principal.clone())
    }

    pub fn lock(&self, username: &str) -> Result<Principal> {
        self.set_status(username, PrincipalStatus::Locked)
    }

    pub fn unlock(&self, username: &str) -> Result<Principal> {
        self.set_status(username, PrincipalStatus::Unlocked)
    }

    pub fn disable(&self, username: &str) -> Result<Principal> {
        self.set_status(username, PrincipalStatus::Disabled)
    }

    pub fn principal_count(&self) -> Result<usize> {
        Ok(self.read()?.principals.len())
    }

    // ========================================================================
    // Role membership
    // ========================================================================

    /// Gives `username` the role `role_name`, updating both sides.
    pub fn assign_role(&self, username: &str, role_name: &str) -> Result<()> {
        let mut state = self.write()?;
        let state = &mut *state;
        let role = state
            .roles
            .get_mut(role_name)
            .ok_or_else(|| RealmError::RoleNotFound(role_name.to_string()))?;
        let principal = state
            .principals
            .get_mut(username)
            .ok_or_else(|| RealmError::PrincipalNotFound(username.to_string()))?;
        principal.add_role(role_name);
        role.add_member(username);
        debug!(principal = %username, role = %role_name, "Role assigned");
        Ok(())
    }

    /// Takes `role_name` away from `username`. Returns whether it was held.
    pub fn revoke_role(&self, username: &str, role_name: &str) -> Result<bool> {
        let mut state = self.write()?;
        let state = &mut *state;
        let principal = state
            .principals
            .get_mut(username)
            .ok_or_else(|| RealmError::PrincipalNotFound(username.to_string()))?;
        let held = principal.remove_role(role_name);
        if let Some(role) = state.roles.get_mut(role_name) {
            role.remove_member(username);
        }
        debug!(principal = %username, role = %role_name, held, "Role revoked");
        Ok(held)
    }

    /// The roles `username` currently holds, sorted by name.
    pub fn roles_of(&self, username: &str) -> Result<Vec<Role>> {
        let state = self.read()?;
        let principal = state
            .principals
            .get(username)
            .ok_or_else(|| RealmError::PrincipalNotFound(username.to_string()))?;
        let mut roles: Vec<Role> = principal
            .role_names()
            .filter_map(|name| state.roles.get(name).cloned())
            .collect();
        roles.sort_by(|a, b| a.name().cmp(b.name()));
        Ok(roles)
    }

    // ========================================================================
    // Permissions
    // ========================================================================

    /// Adds a permission to `role_name`. Returns the stored permission.
    pub fn add_permission(
        &self,
        role_name: &str,
        feature_id: FeatureId,
        rule: PermissionRule,
        mode: AccessMode,
    ) -> Result<Permission> {
        let mut state = self.write()?;
        let role = state
            .roles
            .get_mut(role_name)
            .ok_or_else(|| RealmError::RoleNotFound(role_name.to_string()))?;
        let permission = Permission::new(role_name, feature_id, rule, mode);
        if role.add_permission(permission.clone()) {
            info!(
                role = %role_name,
                feature = %permission.feature_id,
                rule = %rule,
                mode = %mode,
                "Permission added"
            );
        }
        Ok(permission)
    }

    /// Grants `mode` on `feature_id` to `role_name`.
    pub fn grant(&self, role_name: &str, feature_id: FeatureId, mode: AccessMode) -> Result<Permission> {
        self.add_permission(role_name, feature_id, PermissionRule::Allow, mode)
    }

    /// Vetoes `mode` on `feature_id` for holders of `role_name`.
    pub fn veto(&self, role_name: &str, feature_id: FeatureId, mode: AccessMode) -> Result<Permission> {
        self.add_permission(role_name, feature_id, PermissionRule::Veto, mode)
    }

    /// Removes every permission `role_name` holds on `feature_id`.
    ///
    /// Returns the number of permissions removed.
    pub fn revoke_permission(&self, role_name: &str, feature_id: &FeatureId) -> Result<usize> {
        let mut state = self.write()?;
        let role = state
            .roles
            .get_mut(role_name)
            .ok_or_else(|| RealmError::RoleNotFound(role_name.to_string()))?;
        let removed = role.revoke_feature(feature_id);
        info!(role = %role_name, feature = %feature_id, removed, "Permission revoked");
        Ok(removed)
    }

    pub fn permissions_of(&self, role_name: &str) -> Result<Vec<Permission>> {
        let state = self.read()?;
        let role = state
            .roles
            .get(role_name)
            .ok_or_else(|| RealmError::RoleNotFound(role_name.to_string()))?;
        Ok(role.permissions().cloned().collect())
    }

    fn collect_permissions(&self, filter: impl Fn(&Permission) -> bool) -> Result<Vec<Permission>> {
        let state = self.read()?;
        let mut perms: Vec<Permission> = state
            .roles
            .values()
            .flat_map(Role::permissions)
            .filter(|p| filter(p))
            .cloned()
            .collect();
        perms.sort_by(|a, b| a.role.cmp(&b.role).then_with(|| a.feature_id.cmp(&b.feature_id)));
        Ok(perms)
    }

    pub fn permissions(&self) -> Result<Vec<Permission>> {
        self.collect_permissions(|_| true)
    }

    pub fn permissions_for_feature(&self, feature_id: &FeatureId) -> Result<Vec<Permission>> {
        self.collect_permissions(|p| p.feature_id == *feature_id)
    }

    pub fn permissions_by_rule(&self, rule: PermissionRule) -> Result<Vec<Permission>> {
        self.collect_permissions(|p| p.rule == rule)
    }

    pub fn permissions_by_mode(&self, mode: AccessMode) -> Result<Vec<Permission>> {
        self.collect_permissions(|p| p.mode == mode)
    }

    pub fn permission_count(&self) -> Result<usize> {
        Ok(self
            .read()?
            .roles
            .values()
            .map(|r| r.permissions().len())
            .sum())
    }

    // ========================================================================
    // Resolution
    // ========================================================================

    /// Combines the permissions of every role `username` holds.
    ///
    /// An unknown username yields a no-match decision.
    pub fn decide(&self, username: &str, feature_id: &FeatureId, mode: AccessMode) -> Result<Decision> {
        let state = self.read()?;
        let Some(principal) = state.principals.get(username) else {
            return Ok(permissions::evaluate(std::iter::empty(), feature_id, mode));
        };
        let roles = principal.role_names().filter_map(|name| state.roles.get(name));
        Ok(permissions::evaluate(roles, feature_id, mode))
    }

    /// Returns whether `username` is granted `mode` on `feature_id`.
    pub fn principal_has_permission(
        &self,
        username: &str,
        feature_id: &FeatureId,
        mode: AccessMode,
    ) -> Result<bool> {
        Ok(self.decide(username, feature_id, mode)?.is_granted())
    }
}

#[cfg(test)]
impl SecurityRealm {
    /// Poisons the realm lock by panicking while holding it.
    pub(crate) fn poison(&self) {
        let outcome: std::thread::Result<()> =
            std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                let _state = self.state.write();
                panic!("poisoning the realm lock");
            }));
        assert!(outcome.is_err());
    }
}
