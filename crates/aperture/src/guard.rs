//! Authorization guard.
//!
//! Applies the role and permission requirements declared on a type and its
//! members to the principal of a [`Session`]. Class-level requirements are
//! checked before member-level ones, role before permission, and the first
//! failure ends the check.

use aperture_metamodel::{ObjectSpec, Requirements};
use aperture_rbac::{AccessError, Session};
use aperture_types::{AccessMode, FeatureId};
use tracing::{debug, info, warn};

/// Progress of a single access check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardState {
    Unchecked,
    RoleChecked,
    PermissionChecked,
    Granted,
    Denied,
}

/// Result type for guard checks.
pub type Result<T> = std::result::Result<T, AccessError>;

/// Evaluates declared requirements against a session.
#[derive(Debug, Clone)]
pub struct Guard {
    audit_enabled: bool,
}

impl Default for Guard {
    fn default() -> Self {
        Self::new()
    }
}

impl Guard {
    pub fn new() -> Self {
        Self {
            audit_enabled: true,
        }
    }

    /// Disables audit logging (for testing).
    pub fn without_audit(mut self) -> Self {
        self.audit_enabled = false;
        self
    }

    pub fn with_audit(mut self, enabled: bool) -> Self {
        self.audit_enabled = enabled;
        self
    }

    /// Checks access to a type, and to `member` of it when given.
    ///
    /// **Audit:** logs the outcome.
    pub fn check_access(&self, session: &Session, spec: &ObjectSpec, member: Option<&str>) -> Result<()> {
        let mut state = GuardState::Unchecked;
        let outcome = self.check_declared(session, spec, member, &mut state);
        self.audit(session, spec, member, &outcome);
        outcome
    }

    /// Checks read (or write, when `is_write`) access to a property.
    ///
    /// The property's read accessor is `get<Property>` (or `is<Property>`)
    /// and its write accessor `set<Property>`. Requirements on the
    /// accessors apply. Without a read accessor the property's own feature
    /// id is checked for the implied mode; a write without a write accessor
    /// requires `Changing` on that feature id.
    ///
    /// **Audit:** logs the outcome.
    pub fn check_property_access(
        &self,
        session: &Session,
        spec: &ObjectSpec,
        property: &str,
        is_write: bool,
    ) -> Result<()> {
        let mut state = GuardState::Unchecked;
        let outcome = self.check_property(session, spec, property, is_write, &mut state);
        self.audit(session, spec, Some(property), &outcome);
        outcome
    }

    fn check_declared(
        &self,
        session: &Session,
        spec: &ObjectSpec,
        member: Option<&str>,
        state: &mut GuardState,
    ) -> Result<()> {
        self.check_requirements(session, spec, None, spec.type_requirements(), state)?;

        if let Some(member) = member {
            if let Some(requirements) = spec.requirements_for(member) {
                self.check_requirements(session, spec, Some(member), requirements, state)?;
            }
        }

        transition(state, GuardState::Granted);
        Ok(())
    }

    fn check_property(
        &self,
        session: &Session,
        spec: &ObjectSpec,
        property: &str,
        is_write: bool,
        state: &mut GuardState,
    ) -> Result<()> {
        self.check_requirements(session, spec, None, spec.type_requirements(), state)?;

        let property_feature = spec.member_feature_id(property);

        let Some(getter) = read_accessor(spec, property) else {
            let mode = AccessMode::for_write(is_write);
            return self.check_feature(session, &property_feature, mode, state);
        };
        self.check_member(session, spec, &getter, state)?;

        if is_write {
            let setter = accessor_name("set", property);
            if spec.has_member(&setter) {
                self.check_member(session, spec, &setter, state)?;
            } else {
                self.check_feature(session, &property_feature, AccessMode::Changing, state)?;
            }
        }

        transition(state, GuardState::Granted);
        Ok(())
    }

    fn check_member(&self, session: &Session, spec: &ObjectSpec, member: &str, state: &mut GuardState) -> Result<()> {
        match spec.requirements_for(member) {
            Some(requirements) => self.check_requirements(session, spec, Some(member), requirements, state),
            None => Ok(()),
        }
    }

    fn check_requirements(
        &self,
        session: &Session,
        spec: &ObjectSpec,
        member: Option<&str>,
        requirements: &Requirements,
        state: &mut GuardState,
    ) -> Result<()> {
        if let Some(role) = &requirements.role {
            let outcome = if role.require_all {
                session.require_all_roles(&role.roles)
            } else {
                session.require_any_role(&role.roles)
            };
            deny_on_err(state, outcome)?;
            transition(state, GuardState::RoleChecked);
        }

        if let Some(permission) = &requirements.permission {
            let feature_id = match (&permission.feature_id, member) {
                (Some(explicit), _) => explicit.clone(),
                (None, Some(member)) => spec.member_feature_id(member),
                (None, None) => spec.feature_id(),
            };
            self.check_feature(session, &feature_id, permission.mode, state)?;
        }

        Ok(())
    }

    fn check_feature(
        &self,
        session: &Session,
        feature_id: &FeatureId,
        mode: AccessMode,
        state: &mut GuardState,
    ) -> Result<()> {
        deny_on_err(state, session.require_permission(feature_id, mode))?;
        transition(state, GuardState::PermissionChecked);
        Ok(())
    }

    fn audit(&self, session: &Session, spec: &ObjectSpec, member: Option<&str>, outcome: &Result<()>) {
        if !self.audit_enabled {
            return;
        }
        let principal = session.current_username().unwrap_or("<anonymous>");
        match outcome {
            Ok(()) => info!(
                principal = %principal,
                object_type = %spec.object_type(),
                member = ?member,
                "Access granted"
            ),
            Err(e) => warn!(
                principal = %principal,
                object_type = %spec.object_type(),
                member = ?member,
                error = %e,
                "Access denied"
            ),
        }
    }
}

fn transition(state: &mut GuardState, next: GuardState) {
    debug!(from = ?*state, to = ?next, "Guard transition");
    *state = next;
}

fn deny_on_err(state: &mut GuardState, outcome: Result<()>) -> Result<()> {
    if outcome.is_err() {
        transition(state, GuardState::Denied);
    }
    outcome
}

/// Upper-cases the first character: `name` → `Name`.
pub(crate) fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn accessor_name(prefix: &str, property: &str) -> String {
    format!("{prefix}{}", capitalize(property))
}

/// Lower-cases the first character: `Name` → `name`.
pub(crate) fn decapitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Name of the declared read accessor of `property`, if any.
///
/// A property spec whose display name is `property` wins; otherwise
/// `get<Property>` or `is<Property>` is looked up among all members.
fn read_accessor(spec: &ObjectSpec, property: &str) -> Option<String> {
    let capitalized = capitalize(property);
    if let Some(declared) = spec
        .properties()
        .iter()
        .find(|p| p.name == property || p.name == capitalized)
    {
        return Some(declared.id.clone());
    }
    ["get", "is"]
        .into_iter()
        .map(|prefix| accessor_name(prefix, property))
        .find(|name| spec.has_member(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use aperture_metamodel::{MemberDescriptor, Nature, TypeDescriptor};
    use aperture_rbac::SecurityRealm;
    use std::sync::Arc;
    use test_case::test_case;

    fn realm() -> Arc<SecurityRealm> {
        let realm = Arc::new(SecurityRealm::new());
        realm.create_role("user", "Regular User").unwrap();
        realm.create_role("customer-manager", "Customer Manager").unwrap();
        realm.create_principal("alice", "Alice", "alice@example.com").unwrap();
        realm.assign_role("alice", "user").unwrap();
        realm.grant("user", FeatureId::from("Customer"), AccessMode::Viewing).unwrap();
        realm
            .grant("customer-manager", FeatureId::from("Customer"), AccessMode::Changing)
            .unwrap();
        realm
    }

    fn customer_spec() -> ObjectSpec {
        let descriptor = TypeDescriptor::new("Customer")
            .domain_object(Nature::Entity)
            .requires_permission(AccessMode::Viewing)
            .member(MemberDescriptor::property("getName"))
            .member(MemberDescriptor::untagged("setName").requires_feature("Customer", AccessMode::Changing))
            .member(MemberDescriptor::property("getEmail"))
            .member(MemberDescriptor::property("isActive"))
            .member(
                MemberDescriptor::action("placeOrder")
                    .requires_any_role(&["user", "customer-manager"])
                    .requires_feature("Customer", AccessMode::Changing),
            )
            .member(MemberDescriptor::action("viewOrders"));
        ObjectSpec::build(&descriptor).unwrap()
    }

    fn session_for(realm: &Arc<SecurityRealm>, username: &str) -> Session {
        let mut session = Session::new(Arc::clone(realm));
        assert!(session.authenticate(username, "pw"));
        session
    }

    #[test_case("name", "Name")]
    #[test_case("email", "Email")]
    #[test_case("", "")]
    #[test_case("émile", "Émile")]
    fn test_capitalize(input: &str, expected: &str) {
        assert_eq!(capitalize(input), expected);
        assert_eq!(decapitalize(expected), input);
    }

    #[test]
    fn test_unauthenticated_fails_before_role_check() {
        let guard = Guard::new().without_audit();
        let session = Session::new(realm());
        let err = guard
            .check_access(&session, &customer_spec(), Some("placeOrder"))
            .unwrap_err();
        assert_eq!(err, AccessError::Unauthenticated);
    }

    #[test]
    fn test_class_level_grant_and_member_denial() {
        let realm = realm();
        let guard = Guard::new().without_audit();
        let session = session_for(&realm, "alice");
        let spec = customer_spec();

        assert!(guard.check_access(&session, &spec, None).is_ok());
        assert!(guard.check_access(&session, &spec, Some("viewOrders")).is_ok());

        let err = guard.check_access(&session, &spec, Some("placeOrder")).unwrap_err();
        assert_eq!(
            err,
            AccessError::denied("Required permission: Customer (Changing)")
        );

        realm.assign_role("alice", "customer-manager").unwrap();
        assert!(guard.check_access(&session, &spec, Some("placeOrder")).is_ok());
    }

    #[test]
    fn test_class_level_denial_short_circuits() {
        let realm = realm();
        realm.create_principal("bob", "Bob", "bob@example.com").unwrap();
        let guard = Guard::new().without_audit();
        let session = session_for(&realm, "bob");

        // Bob holds no role: the class-level permission fails first
        let err = guard
            .check_access(&session, &customer_spec(), Some("placeOrder"))
            .unwrap_err();
        assert_eq!(err, AccessError::denied("Required permission: Customer (Viewing)"));
    }

    #[test]
    fn test_role_requirement_all() {
        let realm = realm();
        let descriptor = TypeDescriptor::new("Report")
            .domain_object(Nature::ViewModel)
            .requires_all_roles(&["user", "customer-manager"]);
        let spec = ObjectSpec::build(&descriptor).unwrap();
        let guard = Guard::new().without_audit();
        let session = session_for(&realm, "alice");

        assert_eq!(
            guard.check_access(&session, &spec, None),
            Err(AccessError::denied("Required all roles: user, customer-manager"))
        );
        realm.assign_role("alice", "customer-manager").unwrap();
        assert!(guard.check_access(&session, &spec, None).is_ok());
    }

    #[test]
    fn test_property_read_and_write_through_accessors() {
        let realm = realm();
        let guard = Guard::new().without_audit();
        let session = session_for(&realm, "alice");
        let spec = customer_spec();

        assert!(guard.check_property_access(&session, &spec, "name", false).is_ok());
        assert!(guard.check_property_access(&session, &spec, "active", false).is_ok());
        assert!(guard.check_property_access(&session, &spec, "name", true).is_err());

        realm.assign_role("alice", "customer-manager").unwrap();
        assert!(guard.check_property_access(&session, &spec, "name", true).is_ok());
    }

    #[test]
    fn test_write_without_setter_requires_changing_on_property() {
        let realm = realm();
        let guard = Guard::new().without_audit();
        let session = session_for(&realm, "alice");
        let spec = customer_spec();

        assert_eq!(
            guard.check_property_access(&session, &spec, "email", true),
            Err(AccessError::denied("Required permission: Customer.email (Changing)"))
        );

        realm
            .grant("user", FeatureId::from("Customer.email"), AccessMode::Changing)
            .unwrap();
        assert!(guard.check_property_access(&session, &spec, "email", true).is_ok());
    }

    #[test]
    fn test_missing_getter_falls_back_to_property_feature() {
        let realm = realm();
        let guard = Guard::new().without_audit();
        let session = session_for(&realm, "alice");
        let spec = customer_spec();

        assert_eq!(
            guard.check_property_access(&session, &spec, "phone", false),
            Err(AccessError::denied("Required permission: Customer.phone (Viewing)"))
        );
        realm
            .grant("user", FeatureId::from("Customer.phone"), AccessMode::Viewing)
            .unwrap();
        assert!(guard.check_property_access(&session, &spec, "phone", false).is_ok());
        assert!(guard.check_property_access(&session, &spec, "phone", true).is_err());
    }

    #[test]
    fn test_veto_blocks_member_access() {
        let realm = realm();
        realm.create_role("auditor", "").unwrap();
        realm.veto("auditor", FeatureId::from("Customer"), AccessMode::Viewing).unwrap();
        realm.assign_role("alice", "auditor").unwrap();
        realm.assign_role("alice", "customer-manager").unwrap();

        let guard = Guard::new();
        let session = session_for(&realm, "alice");
        assert!(guard.check_access(&session, &customer_spec(), None).unwrap_err().is_denied());
    }

    #[test]
    fn test_unprefixed_accessor_keeps_its_requirements() {
        let realm = realm();
        realm.create_role("admin", "Administrator").unwrap();
        realm
            .grant("user", FeatureId::from("Payroll.salary"), AccessMode::Changing)
            .unwrap();
        let descriptor = TypeDescriptor::new("Payroll")
            .domain_object(Nature::ViewModel)
            .member(MemberDescriptor::property("salary").requires_all_roles(&["admin"]));
        let spec = ObjectSpec::build(&descriptor).unwrap();
        let guard = Guard::new().without_audit();
        let session = session_for(&realm, "alice");

        assert_eq!(
            guard.check_property_access(&session, &spec, "salary", false),
            Err(AccessError::denied("Required all roles: admin"))
        );
        realm.assign_role("alice", "admin").unwrap();
        assert!(guard.check_property_access(&session, &spec, "salary", false).is_ok());
    }
}
