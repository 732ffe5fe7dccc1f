//! Domain types, realm configuration, and listeners shared by the tests.

use std::sync::{Arc, Mutex};

use anyhow::{Context, bail};
use aperture_config::{ApertureConfig, PermissionDefinition, PrincipalDefinition, RoleDefinition};
use aperture_metamodel::{
    ActionArgs, Editing, Introspect, Invocable, MemberDescriptor, Nature, SemanticsOf,
    TypeDescriptor,
};
use aperture_rbac::PrincipalStatus;
use aperture_types::{AccessMode, FeatureId, PermissionRule};
use serde_json::{Value, json};

use crate::{Aperture, DomainEvent, EventListener, EventPhase, Veto};

// ============================================================================
// Domain types
// ============================================================================

#[derive(Debug, Default)]
pub struct Customer {
    pub name: String,
    pub email: String,
    pub active: bool,
    pub orders: Vec<String>,
}

impl Customer {
    pub fn new(name: &str, email: &str) -> Self {
        Self {
            name: name.to_string(),
            email: email.to_string(),
            active: true,
            orders: Vec::new(),
        }
    }
}

impl Introspect for Customer {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::new("Customer")
            .domain_object(Nature::Entity)
            .auditing(true)
            .requires_permission(AccessMode::Viewing)
            .member(MemberDescriptor::property("getName").mandatory(true).max_length(20))
            .member(MemberDescriptor::untagged("setName").requires_feature("Customer", AccessMode::Changing))
            .member(MemberDescriptor::property("getEmail"))
            .member(MemberDescriptor::property("isActive").editing(Editing::Disabled))
            .member(MemberDescriptor::collection("getOrders"))
            .member(
                MemberDescriptor::action("placeOrder")
                    .command_publishing(true)
                    .requires_feature("Customer", AccessMode::Changing),
            )
            .member(MemberDescriptor::action("summarize").semantics(SemanticsOf::Safe))
            .member(MemberDescriptor::action("chargeCard"))
    }
}

impl Invocable for Customer {
    fn invoke(&mut self, action: &str, args: &ActionArgs) -> anyhow::Result<Value> {
        match action {
            "placeOrder" => {
                let item = args.str("item")?;
                self.orders.push(item.to_string());
                Ok(json!(format!("ORD-{}", self.orders.len())))
            }
            "summarize" => Ok(json!({ "name": self.name, "orders": self.orders.len() })),
            "chargeCard" => bail!("payment gateway unavailable"),
            other => bail!("unknown action {other}"),
        }
    }

    fn read_property(&self, property: &str) -> anyhow::Result<Value> {
        match property {
            "name" => Ok(json!(self.name)),
            "email" => Ok(json!(self.email)),
            "active" => Ok(json!(self.active)),
            "orders" => Ok(json!(self.orders)),
            other => bail!("no readable property {other}"),
        }
    }

    fn write_property(&mut self, property: &str, value: Value) -> anyhow::Result<()> {
        let text = value.as_str().context("expected a string")?.to_string();
        match property {
            "name" => self.name = text,
            "email" => self.email = text,
            other => bail!("no writable property {other}"),
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct Order {
    pub item: String,
    pub shipped: bool,
}

impl Introspect for Order {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::new("Order")
            .domain_object(Nature::Entity)
            .requires_permission(AccessMode::Viewing)
            .member(MemberDescriptor::property("getItem"))
            .member(
                MemberDescriptor::action("ship")
                    .semantics(SemanticsOf::Idempotent)
                    .requires_feature("Order", AccessMode::Changing),
            )
    }
}

impl Invocable for Order {
    fn invoke(&mut self, action: &str, _args: &ActionArgs) -> anyhow::Result<Value> {
        match action {
            "ship" => {
                self.shipped = true;
                Ok(json!(true))
            }
            other => bail!("unknown action {other}"),
        }
    }
}

/// Carries no domain-object marker.
pub struct Scratchpad;

impl Introspect for Scratchpad {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::new("Scratchpad").member(MemberDescriptor::action("clear"))
    }
}

impl Invocable for Scratchpad {
    fn invoke(&mut self, _action: &str, _args: &ActionArgs) -> anyhow::Result<Value> {
        Ok(Value::Null)
    }
}

/// Accessors guarded by roles rather than feature permissions.
#[derive(Debug, Default)]
pub struct Vault {
    pub code: String,
    pub label: String,
}

impl Introspect for Vault {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::new("Vault")
            .domain_object(Nature::Entity)
            .member(MemberDescriptor::property("getCode").requires_all_roles(&["admin"]))
            .member(MemberDescriptor::untagged("setCode").requires_all_roles(&["admin", "customer-manager"]))
            .member(MemberDescriptor::property("getLabel"))
    }
}

impl Invocable for Vault {
    fn invoke(&mut self, action: &str, _args: &ActionArgs) -> anyhow::Result<Value> {
        bail!("unknown action {action}")
    }

    fn read_property(&self, property: &str) -> anyhow::Result<Value> {
        match property {
            "code" => Ok(json!(self.code)),
            other => bail!("{other} is write-only"),
        }
    }

    fn write_property(&mut self, property: &str, value: Value) -> anyhow::Result<()> {
        let text = value.as_str().context("expected a string")?.to_string();
        match property {
            "code" => self.code = text,
            "label" => self.label = text,
            other => bail!("no writable property {other}"),
        }
        Ok(())
    }
}

// ============================================================================
// Realm
// ============================================================================

fn role(name: &str, permissions: &[(&str, PermissionRule, AccessMode)]) -> RoleDefinition {
    RoleDefinition {
        name: name.to_string(),
        description: String::new(),
        permissions: permissions
            .iter()
            .map(|(feature, rule, mode)| PermissionDefinition {
                feature: FeatureId::from(*feature),
                rule: *rule,
                mode: *mode,
            })
            .collect(),
    }
}

fn principal(username: &str, status: PrincipalStatus, roles: &[&str]) -> PrincipalDefinition {
    PrincipalDefinition {
        username: username.to_string(),
        name: username.to_string(),
        email: format!("{username}@example.com"),
        status,
        roles: roles.iter().map(ToString::to_string).collect(),
    }
}

/// Roles:
/// - `user`: ALLOW Customer VIEWING
/// - `customer-manager`: ALLOW Customer CHANGING
/// - `admin`: VETO Order VIEWING
/// - `order-manager`: ALLOW Order CHANGING
///
/// Principals: `alice` (user), `carol` (admin, order-manager),
/// `dave` (order-manager), `bob` (locked, user).
pub fn config() -> ApertureConfig {
    let mut config = ApertureConfig::default();
    config.security.audit = false;
    config.security.roles = vec![
        role("user", &[("Customer", PermissionRule::Allow, AccessMode::Viewing)]),
        role(
            "customer-manager",
            &[("Customer", PermissionRule::Allow, AccessMode::Changing)],
        ),
        role("admin", &[("Order", PermissionRule::Veto, AccessMode::Viewing)]),
        role(
            "order-manager",
            &[("Order", PermissionRule::Allow, AccessMode::Changing)],
        ),
    ];
    config.security.principals = vec![
        principal("alice", PrincipalStatus::Unlocked, &["user"]),
        principal("carol", PrincipalStatus::Unlocked, &["admin", "order-manager"]),
        principal("dave", PrincipalStatus::Unlocked, &["order-manager"]),
        principal("bob", PrincipalStatus::Locked, &["user"]),
    ];
    config
}

pub fn aperture() -> Aperture {
    Aperture::from_config(&config()).expect("fixture config is valid")
}

// ============================================================================
// Listeners
// ============================================================================

/// Records every event; optionally vetoes one action in the validate phase.
#[derive(Default)]
pub struct Recorder {
    events: Mutex<Vec<DomainEvent>>,
    veto_action: Option<String>,
}

impl Recorder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn vetoing(action: &str) -> Arc<Self> {
        Arc::new(Self {
            events: Mutex::new(Vec::new()),
            veto_action: Some(action.to_string()),
        })
    }

    pub fn events(&self) -> Vec<DomainEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn phases(&self) -> Vec<EventPhase> {
        self.events().iter().map(DomainEvent::phase).collect()
    }
}

impl EventListener for Recorder {
    fn on_event(&self, event: &DomainEvent) -> Result<(), Veto> {
        self.events.lock().unwrap().push(event.clone());
        match (&self.veto_action, event.as_action()) {
            (Some(vetoed), Some(action))
                if action.action_id == *vetoed && event.phase() == EventPhase::Validate =>
            {
                Err(Veto::new(format!("{vetoed} is frozen")))
            }
            _ => Ok(()),
        }
    }
}
