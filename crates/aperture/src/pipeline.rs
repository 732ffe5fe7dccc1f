//! Action invocation pipeline.
//!
//! ```text
//! invoke(session, target, action, args)
//!   │
//!   ├─ resolve target ─────────────► NotFound
//!   ├─ resolve action ─────────────► UnknownAction
//!   ├─ guard ──────────────────────► Unauthenticated / AccessDenied   (no events)
//!   ├─ VALIDATE event ─────────────► Vetoed                           (action not run)
//!   ├─ EXECUTING event
//!   ├─ action body ────────────────► Action(err)                      (no EXECUTED)
//!   └─ EXECUTED event (return value attached) ──► value
//! ```
//!
//! The target's lock is held from resolution to the executed event, so the
//! phases of two invocations on one object never interleave. Invocations on
//! different objects run independently.
//!
//! Listeners run on the invoking thread while that lock is held. A listener
//! that calls back into the pipeline for the same object gets
//! [`InvocationError::Reentrant`] instead of blocking; other objects remain
//! reachable.

use std::any::TypeId;
use std::cell::RefCell;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, MutexGuard};

use aperture_metamodel::{
    ActionArgs, DomainObject, Editing, Introspect, ObjectSpec, PropertySpec, SpecRegistry,
};
use aperture_rbac::Session;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{EventError, InvocationError, Result};
use crate::events::{
    ActionInvocationEvent, DomainEvent, EventBus, EventPhase, EventSource, PropertyChangeEvent,
};
use crate::guard::{Guard, capitalize, decapitalize};
use crate::store::{ObjectHandle, ObjectStore};

/// Progress of one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationState {
    Resolved,
    Authorized,
    Validated,
    Executing,
    Executed,
    Rejected,
    Failed,
}

fn enter(action: &str, state: InvocationState) {
    debug!(action = %action, state = ?state, "Invocation state");
}

/// Resolves targets, authorizes, and sequences events around member calls.
#[derive(Clone)]
pub struct ActionPipeline {
    registry: Arc<SpecRegistry>,
    store: Arc<dyn ObjectStore>,
    bus: Arc<EventBus>,
    guard: Guard,
}

impl std::fmt::Debug for ActionPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionPipeline")
            .field("registry", &self.registry)
            .field("bus", &self.bus)
            .field("guard", &self.guard)
            .finish_non_exhaustive()
    }
}

impl ActionPipeline {
    pub fn new(
        registry: Arc<SpecRegistry>,
        store: Arc<dyn ObjectStore>,
        bus: Arc<EventBus>,
        guard: Guard,
    ) -> Self {
        Self {
            registry,
            store,
            bus,
            guard,
        }
    }

    pub fn registry(&self) -> &Arc<SpecRegistry> {
        &self.registry
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    // ========================================================================
    // Objects
    // ========================================================================

    /// Stores a domain object and returns its id.
    ///
    /// The object's specification is built (or fetched) first, so a type
    /// without the domain-object marker is rejected before it is stored.
    pub fn persist(&self, object: Box<dyn DomainObject>) -> Result<String> {
        let spec = self.registry.load_object(&*object)?;
        let id = self.store.put(object)?;
        debug!(id = %id, object_type = %spec.object_type(), "Object persisted");
        Ok(id)
    }

    pub fn find(&self, id: &str) -> Result<ObjectHandle> {
        self.store
            .get(id)?
            .ok_or_else(|| InvocationError::NotFound(id.to_string()))
    }

    /// Stored objects of type `T`, ordered by id.
    pub fn find_all<T: Introspect + 'static>(&self) -> Result<Vec<(String, ObjectHandle)>> {
        Ok(self.store.all_of_type(TypeId::of::<T>())?)
    }

    pub fn all_objects(&self) -> Result<Vec<(String, ObjectHandle)>> {
        Ok(self.store.all()?)
    }

    /// Specification of the object stored under `id`.
    pub fn specification(&self, id: &str) -> Result<Arc<ObjectSpec>> {
        let handle = self.find(id)?;
        let target = lock(&handle, id)?;
        Ok(self.registry.load_object(&**target)?)
    }

    // ========================================================================
    // Actions
    // ========================================================================

    /// Invokes `action_id` on the object stored under `target_id`.
    pub fn invoke(
        &self,
        session: &Session,
        target_id: &str,
        action_id: &str,
        args: &ActionArgs,
    ) -> Result<Value> {
        let handle = self.find(target_id)?;
        let mut target = lock(&handle, target_id)?;
        let spec = self.registry.load_object(&**target)?;
        enter(action_id, InvocationState::Resolved);

        if spec.action(action_id).is_none() {
            enter(action_id, InvocationState::Rejected);
            return Err(InvocationError::UnknownAction {
                object_type: spec.object_type().to_string(),
                action: action_id.to_string(),
            });
        }

        if let Err(e) = self.guard.check_access(session, &spec, Some(action_id)) {
            enter(action_id, InvocationState::Rejected);
            return Err(e.into());
        }
        enter(action_id, InvocationState::Authorized);

        let source = EventSource {
            object_id: target_id.to_string(),
            object_type: spec.object_type().to_string(),
        };
        let event = |phase: EventPhase, return_value: Option<Value>| {
            DomainEvent::ActionInvocation(ActionInvocationEvent {
                source: source.clone(),
                phase,
                action_id: action_id.to_string(),
                arguments: args.clone(),
                return_value,
            })
        };

        self.publish(action_id, &event(EventPhase::Validate, None))?;
        enter(action_id, InvocationState::Validated);

        self.publish(action_id, &event(EventPhase::Executing, None))?;
        enter(action_id, InvocationState::Executing);

        let value = match target.dispatch(action_id, args) {
            Ok(value) => value,
            Err(e) => {
                enter(action_id, InvocationState::Failed);
                return Err(InvocationError::Action(e));
            }
        };

        self.publish(action_id, &event(EventPhase::Executed, Some(value.clone())))?;
        enter(action_id, InvocationState::Executed);

        info!(
            action = %action_id,
            object_type = %spec.object_type(),
            principal = ?session.current_username(),
            "Action executed"
        );
        Ok(value)
    }

    fn publish(&self, action_id: &str, event: &DomainEvent) -> Result<()> {
        self.bus.publish(event).map_err(|e| match e {
            EventError::Vetoed(reason) => {
                enter(action_id, InvocationState::Rejected);
                InvocationError::Vetoed {
                    action: action_id.to_string(),
                    reason,
                }
            }
            EventError::Internal(msg) => InvocationError::Internal(msg),
        })
    }

    // ========================================================================
    // Properties
    // ========================================================================

    /// Reads `property` of the object under `target_id`.
    ///
    /// The property may be named as `"name"` or by its accessor id
    /// `"getName"`; both are authorized identically.
    pub fn read_property(&self, session: &Session, target_id: &str, property: &str) -> Result<Value> {
        let handle = self.find(target_id)?;
        let target = lock(&handle, target_id)?;
        let spec = self.registry.load_object(&**target)?;
        let property = canonical_name(resolve_property(&spec, property)?);

        self.guard.check_property_access(session, &spec, &property, false)?;
        target.get_property(&property).map_err(InvocationError::Action)
    }

    /// Writes `property` and publishes a property change event.
    ///
    /// Disabled properties, missing mandatory values, and strings over the
    /// declared maximum length are rejected after authorization. The previous
    /// value must be readable, since it is carried by the change event.
    pub fn set_property(
        &self,
        session: &Session,
        target_id: &str,
        property: &str,
        value: Value,
    ) -> Result<()> {
        let handle = self.find(target_id)?;
        let mut target = lock(&handle, target_id)?;
        let spec = self.registry.load_object(&**target)?;
        let property_spec = resolve_property(&spec, property)?;
        let property = canonical_name(property_spec);

        self.guard.check_property_access(session, &spec, &property, true)?;
        validate_value(property_spec, &property, &value)?;

        let old_value = target.get_property(&property).map_err(|e| {
            warn!(property = %property, error = %e, "Cannot read previous value");
            InvocationError::Action(e)
        })?;
        target
            .set_property(&property, value.clone())
            .map_err(InvocationError::Action)?;

        let event = DomainEvent::PropertyChange(PropertyChangeEvent {
            source: EventSource {
                object_id: target_id.to_string(),
                object_type: spec.object_type().to_string(),
            },
            phase: EventPhase::Executed,
            property_id: property_spec.id.clone(),
            old_value,
            new_value: value,
        });
        self.bus.publish(&event).map_err(|e| InvocationError::Internal(e.to_string()))?;

        info!(
            property = %property,
            object_type = %spec.object_type(),
            principal = ?session.current_username(),
            "Property changed"
        );
        Ok(())
    }
}

// ============================================================================
// Target locking
// ============================================================================

thread_local! {
    /// Targets locked by the current thread, keyed by handle address.
    static HELD_TARGETS: RefCell<Vec<usize>> = const { RefCell::new(Vec::new()) };
}

/// Exclusive access to one stored object, registered as held by this thread.
struct TargetLock<'a> {
    guard: MutexGuard<'a, Box<dyn DomainObject>>,
    key: usize,
}

impl Deref for TargetLock<'_> {
    type Target = Box<dyn DomainObject>;

    fn deref(&self) -> &Self::Target {
        &self.guard
    }
}

impl DerefMut for TargetLock<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.guard
    }
}

impl Drop for TargetLock<'_> {
    fn drop(&mut self) {
        HELD_TARGETS.with(|held| {
            let mut held = held.borrow_mut();
            if let Some(pos) = held.iter().rposition(|k| *k == self.key) {
                held.swap_remove(pos);
            }
        });
    }
}

/// Locks `handle`, failing instead of blocking when this thread already
/// holds it.
fn lock<'a>(handle: &'a ObjectHandle, id: &str) -> Result<TargetLock<'a>> {
    let key = Arc::as_ptr(handle) as usize;
    if HELD_TARGETS.with(|held| held.borrow().contains(&key)) {
        warn!(id = %id, "Re-entrant access to a target already in use");
        return Err(InvocationError::Reentrant(id.to_string()));
    }

    let guard = handle.lock().map_err(|_| InvocationError::poisoned())?;
    HELD_TARGETS.with(|held| held.borrow_mut().push(key));
    Ok(TargetLock { guard, key })
}

/// Property name used by accessors and object dispatch: `Name` → `name`.
fn canonical_name(spec: &PropertySpec) -> String {
    decapitalize(&spec.name)
}

/// Finds the property spec for `property` by member id or display name.
fn resolve_property<'a>(spec: &'a ObjectSpec, property: &str) -> Result<&'a PropertySpec> {
    let capitalized = capitalize(property);
    spec.properties()
        .iter()
        .find(|p| p.id == property || p.name == property || p.name == capitalized)
        .ok_or_else(|| InvocationError::UnknownProperty {
            object_type: spec.object_type().to_string(),
            property: property.to_string(),
        })
}

fn validate_value(spec: &PropertySpec, property: &str, value: &Value) -> Result<()> {
    if spec.editing == Editing::Disabled {
        return Err(InvocationError::NotEditable {
            property: property.to_string(),
        });
    }
    if spec.mandatory && (value.is_null() || value.as_str().is_some_and(str::is_empty)) {
        return Err(InvocationError::InvalidValue {
            property: property.to_string(),
            reason: "value is mandatory".to_string(),
        });
    }
    if let (Some(max), Some(s)) = (spec.max_length, value.as_str()) {
        if s.chars().count() > max as usize {
            return Err(InvocationError::InvalidValue {
                property: property.to_string(),
                reason: format!("longer than {max} characters"),
            });
        }
    }
    Ok(())
}
