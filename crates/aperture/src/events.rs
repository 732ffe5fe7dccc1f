//! Domain events and the synchronous event bus.
//!
//! Listeners run on the publishing thread, in subscription order. During
//! the [`EventPhase::Validate`] phase a listener may refuse the event by
//! returning a [`Veto`]; the first veto stops delivery and is reported to
//! the publisher. Vetoes returned in later phases are logged and ignored.
//!
//! With the `broadcast` feature every delivered event is also mirrored to a
//! `tokio::sync::broadcast` channel for asynchronous consumers.

use std::fmt;
use std::sync::{Arc, RwLock};

use aperture_metamodel::ActionArgs;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::error::EventError;

#[cfg(feature = "broadcast")]
use tokio::sync::broadcast;

/// Phase of a domain event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventPhase {
    /// Before execution. Listeners may veto.
    Validate,
    /// About to execute.
    Executing,
    /// After execution.
    Executed,
}

/// The object an event is about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventSource {
    pub object_id: String,
    pub object_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionInvocationEvent {
    pub source: EventSource,
    pub phase: EventPhase,
    pub action_id: String,
    pub arguments: ActionArgs,
    /// Set only in the executed phase.
    pub return_value: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PropertyChangeEvent {
    pub source: EventSource,
    pub phase: EventPhase,
    pub property_id: String,
    pub old_value: Value,
    pub new_value: Value,
}

/// Any event published on the bus.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum DomainEvent {
    ActionInvocation(ActionInvocationEvent),
    PropertyChange(PropertyChangeEvent),
}

impl DomainEvent {
    pub fn phase(&self) -> EventPhase {
        match self {
            DomainEvent::ActionInvocation(e) => e.phase,
            DomainEvent::PropertyChange(e) => e.phase,
        }
    }

    pub fn source(&self) -> &EventSource {
        match self {
            DomainEvent::ActionInvocation(e) => &e.source,
            DomainEvent::PropertyChange(e) => &e.source,
        }
    }

    pub fn as_action(&self) -> Option<&ActionInvocationEvent> {
        match self {
            DomainEvent::ActionInvocation(e) => Some(e),
            DomainEvent::PropertyChange(_) => None,
        }
    }

    pub fn as_property_change(&self) -> Option<&PropertyChangeEvent> {
        match self {
            DomainEvent::PropertyChange(e) => Some(e),
            DomainEvent::ActionInvocation(_) => None,
        }
    }
}

/// A listener's refusal of an event.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}")]
pub struct Veto {
    pub reason: String,
}

impl Veto {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Receives domain events.
///
/// Listeners must not invoke actions on the event's source object from
/// inside `on_event`; the source is locked for the whole invocation.
pub trait EventListener: Send + Sync {
    fn on_event(&self, event: &DomainEvent) -> Result<(), Veto>;
}

impl<F> EventListener for F
where
    F: Fn(&DomainEvent) -> Result<(), Veto> + Send + Sync,
{
    fn on_event(&self, event: &DomainEvent) -> Result<(), Veto> {
        self(event)
    }
}

/// Synchronous publish/subscribe hub for domain events.
pub struct EventBus {
    listeners: RwLock<Vec<Arc<dyn EventListener>>>,
    #[cfg(feature = "broadcast")]
    tx: broadcast::Sender<DomainEvent>,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listener_count())
            .finish_non_exhaustive()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_buffer(256)
    }

    /// Creates a bus whose broadcast mirror buffers `buffer_size` events.
    ///
    /// Without the `broadcast` feature the size is unused.
    pub fn with_buffer(buffer_size: usize) -> Self {
        #[cfg(feature = "broadcast")]
        let (tx, _rx) = broadcast::channel(buffer_size.max(1));
        #[cfg(not(feature = "broadcast"))]
        let _ = buffer_size;

        Self {
            listeners: RwLock::new(Vec::new()),
            #[cfg(feature = "broadcast")]
            tx,
        }
    }

    pub fn subscribe(&self, listener: Arc<dyn EventListener>) -> Result<(), EventError> {
        self.listeners
            .write()
            .map_err(|_| EventError::Internal("lock poisoned".to_string()))?
            .push(listener);
        Ok(())
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().map_or(0, |l| l.len())
    }

    /// Delivers `event` to every listener.
    ///
    /// Returns `Err(EventError::Vetoed)` only for a veto in the validate
    /// phase; listeners after the vetoing one are not called and the event
    /// is not mirrored.
    pub fn publish(&self, event: &DomainEvent) -> Result<(), EventError> {
        // Snapshot so listeners may subscribe others without deadlocking.
        let listeners: Vec<Arc<dyn EventListener>> = self
            .listeners
            .read()
            .map_err(|_| EventError::Internal("lock poisoned".to_string()))?
            .clone();

        let phase = event.phase();
        for listener in &listeners {
            if let Err(veto) = listener.on_event(event) {
                if phase == EventPhase::Validate {
                    debug!(
                        object_id = %event.source().object_id,
                        reason = %veto.reason,
                        "Event vetoed"
                    );
                    return Err(EventError::Vetoed(veto.reason));
                }
                warn!(
                    object_id = %event.source().object_id,
                    phase = ?phase,
                    reason = %veto.reason,
                    "Veto outside validate phase ignored"
                );
            }
        }

        #[cfg(feature = "broadcast")]
        {
            // No receivers is not an error.
            let _ = self.tx.send(event.clone());
        }

        Ok(())
    }

    /// Subscribes to the broadcast mirror.
    #[cfg(feature = "broadcast")]
    pub fn subscribe_broadcast(&self) -> broadcast::Receiver<DomainEvent> {
        self.tx.subscribe()
    }
}
