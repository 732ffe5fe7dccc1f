//! # aperture: Authorized action invocation over domain objects
//!
//! Domain types describe themselves with `aperture_metamodel` descriptors;
//! roles, permissions, and principals live in an `aperture_rbac` realm.
//! This crate joins the two:
//!
//! - [`Guard`] applies the requirements declared on a type and its members
//!   to the principal of a [`Session`](aperture_rbac::Session)
//! - [`EventBus`] delivers domain events to listeners, which may veto during
//!   the validate phase
//! - [`ObjectStore`] holds domain objects by id
//! - [`ActionPipeline`] authorizes each action and wraps it in the
//!   VALIDATE → EXECUTING → EXECUTED event sequence
//! - [`Aperture`] wires everything from an
//!   [`ApertureConfig`](aperture_config::ApertureConfig)
//!
//! # Example
//!
//! ```
//! use aperture::Aperture;
//! use aperture_metamodel::{ActionArgs, Introspect, Invocable, MemberDescriptor, Nature, TypeDescriptor};
//! use aperture_types::{AccessMode, FeatureId};
//! use serde_json::{Value, json};
//!
//! struct Greeter;
//!
//! impl Introspect for Greeter {
//!     fn describe() -> TypeDescriptor {
//!         TypeDescriptor::new("Greeter")
//!             .domain_object(Nature::ViewModel)
//!             .member(MemberDescriptor::action("greet").requires_permission(AccessMode::Viewing))
//!     }
//! }
//!
//! impl Invocable for Greeter {
//!     fn invoke(&mut self, _action: &str, args: &ActionArgs) -> anyhow::Result<Value> {
//!         Ok(json!(format!("Hello, {}", args.str("name")?)))
//!     }
//! }
//!
//! let aperture = Aperture::new();
//! let realm = aperture.realm();
//! realm.create_role("user", "")?;
//! realm.create_principal("alice", "Alice", "alice@example.com")?;
//! realm.assign_role("alice", "user")?;
//! realm.grant("user", FeatureId::from("Greeter.greet"), AccessMode::Viewing)?;
//!
//! let id = aperture.persist(Box::new(Greeter))?;
//! let mut session = aperture.session();
//! session.authenticate("alice", "pw");
//!
//! let greeting = aperture.invoke(&session, &id, "greet", &ActionArgs::new().with("name", "Bob"))?;
//! assert_eq!(greeting, json!("Hello, Bob"));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod aperture;
mod error;
mod events;
mod guard;
mod pipeline;
mod store;


pub use aperture::{Aperture, build_realm};
pub use error::{EventError, InvocationError, Result, SetupError, StoreError};
pub use events::{
    ActionInvocationEvent, DomainEvent, EventBus, EventListener, EventPhase, EventSource,
    PropertyChangeEvent, Veto,
};
pub use guard::{Guard, GuardState};
pub use pipeline::{ActionPipeline, InvocationState};
pub use store::{InMemoryObjectStore, ObjectHandle, ObjectStore};
