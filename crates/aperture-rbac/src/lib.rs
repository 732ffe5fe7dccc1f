//! # aperture-rbac: Role and feature permission resolution
//!
//! Decides whether a principal may VIEW or CHANGE a feature:
//! - **Permissions** bind a role to a feature with a rule (allow / veto) and a mode
//! - **Roles** own permissions and are shared between principals
//! - **Principals** hold roles by name and carry an account status
//! - **Sessions** carry at most one authenticated principal and are passed
//!   explicitly to every check
//!
//! ## Combination
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │  hasPermission(principal, feature, mode)     │
//! └─────────────────┬───────────────────────────┘
//!                   │
//!                   ▼
//! ┌─────────────────────────────────────────────┐
//! │  1. Any permission of any role vetoes?       │──► denied
//! │  2. Any permission of any role grants?       │──► granted
//! │  3. Nothing matched                          │──► denied (closed world)
//! └─────────────────────────────────────────────┘
//! ```
//!
//! | Permission        | Satisfies VIEWING | Satisfies CHANGING |
//! |-------------------|-------------------|--------------------|
//! | ALLOW  VIEWING    | ✓                 | ✗                  |
//! | ALLOW  CHANGING   | ✓                 | ✓                  |
//! | VETO   VIEWING    | blocks            | blocks             |
//! | VETO   CHANGING   | -                 | blocks             |
//!
//! ## Examples
//!
//! ```
//! use aperture_rbac::{SecurityRealm, Session};
//! use aperture_types::{AccessMode, FeatureId};
//! use std::sync::Arc;
//!
//! let realm = Arc::new(SecurityRealm::new());
//! realm.create_role("user", "Regular user")?;
//! realm.create_principal("alice", "Alice", "alice@example.com")?;
//! realm.assign_role("alice", "user")?;
//! realm.grant("user", FeatureId::from("Customer"), AccessMode::Viewing)?;
//!
//! let mut session = Session::new(Arc::clone(&realm));
//! assert!(session.authenticate("alice", "secret"));
//! assert!(session.can_view(&FeatureId::from("Customer")));
//! assert!(!session.can_change(&FeatureId::from("Customer")));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod error;
pub mod permissions;
pub mod principal;
pub mod realm;
pub mod roles;
pub mod session;

pub use error::{AccessError, RealmError};
pub use permissions::{Decision, Effect, Permission, evaluate, is_granted};
pub use principal::{Principal, PrincipalStatus};
pub use realm::SecurityRealm;
pub use roles::Role;
pub use session::Session;
