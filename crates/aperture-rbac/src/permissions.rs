//! Permissions and the combination algorithm.
//!
//! A [`Permission`] binds one role to one feature with a rule and a mode.
//! [`evaluate`] folds the permissions of many roles into a single decision:
//! a matching veto from any role wins over every allow, and the absence of
//! any match is a denial.

use std::fmt::{self, Display};

use aperture_types::{AccessMode, FeatureId, PermissionRule};
use serde::{Deserialize, Serialize};

use crate::roles::Role;

/// A (role, feature, rule, mode) tuple.
///
/// The role is held by name only; the [`Role`] owns its permissions.
/// Equality is structural over all four fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Permission {
    pub role: String,
    pub feature_id: FeatureId,
    pub rule: PermissionRule,
    pub mode: AccessMode,
}

impl Permission {
    pub fn new(
        role: impl Into<String>,
        feature_id: impl Into<FeatureId>,
        rule: PermissionRule,
        mode: AccessMode,
    ) -> Self {
        Self {
            role: role.into(),
            feature_id: feature_id.into(),
            rule,
            mode,
        }
    }

    /// Creates an `Allow` permission.
    pub fn allow(role: impl Into<String>, feature_id: impl Into<FeatureId>, mode: AccessMode) -> Self {
        Self::new(role, feature_id, PermissionRule::Allow, mode)
    }

    /// Creates a `Veto` permission.
    pub fn veto(role: impl Into<String>, feature_id: impl Into<FeatureId>, mode: AccessMode) -> Self {
        Self::new(role, feature_id, PermissionRule::Veto, mode)
    }

    /// Returns whether this permission grants `mode` on `feature_id`.
    ///
    /// A `Changing` allow satisfies a `Viewing` request.
    pub fn grants(&self, feature_id: &FeatureId, mode: AccessMode) -> bool {
        self.feature_id == *feature_id && self.rule == PermissionRule::Allow && self.mode >= mode
    }

    /// Returns whether this permission vetoes `mode` on `feature_id`.
    ///
    /// A `Viewing` veto also blocks a `Changing` request.
    pub fn vetoes(&self, feature_id: &FeatureId, mode: AccessMode) -> bool {
        self.feature_id == *feature_id && self.rule == PermissionRule::Veto && self.mode <= mode
    }
}

impl Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Permission[{}:{} {} {}]",
            self.role, self.feature_id, self.rule, self.mode
        )
    }
}

// ============================================================================
// Decision
// ============================================================================

/// Outcome of combining permissions across roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// At least one permission grants and none vetoes.
    Granted,
    /// A permission vetoes the request.
    Vetoed,
    /// No permission matches the request.
    NoMatch,
}

/// The result of evaluating a request against a set of roles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub effect: Effect,
    /// The permission that decided the outcome, if any.
    pub matched: Option<Permission>,
}

impl Decision {
    pub fn is_granted(&self) -> bool {
        self.effect == Effect::Granted
    }
}

/// Combines the permissions of `roles` into one decision for
/// (`feature_id`, `mode`).
///
/// Vetoes are scanned first across every role, so a veto held by one role
/// cannot be overridden by an allow held by another.
pub fn evaluate<'a, I>(roles: I, feature_id: &FeatureId, mode: AccessMode) -> Decision
where
    I: IntoIterator<Item = &'a Role>,
{
    let roles: Vec<&Role> = roles.into_iter().collect();

    if let Some(veto) = roles
        .iter()
        .flat_map(|role| role.permissions())
        .find(|p| p.vetoes(feature_id, mode))
    {
        return Decision {
            effect: Effect::Vetoed,
            matched: Some(veto.clone()),
        };
    }

    match roles
        .iter()
        .flat_map(|role| role.permissions())
        .find(|p| p.grants(feature_id, mode))
    {
        Some(grant) => Decision {
            effect: Effect::Granted,
            matched: Some(grant.clone()),
        },
        None => Decision {
            effect: Effect::NoMatch,
            matched: None,
        },
    }
}

/// Shorthand for `evaluate(..).is_granted()`.
pub fn is_granted<'a, I>(roles: I, feature_id: &FeatureId, mode: AccessMode) -> bool
where
    I: IntoIterator<Item = &'a Role>,
{
    evaluate(roles, feature_id, mode).is_granted()
}
