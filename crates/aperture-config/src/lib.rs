//! Configuration management for Aperture
//!
//! Provides hierarchical configuration loading from multiple sources:
//! 1. Environment variables (APERTURE_* prefix, `__` between sections)
//! 2. aperture.local.toml (local overrides)
//! 3. aperture.toml (project config)
//! 4. ~/.config/aperture/config.toml (user defaults)
//! 5. Built-in defaults (lowest precedence)
//!
//! The `[security]` table is the administrative path for declaring roles,
//! their permissions, and principals.

use anyhow::Result;
use aperture_rbac::PrincipalStatus;
use aperture_types::{AccessMode, FeatureId, PermissionRule};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

mod error;
mod loader;

pub use error::ConfigError;
pub use loader::{ConfigLoader, LOCAL_CONFIG_FILE, PROJECT_CONFIG_FILE, user_config_file};

/// Main Aperture configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ApertureConfig {
    pub security: SecurityConfig,
    pub events: EventConfig,
    pub store: StoreConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Audit-log every guard decision.
    pub audit: bool,
    /// Permit a realm with no roles at all (every check then denies).
    pub allow_empty_realm: bool,
    pub roles: Vec<RoleDefinition>,
    pub principals: Vec<PrincipalDefinition>,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            audit: true,
            allow_empty_realm: true,
            roles: Vec::new(),
            principals: Vec::new(),
        }
    }
}

/// Role definition from config
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleDefinition {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub permissions: Vec<PermissionDefinition>,
}

/// Permission definition from config. Rule defaults to allow, mode to viewing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionDefinition {
    pub feature: FeatureId,
    #[serde(default)]
    pub rule: PermissionRule,
    #[serde(default)]
    pub mode: AccessMode,
}

/// Principal definition from config
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrincipalDefinition {
    pub username: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub status: PrincipalStatus,
    #[serde(default)]
    pub roles: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EventConfig {
    /// Capacity of the broadcast mirror channel.
    pub broadcast_buffer: usize,
}

impl Default for EventConfig {
    fn default() -> Self {
        Self {
            broadcast_buffer: 256,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Prefix generated object ids with the object type name.
    pub id_prefix_with_type: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            id_prefix_with_type: true,
        }
    }
}

impl ApertureConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self> {
        ConfigLoader::new().load()
    }

    /// Load configuration from specific project directory
    pub fn load_from_dir(project_dir: impl AsRef<Path>) -> Result<Self> {
        ConfigLoader::new().with_project_dir(project_dir).load()
    }

    /// Parse a single TOML file, without layering.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&text).map_err(|source| ConfigError::ParseError {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Checks cross-references between role and principal definitions.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let security = &self.security;

        if security.roles.is_empty() && !security.allow_empty_realm {
            return Err(ConfigError::ValidationError(
                "no roles declared and allow_empty_realm is false".to_string(),
            ));
        }

        let mut role_names = HashSet::new();
        for role in &security.roles {
            if role.name.trim().is_empty() {
                return Err(ConfigError::ValidationError("role with empty name".to_string()));
            }
            if !role_names.insert(role.name.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "duplicate role: {}",
                    role.name
                )));
            }
        }

        let mut usernames = HashSet::new();
        for principal in &security.principals {
            if !usernames.insert(principal.username.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "duplicate principal: {}",
                    principal.username
                )));
            }
            if let Some(missing) = principal
                .roles
                .iter()
                .find(|r| !role_names.contains(r.as_str()))
            {
                return Err(ConfigError::ValidationError(format!(
                    "principal {} references undeclared role {missing}",
                    principal.username
                )));
            }
        }

        if self.events.broadcast_buffer == 0 {
            return Err(ConfigError::ValidationError(
                "events.broadcast_buffer must be positive".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn role(name: &str) -> RoleDefinition {
        RoleDefinition {
            name: name.to_string(),
            description: String::new(),
            permissions: Vec::new(),
        }
    }

    fn principal(username: &str, roles: &[&str]) -> PrincipalDefinition {
        PrincipalDefinition {
            username: username.to_string(),
            name: String::new(),
            email: String::new(),
            status: PrincipalStatus::Unlocked,
            roles: roles.iter().map(ToString::to_string).collect(),
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = ApertureConfig::default();
        assert!(config.security.audit);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_duplicate_role_rejected() {
        let mut config = ApertureConfig::default();
        config.security.roles = vec![role("user"), role("user")];
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate role: user"));
    }

    #[test]
    fn test_duplicate_principal_rejected() {
        let mut config = ApertureConfig::default();
        config.security.roles = vec![role("user")];
        config.security.principals = vec![principal("alice", &["user"]), principal("alice", &[])];
        assert!(matches!(config.validate(), Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_empty_realm_policy() {
        let mut config = ApertureConfig::default();
        config.security.allow_empty_realm = false;
        assert!(config.validate().is_err());
        config.security.roles.push(role("user"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_toml_file() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let path = temp_dir.path().join("security.toml");
        std::fs::write(
            &path,
            r#"
[[security.roles]]
name = "customer-manager"

[[security.roles.permissions]]
feature = "Customer"
mode = "changing"
"#,
        )
        .expect("Failed to write config");

        let config = ApertureConfig::from_toml_file(&path).expect("Failed to parse config");
        let perm = &config.security.roles[0].permissions[0];
        assert_eq!(perm.feature, FeatureId::from("Customer"));
        assert_eq!(perm.mode, AccessMode::Changing);

        let missing = ApertureConfig::from_toml_file(temp_dir.path().join("missing.toml"));
        assert!(matches!(missing, Err(ConfigError::ReadError { .. })));
    }

    #[test]
    fn test_parse_error_reports_path() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let path = temp_dir.path().join("broken.toml");
        std::fs::write(&path, "[security\naudit = ").expect("Failed to write config");
        assert!(matches!(
            ApertureConfig::from_toml_file(&path),
            Err(ConfigError::ParseError { .. })
        ));
    }
}
