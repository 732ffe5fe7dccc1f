//! Layered configuration loading.
//!
//! Later layers override earlier ones: built-in defaults, the user file
//! (`~/.config/aperture/config.toml`), `aperture.toml`,
//! `aperture.local.toml`, then `APERTURE_*` environment variables.

use crate::ApertureConfig;
use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::env;
use std::path::{Path, PathBuf};

/// Checked-in project configuration.
pub const PROJECT_CONFIG_FILE: &str = "aperture.toml";

/// Per-checkout overrides, not checked in.
pub const LOCAL_CONFIG_FILE: &str = "aperture.local.toml";

/// `~/.config/aperture/config.toml`, when a home directory can be found.
pub fn user_config_file() -> Option<PathBuf> {
    ProjectDirs::from("rs", "Aperture", "aperture").map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Configuration loader with builder pattern
pub struct ConfigLoader {
    project_dir: PathBuf,
    env_prefix: String,
    include_user_config: bool,
}

impl ConfigLoader {
    /// Loader rooted at the current directory.
    pub fn new() -> Self {
        Self {
            project_dir: env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            env_prefix: "APERTURE".to_string(),
            include_user_config: true,
        }
    }

    pub fn with_project_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.project_dir = dir.as_ref().to_path_buf();
        self
    }

    /// Set the environment variable prefix (default: "APERTURE")
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Skip ~/.config/aperture/config.toml.
    pub fn without_user_config(mut self) -> Self {
        self.include_user_config = false;
        self
    }

    /// Load configuration from all sources with proper precedence, then
    /// validate it.
    pub fn load(self) -> Result<ApertureConfig> {
        let mut builder = config::Config::builder();

        // 1. Built-in defaults
        let defaults = ApertureConfig::default();
        builder = builder.add_source(config::Config::try_from(&defaults)?);

        // 2-4. User, project, and local files, when present
        for file in self.config_files() {
            builder = builder.add_source(
                config::File::from(file)
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        }

        // 5. Environment variables (APERTURE_SECURITY__AUDIT=false)
        builder = builder.add_source(
            config::Environment::with_prefix(&self.env_prefix)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build().context("Failed to build configuration")?;

        let aperture_config: ApertureConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        aperture_config
            .validate()
            .context("Configuration failed validation")?;

        Ok(aperture_config)
    }

    /// Configuration files that exist, in precedence order (lowest first).
    pub fn config_files(&self) -> Vec<PathBuf> {
        let user = self.include_user_config.then(user_config_file).flatten();
        user.into_iter()
            .chain([
                self.project_dir.join(PROJECT_CONFIG_FILE),
                self.project_dir.join(LOCAL_CONFIG_FILE),
            ])
            .filter(|path| path.exists())
            .collect()
    }

    /// Load configuration or fall back to defaults
    pub fn load_or_default(self) -> ApertureConfig {
        self.load().unwrap_or_default()
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
