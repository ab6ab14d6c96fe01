//! Configuration with layered resolution using figment.
//!
//! Resolution order (highest priority last):
//! 1. User config: `~/.config/graph-ogm/config.toml` (XDG) or platform config dir
//! 2. Project config: `ogm.toml`
//! 3. Environment variables: `OGM_*`, nested keys separated by `__`
//!    (e.g. `OGM_DATABASE__URL`)
//!
//! # Example
//!
//! ```toml
//! [database]
//! url = "memory:people"
//! name = "people"
//! server_user = "root"
//! server_password = "root"
//! username = "admin"
//! password = "admin"
//!
//! [mapping]
//! auto_generate_schema = true
//! entity_namespace = "my_app::model"
//! ```

use std::ops::Deref;
use std::path::Path;

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::Deserialize;

/// Boxed wrapper for figment::Error to reduce Result size on the stack.
#[derive(Debug)]
pub struct ConfigError(Box<figment::Error>);

impl Deref for ConfigError {
    type Target = figment::Error;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0.source()
    }
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self(Box::new(err))
    }
}

/// Root configuration structure.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub mapping: MappingConfig,
}

/// Connection settings handed to the driver.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Connection URL; the scheme selects the backend (`memory:<name>`).
    pub url: String,
    /// Database name.
    pub name: String,
    /// Server-level credentials, used by drivers that create databases.
    #[serde(default)]
    pub server_user: Option<String>,
    #[serde(default)]
    pub server_password: Option<String>,
    /// Application credentials used to open sessions.
    pub username: String,
    pub password: String,
}

/// Settings for the mapping layer itself.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MappingConfig {
    /// Create classes and indexes for registered entities at bootstrap.
    #[serde(default)]
    pub auto_generate_schema: bool,
    /// Module path prefix entity types must live under. Empty accepts all.
    #[serde(default)]
    pub entity_namespace: Option<String>,
}

impl Config {
    /// Load config with layered resolution (user → project → env).
    pub fn load() -> Result<Self, ConfigError> {
        Self::figment().extract().map_err(ConfigError::from)
    }

    /// Load config from a single TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Figment::new()
            .merge(Toml::file(path.as_ref()))
            .extract()
            .map_err(ConfigError::from)
    }

    /// The layered provider used by [`Config::load`].
    pub fn figment() -> Figment {
        Figment::new()
            // Layer 1: User config (lowest priority)
            .merge(Toml::file(Self::user_config_path()))
            // Layer 2: Project config
            .merge(Toml::file("ogm.toml"))
            // Layer 3: Environment variables (highest priority)
            .merge(Env::prefixed("OGM_").split("__"))
    }

    /// User config path: ~/.config/graph-ogm/config.toml (XDG) or platform config dir.
    fn user_config_path() -> std::path::PathBuf {
        // Prefer XDG config location (~/.config) on all platforms
        if let Some(home) = dirs::home_dir() {
            let xdg_path = home.join(".config").join("graph-ogm").join("config.toml");
            if xdg_path.exists() {
                return xdg_path;
            }
        }
        dirs::config_dir()
            .map(|p| p.join("graph-ogm").join("config.toml"))
            .unwrap_or_default()
    }
}
