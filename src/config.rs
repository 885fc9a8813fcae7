//! Configuration System
//!
//! Handles loading configuration from the TOML config file, environment
//! variables and command-line flags, and resolving them into one
//! [`RuntimeConfig`] per invocation.
//!
//! # Resolution order
//!
//! ```text
//! [env.<activeenv>]  →  --env / AX_ENV selects another environment
//!        ↓
//! inherit top-level url / authheader / kibanaversion where the environment has none
//!        ↓
//! AX_URL, AX_AUTH_HEADER, AX_INDEX
//!        ↓
//! --url, --index
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Name of the config file inside the data directory
pub const CONFIG_FILE_NAME: &str = "ax.toml";

/// Main configuration structure, as stored in `ax.toml`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Environment used when none is given on the command line
    #[serde(default)]
    pub activeenv: String,

    /// URL shared by environments that do not set their own
    #[serde(default)]
    pub url: String,

    /// Authorization header shared by environments that do not set their own
    #[serde(default)]
    pub authheader: String,

    #[serde(default)]
    pub kibanaversion: String,

    /// Named environments
    #[serde(default, rename = "env")]
    pub environments: BTreeMap<String, EnvironmentConfig>,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// One named backend environment
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    #[serde(default)]
    pub url: String,

    #[serde(default)]
    pub authheader: String,

    /// Index pattern to query (e.g., "turbo-*")
    #[serde(default)]
    pub index: String,

    #[serde(default)]
    pub kibanaversion: String,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive; `RUST_LOG` takes precedence
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: pretty or json
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "ax=warn".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    ///
    /// A missing file is an empty configuration, not an error.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No config file at {:?}", path);
                return Ok(Config::default());
            }
            Err(e) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    error: e.to_string(),
                })
            }
        };

        Self::parse(&content).map_err(|e| match e {
            ConfigError::Parse { error, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                error,
            },
            other => other,
        })
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: PathBuf::new(),
            error: e.to_string(),
        })
    }

    /// Look up a named environment
    pub fn environment(&self, name: &str) -> Result<&EnvironmentConfig, ConfigError> {
        self.environments
            .get(name)
            .ok_or_else(|| ConfigError::UnknownEnvironment(name.to_string()))
    }
}

/// Values that override the config file, from the process environment
/// and from command-line flags
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigOverrides {
    pub env: Option<String>,
    pub url: Option<String>,
    pub auth_header: Option<String>,
    pub index: Option<String>,
}

impl ConfigOverrides {
    /// Read `AX_ENV`, `AX_URL`, `AX_AUTH_HEADER` and `AX_INDEX`
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the override variables through `lookup`; empty values are ignored
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());
        Self {
            env: get("AX_ENV"),
            url: get("AX_URL"),
            auth_header: get("AX_AUTH_HEADER"),
            index: get("AX_INDEX"),
        }
    }

    /// Layer `other` on top of `self`; set values in `other` win
    pub fn merge(self, other: ConfigOverrides) -> Self {
        Self {
            env: other.env.or(self.env),
            url: other.url.or(self.url),
            auth_header: other.auth_header.or(self.auth_header),
            index: other.index.or(self.index),
        }
    }
}

/// Fully resolved settings for one invocation
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeConfig {
    /// Selected environment, if any
    pub environment: Option<String>,
    pub url: String,
    pub auth_header: String,
    /// Index pattern; only required for querying
    pub index: Option<String>,
    /// Empty means auto-detect
    pub kibana_version: String,
    /// Where cache files live
    pub data_dir: PathBuf,
}

impl RuntimeConfig {
    /// Resolve the runtime configuration
    ///
    /// `env_overrides` come from the process environment and `flag_overrides`
    /// from the command line; flags win.
    pub fn resolve(
        config: &Config,
        env_overrides: ConfigOverrides,
        flag_overrides: ConfigOverrides,
        data_dir: PathBuf,
    ) -> Result<Self, ConfigError> {
        let environment = flag_overrides
            .env
            .clone()
            .or_else(|| env_overrides.env.clone())
            .or_else(|| Some(config.activeenv.clone()).filter(|e| !e.is_empty()));

        let selected = match &environment {
            Some(name) => config.environment(name)?.clone(),
            None => EnvironmentConfig::default(),
        };

        let inherit = |own: String, shared: &str| {
            if own.is_empty() {
                shared.to_string()
            } else {
                own
            }
        };
        let mut url = inherit(selected.url, &config.url);
        let mut auth_header = inherit(selected.authheader, &config.authheader);
        let kibana_version = inherit(selected.kibanaversion, &config.kibanaversion);
        let mut index = Some(selected.index).filter(|i| !i.is_empty());

        let overrides = env_overrides.merge(flag_overrides);
        if let Some(u) = overrides.url {
            url = u;
        }
        if let Some(a) = overrides.auth_header {
            auth_header = a;
        }
        if let Some(i) = overrides.index {
            index = Some(i);
        }

        if url.is_empty() {
            return Err(ConfigError::MissingUrl);
        }

        Ok(Self {
            environment,
            url,
            auth_header,
            index,
            kibana_version,
            data_dir,
        })
    }

    /// Index pattern to query
    pub fn require_index(&self) -> Result<&str, ConfigError> {
        self.index.as_deref().ok_or(ConfigError::MissingIndex)
    }

    /// Key for per-environment cache files: the environment name, or the URL
    /// when none is selected
    pub fn cache_key(&self) -> &str {
        self.environment.as_deref().unwrap_or(&self.url)
    }
}

/// Default data directory: `<config dir>/ax`
pub fn data_dir() -> PathBuf {
    dirs::config_dir()
        .map(|p| p.join("ax"))
        .unwrap_or_else(|| PathBuf::from(".ax"))
}

/// Default config file location
pub fn default_config_path() -> PathBuf {
    data_dir().join(CONFIG_FILE_NAME)
}

/// Create the data directory, readable only by the owner
///
/// An existing directory keeps whatever mode it already has.
pub fn ensure_data_dir(path: &Path) -> Result<(), ConfigError> {
    #[cfg(unix)]
    let created = {
        use std::os::unix::fs::DirBuilderExt;
        std::fs::DirBuilder::new().recursive(true).mode(0o700).create(path)
    };
    #[cfg(not(unix))]
    let created = std::fs::create_dir_all(path);

    created.map_err(|e| ConfigError::Io {
        path: path.to_path_buf(),
        error: e.to_string(),
    })
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },

    #[error("Undefined environment: {0}")]
    UnknownEnvironment(String),

    #[error("No URL configured; set one in the config file, AX_URL or --url")]
    MissingUrl,

    #[error("No index configured; set one in the config file, AX_INDEX or --index")]
    MissingIndex,

    #[error("Invalid where clause {0:?}, expected field:value")]
    InvalidFilter(String),

    #[error("Could not parse time {0:?}")]
    InvalidTime(String),

    #[error("Invalid result count {0:?}, expected a positive integer")]
    InvalidLimit(String),
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# ax Configuration
#
# Environment variables override these settings:
# - AX_ENV
# - AX_URL
# - AX_AUTH_HEADER
# - AX_INDEX
# - RUST_LOG

# Environment used when --env is not given
activeenv = "prod"

# Shared by environments that do not set their own
url = "http://localhost:5601"
authheader = ""

# Kibana version sent as kbn-version; detected when empty
kibanaversion = ""

[env.prod]
url = "https://kibana.example.com"
# Passed through verbatim as the Authorization header
authheader = "Basic dXNlcjpwYXNzd29yZA=="
index = "logs-*"

[env.local]
index = "logs-*"

[logging]
# Log filter: trace, debug, info, warn, error (or a full directive)
level = "ax=warn"

# Log format: pretty or json
format = "pretty"
"#
    .to_string()
}
