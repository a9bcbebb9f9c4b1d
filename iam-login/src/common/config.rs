use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use super::arn::IamEntity;
use super::types::RoleEntry;

/// Default public STS endpoint
pub const DEFAULT_STS_ENDPOINT: &str = "https://sts.amazonaws.com";

/// Configuration for the login server
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct IamLoginConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// How signed identity requests are checked and forwarded
    #[serde(default)]
    pub identity: IdentityConfig,

    /// Login roles keyed by name
    #[serde(default)]
    pub roles: HashMap<String, RoleEntry>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Port for login and health requests
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,

    /// Maximum accepted login body size in bytes
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

/// Identity verification configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Value callers must send and sign in the `X-IAM-Server-ID` header.
    /// When unset the header is not checked.
    #[serde(default)]
    pub iam_server_id_header_value: Option<String>,

    /// STS endpoint signed requests are replayed against
    #[serde(default = "default_sts_endpoint")]
    pub sts_endpoint: String,

    /// Timeout for the replayed STS call in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,
}

impl IdentityConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to log in JSON format
    #[serde(default)]
    pub json_format: bool,
}

impl IamLoginConfig {
    /// Load configuration from a YAML file
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        Self::from_yaml(&raw).with_context(|| format!("loading config file {}", path.display()))
    }

    /// Parse YAML and canonicalize every role's bound principals
    pub fn from_yaml(raw: &str) -> Result<Self> {
        let mut config: Self = serde_yaml::from_str(raw)?;
        config.canonicalize_roles()?;
        Ok(config)
    }

    fn canonicalize_roles(&mut self) -> Result<()> {
        for (name, role) in self.roles.iter_mut() {
            role.bound_iam_principal_arn = role
                .bound_iam_principal_arn
                .iter()
                .map(|arn| {
                    IamEntity::parse(arn)
                        .map(|entity| entity.canonical_arn())
                        .with_context(|| format!("role {} has an invalid bound principal", name))
                })
                .collect::<Result<Vec<_>>>()?;
        }
        Ok(())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_port: default_listen_port(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            iam_server_id_header_value: None,
            sts_endpoint: default_sts_endpoint(),
            request_timeout: default_request_timeout(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json_format: false,
        }
    }
}

// Default value functions
fn default_listen_port() -> u16 {
    8200
}
fn default_max_body_bytes() -> usize {
    64 * 1024
}
fn default_sts_endpoint() -> String {
    DEFAULT_STS_ENDPOINT.to_string()
}
fn default_request_timeout() -> u64 {
    10
}
fn default_log_level() -> String {
    "info".to_string()
}
