//! Configuration management for the mqttchat CLI.
//!
//! Configuration is stored in ~/.mqttchat/config.yaml and holds named
//! broker contexts plus the name of the current one.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use mqttchat_session::{
    ConnectionConfig, DEFAULT_CONNECT_TIMEOUT, DEFAULT_PORT, DEFAULT_TLS_PORT, QoS,
};

/// Default base configuration directory name.
pub const DEFAULT_BASE_DIR: &str = ".mqttchat";
/// Default configuration filename.
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";

/// Public broker used when nothing else is configured.
pub const DEFAULT_HOST: &str = "broker.hivemq.com";
/// Filter subscribed to by default.
pub const DEFAULT_SUBSCRIBE_TOPIC: &str = "messagesFromCroatia/#";
/// Topic published to by default.
pub const DEFAULT_PUBLISH_TOPIC: &str = "messagesFromCroatia";
/// Prefix for generated client ids.
pub const DEFAULT_CLIENT_ID_PREFIX: &str = "mqttchat";

/// CLI configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Name of the currently active context.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub current_context: String,

    /// Map of context name to context configuration.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub contexts: BTreeMap<String, Context>,

    /// Path to the config file (not serialized).
    #[serde(skip)]
    config_path: PathBuf,
}

/// A named broker profile.
///
/// Zero and empty fields mean "use the default".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Context {
    /// Context name.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    /// Broker host.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub host: String,

    /// Broker port.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub port: u16,

    /// Connect with TLS.
    #[serde(default, skip_serializing_if = "is_false")]
    pub tls: bool,

    /// Prefix for the generated client id.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub client_id_prefix: String,

    /// Filter to subscribe to.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub subscribe_topic: String,

    /// Topic to publish to.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub publish_topic: String,

    /// QoS level (0, 1 or 2) for subscribe and publish.
    #[serde(default, skip_serializing_if = "is_zero_u8")]
    pub qos: u8,

    /// Keep alive in seconds.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub keep_alive: u16,

    /// Connect timeout in seconds.
    #[serde(default, skip_serializing_if = "is_zero_u64")]
    pub connect_timeout: u64,
}

fn is_zero(n: &u16) -> bool {
    *n == 0
}

fn is_zero_u8(n: &u8) -> bool {
    *n == 0
}

fn is_zero_u64(n: &u64) -> bool {
    *n == 0
}

fn is_false(b: &bool) -> bool {
    !*b
}

fn or_default<'a>(value: &'a str, default: &'a str) -> &'a str {
    if value.is_empty() { default } else { value }
}

impl Config {
    /// Gets the default config directory (~/.mqttchat).
    pub fn default_config_dir() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(DEFAULT_BASE_DIR))
    }

    /// Gets the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        Self::default_config_dir().map(|dir| dir.join(DEFAULT_CONFIG_FILE))
    }

    /// Returns the config file path.
    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// Saves the configuration to disk.
    pub fn save(&self) -> anyhow::Result<()> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(&self.config_path, content)?;
        Ok(())
    }

    /// Adds or replaces a context.
    pub fn add_context(&mut self, name: &str, mut ctx: Context) -> anyhow::Result<()> {
        if name.is_empty() {
            anyhow::bail!("context name is empty");
        }
        ctx.validate()?;
        ctx.name = name.to_string();
        self.contexts.insert(name.to_string(), ctx);
        if self.current_context.is_empty() {
            self.current_context = name.to_string();
        }
        self.save()
    }

    /// Deletes a context.
    pub fn delete_context(&mut self, name: &str) -> anyhow::Result<()> {
        if self.contexts.remove(name).is_none() {
            anyhow::bail!("context '{}' not found", name);
        }
        if self.current_context == name {
            self.current_context.clear();
        }
        self.save()
    }

    /// Sets the current context.
    pub fn use_context(&mut self, name: &str) -> anyhow::Result<()> {
        if !self.contexts.contains_key(name) {
            anyhow::bail!("context '{}' not found", name);
        }
        self.current_context = name.to_string();
        self.save()
    }

    /// Gets a specific context.
    pub fn get_context(&self, name: &str) -> Option<&Context> {
        self.contexts.get(name)
    }

    /// Gets the current context.
    pub fn get_current_context(&self) -> Option<&Context> {
        if self.current_context.is_empty() {
            return None;
        }
        self.contexts.get(&self.current_context)
    }

    /// Resolves the context by name, or current context if name is empty.
    pub fn resolve_context(&self, name: Option<&str>) -> Option<&Context> {
        match name {
            Some(n) if !n.is_empty() => self.get_context(n),
            _ => self.get_current_context(),
        }
    }

    /// Lists all context names in sorted order.
    pub fn list_contexts(&self) -> Vec<&str> {
        self.contexts.keys().map(|s| s.as_str()).collect()
    }
}

impl Context {
    /// Check fields that have a fixed range.
    pub fn validate(&self) -> anyhow::Result<()> {
        if QoS::from_u8(self.qos).is_none() {
            anyhow::bail!("qos must be 0, 1 or 2, got {}", self.qos);
        }
        Ok(())
    }

    /// Broker host, falling back to the public demo broker.
    pub fn host(&self) -> &str {
        or_default(&self.host, DEFAULT_HOST)
    }

    /// Broker port, falling back to 8883 with TLS and 1883 without.
    pub fn port(&self) -> u16 {
        match (self.port, self.tls) {
            (0, true) => DEFAULT_TLS_PORT,
            (0, false) => DEFAULT_PORT,
            (port, _) => port,
        }
    }

    /// Filter to subscribe to.
    pub fn subscribe_topic(&self) -> &str {
        or_default(&self.subscribe_topic, DEFAULT_SUBSCRIBE_TOPIC)
    }

    /// Topic to publish to.
    pub fn publish_topic(&self) -> &str {
        or_default(&self.publish_topic, DEFAULT_PUBLISH_TOPIC)
    }

    /// QoS level; invalid values fall back to QoS 0.
    pub fn qos(&self) -> QoS {
        QoS::from_u8(self.qos).unwrap_or_default()
    }

    /// Build a session config with a freshly generated client id.
    pub fn connection_config(&self) -> ConnectionConfig {
        let prefix = or_default(&self.client_id_prefix, DEFAULT_CLIENT_ID_PREFIX);
        let mut config =
            ConnectionConfig::with_generated_id(self.host(), self.port(), prefix).with_tls(self.tls);
        if self.keep_alive > 0 {
            config = config.with_keep_alive(self.keep_alive);
        }
        config.with_connect_timeout(if self.connect_timeout > 0 {
            Duration::from_secs(self.connect_timeout)
        } else {
            DEFAULT_CONNECT_TIMEOUT
        })
    }
}

fn resolve_path(custom_path: Option<&str>) -> anyhow::Result<PathBuf> {
    match custom_path {
        Some(p) => Ok(PathBuf::from(p)),
        None => Config::default_config_path()
            .ok_or_else(|| anyhow::anyhow!("cannot determine config path")),
    }
}

/// Loads configuration, creating an empty file if none exists.
pub fn load_config(custom_path: Option<&str>) -> anyhow::Result<Config> {
    let config_path = resolve_path(custom_path)?;

    // Ensure config directory exists
    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut cfg = if config_path.exists() {
        let content = std::fs::read_to_string(&config_path)?;
        if content.trim().is_empty() {
            Config::default()
        } else {
            serde_yaml::from_str(&content)?
        }
    } else {
        let cfg = Config::default();
        let content = serde_yaml::to_string(&cfg)?;
        std::fs::write(&config_path, content)?;
        cfg
    };

    cfg.config_path = config_path;
    Ok(cfg)
}

/// Saves configuration to the specified path.
pub fn save_config(config: &Config, custom_path: Option<&str>) -> anyhow::Result<()> {
    let config_path = resolve_path(custom_path)?;

    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let content = serde_yaml::to_string(config)?;
    std::fs::write(&config_path, content)?;
    Ok(())
}
