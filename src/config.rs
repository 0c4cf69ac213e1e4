use crate::client::ClientBuilder;
use crate::transport::Transport;
use anyhow::Context;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_NODE: &str = "CONCENTRATOR_NODE";
pub const ENV_URL: &str = "CONCENTRATOR_URL";
pub const ENV_LOG: &str = "CONCENTRATOR_LOG";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Node id announced as FROM on every outgoing message
    #[serde(default = "default_node")]
    pub node: String,

    /// Concentrator address: ws://, wss://, tcp:// or unix://
    #[serde(default = "default_url")]
    pub url: String,

    /// Seconds between reconnect attempts
    /// 0 disables reconnecting
    #[serde(default = "default_reconnect_interval_secs")]
    pub reconnect_interval_secs: u64,

    /// Seconds allowed for each dial, 0 = no limit
    #[serde(default = "default_dial_timeout_secs")]
    pub dial_timeout_secs: u64,

    /// Event queue size, 0 disables the queue
    #[serde(default = "default_inbox_capacity")]
    pub inbox_capacity: usize,

    /// Append log output here instead of stderr
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

fn default_node() -> String {
    "MONOVIEW".to_string()
}

fn default_url() -> String {
    "ws://127.0.0.1:8092".to_string()
}

fn default_reconnect_interval_secs() -> u64 {
    3
}

fn default_dial_timeout_secs() -> u64 {
    5
}

fn default_inbox_capacity() -> usize {
    64
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            node: default_node(),
            url: default_url(),
            reconnect_interval_secs: default_reconnect_interval_secs(),
            dial_timeout_secs: default_dial_timeout_secs(),
            inbox_capacity: default_inbox_capacity(),
            log_file: None,
        }
    }
}

impl Settings {
    /// Load config from ~/.config/concentrator/config.toml
    /// Returns default settings if file doesn't exist or fails to parse
    pub fn load() -> Self {
        let Some(path) = config_path() else {
            log::warn!("[config] could not determine config directory, using defaults");
            return Self::default();
        };
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Self {
        match Self::read_from(path) {
            Ok(Some(settings)) => {
                log::debug!("[config] loaded settings from: {}", path.display());
                settings
            }
            Ok(None) => {
                log::debug!(
                    "[config] no config file found at {}, using defaults",
                    path.display()
                );
                Self::default()
            }
            Err(e) => {
                log::warn!("[config] {:#}, using defaults", e);
                Self::default()
            }
        }
    }

    /// Read and parse a config file. `Ok(None)` when it doesn't exist.
    pub fn read_from(path: &Path) -> anyhow::Result<Option<Self>> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to read config file: {}", path.display()));
            }
        };

        let settings = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(Some(settings))
    }

    /// Apply CONCENTRATOR_NODE, CONCENTRATOR_URL and CONCENTRATOR_LOG.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(node) = get(ENV_NODE) {
            self.node = node;
        }
        if let Some(url) = get(ENV_URL) {
            self.url = url;
        }
        if let Some(log_file) = get(ENV_LOG) {
            self.log_file = Some(PathBuf::from(log_file));
        }
    }

    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_secs(self.reconnect_interval_secs)
    }

    pub fn dial_timeout(&self) -> Duration {
        Duration::from_secs(self.dial_timeout_secs)
    }

    /// Client builder preloaded with these settings.
    pub fn client_builder<T: Transport>(&self, transport: T) -> ClientBuilder<T> {
        ClientBuilder::with_transport(&self.node, &self.url, transport)
            .reconnect_interval(self.reconnect_interval())
            .dial_timeout(self.dial_timeout())
            .inbox(self.inbox_capacity)
    }
}

/// Get the path to the config file: ~/.config/concentrator/config.toml
pub fn config_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "concentrator").map(|dirs| dirs.config_dir().join("config.toml"))
}
