//! Configuration management for Ledgerbook.
//!
//! Handles loading and saving configuration from TOML files. The loaded
//! value is threaded into the transport and the runner explicitly; nothing
//! reads it from global state.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Node binary and connection settings
    pub node: NodeConfig,

    /// Signing defaults
    pub signing: SigningConfig,

    /// Transaction fee settings
    pub tx: TxConfig,

    /// Playbook runner settings
    pub runner: RunnerConfig,
}

/// How to reach the node daemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Node daemon binary name or path
    pub binary: String,

    /// Docker container to run the binary in (runs on the host when unset)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container: Option<String>,

    /// Chain id passed to transactions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<String>,

    /// RPC endpoint (`tcp://host:26657`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node: Option<String>,

    /// Node home directory
    #[serde(skip_serializing_if = "Option::is_none")]
    pub home: Option<String>,

    /// Keyring backend (os, file, test)
    pub keyring_backend: String,
}

/// Signing defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SigningConfig {
    /// Key used when neither the step nor the command line names one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_key: Option<String>,
}

/// Transaction fee settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TxConfig {
    /// Gas limit, or "auto" to simulate
    pub gas: String,

    /// Multiplier applied to simulated gas
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas_adjustment: Option<f64>,

    /// Fees to pay (`2000ukex`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fees: Option<String>,
}

/// Playbook runner settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// How long to wait for a transaction to be included
    pub confirm_timeout_secs: u64,

    /// Interval between inclusion polls
    pub poll_interval_ms: u64,

    /// Keep going after a failing step
    pub continue_on_error: bool,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            binary: "kexd".to_string(),
            container: None,
            chain_id: None,
            node: None,
            home: None,
            keyring_backend: "test".to_string(),
        }
    }
}

impl Default for TxConfig {
    fn default() -> Self {
        Self { gas: "auto".to_string(), gas_adjustment: Some(1.5), fees: None }
    }
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self { confirm_timeout_secs: 60, poll_interval_ms: 2000, continue_on_error: false }
    }
}

impl RunnerConfig {
    /// Confirmation timeout as a duration.
    pub fn confirm_timeout(&self) -> Duration {
        Duration::from_secs(self.confirm_timeout_secs)
    }

    /// Poll interval as a duration.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// Looks for config in:
    /// 1. `.ledgerbook.toml` in current directory
    /// 2. `~/.config/ledgerbook/config.toml`
    /// 3. Falls back to defaults
    pub fn load() -> anyhow::Result<Self> {
        let local_config = PathBuf::from(".ledgerbook.toml");
        if local_config.exists() {
            return Self::load_from_file(&local_config);
        }

        if let Some(config_dir) = Self::config_dir() {
            let global_config = config_dir.join("config.toml");
            if global_config.exists() {
                return Self::load_from_file(&global_config);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        tracing::debug!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Save configuration to the global config file.
    pub fn save(&self) -> anyhow::Result<()> {
        let config_dir = Self::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        std::fs::create_dir_all(&config_dir)?;

        let content = toml::to_string_pretty(self)?;
        std::fs::write(config_dir.join("config.toml"), content)?;

        Ok(())
    }

    /// Get the config directory path.
    pub fn config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("ledgerbook"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.node.binary, "kexd");
        assert_eq!(config.node.keyring_backend, "test");
        assert_eq!(config.tx.gas, "auto");
        assert_eq!(config.runner.confirm_timeout(), Duration::from_secs(60));
        assert_eq!(config.runner.poll_interval(), Duration::from_secs(2));
        assert!(!config.runner.continue_on_error);
        assert!(config.signing.default_key.is_none());
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml_str = toml::to_string(&config).unwrap();
        assert!(toml_str.contains("[node]"));
        assert!(toml_str.contains("[runner]"));
    }

    #[test]
    fn test_config_deserialization() {
        let toml_str = r#"
            [node]
            binary = "kexd"
            container = "kex-validator-1"
            chain_id = "kex-testnet-1"

            [signing]
            default_key = "validator"

            [runner]
            confirm_timeout_secs = 30
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.node.container.as_deref(), Some("kex-validator-1"));
        assert_eq!(config.node.chain_id.as_deref(), Some("kex-testnet-1"));
        assert_eq!(config.signing.default_key.as_deref(), Some("validator"));
        assert_eq!(config.runner.confirm_timeout_secs, 30);
        // untouched sections keep their defaults
        assert_eq!(config.runner.poll_interval_ms, 2000);
        assert_eq!(config.node.keyring_backend, "test");
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[tx]\nfees = \"2000ukex\"\n").unwrap();

        let config = Config::load_from_file(&path).unwrap();
        assert_eq!(config.tx.fees.as_deref(), Some("2000ukex"));
        assert_eq!(config.tx.gas, "auto");
    }
}
