//! Configuration module for the bioledger client
//!
//! Configuration is loaded from a TOML file, `.env` is honoured through
//! dotenvy and a handful of `BIOLEDGER_*` variables override file values.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::contracts::DEFAULT_CONTRACT_ADDRESS;
use crate::session::SessionOptions;
use crate::submitter::{RetryPolicy, SubmissionPolicy};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Main application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Ledger node and contract location
    #[serde(default)]
    pub ledger: LedgerConfig,

    /// Submission state machine tunables
    #[serde(default)]
    pub submission: SubmissionConfig,

    #[serde(default)]
    pub confirmation: ConfirmationConfig,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    /// Monitoring and metrics
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Fullnode REST endpoint
    #[serde(default = "default_node_url")]
    pub node_url: String,

    /// Network name shown to users and used in explorer links
    #[serde(default = "default_network")]
    pub network: String,

    /// Account the contract modules are published under
    #[serde(default = "default_contract_address")]
    pub contract_address: String,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_explorer_url")]
    pub explorer_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionConfig {
    /// Attempts per logical submission, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_backoff_base")]
    pub backoff_base_ms: u64,

    #[serde(default = "default_jitter_max")]
    pub jitter_max_ms: u64,

    /// Pause after the signer accepted a transaction
    #[serde(default = "default_propagation_delay")]
    pub propagation_delay_ms: u64,

    /// Safety margin on simulated max gas (percent)
    #[serde(default = "default_gas_margin")]
    pub gas_margin_percent: u32,

    /// Submit even when simulation fails for a reason other than "already exists"
    #[serde(default = "default_true")]
    pub proceed_on_simulation_failure: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfirmationConfig {
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_confirmation_timeout")]
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Network and signer liveness probe interval
    #[serde(default = "default_liveness_interval")]
    pub liveness_interval_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// sled database directory
    #[serde(default = "default_store_path")]
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitoringConfig {
    /// Enable Prometheus metrics
    #[serde(default = "default_true")]
    pub enable_metrics: bool,
}

// Default value functions
fn default_node_url() -> String { "https://fullnode.devnet.aptoslabs.com".to_string() }
fn default_network() -> String { "devnet".to_string() }
fn default_contract_address() -> String { DEFAULT_CONTRACT_ADDRESS.to_string() }
fn default_request_timeout() -> u64 { 10 }
fn default_explorer_url() -> String { "https://explorer.aptoslabs.com/txn".to_string() }
fn default_max_attempts() -> u32 { 3 }
fn default_backoff_base() -> u64 { 2000 }
fn default_jitter_max() -> u64 { 1000 }
fn default_propagation_delay() -> u64 { 500 }
fn default_gas_margin() -> u32 { 50 }
fn default_poll_interval() -> u64 { 2000 }
fn default_confirmation_timeout() -> u64 { 30_000 }
fn default_liveness_interval() -> u64 { 30 }
fn default_store_path() -> String { "./bioledger-data".to_string() }
fn default_true() -> bool { true }

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            node_url: default_node_url(),
            network: default_network(),
            contract_address: default_contract_address(),
            request_timeout_secs: default_request_timeout(),
            explorer_url: default_explorer_url(),
        }
    }
}

impl Default for SubmissionConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_base_ms: default_backoff_base(),
            jitter_max_ms: default_jitter_max(),
            propagation_delay_ms: default_propagation_delay(),
            gas_margin_percent: default_gas_margin(),
            proceed_on_simulation_failure: default_true(),
        }
    }
}

impl Default for ConfirmationConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval(),
            timeout_ms: default_confirmation_timeout(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            liveness_interval_secs: default_liveness_interval(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            enable_metrics: default_true(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ledger: LedgerConfig::default(),
            submission: SubmissionConfig::default(),
            confirmation: ConfirmationConfig::default(),
            session: SessionConfig::default(),
            storage: StorageConfig::default(),
            monitoring: MonitoringConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration with `.env` and environment variable overrides
    pub fn from_file_with_env(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let mut config = Self::from_file(path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Apply `BIOLEDGER_*` overrides read through `lookup`
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("BIOLEDGER_NODE_URL") {
            self.ledger.node_url = url;
        }
        if let Some(address) = lookup("BIOLEDGER_CONTRACT_ADDRESS") {
            self.ledger.contract_address = address;
        }
        if let Some(network) = lookup("BIOLEDGER_NETWORK") {
            self.ledger.network = network;
        }
        if let Some(path) = lookup("BIOLEDGER_STORE_PATH") {
            self.storage.path = path;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ledger.node_url.trim().is_empty() {
            return Err(ConfigError::Invalid("ledger.node_url is empty".into()));
        }
        if self.ledger.contract_address.trim().is_empty() {
            return Err(ConfigError::Invalid("ledger.contract_address is empty".into()));
        }
        if self.ledger.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid("ledger.request_timeout_secs must be > 0".into()));
        }
        if self.submission.max_attempts == 0 {
            return Err(ConfigError::Invalid("submission.max_attempts must be > 0".into()));
        }
        if self.confirmation.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid("confirmation.poll_interval_ms must be > 0".into()));
        }
        if self.confirmation.timeout_ms == 0 {
            return Err(ConfigError::Invalid("confirmation.timeout_ms must be > 0".into()));
        }
        if self.session.liveness_interval_secs == 0 {
            return Err(ConfigError::Invalid("session.liveness_interval_secs must be > 0".into()));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.ledger.request_timeout_secs)
    }

    pub fn submission_policy(&self) -> SubmissionPolicy {
        SubmissionPolicy {
            retry: RetryPolicy {
                max_attempts: self.submission.max_attempts,
                backoff_base_ms: self.submission.backoff_base_ms,
                jitter_max_ms: self.submission.jitter_max_ms,
            },
            propagation_delay: Duration::from_millis(self.submission.propagation_delay_ms),
            gas_margin_percent: self.submission.gas_margin_percent,
            proceed_on_simulation_failure: self.submission.proceed_on_simulation_failure,
        }
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            network_name: self.ledger.network.clone(),
            explorer_url: self.ledger.explorer_url.clone(),
            submission: self.submission_policy(),
            poll_interval: Duration::from_millis(self.confirmation.poll_interval_ms),
            confirmation_timeout: Duration::from_millis(self.confirmation.timeout_ms),
            liveness_interval: Duration::from_secs(self.session.liveness_interval_secs),
        }
    }
}
