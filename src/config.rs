//! Configuration management for the fire sender
//!
//! Loads configuration from a TOML file with environment variable substitution.
//! The endpoint list doubles as the static fee-model table: every endpoint names
//! the fee model it is submitted with.

use crate::chain::confirmation::{DEFAULT_POLL_INTERVAL, DEFAULT_PROGRESS_INTERVAL};
use crate::chain::rpc::DEFAULT_RPC_TIMEOUT;
use crate::tx::{fire_call_data, FeeSettings};

use anyhow::{Context, Result};
use ethers::types::{Address, Bytes};
use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

lazy_static! {
    static ref ENV_VAR_PATTERN: Regex =
        Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").expect("env var pattern is valid");
}

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub fire: FireSettings,
    #[serde(default)]
    pub retry: RetrySettings,
    #[serde(default)]
    pub keystore: KeystoreSettings,
    pub endpoints: Vec<Endpoint>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FireSettings {
    pub contract_address: String,
    /// Hex call payload; defaults to the `fire()` selector
    pub call_data: Option<String>,
    pub chain_id: u64,
    pub priority_fee_gwei: u64,
    pub max_fee_gwei: u64,
    #[serde(default)]
    pub test_mode: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_retries: u32,
    pub retry_delay_secs: u64,
    pub confirmation_timeout_secs: u64,
    pub poll_interval_secs: u64,
    pub progress_interval_secs: u64,
    pub rpc_timeout_secs: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay_secs: 10,
            confirmation_timeout_secs: 180,
            poll_interval_secs: DEFAULT_POLL_INTERVAL.as_secs(),
            progress_interval_secs: DEFAULT_PROGRESS_INTERVAL.as_secs(),
            rpc_timeout_secs: DEFAULT_RPC_TIMEOUT.as_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct KeystoreSettings {
    pub path: PathBuf,
    /// Name of the environment variable holding the keystore password
    pub password_env: String,
}

impl Default for KeystoreSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from("keystore/fire.json"),
            password_env: "FIRE_KEYSTORE_PASSWORD".to_string(),
        }
    }
}

/// A named JSON-RPC endpoint. Identity is the URL.
#[derive(Debug, Clone, Deserialize)]
pub struct Endpoint {
    pub name: String,
    pub url: String,
    pub fee_model: FeeModel,
}

impl PartialEq for Endpoint {
    fn eq(&self, other: &Self) -> bool {
        self.url == other.url
    }
}

impl Eq for Endpoint {}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FeeModel {
    Legacy,
    Eip1559,
}

/// Immutable engine configuration derived from [`Settings`]
#[derive(Debug, Clone)]
pub struct FireConfig {
    pub contract_address: Address,
    pub call_data: Bytes,
    pub chain_id: u64,
    pub fees: FeeSettings,
    pub endpoints: Vec<Endpoint>,
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub confirmation_timeout: Duration,
    pub poll_interval: Duration,
    pub progress_interval: Duration,
    pub test_mode: bool,
}

impl Settings {
    /// Load settings from the configuration file
    pub fn load() -> Result<Self> {
        let config_path = env::var("FIRE_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config/default.toml"));

        let config_str = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

        let mut settings = Self::from_toml_str(&config_str)?;

        if let Ok(flag) = env::var("FIRE_TEST_MODE") {
            settings.fire.test_mode = matches!(flag.trim(), "1" | "true" | "yes");
        }

        Ok(settings)
    }

    /// Parse and validate settings from TOML text
    pub fn from_toml_str(input: &str) -> Result<Self> {
        // Substitute environment variables
        let config_str = substitute_env_vars(input);

        let settings: Settings =
            toml::from_str(&config_str).with_context(|| "Failed to parse configuration")?;

        settings.validate()?;

        Ok(settings)
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        if self.endpoints.is_empty() {
            anyhow::bail!("At least one RPC endpoint must be configured");
        }

        for endpoint in &self.endpoints {
            if !(endpoint.url.starts_with("http://") || endpoint.url.starts_with("https://")) {
                anyhow::bail!(
                    "Endpoint {} has an invalid URL {:?}; expected http(s)",
                    endpoint.name,
                    endpoint.url
                );
            }
        }

        Address::from_str(&self.fire.contract_address)
            .with_context(|| format!("Invalid contract address: {}", self.fire.contract_address))?;

        if let Some(ref data) = self.fire.call_data {
            let bytes = decode_hex(data).with_context(|| "Invalid call_data")?;
            if bytes.len() < 4 {
                anyhow::bail!("call_data must contain at least a 4-byte selector");
            }
        }

        if self.retry.max_retries == 0 {
            anyhow::bail!("max_retries must be at least 1");
        }
        if self.retry.poll_interval_secs == 0 {
            anyhow::bail!("poll_interval_secs must be greater than zero");
        }

        Ok(())
    }

    /// Build the immutable engine configuration
    pub fn engine_config(&self) -> Result<FireConfig> {
        let contract_address = Address::from_str(&self.fire.contract_address)
            .with_context(|| format!("Invalid contract address: {}", self.fire.contract_address))?;

        let call_data = match self.fire.call_data {
            Some(ref data) => Bytes::from(decode_hex(data)?),
            None => fire_call_data(),
        };

        Ok(FireConfig {
            contract_address,
            call_data,
            chain_id: self.fire.chain_id,
            fees: FeeSettings {
                priority_gwei: self.fire.priority_fee_gwei,
                max_gwei: self.fire.max_fee_gwei,
            },
            endpoints: self.endpoints.clone(),
            max_retries: self.retry.max_retries,
            retry_delay: Duration::from_secs(self.retry.retry_delay_secs),
            confirmation_timeout: Duration::from_secs(self.retry.confirmation_timeout_secs),
            poll_interval: Duration::from_secs(self.retry.poll_interval_secs),
            progress_interval: Duration::from_secs(self.retry.progress_interval_secs),
            test_mode: self.fire.test_mode,
        })
    }

    /// Per-call RPC timeout
    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.retry.rpc_timeout_secs)
    }
}

fn decode_hex(input: &str) -> Result<Vec<u8>> {
    let trimmed = input.trim();
    let stripped = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    hex::decode(stripped).with_context(|| format!("Invalid hex: {}", input))
}

/// Substitute environment variables in the format ${VAR_NAME}
fn substitute_env_vars(input: &str) -> String {
    let mut result = input.to_string();

    for cap in ENV_VAR_PATTERN.captures_iter(input) {
        let var_name = &cap[1];
        let var_value = env::var(var_name).unwrap_or_default();
        result = result.replace(&cap[0], &var_value);
    }

    result
}
