use crate::constants::{
    CACHE_DEFAULT_TTL_SECS, CONFIRMATION_POLL_INTERVAL_MS, CONFIRMATION_TIMEOUT_SECS,
    DEFAULT_CACHE_CAPACITY, DEFAULT_CHAIN_ID, RETRY_BASE_DELAY_MS, RETRY_MAX_DELAY_MS,
    RETRY_MAX_RETRIES, SIMULATION_TIMEOUT_SECS, SUBMIT_TIMEOUT_SECS, TOKEN_STRK,
    VIEW_TIMEOUT_SECS,
};
use serde::Deserialize;
use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // Blockchain
    pub starknet_rpc_url: String,
    pub starknet_chain_id: String,

    // Signing (optional, reads work without it)
    pub backend_account_address: Option<String>,
    pub backend_private_key: Option<String>,
    pub value_token_address: String,

    // Bounded waits
    pub view_timeout_secs: u64,
    pub simulation_timeout_secs: u64,
    pub submit_timeout_secs: u64,
    pub confirmation_timeout_secs: u64,
    pub confirmation_poll_interval_ms: u64,

    // Read retries
    pub retry_max_retries: u32,
    pub retry_base_delay_ms: u64,
    pub retry_max_delay_ms: u64,

    // Cache
    pub cache_capacity: usize,
    pub cache_default_ttl_secs: u64,
}

// Internal helper that reads an optional, non-empty variable.
fn non_empty<F>(lookup: &F, name: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

// Internal helper that parses a variable or falls back to the default.
fn parse_or<F, T>(lookup: &F, name: &str, default: T) -> anyhow::Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match non_empty(lookup, name) {
        Some(raw) => raw
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("{} has an invalid value {:?}: {}", name, raw, e)),
        None => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the config from any variable source; `from_env` passes the process env.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let starknet_rpc_url = non_empty(&lookup, "STARKNET_RPC_URL")
            .ok_or_else(|| anyhow::anyhow!("STARKNET_RPC_URL is not set"))?;

        Ok(Config {
            starknet_rpc_url,
            starknet_chain_id: non_empty(&lookup, "STARKNET_CHAIN_ID")
                .unwrap_or_else(|| DEFAULT_CHAIN_ID.to_string()),

            backend_account_address: non_empty(&lookup, "BACKEND_ACCOUNT_ADDRESS"),
            backend_private_key: non_empty(&lookup, "BACKEND_PRIVATE_KEY"),
            value_token_address: non_empty(&lookup, "VALUE_TOKEN_ADDRESS")
                .unwrap_or_else(|| TOKEN_STRK.to_string()),

            view_timeout_secs: parse_or(&lookup, "VIEW_TIMEOUT_SECS", VIEW_TIMEOUT_SECS)?,
            simulation_timeout_secs: parse_or(
                &lookup,
                "SIMULATION_TIMEOUT_SECS",
                SIMULATION_TIMEOUT_SECS,
            )?,
            submit_timeout_secs: parse_or(&lookup, "SUBMIT_TIMEOUT_SECS", SUBMIT_TIMEOUT_SECS)?,
            confirmation_timeout_secs: parse_or(
                &lookup,
                "CONFIRMATION_TIMEOUT_SECS",
                CONFIRMATION_TIMEOUT_SECS,
            )?,
            confirmation_poll_interval_ms: parse_or(
                &lookup,
                "CONFIRMATION_POLL_INTERVAL_MS",
                CONFIRMATION_POLL_INTERVAL_MS,
            )?,

            retry_max_retries: parse_or(&lookup, "RETRY_MAX_RETRIES", RETRY_MAX_RETRIES)?,
            retry_base_delay_ms: parse_or(&lookup, "RETRY_BASE_DELAY_MS", RETRY_BASE_DELAY_MS)?,
            retry_max_delay_ms: parse_or(&lookup, "RETRY_MAX_DELAY_MS", RETRY_MAX_DELAY_MS)?,

            cache_capacity: parse_or(&lookup, "CACHE_CAPACITY", DEFAULT_CACHE_CAPACITY)?,
            cache_default_ttl_secs: parse_or(
                &lookup,
                "CACHE_DEFAULT_TTL_SECS",
                CACHE_DEFAULT_TTL_SECS,
            )?,
        })
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if !self.starknet_rpc_url.starts_with("http://")
            && !self.starknet_rpc_url.starts_with("https://")
        {
            anyhow::bail!("STARKNET_RPC_URL must be an http(s) URL");
        }
        if self.view_timeout_secs == 0
            || self.simulation_timeout_secs == 0
            || self.submit_timeout_secs == 0
            || self.confirmation_timeout_secs == 0
        {
            anyhow::bail!("Timeouts must be > 0");
        }
        if self.confirmation_poll_interval_ms == 0 {
            anyhow::bail!("CONFIRMATION_POLL_INTERVAL_MS must be > 0");
        }
        if self.cache_capacity == 0 {
            anyhow::bail!("CACHE_CAPACITY must be > 0");
        }
        if self.retry_max_delay_ms < self.retry_base_delay_ms {
            anyhow::bail!("RETRY_MAX_DELAY_MS must be >= RETRY_BASE_DELAY_MS");
        }

        match (&self.backend_account_address, &self.backend_private_key) {
            (Some(_), None) | (None, Some(_)) => {
                tracing::warn!(
                    "Only one of BACKEND_ACCOUNT_ADDRESS / BACKEND_PRIVATE_KEY is set; writes are disabled"
                );
            }
            _ => {}
        }
        if let Some(key) = &self.backend_private_key {
            if key.contains("123456") {
                tracing::warn!("Detected dev credentials in config");
            }
        }
        if self.value_token_address.starts_with("0x0000") {
            tracing::warn!("Using placeholder value token address");
        }
        if self.confirmation_poll_interval_ms >= self.confirmation_timeout_secs * 1_000 {
            tracing::warn!("Confirmation poll interval exceeds the confirmation timeout");
        }

        Ok(())
    }

    pub fn has_signer(&self) -> bool {
        self.backend_account_address.is_some() && self.backend_private_key.is_some()
    }

    pub fn is_testnet(&self) -> bool {
        let chain = self.starknet_chain_id.to_ascii_uppercase();
        chain.contains("SEPOLIA") || chain.contains("GOERLI")
    }

    pub fn view_timeout(&self) -> Duration {
        Duration::from_secs(self.view_timeout_secs)
    }

    pub fn cache_default_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_default_ttl_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_apply_when_only_rpc_url_is_set() {
        let config =
            Config::from_lookup(lookup_from(&[("STARKNET_RPC_URL", "https://rpc.example")]))
                .expect("config");
        assert_eq!(config.view_timeout_secs, VIEW_TIMEOUT_SECS);
        assert_eq!(config.confirmation_timeout_secs, CONFIRMATION_TIMEOUT_SECS);
        assert_eq!(config.cache_capacity, DEFAULT_CACHE_CAPACITY);
        assert_eq!(config.starknet_chain_id, DEFAULT_CHAIN_ID);
        assert!(!config.has_signer());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn missing_rpc_url_is_an_error() {
        assert!(Config::from_lookup(lookup_from(&[])).is_err());
    }

    #[test]
    fn invalid_number_names_the_variable() {
        let err = Config::from_lookup(lookup_from(&[
            ("STARKNET_RPC_URL", "https://rpc.example"),
            ("VIEW_TIMEOUT_SECS", "ten"),
        ]))
        .expect_err("should fail");
        assert!(err.to_string().contains("VIEW_TIMEOUT_SECS"));
    }

    #[test]
    fn validate_rejects_zero_timeouts() {
        let config = Config::from_lookup(lookup_from(&[
            ("STARKNET_RPC_URL", "https://rpc.example"),
            ("CONFIRMATION_TIMEOUT_SECS", "0"),
        ]))
        .expect("config");
        assert!(config.validate().is_err());
    }

    #[test]
    fn sepolia_chain_is_testnet() {
        let config = Config::from_lookup(lookup_from(&[
            ("STARKNET_RPC_URL", "https://rpc.example"),
            ("STARKNET_CHAIN_ID", "SN_SEPOLIA"),
        ]))
        .expect("config");
        assert!(config.is_testnet());
    }
}
