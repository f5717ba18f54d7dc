//! Bootstrap configuration: the handful of settings needed before the
//! process can even reach the database (connection string, master key,
//! which tenants to poll). Everything that can change without a restart
//! lives behind `SettingsStore` instead — this file is deliberately small.

use anyhow::Context;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize)]
pub struct CliConfig {
    pub database_url: String,
    /// Hex-encoded 32-byte master key used to seal/unseal credential rows.
    pub master_key_hex: String,
    pub pagerduty_routing_key: Option<String>,
    pub poll_interval_seconds: Option<u64>,
    pub webhook_bind_addr: Option<String>,
    pub tenants: Vec<String>,
}

impl CliConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file at {}", path.display()))?;

        toml::from_str(&raw).with_context(|| format!("parsing config file at {}", path.display()))
    }

    pub fn master_key_bytes(&self) -> anyhow::Result<[u8; 32]> {
        let decoded = hex::decode(&self.master_key_hex).context("master_key_hex is not valid hex")?;

        decoded
            .try_into()
            .map_err(|v: Vec<u8>| anyhow::anyhow!("master_key_hex must decode to 32 bytes, got {}", v.len()))
    }

    pub fn poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.poll_interval_seconds.unwrap_or(30))
    }

    pub fn webhook_addr(&self) -> String {
        self.webhook_bind_addr
            .clone()
            .unwrap_or_else(|| "0.0.0.0:8787".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_master_key_hex() {
        let config = CliConfig {
            database_url: "mysql://localhost/sync".to_string(),
            master_key_hex: "00".repeat(32),
            pagerduty_routing_key: None,
            poll_interval_seconds: None,
            webhook_bind_addr: None,
            tenants: vec![],
        };

        let bytes = config.master_key_bytes().unwrap();
        assert_eq!(bytes, [0u8; 32]);
    }

    #[test]
    fn rejects_wrong_length_key() {
        let config = CliConfig {
            database_url: "mysql://localhost/sync".to_string(),
            master_key_hex: "00".repeat(16),
            pagerduty_routing_key: None,
            poll_interval_seconds: None,
            webhook_bind_addr: None,
            tenants: vec![],
        };

        assert!(config.master_key_bytes().is_err());
    }

    #[test]
    fn defaults_poll_interval_to_thirty_seconds() {
        let config = CliConfig {
            database_url: "mysql://localhost/sync".to_string(),
            master_key_hex: "00".repeat(32),
            pagerduty_routing_key: None,
            poll_interval_seconds: None,
            webhook_bind_addr: None,
            tenants: vec![],
        };

        assert_eq!(config.poll_interval(), std::time::Duration::from_secs(30));
    }
}
