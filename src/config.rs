use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::time::Duration;

use crate::transfer::ReconcilerConfig;

/// Which services this process hosts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ServiceRole {
    /// Balance Keeper + Ledger Store
    Account,
    /// Transfer Orchestrator + Transaction Record Store
    Transaction,
    /// Both, in one process
    All,
}

impl ServiceRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceRole::Account => "account",
            ServiceRole::Transaction => "transaction",
            ServiceRole::All => "all",
        }
    }

    pub fn hosts_accounts(&self) -> bool {
        matches!(self, ServiceRole::Account | ServiceRole::All)
    }

    pub fn hosts_transactions(&self) -> bool {
        matches!(self, ServiceRole::Transaction | ServiceRole::All)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub log_dir: String,
    pub log_file: String,
    pub use_json: bool,
    pub rotation: String,
    pub role: ServiceRole,
    pub server: ServerConfig,
    /// Base URL of the account service, used by the transaction role
    #[serde(default = "default_account_service_url")]
    pub account_service_url: String,
    /// Bound on every Balance Keeper call
    #[serde(default = "default_rpc_timeout_ms")]
    pub rpc_timeout_ms: u64,
    /// PostgreSQL connection URL; absent means in-memory stores
    #[serde(default)]
    pub postgres_url: Option<String>,
    #[serde(default)]
    pub reconciler: ReconcilerConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

fn default_account_service_url() -> String {
    "http://127.0.0.1:8081".to_string()
}

fn default_rpc_timeout_ms() -> u64 {
    5_000
}

impl AppConfig {
    pub fn load(env: &str) -> anyhow::Result<Self> {
        let config_path = format!("config/{}.yaml", env);
        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path))?;
        Self::from_yaml(&content).with_context(|| format!("Failed to parse {}", config_path))
    }

    pub fn from_yaml(content: &str) -> anyhow::Result<Self> {
        let config: AppConfig = serde_yaml::from_str(content)?;
        if config.rpc_timeout_ms == 0 {
            anyhow::bail!("rpc_timeout_ms must be positive");
        }
        // A claimed transfer must outlive its holder's keeper calls
        if config.reconciler.stale_threshold() <= config.rpc_timeout() * 3 {
            anyhow::bail!(
                "reconciler.stale_threshold_secs ({}s) must exceed three times rpc_timeout_ms ({}ms)",
                config.reconciler.stale_threshold_secs,
                config.rpc_timeout_ms
            );
        }
        Ok(config)
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_millis(self.rpc_timeout_ms)
    }
}
