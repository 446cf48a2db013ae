use std::{path::PathBuf, time::Duration};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

/// Get the data directory for the application.
pub fn get_data_dir() -> PathBuf {
    if let Ok(s) = std::env::var("XCORE_WALLET_DATA") {
        PathBuf::from(s)
    } else if let Some(proj_dirs) = ProjectDirs::from("io", "x42", "xcore-wallet") {
        proj_dirs.data_local_dir().to_path_buf()
    } else {
        PathBuf::from(".").join(".data")
    }
}

/// Names of the available network presets.
pub const NETWORKS: [&str; 3] = ["mainnet", "testnet", "regtest"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub name: String,
    pub api_url: String,
    /// Ticker shown next to amounts.
    pub coin_unit: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletConfig {
    pub name: String,
    pub account: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeeConfig {
    /// Quiescence window before a fee estimate is requested.
    pub debounce_ms: u64,
    /// Upper bound on a single node API call.
    pub request_timeout_secs: u64,
    /// How often the spendable balance is refreshed.
    pub balance_refresh_secs: u64,
}

impl FeeConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn balance_refresh(&self) -> Duration {
        Duration::from_secs(self.balance_refresh_secs)
    }
}

impl Default for FeeConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 300,
            request_timeout_secs: 60,
            balance_refresh_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub network: NetworkConfig,
    pub wallet: WalletConfig,
    pub fees: FeeConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self::mainnet()
    }
}

impl Config {
    /// Create config from CLI args.
    pub fn new(network: &str, api_url: Option<&str>, wallet: Option<&str>) -> Self {
        let mut config = Self::from_network(network);
        if let Some(url) = api_url {
            config.network.api_url = url.trim_end_matches('/').to_string();
        }
        if let Some(name) = wallet {
            config.wallet.name = name.to_string();
        }
        config
    }

    pub fn mainnet() -> Self {
        Self::preset("mainnet", "http://127.0.0.1:42220", "x42")
    }

    pub fn testnet() -> Self {
        Self::preset("testnet", "http://127.0.0.1:42221", "TX42")
    }

    pub fn regtest() -> Self {
        Self::preset("regtest", "http://127.0.0.1:42222", "TX42")
    }

    fn preset(name: &str, api_url: &str, coin_unit: &str) -> Self {
        Self {
            network: NetworkConfig {
                name: name.to_string(),
                api_url: api_url.to_string(),
                coin_unit: coin_unit.to_string(),
            },
            wallet: WalletConfig {
                name: "default".to_string(),
                account: "account 0".to_string(),
            },
            fees: FeeConfig::default(),
        }
    }

    pub fn from_network(network: &str) -> Self {
        match network {
            "testnet" => Self::testnet(),
            "regtest" => Self::regtest(),
            _ => Self::mainnet(),
        }
    }
}
