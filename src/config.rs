//! Configuration management for lumenchain

use serde::Deserialize;
use std::fs;

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub fees: FeeConfig,
}

#[derive(Debug, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "default_api_port")]
    pub api_port: u16,
    #[serde(default = "default_network_id")]
    pub network_id: String,
}

#[derive(Debug, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_data_path")]
    pub path: String,
}

/// Flat fee schedule: every transaction pays `base_fee` plus
/// `per_instruction_fee` for each instruction it carries.
#[derive(Debug, Clone, Deserialize)]
pub struct FeeConfig {
    #[serde(default = "default_base_fee")]
    pub base_fee: u64,
    #[serde(default = "default_per_instruction_fee")]
    pub per_instruction_fee: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        NetworkConfig {
            api_port: default_api_port(),
            network_id: default_network_id(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        DatabaseConfig {
            path: default_data_path(),
        }
    }
}

impl Default for FeeConfig {
    fn default() -> Self {
        FeeConfig {
            base_fee: default_base_fee(),
            per_instruction_fee: default_per_instruction_fee(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            network: NetworkConfig::default(),
            database: DatabaseConfig::default(),
            fees: FeeConfig::default(),
        }
    }
}

pub fn load_config(path: &str) -> Result<Config, Box<dyn std::error::Error>> {
    let config_str = fs::read_to_string(path).unwrap_or_default();
    let config: Config = if config_str.is_empty() {
        // Sane defaults when the config file is absent
        Config::default()
    } else {
        toml::from_str(&config_str)?
    };

    // Validate critical values
    if config.database.path.is_empty() {
        return Err("database.path must be set".into());
    }

    Ok(config)
}

fn default_api_port() -> u16 {
    5700
}

fn default_network_id() -> String {
    "devnet".to_string()
}

fn default_data_path() -> String {
    "./data/ledger.db".to_string()
}

fn default_base_fee() -> u64 {
    100
}

fn default_per_instruction_fee() -> u64 {
    10
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_yields_defaults() {
        let config = load_config("does-not-exist.toml").unwrap();
        assert_eq!(config.network.api_port, 5700);
        assert_eq!(config.fees.base_fee, 100);
        assert_eq!(config.fees.per_instruction_fee, 10);
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: Config = toml::from_str("[fees]\nbase_fee = 200\n").unwrap();
        assert_eq!(config.fees.base_fee, 200);
        assert_eq!(config.fees.per_instruction_fee, 10);
        assert_eq!(config.network.network_id, "devnet");
    }
}
