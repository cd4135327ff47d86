//! Process-level settings, read from a `.env` file and the environment.

use alloy_primitives::Address;
use anyhow::{bail, Context};
use serde::Deserialize;

#[derive(Deserialize, Debug)]
pub struct SettingsParsed {
    pub rpc_url: String,
    pub trace_rpc_url: Option<String>,
    pub api_key: Option<String>,
    pub network: String,
    pub wallet_address: Option<Address>,
    pub contract_address: Option<Address>,
    pub start_block: Option<u64>,
    pub confirmations: Option<u64>,
    pub log_level: Option<String>,
    pub database_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Network {
    Mainnet,
    Sepolia,
}

impl Network {
    pub fn chain_id(&self) -> u64 {
        match self {
            Network::Mainnet => 1,
            Network::Sepolia => 11_155_111,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub network: Network,
    pub rpc_url: String,
    /// Falls back to `rpc_url` when not set.
    pub trace_rpc_url: String,
    pub api_key: Option<String>,
    pub wallet_address: Option<Address>,
    pub contract_address: Option<Address>,
    pub start_block: Option<u64>,
    pub confirmations: u64,
    pub log_level: log::Level,
    pub database_url: Option<String>,
}

impl Settings {
    pub fn init() -> Result<Settings, anyhow::Error> {
        dotenv::dotenv().ok();

        let builder = config::Config::builder()
            .add_source(config::Environment::default().try_parsing(true))
            .build()
            .context("Failed to build config")?;

        let parsed: SettingsParsed = builder
            .try_deserialize()
            .context("The environment should match the SettingsParsed struct")?;

        Settings::from_parsed(parsed)
    }

    pub fn from_parsed(parsed: SettingsParsed) -> Result<Settings, anyhow::Error> {
        let network = match parsed.network.as_str() {
            "mainnet" => Network::Mainnet,
            "sepolia" => Network::Sepolia,
            other => bail!("'{}' is not a valid network.", other),
        };

        let log_level = match parsed.log_level.as_deref() {
            Some("trace") => log::Level::Trace,
            Some("debug") => log::Level::Debug,
            Some("warn") => log::Level::Warn,
            Some("error") => log::Level::Error,
            _ => log::Level::Info,
        };

        Ok(Settings {
            network,
            trace_rpc_url: parsed
                .trace_rpc_url
                .unwrap_or_else(|| parsed.rpc_url.clone()),
            rpc_url: parsed.rpc_url,
            api_key: parsed.api_key,
            wallet_address: parsed.wallet_address,
            contract_address: parsed.contract_address,
            start_block: parsed.start_block,
            confirmations: parsed.confirmations.unwrap_or(3),
            log_level,
            database_url: parsed.database_url,
        })
    }
}
