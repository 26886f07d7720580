//! Process configuration
//!
//! Built once at start-up and handed down to every component. Business
//! logic never reads the environment directly.

use std::{fmt, str::FromStr};

use ethers::types::Address;

use crate::{
    constants::{
        DEFAULT_BIND_ADDR, MAINNET_CHAIN_ID, MAINNET_EXPLORER_URL, TESTNET_CHAIN_ID,
        TESTNET_EXPLORER_URL,
    },
    errors::ConfigError,
    state::{DefaultPayoutConfig, Network},
};

/// Per-network settings as loaded; any field may still be missing
#[derive(Clone)]
pub struct NetworkSettings {
    pub network: Network,
    pub rpc_url: Option<String>,
    pub signing_key: Option<String>,
    pub token_address: Option<Address>,
    pub chain_id: u64,
    pub explorer_url: String,
}

impl fmt::Debug for NetworkSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetworkSettings")
            .field("network", &self.network)
            .field("rpc_url", &self.rpc_url)
            .field("signing_key", &self.signing_key.as_ref().map(|_| "<redacted>"))
            .field("token_address", &self.token_address)
            .field("chain_id", &self.chain_id)
            .field("explorer_url", &self.explorer_url)
            .finish()
    }
}

impl NetworkSettings {
    /// Check every setting a transfer run needs
    pub fn resolve(&self) -> Result<ResolvedNetwork, ConfigError> {
        let rpc_url = self
            .rpc_url
            .clone()
            .ok_or_else(|| ConfigError::missing_rpc_url(self.network))?;
        let signing_key = self
            .signing_key
            .clone()
            .ok_or_else(|| ConfigError::missing_signing_key(self.network))?;
        let token_address = self
            .token_address
            .ok_or_else(|| ConfigError::missing_token_address(self.network))?;

        Ok(ResolvedNetwork {
            network: self.network,
            rpc_url,
            signing_key,
            token_address,
            chain_id: self.chain_id,
            explorer_url: self.explorer_url.clone(),
        })
    }
}

/// Complete settings for one network
#[derive(Clone)]
pub struct ResolvedNetwork {
    pub network: Network,
    pub rpc_url: String,
    pub signing_key: String,
    pub token_address: Address,
    pub chain_id: u64,
    pub explorer_url: String,
}

impl fmt::Debug for ResolvedNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedNetwork")
            .field("network", &self.network)
            .field("rpc_url", &self.rpc_url)
            .field("token_address", &self.token_address)
            .field("chain_id", &self.chain_id)
            .field("explorer_url", &self.explorer_url)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub trigger_secret: String,
    pub database_url: Option<String>,
    pub bind_addr: String,
    pub mainnet: NetworkSettings,
    pub testnet: NetworkSettings,
    /// Used when the store holds no default payout config
    pub defaults: DefaultPayoutConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key/value source; blank values count as unset
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let trigger_secret = get("PAYOUT_TRIGGER_SECRET").ok_or(ConfigError::Missing("PAYOUT_TRIGGER_SECRET"))?;

        let mainnet = load_network(&get, Network::Mainnet)?;
        let testnet = load_network(&get, Network::Testnet)?;

        let max_participants = get("DEFAULT_MAX_PARTICIPANTS")
            .map(|raw| parse_named::<u32>("DEFAULT_MAX_PARTICIPANTS", &raw))
            .transpose()?;
        let network = get("DEFAULT_PAYOUT_NETWORK")
            .map(|raw| {
                Network::parse(&raw).ok_or_else(|| ConfigError::Invalid {
                    name: "DEFAULT_PAYOUT_NETWORK",
                    reason: format!("unknown network {raw:?}"),
                })
            })
            .transpose()?;
        let weekday = get("DEFAULT_PAYOUT_WEEKDAY")
            .map(|raw| parse_named::<i32>("DEFAULT_PAYOUT_WEEKDAY", &raw))
            .transpose()?;

        Ok(Config {
            trigger_secret,
            database_url: get("DATABASE_URL"),
            bind_addr: get("PAYOUT_BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            mainnet,
            testnet,
            defaults: DefaultPayoutConfig {
                amount: get("DEFAULT_PAYOUT_AMOUNT"),
                max_participants,
                network,
                weekday,
                time: get("DEFAULT_PAYOUT_TIME"),
                timezone: get("DEFAULT_PAYOUT_TIMEZONE"),
            },
        })
    }

    pub fn network(&self, network: Network) -> &NetworkSettings {
        match network {
            Network::Mainnet => &self.mainnet,
            Network::Testnet => &self.testnet,
        }
    }
}

fn load_network<G>(get: &G, network: Network) -> Result<NetworkSettings, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    let (prefix, default_chain_id, default_explorer) = match network {
        Network::Mainnet => ("MAINNET", MAINNET_CHAIN_ID, MAINNET_EXPLORER_URL),
        Network::Testnet => ("TESTNET", TESTNET_CHAIN_ID, TESTNET_EXPLORER_URL),
    };
    let key = |suffix: &str| format!("{prefix}_{suffix}");

    let token_address = get(&key("USDC_ADDRESS"))
        .map(|raw| {
            Address::from_str(&raw).map_err(|err| ConfigError::Invalid {
                name: token_address_name(network),
                reason: err.to_string(),
            })
        })
        .transpose()?;

    let chain_id = match get(&key("CHAIN_ID")) {
        Some(raw) => raw.parse::<u64>().map_err(|err| ConfigError::Invalid {
            name: chain_id_name(network),
            reason: err.to_string(),
        })?,
        None => default_chain_id,
    };

    Ok(NetworkSettings {
        network,
        rpc_url: get(&key("RPC_URL")),
        signing_key: get(&key("PAYOUT_PRIVATE_KEY")),
        token_address,
        chain_id,
        explorer_url: get(&key("EXPLORER_URL")).unwrap_or_else(|| default_explorer.to_string()),
    })
}

fn token_address_name(network: Network) -> &'static str {
    match network {
        Network::Mainnet => "MAINNET_USDC_ADDRESS",
        Network::Testnet => "TESTNET_USDC_ADDRESS",
    }
}

fn chain_id_name(network: Network) -> &'static str {
    match network {
        Network::Mainnet => "MAINNET_CHAIN_ID",
        Network::Testnet => "TESTNET_CHAIN_ID",
    }
}

fn parse_named<T>(name: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    raw.parse::<T>().map_err(|err| ConfigError::Invalid {
        name,
        reason: err.to_string(),
    })
}
