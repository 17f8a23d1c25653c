//! Application configuration loaded from environment variables.

use cron_protocol::{Address, Network};

use crate::errors::{MonitorError, Result};

#[derive(Debug, Clone)]
pub struct Config {
    pub network: Network,
    /// toncenter v3 base URL; defaults to the network's public endpoint
    pub toncenter_url: String,
    /// Sent as `X-API-Key` when set
    pub toncenter_api_key: Option<String>,
    /// The v5 wallet whose extensions are watched
    pub owner: Address,
    /// Relay whose presence in a job's message marks it self-funding
    pub relay: Address,
    /// Path to the SQLite database file
    pub database_url: String,
    /// Port for the REST API server
    pub api_port: u16,
    /// How often (in seconds) to refresh jobs and domains
    pub poll_interval_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let network: Network = env_var("NETWORK")
            .unwrap_or_else(|_| "testnet".to_string())
            .parse()
            .map_err(MonitorError::Config)?;

        Ok(Config {
            network,
            toncenter_url: env_var("TONCENTER_URL")
                .unwrap_or_else(|_| network.toncenter_v3_url().to_string()),
            toncenter_api_key: env_var("TONCENTER_API_KEY").ok().filter(|k| !k.is_empty()),
            owner: parse_address("OWNER_ADDRESS")?,
            relay: parse_address("RELAY_ADDRESS")?,
            database_url: env_var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:./cron_jobs.db".to_string()),
            api_port: env_var("API_PORT")
                .unwrap_or_else(|_| "3001".to_string())
                .parse()
                .map_err(|_| MonitorError::Config("Invalid API_PORT".to_string()))?,
            poll_interval_secs: env_var("POLL_INTERVAL_SECS")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .map_err(|_| MonitorError::Config("Invalid POLL_INTERVAL_SECS".to_string()))?,
        })
    }
}

fn env_var(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| MonitorError::Config(format!("Missing env var: {key}")))
}

fn parse_address(key: &str) -> Result<Address> {
    env_var(key)
        .map_err(|_| MonitorError::Config(format!("{key} environment variable is required")))?
        .parse()
        .map_err(|e| MonitorError::Config(format!("Invalid {key}: {e}")))
}
