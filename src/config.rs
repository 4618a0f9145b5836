/// Startup configuration loaded from the environment
///
/// All settings are read once at process start. Missing or empty required
/// settings are fatal configuration errors; nothing here is reloaded at
/// runtime.

use thiserror::Error;

/// Default per-endpoint request rate (requests per second)
const DEFAULT_RATE_LIMIT: u32 = 4;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required setting: {0}")]
    Missing(&'static str),
    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

/// Process-wide configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// JSON-RPC endpoint URLs, each rate limited independently
    pub rpc_urls: Vec<String>,
    /// Websocket endpoint for log subscriptions
    pub ws_url: String,
    /// Requests per second allowed against each endpoint
    pub rate_limit: u32,
    /// Append the unthrottled public mainnet endpoint as a fallback
    pub include_public_rpc: bool,
}

impl Config {
    /// Load configuration from `.env` / the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        let rpc_urls: Vec<String> = std::env::var("SOLANA_RPC_URLS")
            .map_err(|_| ConfigError::Missing("SOLANA_RPC_URLS"))?
            .split(';')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();

        if rpc_urls.is_empty() {
            return Err(ConfigError::Missing("SOLANA_RPC_URLS"));
        }

        let ws_url = std::env::var("SOLANA_WS_URL")
            .map_err(|_| ConfigError::Missing("SOLANA_WS_URL"))?;
        if ws_url.trim().is_empty() {
            return Err(ConfigError::Missing("SOLANA_WS_URL"));
        }

        let rate_limit = match std::env::var("RPC_RATE_LIMIT") {
            Ok(raw) => raw.parse::<u32>().map_err(|_| ConfigError::Invalid {
                key: "RPC_RATE_LIMIT",
                value: raw.clone(),
            })?,
            Err(_) => DEFAULT_RATE_LIMIT,
        };

        let include_public_rpc = std::env::var("INCLUDE_PUBLIC_RPC")
            .map(|v| v == "1")
            .unwrap_or(false);

        Ok(Self {
            rpc_urls,
            ws_url,
            rate_limit,
            include_public_rpc,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_rpc_urls_is_fatal() {
        std::env::remove_var("SOLANA_RPC_URLS");
        let err = Config::load().unwrap_err();
        assert!(matches!(err, ConfigError::Missing("SOLANA_RPC_URLS")));
    }
}
