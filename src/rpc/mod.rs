//! Rate-limited RPC endpoint pool
//!
//! A fixed set of endpoints is built once at startup from configuration.
//! Every upstream call borrows the next endpoint round-robin; each endpoint
//! throttles itself with a GCRA token bucket so a burst of candidates never
//! hammers a single provider. The pool never shrinks and never inspects
//! endpoint health; failover is the retry layer's job.

mod methods;
mod types;

pub use types::{
    AccountValue, LoadedAddresses, RpcError, SignatureRecord, TokenAccountBalance, TokenBalance,
    TransactionMeta, UiTokenAmount,
};

use crate::config::{Config, ConfigError};
use crate::constants::PUBLIC_MAINNET_RPC;
use crate::logger::{log, LogTag};
use governor::{
    clock::DefaultClock,
    middleware::NoOpMiddleware,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::num::NonZeroU32;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use types::{RpcEnvelope, RpcRequest};

/// Per-request timeout baked into each endpoint's HTTP client
const REQUEST_TIMEOUT: Duration = Duration::from_secs(8);

type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock, NoOpMiddleware>;

/// One upstream JSON-RPC access point
pub struct RpcEndpoint {
    url: String,
    http: reqwest::Client,
    limiter: Option<DirectLimiter>,
}

impl RpcEndpoint {
    fn build_client() -> Result<reqwest::Client, ConfigError> {
        reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ConfigError::Invalid {
                key: "http client",
                value: e.to_string(),
            })
    }

    fn throttled(url: String, rate_per_second: u32) -> Result<Self, ConfigError> {
        let rate = NonZeroU32::new(rate_per_second).unwrap_or(NonZeroU32::MIN);
        Ok(Self {
            url,
            http: Self::build_client()?,
            limiter: Some(RateLimiter::direct(Quota::per_second(rate))),
        })
    }

    fn unthrottled(url: String) -> Result<Self, ConfigError> {
        Ok(Self {
            url,
            http: Self::build_client()?,
            limiter: None,
        })
    }

    /// Wait until this endpoint's rate limit allows another request.
    pub async fn throttle(&self) {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }
    }

    /// Endpoint URL with any query string (API keys) stripped, for logging.
    pub fn masked_url(&self) -> &str {
        self.url.split('?').next().unwrap_or(&self.url)
    }

    /// Issue a single JSON-RPC call. No retries at this layer.
    pub(crate) async fn request(
        &self,
        method: &'static str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, RpcError> {
        let response = self
            .http
            .post(&self.url)
            .header("Content-Type", "application/json")
            .json(&RpcRequest::new(method, params))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    RpcError::Timeout
                } else {
                    RpcError::Transport(e)
                }
            })?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(RpcError::RateLimited);
        }

        let envelope: RpcEnvelope = response
            .json()
            .await
            .map_err(|e| RpcError::InvalidResponse(e.to_string()))?;

        if let Some(err) = envelope.error {
            return Err(RpcError::Rpc {
                code: err.code,
                message: err.message,
            });
        }

        Ok(envelope.result.unwrap_or(serde_json::Value::Null))
    }
}

/// Round-robin pool of rate-limited endpoints
pub struct RpcPool {
    endpoints: Vec<Arc<RpcEndpoint>>,
    cursor: Mutex<usize>,
}

impl std::fmt::Debug for RpcPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcPool")
            .field("endpoints", &self.endpoints.len())
            .finish()
    }
}

impl RpcPool {
    /// Build the pool from configuration.
    ///
    /// An empty endpoint list is a fatal configuration error, not a runtime
    /// fault.
    pub fn initialise(config: &Config) -> Result<Self, ConfigError> {
        let mut endpoints = Vec::with_capacity(config.rpc_urls.len() + 1);
        for url in &config.rpc_urls {
            endpoints.push(Arc::new(RpcEndpoint::throttled(
                url.clone(),
                config.rate_limit,
            )?));
        }

        if config.include_public_rpc {
            endpoints.push(Arc::new(RpcEndpoint::unthrottled(
                PUBLIC_MAINNET_RPC.to_string(),
            )?));
        }

        if endpoints.is_empty() {
            return Err(ConfigError::Missing("SOLANA_RPC_URLS"));
        }

        log(
            LogTag::Rpc,
            "INIT",
            &format!("RPC pool initialised (endpoints: {})", endpoints.len()),
        );

        Ok(Self {
            endpoints,
            cursor: Mutex::new(0),
        })
    }

    /// Build a pool directly from URLs (used by tests and tools).
    pub fn from_urls(urls: &[&str], rate_per_second: u32) -> Result<Self, ConfigError> {
        let config = Config {
            rpc_urls: urls.iter().map(|s| s.to_string()).collect(),
            ws_url: String::new(),
            rate_limit: rate_per_second,
            include_public_rpc: false,
        };
        Self::initialise(&config)
    }

    /// Borrow the next endpoint in round-robin order.
    ///
    /// Never blocks on the endpoint and never checks health; callers throttle
    /// via [`RpcEndpoint::throttle`] before sending.
    pub fn borrow(&self) -> Arc<RpcEndpoint> {
        let mut cursor = self.cursor.lock().expect("rpc cursor poisoned");
        let endpoint = self.endpoints[*cursor].clone();
        *cursor = (*cursor + 1) % self.endpoints.len();
        endpoint
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_pool(n: usize) -> RpcPool {
        let urls: Vec<String> = (0..n).map(|i| format!("http://rpc{}.invalid", i)).collect();
        let refs: Vec<&str> = urls.iter().map(String::as_str).collect();
        RpcPool::from_urls(&refs, 4).expect("pool builds")
    }

    #[test]
    fn borrow_rotates_round_robin_and_wraps() {
        let pool = test_pool(3);
        let first = pool.borrow().masked_url().to_string();
        let second = pool.borrow().masked_url().to_string();
        let third = pool.borrow().masked_url().to_string();
        let wrapped = pool.borrow().masked_url().to_string();

        assert_ne!(first, second);
        assert_ne!(second, third);
        // Call N+1 returns the endpoint of call 1
        assert_eq!(first, wrapped);
    }

    #[test]
    fn empty_pool_is_a_config_error() {
        let err = RpcPool::from_urls(&[], 4).unwrap_err();
        assert!(matches!(err, ConfigError::Missing(_)));
    }

    #[test]
    fn masked_url_strips_api_keys() {
        let pool = RpcPool::from_urls(&["https://rpc.example.com/?api-key=secret"], 4).unwrap();
        assert_eq!(pool.borrow().masked_url(), "https://rpc.example.com/");
    }
}
