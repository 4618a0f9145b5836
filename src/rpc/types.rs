//! JSON-RPC wire types and the RPC error taxonomy
//!
//! Response shapes are hand-rolled serde structs for exactly the fields the
//! pipeline consumes; everything else in the upstream payload is ignored.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error taxonomy for upstream access.
///
/// `is_retryable` separates transient faults (worth another attempt on the
/// next endpoint) from structural ones (the data will never appear, stop
/// immediately without consuming the retry budget).
#[derive(Debug, Error)]
pub enum RpcError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("request timed out")]
    Timeout,

    #[error("endpoint rate limited (HTTP 429)")]
    RateLimited,

    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("requested entity not found")]
    NotFound,

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("{method} failed after {attempts} attempts")]
    Exhausted { method: &'static str, attempts: u32 },
}

impl RpcError {
    /// Whether another attempt against a rotated endpoint can succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            RpcError::Transport(_) | RpcError::Timeout | RpcError::RateLimited => true,
            // Upstream node-side errors (behind, tx not indexed yet, ...)
            RpcError::Rpc { .. } => true,
            RpcError::NotFound | RpcError::InvalidResponse(_) | RpcError::Exhausted { .. } => {
                false
            }
        }
    }
}

/// Outbound JSON-RPC 2.0 request
#[derive(Serialize)]
pub struct RpcRequest {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: &'static str,
    pub params: serde_json::Value,
}

impl RpcRequest {
    pub fn new(method: &'static str, params: serde_json::Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id: 1,
            method,
            params,
        }
    }
}

/// Inbound JSON-RPC 2.0 envelope
#[derive(Deserialize)]
pub struct RpcEnvelope {
    pub result: Option<serde_json::Value>,
    pub error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
pub struct RpcErrorObject {
    pub code: i64,
    pub message: String,
}

// ============================================================================
// getTransaction
// ============================================================================

/// Raw `getTransaction` result with base64 transaction payload
#[derive(Debug, Deserialize)]
pub struct RawTransactionResult {
    pub slot: u64,
    #[serde(rename = "blockTime")]
    pub block_time: Option<i64>,
    /// `[payload, "base64"]`
    pub transaction: (String, String),
    pub meta: Option<TransactionMeta>,
}

/// Transaction metadata with balance changes and log output
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TransactionMeta {
    pub err: Option<serde_json::Value>,
    #[serde(rename = "preBalances", default)]
    pub pre_balances: Vec<u64>,
    #[serde(rename = "postBalances", default)]
    pub post_balances: Vec<u64>,
    #[serde(rename = "postTokenBalances", default)]
    pub post_token_balances: Option<Vec<TokenBalance>>,
    #[serde(rename = "logMessages", default)]
    pub log_messages: Option<Vec<String>>,
    #[serde(rename = "loadedAddresses", default)]
    pub loaded_addresses: Option<LoadedAddresses>,
}

/// Token balance entry in transaction metadata
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TokenBalance {
    #[serde(rename = "accountIndex")]
    pub account_index: u32,
    pub mint: String,
    pub owner: Option<String>,
    #[serde(rename = "uiTokenAmount")]
    pub ui_token_amount: UiTokenAmount,
}

/// Token amount with UI representation
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UiTokenAmount {
    pub amount: String,
    pub decimals: u8,
    #[serde(rename = "uiAmount")]
    pub ui_amount: Option<f64>,
    #[serde(rename = "uiAmountString")]
    pub ui_amount_string: Option<String>,
}

/// Addresses resolved from address-lookup tables, in on-chain order
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LoadedAddresses {
    #[serde(default)]
    pub writable: Vec<String>,
    #[serde(default)]
    pub readonly: Vec<String>,
}

// ============================================================================
// getAccountInfo
// ============================================================================

/// Account state as returned by `getAccountInfo` (base64 encoding)
#[derive(Debug, Deserialize)]
pub struct AccountValue {
    pub lamports: u64,
    pub owner: String,
    /// `[payload, "base64"]`
    pub data: (String, String),
    pub executable: bool,
}

// ============================================================================
// getSignaturesForAddress
// ============================================================================

/// One entry of an address's signature history
#[derive(Debug, Clone, Deserialize)]
pub struct SignatureRecord {
    pub signature: String,
    pub slot: u64,
    pub err: Option<serde_json::Value>,
    #[serde(rename = "blockTime")]
    pub block_time: Option<i64>,
}

// ============================================================================
// getTokenLargestAccounts
// ============================================================================

/// One entry of `getTokenLargestAccounts`
#[derive(Debug, Clone, Deserialize)]
pub struct TokenAccountBalance {
    pub address: String,
    #[serde(rename = "uiAmount")]
    pub ui_amount: Option<f64>,
    pub amount: String,
    pub decimals: u8,
}
