//! Resilient fetch operations over the endpoint pool
//!
//! Every operation follows the same policy: up to [`RETRY_ATTEMPTS`] tries,
//! each borrowing the next endpoint from the pool so repeated failures rotate
//! across providers, each bounded by the endpoint client's request timeout.
//! Transient faults retry; structural faults (missing account, undecodable
//! payload) abort immediately. Exhaustion means "not available right now",
//! not "does not exist".

use super::types::{AccountValue, RawTransactionResult, RpcError, SignatureRecord, TokenAccountBalance};
use super::RpcPool;
use crate::constants::LAMPORTS_PER_SOL;
use crate::logger::{log_debug, log_warn, LogTag};
use crate::transactions::ConfirmedTransaction;
use base64::{engine::general_purpose, Engine as _};
use serde_json::{json, Value};
use solana_sdk::{pubkey::Pubkey, signature::Signature, transaction::VersionedTransaction};

/// Retry ceiling shared by all fetch operations
const RETRY_ATTEMPTS: u32 = 5;

impl RpcPool {
    /// Issue one JSON-RPC method with retry + endpoint rotation.
    ///
    /// `retry_on_null` treats a null result as transient. Used for
    /// `getTransaction`, where a confirmed transaction may not be indexed by
    /// every provider yet.
    async fn call(
        &self,
        method: &'static str,
        params: Value,
        retry_on_null: bool,
    ) -> Result<Value, RpcError> {
        for attempt in 1..=RETRY_ATTEMPTS {
            let endpoint = self.borrow();
            endpoint.throttle().await;

            match endpoint.request(method, params.clone()).await {
                Ok(value) if value.is_null() && retry_on_null => {
                    log_debug(
                        LogTag::Rpc,
                        "RETRY",
                        &format!(
                            "{} returned null, retrying ({}/{}) via {}",
                            method,
                            attempt,
                            RETRY_ATTEMPTS,
                            endpoint.masked_url()
                        ),
                    );
                }
                Ok(value) if value.is_null() => return Err(RpcError::NotFound),
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() => {
                    log_debug(
                        LogTag::Rpc,
                        "RETRY",
                        &format!(
                            "{} failed, retrying ({}/{}) via {}: {}",
                            method,
                            attempt,
                            RETRY_ATTEMPTS,
                            endpoint.masked_url(),
                            e
                        ),
                    );
                }
                Err(e) => return Err(e),
            }
        }

        log_warn(
            LogTag::Rpc,
            "EXHAUSTED",
            &format!("{} failed after {} attempts", method, RETRY_ATTEMPTS),
        );
        Err(RpcError::Exhausted {
            method,
            attempts: RETRY_ATTEMPTS,
        })
    }

    /// Fetch and decode a confirmed transaction (base64 wire payload).
    pub async fn get_transaction(
        &self,
        signature: &Signature,
    ) -> Result<ConfirmedTransaction, RpcError> {
        let params = json!([
            signature.to_string(),
            {
                "commitment": "confirmed",
                "maxSupportedTransactionVersion": 0,
                "encoding": "base64",
            }
        ]);
        let value = self.call("getTransaction", params, true).await?;

        let raw: RawTransactionResult = serde_json::from_value(value)
            .map_err(|e| RpcError::InvalidResponse(format!("getTransaction: {}", e)))?;

        let bytes = general_purpose::STANDARD
            .decode(raw.transaction.0.as_bytes())
            .map_err(|e| RpcError::InvalidResponse(format!("transaction base64: {}", e)))?;
        let transaction: VersionedTransaction = bincode::deserialize(&bytes)
            .map_err(|e| RpcError::InvalidResponse(format!("transaction bincode: {}", e)))?;

        Ok(ConfirmedTransaction {
            slot: raw.slot,
            block_time: raw.block_time,
            transaction,
            meta: raw.meta.unwrap_or_default(),
        })
    }

    /// SOL balance of an account, in whole SOL.
    pub async fn get_balance(&self, account: &Pubkey) -> Result<f64, RpcError> {
        let value = self
            .call(
                "getBalance",
                json!([account.to_string(), { "commitment": "confirmed" }]),
                false,
            )
            .await?;

        let lamports = value
            .get("value")
            .and_then(Value::as_u64)
            .ok_or_else(|| RpcError::InvalidResponse("getBalance: missing value".to_string()))?;

        Ok(lamports as f64 / LAMPORTS_PER_SOL as f64)
    }

    /// Full account state. A missing account is structural, not transient.
    pub async fn get_account_info(&self, account: &Pubkey) -> Result<AccountValue, RpcError> {
        let value = self
            .call(
                "getAccountInfo",
                json!([account.to_string(), { "commitment": "confirmed", "encoding": "base64" }]),
                false,
            )
            .await?;

        let inner = value.get("value").cloned().unwrap_or(Value::Null);
        if inner.is_null() {
            return Err(RpcError::NotFound);
        }

        serde_json::from_value(inner)
            .map_err(|e| RpcError::InvalidResponse(format!("getAccountInfo: {}", e)))
    }

    /// Raw account data bytes.
    pub async fn get_account_data(&self, account: &Pubkey) -> Result<Vec<u8>, RpcError> {
        let info = self.get_account_info(account).await?;
        general_purpose::STANDARD
            .decode(info.data.0.as_bytes())
            .map_err(|e| RpcError::InvalidResponse(format!("account base64: {}", e)))
    }

    /// Recent signature history of an address, newest first.
    pub async fn get_signatures_for_address(
        &self,
        account: &Pubkey,
        limit: usize,
    ) -> Result<Vec<SignatureRecord>, RpcError> {
        let value = self
            .call(
                "getSignaturesForAddress",
                json!([account.to_string(), { "limit": limit, "commitment": "confirmed" }]),
                false,
            )
            .await?;

        serde_json::from_value(value)
            .map_err(|e| RpcError::InvalidResponse(format!("getSignaturesForAddress: {}", e)))
    }

    /// Largest token accounts of a mint.
    pub async fn get_token_largest_accounts(
        &self,
        mint: &Pubkey,
    ) -> Result<Vec<TokenAccountBalance>, RpcError> {
        let value = self
            .call(
                "getTokenLargestAccounts",
                json!([mint.to_string(), { "commitment": "confirmed" }]),
                false,
            )
            .await?;

        let inner = value.get("value").cloned().ok_or_else(|| {
            RpcError::InvalidResponse("getTokenLargestAccounts: missing value".to_string())
        })?;

        serde_json::from_value(inner)
            .map_err(|e| RpcError::InvalidResponse(format!("getTokenLargestAccounts: {}", e)))
    }
}
