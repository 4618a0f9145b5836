/// Raydium AMM v4 pool-creation ingestion
///
/// Watches for `initialize2` transactions against the Raydium AMM program,
/// destructures the instruction's fixed account layout into a normalized
/// pool record, reads the deposited liquidity out of the post-transaction
/// token balances, and recovers the creation parameters that Raydium only
/// reports as log text.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use solana_sdk::instruction::CompiledInstruction;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;

use crate::constants::{
    RAYDIUM_AMM_PROGRAM, RAYDIUM_AUTHORITY_ID, RAYDIUM_INIT_LOG_MARKER, RAYDIUM_INIT_PAYLOAD_TAG,
    USDC, WRAPPED_SOL,
};
use crate::logger::{log_debug, LogTag};
use crate::rpc::RpcPool;
use crate::transactions::{AccountResolver, ConfirmedTransaction};

/// Fixed account positions of the `initialize2` instruction
const AMM_ID_INDEX: usize = 4;
const OPEN_ORDERS_INDEX: usize = 6;
const LP_MINT_INDEX: usize = 7;
const BASE_MINT_INDEX: usize = 8;
const QUOTE_MINT_INDEX: usize = 9;
const BASE_VAULT_INDEX: usize = 10;
const QUOTE_VAULT_INDEX: usize = 11;
const TARGET_ORDERS_INDEX: usize = 12;
const LIQUIDITY_CREATOR_INDEX: usize = 20;

/// Minimum accounts an `initialize2` instruction carries
const INIT_ACCOUNT_FLOOR: usize = 21;

/// Creation parameters recovered from the `InitializeInstruction2` log line
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct PoolInitMetadata {
    pub nonce: u64,
    pub open_time: u64,
    pub init_pc_amount: u64,
    pub init_coin_amount: u64,
}

/// Normalized record of a newly created liquidity pool
#[derive(Debug, Clone)]
pub struct NewPoolEvent {
    pub program_id: Pubkey,
    pub amm_id: Pubkey,
    pub open_orders: Pubkey,
    pub lp_mint: Pubkey,
    pub base_mint: Pubkey,
    pub quote_mint: Pubkey,
    pub base_vault: Pubkey,
    pub quote_vault: Pubkey,
    pub target_orders: Pubkey,
    pub liquidity_creator: Pubkey,

    /// Deposited amounts at creation, in UI units
    pub base_liquidity: f64,
    pub quote_liquidity: f64,

    pub creator: Pubkey,
    pub signature: Signature,
    pub slot: u64,
    pub block_time: Option<DateTime<Utc>>,
    pub discovered_at: DateTime<Utc>,
    /// Whether base/quote arrived in reverse order and were exchanged
    pub swapped: bool,

    pub init_metadata: PoolInitMetadata,
}

/// Subscriber-side log filter: pool creations always emit the initialize2
/// log line. Over-inclusive is acceptable; the parser re-verifies everything.
pub fn pool_log_filter(logs: &[String]) -> bool {
    logs.iter().any(|line| line.contains(RAYDIUM_INIT_LOG_MARKER))
}

/// Fetch one candidate and parse it into a pool record.
///
/// Any failure drops the candidate; this path is routinely hit by
/// signatures that merely mention the program.
pub async fn parse_transaction(pool: &RpcPool, signature: &Signature) -> Option<NewPoolEvent> {
    let tx = match pool.get_transaction(signature).await {
        Ok(tx) => tx,
        Err(e) => {
            log_debug(
                LogTag::Raydium,
                "FETCH_FAILED",
                &format!("dropping candidate {}: {}", signature, e),
            );
            return None;
        }
    };

    extract_pool_event(&tx)
}

/// Scan a decoded transaction for the first valid pool-creation instruction.
pub fn extract_pool_event(tx: &ConfirmedTransaction) -> Option<NewPoolEvent> {
    // A failed transaction cannot have created a pool
    if tx.meta.err.is_some() {
        return None;
    }

    for instruction in tx.instructions() {
        let Some(program) = tx.program_for(instruction) else {
            continue;
        };
        if program != &*RAYDIUM_AMM_PROGRAM {
            continue;
        }
        if instruction.accounts.len() < INIT_ACCOUNT_FLOOR {
            continue;
        }

        if let Some(event) = destructure_pool(instruction, tx) {
            // At most one record per transaction
            return Some(event);
        }
    }

    None
}

fn destructure_pool(
    instruction: &CompiledInstruction,
    tx: &ConfirmedTransaction,
) -> Option<NewPoolEvent> {
    let resolver = AccountResolver::direct(instruction, tx);

    let mut base_mint = resolver.get(BASE_MINT_INDEX);
    let mut quote_mint = resolver.get(QUOTE_MINT_INDEX);
    let mut base_vault = resolver.get(BASE_VAULT_INDEX);
    let mut quote_vault = resolver.get(QUOTE_VAULT_INDEX);

    // The null (system) address here means a clamped index or a degenerate
    // instruction; either way the record would be unusable
    if base_mint == Pubkey::default() || quote_mint == Pubkey::default() {
        return None;
    }

    // Deposited liquidity lives in the post balances of the vault accounts
    // owned by the protocol authority. An amount with no matching entry
    // stays at zero.
    let mut base_liquidity = 0.0;
    let mut quote_liquidity = 0.0;
    if let Some(balances) = &tx.meta.post_token_balances {
        for balance in balances {
            if balance.owner.as_deref() != Some(RAYDIUM_AUTHORITY_ID) {
                continue;
            }
            if balance.mint == base_mint.to_string() {
                base_liquidity = balance.ui_token_amount.ui_amount.unwrap_or(0.0);
            } else if balance.mint == quote_mint.to_string() {
                quote_liquidity = balance.ui_token_amount.ui_amount.unwrap_or(0.0);
            }
        }
    }

    // Canonical order: base is always the newly listed asset
    let mut swapped = false;
    if base_mint == *WRAPPED_SOL || base_mint == *USDC {
        std::mem::swap(&mut base_mint, &mut quote_mint);
        std::mem::swap(&mut base_vault, &mut quote_vault);
        std::mem::swap(&mut base_liquidity, &mut quote_liquidity);
        swapped = true;
    }

    let discovered_at = Utc::now();

    let mut init_metadata = tx
        .meta
        .log_messages
        .as_deref()
        .and_then(metadata_from_logs)
        .unwrap_or_default();
    if init_metadata.open_time == 0 {
        init_metadata.open_time = discovered_at.timestamp() as u64;
    }

    Some(NewPoolEvent {
        program_id: *RAYDIUM_AMM_PROGRAM,
        amm_id: resolver.get(AMM_ID_INDEX),
        open_orders: resolver.get(OPEN_ORDERS_INDEX),
        lp_mint: resolver.get(LP_MINT_INDEX),
        base_mint,
        quote_mint,
        base_vault,
        quote_vault,
        target_orders: resolver.get(TARGET_ORDERS_INDEX),
        liquidity_creator: resolver.get(LIQUIDITY_CREATOR_INDEX),
        base_liquidity,
        quote_liquidity,
        creator: tx.fee_payer().copied().unwrap_or_default(),
        signature: tx.signature().copied().unwrap_or_default(),
        slot: tx.slot,
        block_time: tx.block_time_utc(),
        discovered_at,
        swapped,
        init_metadata,
    })
}

/// Recover the creation parameters from the `InitializeInstruction2` log
/// line by re-quoting its space-separated `key: value` text into JSON.
///
/// A malformed line is "no metadata", never a fault.
pub fn metadata_from_logs(logs: &[String]) -> Option<PoolInitMetadata> {
    for line in logs {
        let Some((_, payload)) = line.split_once(RAYDIUM_INIT_PAYLOAD_TAG) else {
            continue;
        };

        let quoted: Vec<String> = payload
            .split(' ')
            .map(|token| match token.strip_suffix(':') {
                Some(key) => format!("\"{}\":", key),
                None => token.to_string(),
            })
            .collect();

        if let Ok(metadata) = serde_json::from_str::<PoolInitMetadata>(&quoted.join(" ")) {
            return Some(metadata);
        }
        // Not valid JSON after re-quoting; keep searching
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::SOL_MINT;
    use crate::rpc::{TokenBalance, TransactionMeta, UiTokenAmount};
    use solana_sdk::instruction::CompiledInstruction;
    use solana_sdk::message::{Message, VersionedMessage};
    use solana_sdk::transaction::VersionedTransaction;
    use std::str::FromStr;

    fn init_instruction(account_count: u8, program_id_index: u8) -> CompiledInstruction {
        CompiledInstruction {
            program_id_index,
            accounts: (0..account_count).collect(),
            data: vec![1],
        }
    }

    /// 21 distinct accounts followed by the Raydium program id
    fn synthetic_pool_tx(account_count: u8) -> ConfirmedTransaction {
        let mut keys: Vec<Pubkey> = (0..account_count).map(|_| Pubkey::new_unique()).collect();
        keys.push(*RAYDIUM_AMM_PROGRAM);
        let program_id_index = (keys.len() - 1) as u8;

        let message = Message {
            account_keys: keys,
            instructions: vec![init_instruction(account_count, program_id_index)],
            ..Message::default()
        };

        ConfirmedTransaction {
            slot: 250_000_000,
            block_time: Some(1_700_000_000),
            transaction: VersionedTransaction {
                signatures: vec![Signature::default()],
                message: VersionedMessage::Legacy(message),
            },
            meta: TransactionMeta::default(),
        }
    }

    fn authority_balance(mint: &Pubkey, amount: f64) -> TokenBalance {
        TokenBalance {
            account_index: 0,
            mint: mint.to_string(),
            owner: Some(RAYDIUM_AUTHORITY_ID.to_string()),
            ui_token_amount: UiTokenAmount {
                amount: format!("{}", amount as u64),
                decimals: 9,
                ui_amount: Some(amount),
                ui_amount_string: None,
            },
        }
    }

    #[test]
    fn failed_transaction_yields_no_record() {
        let mut tx = synthetic_pool_tx(21);
        tx.meta.err = Some(serde_json::json!({ "InstructionError": [2, "Custom"] }));
        assert!(extract_pool_event(&tx).is_none());
    }

    #[test]
    fn transaction_without_raydium_instruction_yields_no_record() {
        let mut tx = synthetic_pool_tx(21);
        // Point the instruction at a non-Raydium program
        if let VersionedMessage::Legacy(message) = &mut tx.transaction.message {
            message.account_keys[21] = Pubkey::new_unique();
        }
        assert!(extract_pool_event(&tx).is_none());
    }

    #[test]
    fn short_instruction_yields_no_record() {
        let mut tx = synthetic_pool_tx(21);
        if let VersionedMessage::Legacy(message) = &mut tx.transaction.message {
            message.instructions[0].accounts.truncate(12);
        }
        assert!(extract_pool_event(&tx).is_none());
    }

    #[test]
    fn pool_event_uses_fixed_account_positions() {
        let tx = synthetic_pool_tx(21);
        let keys = tx.account_keys().to_vec();

        let event = extract_pool_event(&tx).expect("record emitted");
        assert_eq!(event.amm_id, keys[4]);
        assert_eq!(event.open_orders, keys[6]);
        assert_eq!(event.lp_mint, keys[7]);
        assert_eq!(event.base_mint, keys[8]);
        assert_eq!(event.quote_mint, keys[9]);
        assert_eq!(event.base_vault, keys[10]);
        assert_eq!(event.quote_vault, keys[11]);
        assert_eq!(event.liquidity_creator, keys[20]);
        assert_eq!(event.creator, keys[0]);
        assert!(!event.swapped);
    }

    #[test]
    fn reversed_pair_is_canonicalized() {
        let mut tx = synthetic_pool_tx(21);
        let wsol = Pubkey::from_str(SOL_MINT).unwrap();
        if let VersionedMessage::Legacy(message) = &mut tx.transaction.message {
            message.account_keys[8] = wsol;
        }
        let keys = tx.account_keys().to_vec();
        tx.meta.post_token_balances = Some(vec![
            authority_balance(&wsol, 50.0),
            authority_balance(&keys[9], 1_000_000.0),
        ]);

        let event = extract_pool_event(&tx).expect("record emitted");
        assert!(event.swapped);
        assert_eq!(event.base_mint, keys[9]);
        assert_eq!(event.quote_mint, wsol);
        assert_eq!(event.base_vault, keys[11]);
        assert_eq!(event.quote_vault, keys[10]);
        assert_eq!(event.base_liquidity, 1_000_000.0);
        assert_eq!(event.quote_liquidity, 50.0);
    }

    #[test]
    fn liquidity_defaults_to_zero_without_matching_balances() {
        let tx = synthetic_pool_tx(21);
        let event = extract_pool_event(&tx).expect("record emitted");
        assert_eq!(event.base_liquidity, 0.0);
        assert_eq!(event.quote_liquidity, 0.0);
    }

    #[test]
    fn repeated_extraction_differs_only_in_discovery_time() {
        let tx = synthetic_pool_tx(21);

        let first = extract_pool_event(&tx).expect("record emitted");
        let second = extract_pool_event(&tx).expect("record emitted");

        assert_eq!(first.amm_id, second.amm_id);
        assert_eq!(first.base_mint, second.base_mint);
        assert_eq!(first.quote_mint, second.quote_mint);
        assert_eq!(first.slot, second.slot);
        assert_eq!(first.block_time, second.block_time);
        assert_eq!(first.swapped, second.swapped);
        // Only the discovery timestamp may differ between the two parses
        assert!(second.discovered_at >= first.discovered_at);
    }

    #[test]
    fn metadata_is_recovered_from_log_text() {
        let logs = vec![
            "Program log: Instruction: Initialize".to_string(),
            "Program log: initialize2: InitializeInstruction2 { nonce: 254, open_time: 1700000123, \
             init_pc_amount: 30000000000, init_coin_amount: 206900000 }"
                .to_string(),
        ];

        let metadata = metadata_from_logs(&logs).expect("metadata parsed");
        assert_eq!(metadata.nonce, 254);
        assert_eq!(metadata.open_time, 1_700_000_123);
        assert_eq!(metadata.init_pc_amount, 30_000_000_000);
        assert_eq!(metadata.init_coin_amount, 206_900_000);
    }

    #[test]
    fn malformed_metadata_is_no_metadata() {
        let logs = vec!["Program log: initialize2: InitializeInstruction2 {{ broken".to_string()];
        assert!(metadata_from_logs(&logs).is_none());
    }

    #[test]
    fn zero_open_time_defaults_to_discovery_time() {
        let mut tx = synthetic_pool_tx(21);
        tx.meta.log_messages = Some(vec![
            "Program log: initialize2: InitializeInstruction2 { nonce: 1, open_time: 0, \
             init_pc_amount: 5, init_coin_amount: 7 }"
                .to_string(),
        ]);

        let event = extract_pool_event(&tx).expect("record emitted");
        assert_eq!(event.init_metadata.open_time, event.discovered_at.timestamp() as u64);
        assert_eq!(event.init_metadata.init_pc_amount, 5);
    }
}
