/// OpenBook (Serum v3) market-creation ingestion
///
/// Watches for `InitializeMarket` transactions against the OpenBook program,
/// destructures the instruction's fixed account layout (directly or through
/// the loaded-address list of lookup-table transactions), derives the vault
/// signer address from the nonce embedded in the instruction payload, and
/// computes what the market cost its creator.

use chrono::{DateTime, Utc};
use solana_sdk::instruction::CompiledInstruction;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;

use crate::constants::{
    OPENBOOK_INVOKE_LOG, OPENBOOK_PROGRAM, SYSTEM_PROGRAM_SUCCESS_LOG, USDC, WRAPPED_SOL,
};
use crate::logger::{log, log_debug, LogTag};
use crate::rpc::RpcPool;
use crate::transactions::{AccountResolver, ConfirmedTransaction, ResolutionMode};

/// Fixed account positions of the `InitializeMarket` instruction
const MARKET_INDEX: usize = 0;
const EVENT_QUEUE_INDEX: usize = 2;
const BIDS_INDEX: usize = 3;
const ASKS_INDEX: usize = 4;
const BASE_VAULT_INDEX: usize = 5;
const QUOTE_VAULT_INDEX: usize = 6;
const BASE_MINT_INDEX: usize = 7;
const QUOTE_MINT_INDEX: usize = 8;

/// Minimum accounts an `InitializeMarket` instruction carries
const INIT_ACCOUNT_FLOOR: usize = 10;

/// Transactions with fewer instructions cannot contain a market init
const INSTRUCTION_FLOOR: usize = 6;

/// Loaded-address list length at which the lookup-table layout applies
const LOADED_ADDRESS_FLOOR: usize = 9;

/// Byte window of the vault-signer nonce inside the instruction payload
const VAULT_SIGNER_NONCE_RANGE: std::ops::Range<usize> = 23..31;

/// Normalized record of a newly created order-book market
#[derive(Debug, Clone)]
pub struct NewMarketEvent {
    pub program_id: Pubkey,
    pub market: Pubkey,
    pub event_queue: Pubkey,
    pub bids: Pubkey,
    pub asks: Pubkey,
    pub base_mint: Pubkey,
    pub quote_mint: Pubkey,
    pub base_vault: Pubkey,
    pub quote_vault: Pubkey,
    /// Program-derived owner of the market's vault accounts
    pub vault_signer: Pubkey,

    /// Native-currency balance delta of the creating account, in SOL
    pub creation_cost: f64,

    pub creator: Pubkey,
    pub signature: Signature,
    pub slot: u64,
    pub block_time: Option<DateTime<Utc>>,
    pub discovered_at: DateTime<Utc>,
    /// Whether base/quote arrived in reverse order and were exchanged
    pub swapped: bool,
}

/// Subscriber-side log filter.
///
/// Log mentions alone are over-inclusive, so require a system-program
/// success line immediately followed by a first-level invocation of the
/// OpenBook program, the shape every market-init transaction produces.
pub fn market_log_filter(logs: &[String]) -> bool {
    for (i, line) in logs.iter().enumerate() {
        if !line.contains(SYSTEM_PROGRAM_SUCCESS_LOG) {
            continue;
        }
        match logs.get(i + 1) {
            Some(next) if next.contains(OPENBOOK_INVOKE_LOG.as_str()) => return true,
            Some(_) => continue,
            None => break,
        }
    }
    false
}

/// Fetch one candidate and parse it into a market record.
pub async fn parse_transaction(pool: &RpcPool, signature: &Signature) -> Option<NewMarketEvent> {
    let tx = match pool.get_transaction(signature).await {
        Ok(tx) => tx,
        Err(e) => {
            log_debug(
                LogTag::Openbook,
                "FETCH_FAILED",
                &format!("dropping candidate {}: {}", signature, e),
            );
            return None;
        }
    };

    extract_market_event(&tx)
}

/// Scan a decoded transaction for the first valid market-init instruction.
pub fn extract_market_event(tx: &ConfirmedTransaction) -> Option<NewMarketEvent> {
    // Structural fast path: market creation bundles several instructions
    if tx.instructions().len() < INSTRUCTION_FLOOR {
        return None;
    }

    for instruction in tx.instructions() {
        let Some(program) = tx.program_for(instruction) else {
            continue;
        };
        if program != &*OPENBOOK_PROGRAM {
            continue;
        }
        if instruction.accounts.len() < INIT_ACCOUNT_FLOOR {
            continue;
        }

        if let Some(mut event) = destructure_market(instruction, tx) {
            event.creation_cost = tx.fee_payer_cost();
            // At most one record per transaction
            return Some(event);
        }
    }

    None
}

fn destructure_market(
    instruction: &CompiledInstruction,
    tx: &ConfirmedTransaction,
) -> Option<NewMarketEvent> {
    let resolver = AccountResolver::with_loaded_fallback(instruction, tx, LOADED_ADDRESS_FLOOR);

    let mut base_mint = resolver.get(BASE_MINT_INDEX);
    let mut quote_mint = resolver.get(QUOTE_MINT_INDEX);

    // Lookup-table markets are only ingested for wrapped-SOL pairs
    if resolver.mode() == ResolutionMode::LoadedTable
        && base_mint != *WRAPPED_SOL
        && quote_mint != *WRAPPED_SOL
    {
        return None;
    }

    if base_mint == Pubkey::default() || quote_mint == Pubkey::default() {
        return None;
    }

    let market = resolver.get(MARKET_INDEX);
    let mut base_vault = resolver.get(BASE_VAULT_INDEX);
    let mut quote_vault = resolver.get(QUOTE_VAULT_INDEX);

    // The vault signer is a program-derived address over the market key and
    // the nonce serialized at a fixed payload offset. If derivation fails
    // the record is unusable.
    let nonce = instruction.data.get(VAULT_SIGNER_NONCE_RANGE)?;
    let vault_signer =
        match Pubkey::create_program_address(&[market.as_ref(), nonce], &OPENBOOK_PROGRAM) {
            Ok(address) => address,
            Err(e) => {
                log(
                    LogTag::Openbook,
                    "DERIVE_FAILED",
                    &format!("vault signer derivation failed for market {}: {}", market, e),
                );
                return None;
            }
        };

    // Canonical order: base is always the newly listed asset
    let mut swapped = false;
    if base_mint == *WRAPPED_SOL || base_mint == *USDC {
        std::mem::swap(&mut base_mint, &mut quote_mint);
        std::mem::swap(&mut base_vault, &mut quote_vault);
        swapped = true;
    }

    Some(NewMarketEvent {
        program_id: *OPENBOOK_PROGRAM,
        market,
        event_queue: resolver.get(EVENT_QUEUE_INDEX),
        bids: resolver.get(BIDS_INDEX),
        asks: resolver.get(ASKS_INDEX),
        base_mint,
        quote_mint,
        base_vault,
        quote_vault,
        vault_signer,
        creation_cost: 0.0,
        creator: tx.fee_payer().copied().unwrap_or_default(),
        signature: tx.signature().copied().unwrap_or_default(),
        slot: tx.slot,
        block_time: tx.block_time_utc(),
        discovered_at: Utc::now(),
        swapped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{LAMPORTS_PER_SOL, OPENBOOK_PROGRAM_ID, SOL_MINT};
    use crate::rpc::TransactionMeta;
    use solana_sdk::message::{Message, VersionedMessage};
    use solana_sdk::transaction::VersionedTransaction;
    use std::str::FromStr;

    /// Instruction data with a valid vault-signer nonce for `market` at the
    /// fixed payload offset. The nonce is found the way market creators find
    /// it: counting up until the derivation lands off-curve.
    fn init_data_for(market: &Pubkey) -> Vec<u8> {
        let mut nonce: u64 = 0;
        loop {
            if Pubkey::create_program_address(
                &[market.as_ref(), &nonce.to_le_bytes()],
                &OPENBOOK_PROGRAM,
            )
            .is_ok()
            {
                break;
            }
            nonce += 1;
        }

        let mut data = vec![0u8; 31];
        data[VAULT_SIGNER_NONCE_RANGE].copy_from_slice(&nonce.to_le_bytes());
        data
    }

    fn filler_instruction(program_id_index: u8) -> CompiledInstruction {
        CompiledInstruction {
            program_id_index,
            accounts: vec![0],
            data: vec![0],
        }
    }

    /// A market-init transaction: 10 distinct accounts, the market-init
    /// instruction padded out with system-program no-ops to clear the
    /// instruction floor.
    fn synthetic_market_tx(init_accounts: u8) -> ConfirmedTransaction {
        let mut keys: Vec<Pubkey> = (0..10).map(|_| Pubkey::new_unique()).collect();
        keys.push(*OPENBOOK_PROGRAM); // index 10
        keys.push(Pubkey::default()); // index 11, system program

        let init = CompiledInstruction {
            program_id_index: 10,
            accounts: (0..init_accounts).collect(),
            data: init_data_for(&keys[MARKET_INDEX]),
        };

        let mut instructions = vec![init];
        for _ in 0..5 {
            instructions.push(filler_instruction(11));
        }

        let mut meta = TransactionMeta::default();
        meta.pre_balances = vec![10 * LAMPORTS_PER_SOL];
        meta.post_balances = vec![7 * LAMPORTS_PER_SOL];

        ConfirmedTransaction {
            slot: 250_000_001,
            block_time: Some(1_700_000_000),
            transaction: VersionedTransaction {
                signatures: vec![Signature::default()],
                message: VersionedMessage::Legacy(Message {
                    account_keys: keys,
                    instructions,
                    ..Message::default()
                }),
            },
            meta,
        }
    }

    #[test]
    fn market_event_with_sol_quote_keeps_raw_order() {
        let mut tx = synthetic_market_tx(10);
        let wsol = Pubkey::from_str(SOL_MINT).unwrap();
        if let VersionedMessage::Legacy(message) = &mut tx.transaction.message {
            message.account_keys[QUOTE_MINT_INDEX] = wsol;
        }
        let keys = tx.account_keys().to_vec();

        let event = extract_market_event(&tx).expect("record emitted");
        assert!(!event.swapped);
        assert_eq!(event.market, keys[0]);
        assert_eq!(event.base_mint, keys[7]);
        assert_eq!(event.quote_mint, wsol);
        assert_ne!(event.vault_signer, Pubkey::default());
        assert!((event.creation_cost - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn sol_base_is_swapped_into_quote_position() {
        let mut tx = synthetic_market_tx(10);
        let wsol = Pubkey::from_str(SOL_MINT).unwrap();
        if let VersionedMessage::Legacy(message) = &mut tx.transaction.message {
            message.account_keys[BASE_MINT_INDEX] = wsol;
        }
        let keys = tx.account_keys().to_vec();

        let event = extract_market_event(&tx).expect("record emitted");
        assert!(event.swapped);
        assert_eq!(event.base_mint, keys[8]);
        assert_eq!(event.quote_mint, wsol);
        assert_eq!(event.base_vault, keys[6]);
        assert_eq!(event.quote_vault, keys[5]);
    }

    #[test]
    fn below_account_floor_yields_no_record() {
        let tx = synthetic_market_tx(8);
        assert!(extract_market_event(&tx).is_none());
    }

    #[test]
    fn below_instruction_floor_yields_no_record() {
        let mut tx = synthetic_market_tx(10);
        if let VersionedMessage::Legacy(message) = &mut tx.transaction.message {
            message.instructions.truncate(2);
        }
        assert!(extract_market_event(&tx).is_none());
    }

    #[test]
    fn foreign_program_yields_no_record() {
        let mut tx = synthetic_market_tx(10);
        if let VersionedMessage::Legacy(message) = &mut tx.transaction.message {
            message.account_keys[10] = Pubkey::new_unique();
        }
        assert!(extract_market_event(&tx).is_none());
    }

    #[test]
    fn null_mint_yields_no_record() {
        let mut tx = synthetic_market_tx(10);
        if let VersionedMessage::Legacy(message) = &mut tx.transaction.message {
            message.account_keys[BASE_MINT_INDEX] = Pubkey::default();
        }
        assert!(extract_market_event(&tx).is_none());
    }

    #[test]
    fn truncated_payload_yields_no_record() {
        let mut tx = synthetic_market_tx(10);
        if let VersionedMessage::Legacy(message) = &mut tx.transaction.message {
            message.instructions[0].data.truncate(10);
        }
        assert!(extract_market_event(&tx).is_none());
    }

    #[test]
    fn log_filter_requires_adjacent_invocation() {
        let invoke = format!("Program {} invoke [1]", OPENBOOK_PROGRAM_ID);
        let success = SYSTEM_PROGRAM_SUCCESS_LOG.to_string();

        let positive = vec![success.clone(), invoke.clone()];
        assert!(market_log_filter(&positive));

        let separated = vec![success.clone(), "Program log: noise".to_string(), invoke];
        assert!(!market_log_filter(&separated));

        let mention_only = vec![format!("Program log: mentions {}", OPENBOOK_PROGRAM_ID)];
        assert!(!market_log_filter(&mention_only));

        let trailing_success = vec![success];
        assert!(!market_log_filter(&trailing_success));
    }
}
