/// Decoded-transaction access helpers shared by the protocol parsers
///
/// Wraps the wire-decoded transaction together with its metadata and hides
/// the two account-addressing modes (direct instruction indices vs. the
/// loaded-address list of lookup-table transactions) behind one resolver.

use crate::rpc::TransactionMeta;
use chrono::{DateTime, TimeZone, Utc};
use solana_sdk::instruction::CompiledInstruction;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::VersionedTransaction;
use std::str::FromStr;

use crate::constants::LAMPORTS_PER_SOL;

/// A confirmed transaction with its execution metadata
#[derive(Debug, Clone)]
pub struct ConfirmedTransaction {
    pub slot: u64,
    pub block_time: Option<i64>,
    pub transaction: VersionedTransaction,
    pub meta: TransactionMeta,
}

impl ConfirmedTransaction {
    /// Statically declared account keys of the message.
    pub fn account_keys(&self) -> &[Pubkey] {
        self.transaction.message.static_account_keys()
    }

    /// Compiled instructions in execution order.
    pub fn instructions(&self) -> &[CompiledInstruction] {
        self.transaction.message.instructions()
    }

    /// Program that issued an instruction, if its index is in range.
    pub fn program_for(&self, instruction: &CompiledInstruction) -> Option<&Pubkey> {
        self.account_keys().get(instruction.program_id_index as usize)
    }

    /// Fee payer (first account key).
    pub fn fee_payer(&self) -> Option<&Pubkey> {
        self.account_keys().first()
    }

    /// Primary signature of the transaction.
    pub fn signature(&self) -> Option<&Signature> {
        self.transaction.signatures.first()
    }

    /// On-chain block time, when the upstream reported one.
    pub fn block_time_utc(&self) -> Option<DateTime<Utc>> {
        self.block_time
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
    }

    /// Native-currency balance delta of the fee payer across execution, in
    /// SOL. Positive means the fee payer paid.
    pub fn fee_payer_cost(&self) -> f64 {
        let pre = self.meta.pre_balances.first().copied().unwrap_or(0);
        let post = self.meta.post_balances.first().copied().unwrap_or(0);
        (pre as f64 - post as f64) / LAMPORTS_PER_SOL as f64
    }
}

/// Convert lamports to whole SOL.
pub fn lamports_to_sol(lamports: u64) -> f64 {
    lamports as f64 / LAMPORTS_PER_SOL as f64
}

/// Which addressing mode a resolver ended up in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionMode {
    /// Positions index the instruction's account list, which indexes the
    /// static account keys
    Direct,
    /// Positions index the concatenated writable+readonly loaded-address
    /// list of a lookup-table transaction
    LoadedTable,
}

/// Positional account resolution for one instruction.
///
/// Out-of-range positions resolve to the null (system) address instead of
/// erroring; downstream null-mint checks reject those candidates.
pub struct AccountResolver<'a> {
    mode: ResolutionMode,
    instruction: &'a CompiledInstruction,
    keys: &'a [Pubkey],
    loaded: Vec<Pubkey>,
}

impl<'a> AccountResolver<'a> {
    /// Always resolve through the instruction's account list.
    pub fn direct(instruction: &'a CompiledInstruction, tx: &'a ConfirmedTransaction) -> Self {
        Self {
            mode: ResolutionMode::Direct,
            instruction,
            keys: tx.account_keys(),
            loaded: Vec::new(),
        }
    }

    /// Resolve through the loaded-address list when the transaction carries
    /// at least `min_loaded` lookup-table addresses, otherwise directly.
    ///
    /// The mode is detected by list length, not by transaction version flags.
    pub fn with_loaded_fallback(
        instruction: &'a CompiledInstruction,
        tx: &'a ConfirmedTransaction,
        min_loaded: usize,
    ) -> Self {
        let loaded = loaded_address_list(&tx.meta);
        if loaded.len() >= min_loaded {
            Self {
                mode: ResolutionMode::LoadedTable,
                instruction,
                keys: tx.account_keys(),
                loaded,
            }
        } else {
            Self::direct(instruction, tx)
        }
    }

    pub fn mode(&self) -> ResolutionMode {
        self.mode
    }

    /// Resolve the account at a fixed schema position, clamped to the null
    /// address when anything is out of range.
    pub fn get(&self, position: usize) -> Pubkey {
        match self.mode {
            ResolutionMode::Direct => self
                .instruction
                .accounts
                .get(position)
                .and_then(|index| self.keys.get(*index as usize))
                .copied()
                .unwrap_or_default(),
            ResolutionMode::LoadedTable => {
                self.loaded.get(position).copied().unwrap_or_default()
            }
        }
    }
}

/// Writable followed by readonly loaded addresses, parsed leniently (a
/// malformed entry becomes the null address and fails the mint checks later).
fn loaded_address_list(meta: &TransactionMeta) -> Vec<Pubkey> {
    let Some(loaded) = &meta.loaded_addresses else {
        return Vec::new();
    };
    loaded
        .writable
        .iter()
        .chain(loaded.readonly.iter())
        .map(|s| Pubkey::from_str(s).unwrap_or_default())
        .collect()
}
