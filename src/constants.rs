/// Global constants used across PoolScreener
///
/// This module contains system-wide constants that are not configurable
/// and are used across multiple modules.

use once_cell::sync::Lazy;
use solana_sdk::pubkey::Pubkey;
use std::str::FromStr;

// ============================================================================
// SOLANA BLOCKCHAIN CONSTANTS
// ============================================================================

/// SOL token mint address (wrapped SOL / WSOL)
pub const SOL_MINT: &str = "So11111111111111111111111111111111111111112";

/// Number of decimal places for SOL token
pub const SOL_DECIMALS: u8 = 9;

/// Lamports per SOL (10^9)
pub const LAMPORTS_PER_SOL: u64 = 1_000_000_000;

/// Common stablecoin mint treated as a quote currency
pub const USDC_MINT: &str = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";

/// Metaplex token metadata program
pub const METADATA_PROGRAM_ID: &str = "metaqbxxUerdq28cj1RbAWkYQm3ybzjb6a8bt518x1s";

// ============================================================================
// PROTOCOL CONSTANTS
// ============================================================================

/// Raydium AMM v4 program (liquidity pool creation)
pub const RAYDIUM_AMM_PROGRAM_ID: &str = "675kPX9MHTjS2zt1qfr1NYHuzeLXfQM9H24wFSUt1Mp8";

/// Raydium liquidity pool authority (owner of pool vault token accounts)
pub const RAYDIUM_AUTHORITY_ID: &str = "5Q544fKrFoe6tsEbD7S8EmxGTJYAKtTVhAW5Q5pge4j1";

/// OpenBook (Serum v3) central limit order book program
pub const OPENBOOK_PROGRAM_ID: &str = "srmqPvymJeFKQ4zGQed1GFppgkRHL9kaELCbyksJtPX";

/// Log substring that identifies a Raydium pool initialization transaction
pub const RAYDIUM_INIT_LOG_MARKER: &str = "initialize2";

/// Marker preceding the key/value payload of the pool init log line
pub const RAYDIUM_INIT_PAYLOAD_TAG: &str = " InitializeInstruction2 ";

/// System program success line preceding the OpenBook market-init invocation
pub const SYSTEM_PROGRAM_SUCCESS_LOG: &str = "Program 11111111111111111111111111111111 success";

// ============================================================================
// EXTERNAL SERVICES
// ============================================================================

/// Public IPFS gateway used to rewrite known storage-provider URLs
pub const IPFS_GATEWAY: &str = "https://ipfs.io/ipfs/";

/// Default public mainnet RPC appended to the pool when INCLUDE_PUBLIC_RPC=1
pub const PUBLIC_MAINNET_RPC: &str = "https://api.mainnet-beta.solana.com";

// ============================================================================
// PARSED PUBKEYS
// ============================================================================

pub static RAYDIUM_AMM_PROGRAM: Lazy<Pubkey> =
    Lazy::new(|| Pubkey::from_str(RAYDIUM_AMM_PROGRAM_ID).expect("valid raydium program id"));

pub static RAYDIUM_AUTHORITY: Lazy<Pubkey> =
    Lazy::new(|| Pubkey::from_str(RAYDIUM_AUTHORITY_ID).expect("valid raydium authority id"));

pub static OPENBOOK_PROGRAM: Lazy<Pubkey> =
    Lazy::new(|| Pubkey::from_str(OPENBOOK_PROGRAM_ID).expect("valid openbook program id"));

pub static METADATA_PROGRAM: Lazy<Pubkey> =
    Lazy::new(|| Pubkey::from_str(METADATA_PROGRAM_ID).expect("valid metadata program id"));

pub static WRAPPED_SOL: Lazy<Pubkey> =
    Lazy::new(|| Pubkey::from_str(SOL_MINT).expect("valid wsol mint"));

pub static USDC: Lazy<Pubkey> =
    Lazy::new(|| Pubkey::from_str(USDC_MINT).expect("valid usdc mint"));

/// First-level invocation line of the OpenBook program
pub static OPENBOOK_INVOKE_LOG: Lazy<String> =
    Lazy::new(|| format!("Program {} invoke [1]", OPENBOOK_PROGRAM_ID));
