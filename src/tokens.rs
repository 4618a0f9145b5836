/// Token intelligence for hook consumers
///
/// Everything a notification renderer wants to say about a freshly listed
/// token: the on-chain mint state, the metaplex metadata strings, the
/// off-chain metadata document the URI points at, holder concentration and
/// creator wallet probes.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use serde::Deserialize;
use solana_program::program_option::COption;
use solana_program::program_pack::Pack;
use solana_sdk::pubkey::Pubkey;
use spl_token::state::Mint;
use std::time::Duration;

use crate::constants::{IPFS_GATEWAY, METADATA_PROGRAM, USDC, WRAPPED_SOL};
use crate::rpc::{RpcError, RpcPool};

/// Recent-signature window used for creator wallet probes
const WALLET_HISTORY_LIMIT: usize = 25;

static HTTP: Lazy<reqwest::Client> = Lazy::new(|| {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(8))
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
});

/// On-chain state of a mint plus its metaplex metadata strings
#[derive(Debug, Clone)]
pub struct TokenData {
    pub mint: Pubkey,
    pub supply: u64,
    pub decimals: u8,
    pub is_initialized: bool,
    pub mint_authority: Option<Pubkey>,
    pub freeze_authority: Option<Pubkey>,
    pub name: String,
    pub symbol: String,
    pub uri: String,
}

impl TokenData {
    /// Supply scaled by the mint's decimals.
    pub fn ui_supply(&self) -> f64 {
        self.supply as f64 / 10f64.powi(self.decimals as i32)
    }
}

/// Off-chain metadata document found at the mint's URI
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TokenMeta {
    pub name: String,
    pub symbol: String,
    pub description: String,
    pub image: String,
    pub created_on: String,
    pub twitter: String,
    pub telegram: String,
    pub website: String,
    pub extensions: TokenMetaExtensions,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TokenMetaExtensions {
    pub website: String,
    pub twitter: String,
    pub telegram: String,
}

/// One entry of a mint's largest-holder list
#[derive(Debug, Clone)]
pub struct TopHolder {
    pub address: String,
    pub amount: f64,
}

/// Summary of a wallet's recent signature history
#[derive(Debug, Clone)]
pub struct WalletHistory {
    pub transaction_count: usize,
    pub earliest: Option<DateTime<Utc>>,
}

/// Fetch mint state and metaplex metadata for a token.
///
/// A wrong-shape mint account is structural and aborts immediately; only
/// the fetches themselves are retried.
pub async fn get_token_data(pool: &RpcPool, mint: &Pubkey) -> Result<TokenData> {
    let data = pool
        .get_account_data(mint)
        .await
        .with_context(|| format!("mint account fetch for {}", mint))?;
    let parsed = Mint::unpack(&data).map_err(|e| anyhow!("not a valid SPL mint: {}", e))?;

    let (metadata_account, _) = Pubkey::find_program_address(
        &[b"metadata", METADATA_PROGRAM.as_ref(), mint.as_ref()],
        &METADATA_PROGRAM,
    );
    let metadata = pool
        .get_account_data(&metadata_account)
        .await
        .with_context(|| format!("metadata account fetch for {}", mint))?;
    let (name, symbol, uri) =
        read_metadata_strings(&metadata).ok_or_else(|| anyhow!("malformed metadata account"))?;

    Ok(TokenData {
        mint: *mint,
        supply: parsed.supply,
        decimals: parsed.decimals,
        is_initialized: parsed.is_initialized,
        mint_authority: coption(parsed.mint_authority),
        freeze_authority: coption(parsed.freeze_authority),
        name,
        symbol,
        uri,
    })
}

fn coption(value: COption<Pubkey>) -> Option<Pubkey> {
    match value {
        COption::Some(key) => Some(key),
        COption::None => None,
    }
}

/// Metaplex metadata layout: key (1) + update authority (32) + mint (32)
/// followed by three length-prefixed strings padded with NULs.
fn read_metadata_strings(data: &[u8]) -> Option<(String, String, String)> {
    let mut offset = 1 + 32 + 32;
    let name = read_prefixed_string(data, &mut offset)?;
    let symbol = read_prefixed_string(data, &mut offset)?;
    let uri = read_prefixed_string(data, &mut offset)?;
    Some((name, symbol, uri))
}

fn read_prefixed_string(data: &[u8], offset: &mut usize) -> Option<String> {
    let len_bytes = data.get(*offset..*offset + 4)?;
    let len = u32::from_le_bytes(len_bytes.try_into().ok()?) as usize;
    let bytes = data.get(*offset + 4..*offset + 4 + len)?;
    *offset += 4 + len;
    Some(String::from_utf8_lossy(bytes).trim_end_matches('\0').to_string())
}

/// Fetch the off-chain metadata document, merging `extensions` socials into
/// the top-level fields.
pub async fn fetch_token_meta(uri: &str) -> Result<TokenMeta> {
    let uri = rewrite_metadata_uri(uri);

    let response = HTTP
        .get(&uri)
        .send()
        .await
        .with_context(|| format!("metadata fetch from {}", uri))?;
    let mut meta: TokenMeta = response
        .json()
        .await
        .with_context(|| format!("metadata json from {}", uri))?;

    if !meta.extensions.twitter.is_empty() {
        meta.twitter = meta.extensions.twitter.clone();
    }
    if !meta.extensions.telegram.is_empty() {
        meta.telegram = meta.extensions.telegram.clone();
    }
    if !meta.extensions.website.is_empty() {
        meta.website = meta.extensions.website.clone();
    }

    Ok(meta)
}

/// Rewrite known storage-provider URL shapes to a plain IPFS gateway fetch.
pub fn rewrite_metadata_uri(uri: &str) -> String {
    if uri.contains("nftstorage.link") {
        if let Some(last) = uri.split('/').filter(|s| !s.is_empty()).last() {
            let cid = last.split('.').next().unwrap_or(last);
            return format!("{}{}", IPFS_GATEWAY, cid);
        }
    }
    uri.to_string()
}

/// Largest holders of a mint, sorted by amount descending.
pub async fn get_top_holders(pool: &RpcPool, mint: &Pubkey) -> Result<Vec<TopHolder>, RpcError> {
    let mut holders: Vec<TopHolder> = pool
        .get_token_largest_accounts(mint)
        .await?
        .into_iter()
        .filter_map(|balance| {
            balance.ui_amount.map(|amount| TopHolder {
                address: balance.address,
                amount,
            })
        })
        .collect();

    holders.sort_by(|a, b| {
        b.amount
            .partial_cmp(&a.amount)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    Ok(holders)
}

/// SOL balance of a wallet; unavailable data reads as zero.
pub async fn get_wallet_balance(pool: &RpcPool, address: &Pubkey) -> f64 {
    pool.get_balance(address).await.unwrap_or(0.0)
}

/// Recent activity summary of a wallet.
pub async fn get_wallet_history(
    pool: &RpcPool,
    address: &Pubkey,
) -> Result<WalletHistory, RpcError> {
    let records = pool
        .get_signatures_for_address(address, WALLET_HISTORY_LIMIT)
        .await?;

    let earliest = records
        .iter()
        .filter_map(|record| record.block_time)
        .min()
        .and_then(|secs| Utc.timestamp_opt(secs, 0).single());

    Ok(WalletHistory {
        transaction_count: records.len(),
        earliest,
    })
}

/// Human label for a canonical quote mint.
pub fn symbol_for_quote(mint: &Pubkey) -> &'static str {
    if mint == &*WRAPPED_SOL {
        "SOL"
    } else if mint == &*USDC {
        "USDC"
    } else {
        "N/A"
    }
}

/// Social links joined into one display string.
pub fn format_socials(meta: &TokenMeta) -> String {
    let mut socials = Vec::new();
    for (label, value) in [
        ("Twitter", &meta.twitter),
        ("Telegram", &meta.telegram),
        ("Website", &meta.website),
    ] {
        if value.is_empty() {
            continue;
        }
        let url = if value.starts_with("https://") {
            value.clone()
        } else {
            format!("https://{}", value)
        };
        socials.push(format!("{}: {}", label, url));
    }

    if socials.is_empty() {
        "None".to_string()
    } else {
        socials.join(" | ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{SOL_MINT, USDC_MINT};
    use std::str::FromStr;

    #[test]
    fn subdomain_storage_url_is_rewritten_to_gateway() {
        let uri = "https://bafybeicw3txn5yu3oscu4o5xkvzoajky.ipfs.nftstorage.link";
        assert_eq!(
            rewrite_metadata_uri(uri),
            format!("{}bafybeicw3txn5yu3oscu4o5xkvzoajky", IPFS_GATEWAY)
        );

        // Trailing slash variants resolve to the same CID
        let with_slash = format!("{}/", uri);
        assert_eq!(
            rewrite_metadata_uri(&with_slash),
            format!("{}bafybeicw3txn5yu3oscu4o5xkvzoajky", IPFS_GATEWAY)
        );
    }

    #[test]
    fn path_storage_url_is_rewritten_to_gateway() {
        let uri = "https://nftstorage.link/ipfs/bafkreibbbviaj3z2javu4jv6";
        assert_eq!(
            rewrite_metadata_uri(uri),
            format!("{}bafkreibbbviaj3z2javu4jv6", IPFS_GATEWAY)
        );
    }

    #[test]
    fn other_uris_pass_through_unchanged() {
        let uri = "https://arweave.net/abc123";
        assert_eq!(rewrite_metadata_uri(uri), uri);
    }

    #[test]
    fn metadata_strings_are_read_from_fixed_layout() {
        let mut data = vec![0u8; 65];
        for text in ["My Token\0\0\0\0", "MTK\0\0", "https://example.com/meta.json"] {
            data.extend_from_slice(&(text.len() as u32).to_le_bytes());
            data.extend_from_slice(text.as_bytes());
        }

        let (name, symbol, uri) = read_metadata_strings(&data).expect("strings read");
        assert_eq!(name, "My Token");
        assert_eq!(symbol, "MTK");
        assert_eq!(uri, "https://example.com/meta.json");
    }

    #[test]
    fn truncated_metadata_is_rejected() {
        let data = vec![0u8; 40];
        assert!(read_metadata_strings(&data).is_none());
    }

    #[test]
    fn quote_symbols_are_labelled() {
        assert_eq!(symbol_for_quote(&Pubkey::from_str(SOL_MINT).unwrap()), "SOL");
        assert_eq!(symbol_for_quote(&Pubkey::from_str(USDC_MINT).unwrap()), "USDC");
        assert_eq!(symbol_for_quote(&Pubkey::new_unique()), "N/A");
    }

    #[test]
    fn socials_are_joined_with_scheme_defaults() {
        let meta = TokenMeta {
            twitter: "twitter.com/example".to_string(),
            website: "https://example.com".to_string(),
            ..TokenMeta::default()
        };
        assert_eq!(
            format_socials(&meta),
            "Twitter: https://twitter.com/example | Website: https://example.com"
        );

        assert_eq!(format_socials(&TokenMeta::default()), "None");
    }
}
