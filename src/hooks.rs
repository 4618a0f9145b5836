/// Hook registration and the built-in console announcer
///
/// Consumers subscribe to pipeline output by registering hooks before the
/// pipeline starts. Hooks for one protocol run in registration order,
/// sequentially, on every emitted record; a blocking or stuck hook stalls
/// that protocol's dispatch (accepted backpressure). Outbound chat rendering
/// lives outside this crate; the announcer below is the in-repo consumer.

use async_trait::async_trait;
use std::sync::Arc;

use crate::cache::MarketCache;
use crate::logger::{log, log_debug, LogTag};
use crate::openbook::NewMarketEvent;
use crate::raydium::NewPoolEvent;
use crate::rpc::RpcPool;
use crate::tokens;

/// Shared services handed to every hook invocation
pub struct HookContext {
    pub rpc: Arc<RpcPool>,
    pub markets: Arc<MarketCache>,
}

/// Consumer of new-pool records
#[async_trait]
pub trait PoolHook: Send + Sync {
    async fn on_new_pool(&self, event: &NewPoolEvent, ctx: &HookContext);
}

/// Consumer of new-market records
#[async_trait]
pub trait MarketHook: Send + Sync {
    async fn on_new_market(&self, event: &NewMarketEvent, ctx: &HookContext);
}

/// Registration-ordered hook lists, one per protocol.
///
/// Built once during startup and passed by reference to the pipeline; there
/// is no runtime registration.
#[derive(Default)]
pub struct HookRegistry {
    pool_hooks: Vec<Box<dyn PoolHook>>,
    market_hooks: Vec<Box<dyn MarketHook>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_pool_hook(&mut self, hook: Box<dyn PoolHook>) {
        self.pool_hooks.push(hook);
    }

    pub fn register_market_hook(&mut self, hook: Box<dyn MarketHook>) {
        self.market_hooks.push(hook);
    }

    pub fn pool_hooks(&self) -> &[Box<dyn PoolHook>] {
        &self.pool_hooks
    }

    pub fn market_hooks(&self) -> &[Box<dyn MarketHook>] {
        &self.market_hooks
    }
}

/// Console announcer: renders each record as a readable summary line,
/// enriched with token and creator intelligence. Enrichment failures
/// degrade to "N/A" and never abort dispatch.
pub struct AnnouncerHook;

impl AnnouncerHook {
    pub fn new() -> Self {
        Self
    }
}

impl Default for AnnouncerHook {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PoolHook for AnnouncerHook {
    async fn on_new_pool(&self, event: &NewPoolEvent, ctx: &HookContext) {
        let token = tokens::get_token_data(&ctx.rpc, &event.base_mint).await;
        let token = match token {
            Ok(token) => Some(token),
            Err(e) => {
                log_debug(
                    LogTag::Hook,
                    "ENRICH_FAILED",
                    &format!("token data unavailable for {}: {}", event.base_mint, e),
                );
                None
            }
        };

        let meta = match &token {
            Some(token) if !token.uri.is_empty() => {
                tokens::fetch_token_meta(&token.uri).await.ok()
            }
            _ => None,
        };

        // The matching order-book market, if its creation was seen first
        let market_cost = ctx
            .markets
            .take(&event.base_mint.to_string())
            .map(|market| market.creation_cost);

        let creator_balance = tokens::get_wallet_balance(&ctx.rpc, &event.creator).await;
        let creator_history = tokens::get_wallet_history(&ctx.rpc, &event.creator).await.ok();
        let holders = tokens::get_top_holders(&ctx.rpc, &event.base_mint)
            .await
            .unwrap_or_default();

        let symbol = token
            .as_ref()
            .map(|t| t.symbol.clone())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "???".to_string());
        let quote_symbol = tokens::symbol_for_quote(&event.quote_mint);

        let cost_line = market_cost
            .map(|cost| format!("{:.3} SOL", cost))
            .unwrap_or_else(|| "N/A".to_string());

        let authorities = token
            .as_ref()
            .map(|t| {
                format!(
                    "mint {} / freeze {}",
                    if t.mint_authority.is_some() { "enabled" } else { "disabled" },
                    if t.freeze_authority.is_some() { "enabled" } else { "disabled" },
                )
            })
            .unwrap_or_else(|| "unknown".to_string());

        let ownership = token
            .as_ref()
            .map(|t| format_ownership(&holders, t.ui_supply()))
            .unwrap_or_else(|| "N/A".to_string());

        let creator_line = match creator_history {
            Some(history) => format!(
                "{} ({:.3} SOL, {} recent txs{})",
                event.creator,
                creator_balance,
                history.transaction_count,
                history
                    .earliest
                    .map(|t| format!(", active since {}", t.format("%Y-%m-%d")))
                    .unwrap_or_default(),
            ),
            None => format!("{} ({:.3} SOL)", event.creator, creator_balance),
        };

        let socials = meta
            .as_ref()
            .map(tokens::format_socials)
            .unwrap_or_else(|| "None".to_string());

        log(
            LogTag::Hook,
            "NEW_POOL",
            &format!(
                "{}/{} | pool {} | tx {} | market cost {} | liquidity {:.0} {} / {:.1} {} | \
                 opens <t:{}> | creator {} | authorities: {} | ownership: {} | socials: {}{}",
                symbol,
                quote_symbol,
                event.amm_id,
                event.signature,
                cost_line,
                event.base_liquidity,
                symbol,
                event.quote_liquidity,
                quote_symbol,
                event.init_metadata.open_time,
                creator_line,
                authorities,
                ownership,
                socials,
                if event.swapped { " | pair order swapped" } else { "" },
            ),
        );
    }
}

#[async_trait]
impl MarketHook for AnnouncerHook {
    async fn on_new_market(&self, event: &NewMarketEvent, _ctx: &HookContext) {
        log(
            LogTag::Hook,
            "NEW_MARKET",
            &format!(
                "market {} | base {} | quote {} | vault signer {} | cost {:.3} SOL | tx {}{}",
                event.market,
                event.base_mint,
                event.quote_mint,
                event.vault_signer,
                event.creation_cost,
                event.signature,
                if event.swapped { " | pair order swapped" } else { "" },
            ),
        );
    }
}

/// Top-holder concentration as supply percentages.
fn format_ownership(holders: &[tokens::TopHolder], supply: f64) -> String {
    if holders.is_empty() || supply <= 0.0 {
        return "N/A".to_string();
    }

    holders
        .iter()
        .take(3)
        .map(|holder| {
            format!(
                "{}… {:.2}%",
                &holder.address[..holder.address.len().min(4)],
                (holder.amount / supply) * 100.0
            )
        })
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokens::TopHolder;

    #[test]
    fn ownership_is_percent_of_supply() {
        let holders = vec![
            TopHolder {
                address: "AbcdEfgh".to_string(),
                amount: 500.0,
            },
            TopHolder {
                address: "WxyzQrst".to_string(),
                amount: 250.0,
            },
        ];

        let formatted = format_ownership(&holders, 1_000.0);
        assert!(formatted.contains("Abcd… 50.00%"));
        assert!(formatted.contains("Wxyz… 25.00%"));
    }

    #[test]
    fn empty_holders_render_as_unavailable() {
        assert_eq!(format_ownership(&[], 1_000.0), "N/A");
    }

    #[tokio::test]
    async fn hooks_dispatch_in_registration_order() {
        use crate::rpc::RpcPool;
        use chrono::Utc;
        use solana_sdk::pubkey::Pubkey;
        use solana_sdk::signature::Signature;
        use std::sync::atomic::{AtomicUsize, Ordering};

        struct Ordered {
            expected: usize,
            counter: Arc<AtomicUsize>,
        }

        #[async_trait]
        impl MarketHook for Ordered {
            async fn on_new_market(&self, _event: &NewMarketEvent, _ctx: &HookContext) {
                let position = self.counter.fetch_add(1, Ordering::SeqCst);
                assert_eq!(position, self.expected);
            }
        }

        let counter = Arc::new(AtomicUsize::new(0));
        let mut registry = HookRegistry::new();
        for expected in 0..3 {
            registry.register_market_hook(Box::new(Ordered {
                expected,
                counter: counter.clone(),
            }));
        }

        let ctx = HookContext {
            rpc: Arc::new(RpcPool::from_urls(&["http://rpc.invalid"], 1).unwrap()),
            markets: Arc::new(MarketCache::new()),
        };
        let event = NewMarketEvent {
            program_id: Pubkey::new_unique(),
            market: Pubkey::new_unique(),
            event_queue: Pubkey::new_unique(),
            bids: Pubkey::new_unique(),
            asks: Pubkey::new_unique(),
            base_mint: Pubkey::new_unique(),
            quote_mint: Pubkey::new_unique(),
            base_vault: Pubkey::new_unique(),
            quote_vault: Pubkey::new_unique(),
            vault_signer: Pubkey::new_unique(),
            creation_cost: 1.5,
            creator: Pubkey::new_unique(),
            signature: Signature::default(),
            slot: 1,
            block_time: None,
            discovered_at: Utc::now(),
            swapped: false,
        };

        for hook in registry.market_hooks() {
            hook.on_new_market(&event, &ctx).await;
        }

        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }
}
