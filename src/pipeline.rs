/// Pipeline orchestration
///
/// Wires, per protocol: supervised log subscriber → signature channel →
/// parser → record channel → hook dispatcher. Subscribers restart forever
/// with a fixed cool-down; a malformed candidate never takes a stage down.
/// Dispatch awaits each hook in turn, so a slow consumer throttles its own
/// protocol instead of growing an unbounded backlog.

use std::sync::Arc;
use std::time::Duration;

use solana_sdk::signature::Signature;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::cache::MarketCache;
use crate::config::Config;
use crate::constants::{OPENBOOK_PROGRAM_ID, RAYDIUM_AMM_PROGRAM_ID};
use crate::hooks::{HookContext, HookRegistry};
use crate::logger::{log, log_warn, LogTag};
use crate::openbook;
use crate::raydium;
use crate::rpc::RpcPool;
use crate::websocket::LogsSubscriber;

/// Cool-down between subscriber restarts
const RESTART_DELAY: Duration = Duration::from_secs(3);

/// Start all pipeline stages. The returned handles run for the process
/// lifetime; shutdown is process-level only.
pub fn start(
    config: &Config,
    rpc: Arc<RpcPool>,
    markets: Arc<MarketCache>,
    hooks: Arc<HookRegistry>,
) -> Vec<JoinHandle<()>> {
    let mut handles = Vec::new();

    // ------------------------------------------------------------------
    // Raydium: pool creations
    // ------------------------------------------------------------------
    let (pool_sig_tx, mut pool_sig_rx) = mpsc::unbounded_channel::<Signature>();
    let (pool_rec_tx, mut pool_rec_rx) = mpsc::unbounded_channel::<raydium::NewPoolEvent>();

    {
        let ws_url = config.ws_url.clone();
        handles.push(tokio::spawn(async move {
            let subscriber = LogsSubscriber::new(
                "raydium",
                LogTag::Raydium,
                RAYDIUM_AMM_PROGRAM_ID,
                raydium::pool_log_filter,
            );
            supervise(subscriber, ws_url, pool_sig_tx).await;
        }));
    }

    {
        let rpc = rpc.clone();
        handles.push(tokio::spawn(async move {
            while let Some(signature) = pool_sig_rx.recv().await {
                if let Some(event) = raydium::parse_transaction(&rpc, &signature).await {
                    log(
                        LogTag::Raydium,
                        "POOL",
                        &format!("new pool {} ({})", event.amm_id, event.signature),
                    );
                    if pool_rec_tx.send(event).is_err() {
                        break;
                    }
                }
            }
            log(LogTag::Raydium, "STOP", "pool parser stage ended");
        }));
    }

    {
        let ctx = HookContext {
            rpc: rpc.clone(),
            markets: markets.clone(),
        };
        let hooks = hooks.clone();
        handles.push(tokio::spawn(async move {
            while let Some(event) = pool_rec_rx.recv().await {
                for hook in hooks.pool_hooks() {
                    hook.on_new_pool(&event, &ctx).await;
                }
            }
            log(LogTag::Raydium, "STOP", "pool dispatcher ended");
        }));
    }

    // ------------------------------------------------------------------
    // OpenBook: market creations
    // ------------------------------------------------------------------
    let (market_sig_tx, mut market_sig_rx) = mpsc::unbounded_channel::<Signature>();
    let (market_rec_tx, mut market_rec_rx) =
        mpsc::unbounded_channel::<openbook::NewMarketEvent>();

    {
        let ws_url = config.ws_url.clone();
        handles.push(tokio::spawn(async move {
            let subscriber = LogsSubscriber::new(
                "openbook",
                LogTag::Openbook,
                OPENBOOK_PROGRAM_ID,
                openbook::market_log_filter,
            );
            supervise(subscriber, ws_url, market_sig_tx).await;
        }));
    }

    {
        let rpc = rpc.clone();
        let markets = markets.clone();
        handles.push(tokio::spawn(async move {
            while let Some(signature) = market_sig_rx.recv().await {
                if let Some(event) = openbook::parse_transaction(&rpc, &signature).await {
                    log(
                        LogTag::Openbook,
                        "MARKET",
                        &format!("new market {} ({})", event.market, event.signature),
                    );
                    // The pool pipeline's consumers look this up by mint
                    markets.put(event.base_mint.to_string(), event.clone());
                    if market_rec_tx.send(event).is_err() {
                        break;
                    }
                }
            }
            log(LogTag::Openbook, "STOP", "market parser stage ended");
        }));
    }

    {
        let ctx = HookContext {
            rpc,
            markets,
        };
        handles.push(tokio::spawn(async move {
            while let Some(event) = market_rec_rx.recv().await {
                for hook in hooks.market_hooks() {
                    hook.on_new_market(&event, &ctx).await;
                }
            }
            log(LogTag::Openbook, "STOP", "market dispatcher ended");
        }));
    }

    handles
}

/// Run one subscriber forever, reconnecting after the cool-down on every
/// exit. Only process shutdown stops it.
async fn supervise(
    subscriber: LogsSubscriber,
    ws_url: String,
    out: mpsc::UnboundedSender<Signature>,
) {
    loop {
        if let Err(e) = subscriber.run(&ws_url, &out).await {
            log_warn(
                LogTag::Websocket,
                "RESTART",
                &format!(
                    "{} subscriber exited: {} - reconnecting in {}s",
                    subscriber.name(),
                    e,
                    RESTART_DELAY.as_secs()
                ),
            );
        }
        tokio::time::sleep(RESTART_DELAY).await;
    }
}
