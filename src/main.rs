use std::sync::Arc;

use poolscreener::cache::MarketCache;
use poolscreener::config::Config;
use poolscreener::hooks::{AnnouncerHook, HookRegistry};
use poolscreener::logger::{log, log_error, LogTag};
use poolscreener::pipeline;
use poolscreener::rpc::RpcPool;

/// Main entry point for PoolScreener
///
/// Loads configuration, builds the RPC pool, registers the built-in
/// announcer for both protocols and starts the ingestion pipeline. The
/// stages run until the process is killed; there is no graceful drain.
#[tokio::main]
async fn main() {
    log(LogTag::System, "START", "============================================");
    log(LogTag::System, "START", "PoolScreener - Solana launch monitor");
    log(LogTag::System, "START", &format!("Version: {}", env!("CARGO_PKG_VERSION")));
    log(LogTag::System, "START", "============================================");

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            log_error(LogTag::System, "CONFIG", &format!("configuration error: {}", e));
            std::process::exit(1);
        }
    };

    let rpc = match RpcPool::initialise(&config) {
        Ok(pool) => Arc::new(pool),
        Err(e) => {
            log_error(LogTag::System, "CONFIG", &format!("rpc pool error: {}", e));
            std::process::exit(1);
        }
    };

    let markets = Arc::new(MarketCache::new());

    let mut registry = HookRegistry::new();
    registry.register_pool_hook(Box::new(AnnouncerHook::new()));
    registry.register_market_hook(Box::new(AnnouncerHook::new()));
    let registry = Arc::new(registry);

    let handles = pipeline::start(&config, rpc, markets, registry);
    log(
        LogTag::System,
        "RUNNING",
        &format!("pipeline started ({} stages)", handles.len()),
    );

    // Stage tasks run forever; park the main task on them
    futures::future::join_all(handles).await;
}
