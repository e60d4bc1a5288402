//! Pool Mixer node — ledger engine behind a serialized actor and an HTTP API.
//!
//!   HTTP ──→ EngineHandle ──(mpsc)──→ EngineActor ──→ LedgerEngine
//!
//! Custody is simulated in memory and pre-funded from `MIXER_GENESIS`.

use std::env;
use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use pool_mixer::api;
use pool_mixer::mixer::clock::{BlockClock, Clock, UtcDayClock};
use pool_mixer::mixer::custody::InMemoryCustody;
use pool_mixer::mixer::{Amount, EngineActor, Identity, LedgerConfig, LedgerEngine};

// ─────────────────────────────────────────────────────────
// Settings
// ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ClockKind {
    Blocks,
    Utc,
}

#[derive(Debug, Clone)]
struct NodeSettings {
    listen_addr: SocketAddr,
    clock: ClockKind,
    blocks_per_day: u64,
    block_interval: Duration,
    genesis: Vec<(Identity, Amount)>,
}

impl NodeSettings {
    fn from_env() -> anyhow::Result<Self> {
        let listen_addr = env::var("MIXER_LISTEN_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:8080".into())
            .parse()
            .context("MIXER_LISTEN_ADDR is not a socket address")?;
        let clock = match env::var("MIXER_CLOCK").unwrap_or_default().to_lowercase().as_str() {
            "blocks" => ClockKind::Blocks,
            _ => ClockKind::Utc,
        };
        let blocks_per_day = env::var("MIXER_BLOCKS_PER_DAY")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(144);
        let block_interval = env::var("MIXER_BLOCK_INTERVAL_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(600));
        let genesis = match env::var("MIXER_GENESIS") {
            Ok(raw) => parse_genesis(&raw)?,
            Err(_) => Vec::new(),
        };
        Ok(Self { listen_addr, clock, blocks_per_day, block_interval, genesis })
    }
}

/// `0xabc…:1000,0xdef…:2500` → funded external wallets.
fn parse_genesis(raw: &str) -> anyhow::Result<Vec<(Identity, Amount)>> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (addr, amount) = entry
                .split_once(':')
                .with_context(|| format!("genesis entry `{entry}` is not address:amount"))?;
            let id = addr
                .trim()
                .parse::<Identity>()
                .with_context(|| format!("genesis address `{addr}` is invalid"))?;
            let amount = amount
                .trim()
                .parse::<Amount>()
                .with_context(|| format!("genesis amount `{amount}` is invalid"))?;
            Ok((id, amount))
        })
        .collect()
}

// ─────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cfg = LedgerConfig::from_env()?;
    let settings = NodeSettings::from_env()?;
    info!(
        "🚀 Pool Mixer node | admin={} fee={}% max_participants={} min_pool={} max_tx={} daily={} clock={:?}",
        cfg.admin, cfg.mixing_fee_percentage, cfg.max_pool_participants,
        cfg.min_pool_amount, cfg.max_transaction_amount, cfg.max_daily_limit, settings.clock,
    );

    let mut custody = InMemoryCustody::new();
    for (id, amount) in &settings.genesis {
        custody.fund(*id, *amount);
    }
    info!("🌱 Genesis wallets funded: {}", settings.genesis.len());

    let clock: Box<dyn Clock> = match settings.clock {
        ClockKind::Utc => Box::new(UtcDayClock),
        ClockKind::Blocks => {
            let blocks = BlockClock::new(settings.blocks_per_day);
            let ticker = blocks.clone();
            let every = settings.block_interval;
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(every);
                interval.tick().await;
                loop {
                    interval.tick().await;
                    ticker.advance(1);
                }
            });
            Box::new(blocks)
        }
    };

    let engine = LedgerEngine::new(cfg, custody, clock);
    let (handle, actor_task) = EngineActor::spawn(engine, 1024);

    tokio::select! {
        res = api::serve(handle, settings.listen_addr) => res?,
        _ = tokio::signal::ctrl_c() => {
            warn!("🛑 Ctrl-C received, shutting down");
        }
    }

    // Open connections may still hold a handle; don't wait on them forever.
    match tokio::time::timeout(Duration::from_secs(5), actor_task).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!("engine actor ended abnormally: {}", e),
        Err(_) => warn!("engine actor still busy after 5s, exiting anyway"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_genesis() {
        let a = "0x0101010101010101010101010101010101010101";
        let b = "0x0202020202020202020202020202020202020202";
        let parsed = parse_genesis(&format!("{a}:1000, {b}:2500,")).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0], (a.parse().unwrap(), 1_000));
        assert_eq!(parsed[1].1, 2_500);
    }

    #[test]
    fn test_parse_genesis_rejects_garbage() {
        assert!(parse_genesis("nope").is_err());
        assert!(parse_genesis("0x0101010101010101010101010101010101010101:abc").is_err());
        assert!(parse_genesis("").unwrap().is_empty());
    }
}
