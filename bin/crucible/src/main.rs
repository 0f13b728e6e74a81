use std::{marker::PhantomData, sync::Arc, time::Duration};

use crucible_beacon::{BeaconClient, BeaconFeed, MultiBeaconClient, NilBeaconClient};
use crucible_builder::{
    run_sync_monitor, BuilderApi, BundlePool, ControlLoop, ControlMessage, RpcEngine, RpcSnapshot,
    Scheduler,
};
use crucible_common::{
    metrics::start_metrics_server, task, utils::init_tracing_log, BuilderConfig, ChainInfo,
    SigningContext,
};
use crucible_relay::{local, BuilderClient, RelayGateway};
use crucible_types::PayloadAttributes;
#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;
use tokio::{signal::unix::SignalKind, sync::mpsc};
use tracing::{debug, error, info, warn};

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

const VALIDATOR_REFRESH_INTERVAL: Duration = Duration::from_secs(384);
const SYNC_POLL_INTERVAL: Duration = Duration::from_secs(5);
const EVENT_CHANNEL_SIZE: usize = 64;

struct BuilderProd<B>(PhantomData<B>);

impl<B: BeaconFeed> BuilderApi for BuilderProd<B> {
    type Snapshot = RpcSnapshot;
    type Engine = RpcEngine;
    type BundleSource = BundlePool;
    type Submitter = RelayGateway<B>;
}

#[tokio::main]
async fn main() {
    let config = match BuilderConfig::load() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("failed to load config: {err}");
            std::process::exit(1);
        }
    };

    let _guard = match init_tracing_log(&config.logging) {
        Ok(guard) => guard,
        Err(err) => {
            eprintln!("failed to init logging: {err}");
            std::process::exit(1);
        }
    };

    if let Err(err) = config.validate() {
        error!(%err, "invalid config");
        std::process::exit(1);
    }

    start_metrics_server();

    let res = if config.beacon_endpoints.is_empty() {
        warn!("no beacon endpoints configured, builder will never be triggered");
        run(config, NilBeaconClient).await
    } else {
        let feed = beacon_feed(&config);
        run(config, feed).await
    };

    match res {
        Ok(_) => info!("builder exited"),
        Err(err) => {
            error!(%err, "builder exited with error");
            std::process::exit(1);
        }
    }
}

fn beacon_feed(config: &BuilderConfig) -> Arc<MultiBeaconClient> {
    let http = reqwest::Client::new();
    let clients = config
        .beacon_endpoints
        .iter()
        .map(|endpoint| Arc::new(BeaconClient::new(http.clone(), endpoint.clone())))
        .collect();

    let feed = Arc::new(MultiBeaconClient::new(clients));
    feed.start_validator_refresh(VALIDATOR_REFRESH_INTERVAL);
    feed
}

async fn run<B: BeaconFeed + Clone>(config: BuilderConfig, beacon: B) -> eyre::Result<()> {
    let chain_info = Arc::new(ChainInfo::new(&config.chain));
    let signing = Arc::new(SigningContext::new(config.builder_keypair()?, chain_info.clone()));
    let http = reqwest::Client::new();

    info!(
        pubkey = ?signing.pubkey(),
        algorithms = ?config.algorithms()?,
        dry_run = config.dry_run,
        "starting builder"
    );

    let relays = RelayGateway::from_config(&config, http.clone(), beacon.clone(), chain_info)?;
    if let Some(local_relay) = relays.local.clone() {
        task::spawn(file!(), line!(), local::serve(local_relay, config.listen_addr));
    }

    let engine = Arc::new(RpcEngine::new(http, &config.simulator));
    let bundles = Arc::new(BundlePool::new());
    let scheduler = Arc::new(Scheduler::<BuilderProd<B>>::from_config(
        &config,
        engine.clone(),
        bundles.clone(),
        Arc::new(relays.gateway),
        signing,
    )?);

    let peer = match &config.peer_builder {
        Some(peer) => {
            let client = BuilderClient::new(&peer.host, Duration::from_millis(peer.timeout_ms))?;
            info!(url = %client.base_url(), "peer builder configured");
            Some(client)
        }
        None => None,
    };

    // beacon feed -> bundle pruning and peer lookups -> scheduler
    let (feed_tx, mut feed_rx) = mpsc::channel::<PayloadAttributes>(EVENT_CHANNEL_SIZE);
    let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_SIZE);
    task::spawn(file!(), line!(), async move {
        beacon.subscribe_payload_attributes(feed_tx).await;
    });
    task::spawn(file!(), line!(), async move {
        while let Some(attrs) = feed_rx.recv().await {
            bundles.prune(attrs.block_number);
            if let Some(peer) = peer.clone() {
                task::spawn(file!(), line!(), log_peer_block(peer, attrs.clone()));
            }
            if events_tx.send(attrs).await.is_err() {
                break;
            }
        }
    });
    task::spawn(file!(), line!(), scheduler.clone().run(events_rx));

    let (sync_tx, sync_rx) = mpsc::channel(8);
    task::spawn(file!(), line!(), run_sync_monitor(engine, sync_tx, SYNC_POLL_INTERVAL));

    let (control_tx, control_rx) = mpsc::channel(8);
    let control = task::spawn(
        file!(),
        line!(),
        ControlLoop::new(scheduler, Some(sync_rx), control_rx).run(),
    );
    control_tx.send(ControlMessage::Start).await?;

    // wait for SIGTERM or SIGINT
    let mut sigint = tokio::signal::unix::signal(SignalKind::interrupt())?;
    let mut sigterm = tokio::signal::unix::signal(SignalKind::terminate())?;

    tokio::select! {
        _ = sigint.recv() => {}
        _ = sigterm.recv() => {}
    }

    info!("shutting down");
    let _ = control_tx.send(ControlMessage::Exit).await;
    control.await?;

    Ok(())
}

async fn log_peer_block(peer: BuilderClient, attrs: PayloadAttributes) {
    match peer.get_block(attrs.block_number, attrs.parent_hash).await {
        Ok(payload) => debug!(
            slot = attrs.slot,
            block_number = payload.block_number,
            gas_used = payload.gas_used,
            txs = payload.transactions.len(),
            "peer builder block"
        ),
        Err(err) => debug!(slot = attrs.slot, %err, "no peer builder block"),
    }
}
