// SPDX-License-Identifier: MIT

use clap::Parser;
use order_sentinel::app::config::GlobalSettings;
use order_sentinel::app::logging::setup_logging;
use order_sentinel::domain::error::AppError;
use order_sentinel::infrastructure::data::store::OrderStore;
use order_sentinel::infrastructure::data::vault::SecretVault;
use order_sentinel::infrastructure::network::chain::RpcChainClient;
use order_sentinel::infrastructure::network::price_feed::HttpPriceOracle;
use order_sentinel::infrastructure::network::provider::ConnectionFactory;
use order_sentinel::infrastructure::network::swap_plan::HttpSwapPlanner;
use order_sentinel::services::orders::notify::{ChannelNotifier, OrderEvent};
use order_sentinel::services::orders::{OrderExecutor, OrderMonitor, OrderService};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Parser, Debug)]
#[command(author, version, about = "order sentinel")]
struct Cli {
    /// Path to config file (default: config.{toml,yaml,...})
    #[arg(long)]
    config: Option<String>,

    /// Override the monitor poll interval in seconds
    #[arg(long)]
    poll_secs: Option<u64>,

    /// Log level or directive string
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let cli = Cli::parse();
    let mut settings = GlobalSettings::load(cli.config.as_deref())?;
    if let Some(poll) = cli.poll_secs {
        settings.poll_interval_secs = poll.max(1);
    }
    let level = if settings.debug && cli.log_level == "info" {
        "debug"
    } else {
        &cli.log_level
    };
    setup_logging(level, settings.log_json);

    tracing::info!(
        target: "config",
        chain_id = settings.chain_id,
        db = %settings.database_url,
        poll_secs = settings.poll_interval_secs,
        concurrency = settings.sweep_concurrency,
        "Starting order sentinel"
    );

    let store = OrderStore::new(&settings.database_url).await?;
    let vault = SecretVault::new(&settings.vault_key);
    let provider = ConnectionFactory::http(&settings.rpc_url)?;

    let http_timeout = Duration::from_millis(settings.http_timeout_ms);
    let oracle = Arc::new(HttpPriceOracle::new(
        &settings.price_api_url,
        settings.chain_id,
        http_timeout,
    )?);
    let planner = Arc::new(HttpSwapPlanner::new(
        &settings.swap_api_url,
        settings.chain_id,
        http_timeout,
    )?);
    let chain = Arc::new(RpcChainClient::new(
        provider,
        settings.chain_id,
        Duration::from_millis(settings.receipt_poll_ms),
        Duration::from_millis(settings.receipt_timeout_ms),
    ));

    let (notifier, mut notifications) = ChannelNotifier::channel();

    // The front-end collaborator consumes these; until one is attached,
    // drain and log so the channel never backs up.
    tokio::spawn(async move {
        while let Some(note) = notifications.recv().await {
            match &note.event {
                OrderEvent::Filled {
                    order_id, tx_hash, executed_price, ..
                } => tracing::info!(
                    target: "notify",
                    owner = note.owner,
                    order_id,
                    price = executed_price,
                    tx = %tx_hash,
                    "Order filled"
                ),
                OrderEvent::Expired { order_id } => {
                    tracing::info!(target: "notify", owner = note.owner, order_id, "Order expired")
                }
                OrderEvent::Cancelled { order_id } => {
                    tracing::info!(target: "notify", owner = note.owner, order_id, "Order cancelled")
                }
            }
        }
    });

    let executor = Arc::new(OrderExecutor::new(
        store.clone(),
        vault.clone(),
        chain,
        planner,
        notifier.clone(),
    ));
    let monitor = Arc::new(OrderMonitor::new(
        store.clone(),
        oracle,
        executor,
        notifier.clone(),
        Duration::from_secs(settings.poll_interval_secs),
        settings.sweep_concurrency,
    ));

    // Order surface for the front-end collaborator.
    let _api = OrderService::new(store, vault, notifier);

    let shutdown = CancellationToken::new();
    let monitor_task = tokio::spawn(monitor.run(shutdown.clone()));

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| AppError::Initialization(format!("Signal handler failed: {e}")))?;
    tracing::info!("Shutdown requested; finishing current sweep");
    shutdown.cancel();

    monitor_task
        .await
        .map_err(|e| AppError::Unknown(e.into()))?;
    Ok(())
}
