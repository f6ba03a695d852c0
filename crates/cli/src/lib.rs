pub mod args;
mod book;
mod funding;
mod rpc;
mod snapshot;

use std::time::Duration;

use anyhow::Context;
use args::Cli;
use perp_funding_sdk::{
    layout::DRIFT_SOL_PERP_MARKET,
    oracle::OracleDecoder,
    sync::{MarketKey, MarketRecord, MarketState, RecordSynchronizer, SyncConfig, market_records, with_drift_market},
};
use tokio_util::sync::CancellationToken;

use crate::{args::Commands, rpc::RpcFetcher};

pub(crate) type MarketSynchronizer = RecordSynchronizer<MarketKey, MarketRecord, RpcFetcher>;

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let fetcher = RpcFetcher::new(cli.rpc.clone(), cli.ws_url());
    let accounts = cli.accounts();
    let oracle_decoder = OracleDecoder::default();
    let mut records = market_records(&accounts, &oracle_decoder);
    if let Commands::Funding { drift_market, no_drift: false, .. } = &cli.command {
        records = with_drift_market(records, drift_market.unwrap_or(DRIFT_SOL_PERP_MARKET));
    }
    let config = SyncConfig::default().with_fetch_timeout(Duration::from_secs(cli.fetch_timeout));

    let subscribe = matches!(cli.command, Commands::Book { subscribe: true, .. });
    let synchronizer = if subscribe {
        RecordSynchronizer::new_with_subscriptions(fetcher, records, config).await
    } else {
        RecordSynchronizer::new_with_polling(fetcher, records, config).await
    }
    .context("fetching market accounts")?;

    let cancellation_signal = CancellationToken::new();
    let cancellation_token = cancellation_signal.child_token();
    tokio::spawn(async move {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to install CTRL+C signal handler");
            return;
        }
        cancellation_signal.cancel();
    });

    match cli.command {
        Commands::Snapshot { depth } => snapshot::render(&synchronizer, &oracle_decoder, depth)?,
        Commands::Book { depth, orders_per_level, show_expired, subscribe: _, interval_ms } => {
            book::render(
                &synchronizer,
                &oracle_decoder,
                depth,
                orders_per_level,
                show_expired,
                Duration::from_millis(interval_ms),
                cancellation_token,
            )
            .await?
        },
        Commands::Funding { venue, drift_market: _, no_drift, num_samples } => {
            funding::run(&synchronizer, &oracle_decoder, venue, !no_drift, num_samples, cancellation_token).await?
        },
    }

    Ok(())
}

/// Market assembled from the current snapshot, against the wall clock.
pub(crate) fn market_state(
    synchronizer: &MarketSynchronizer,
    oracle_decoder: &OracleDecoder,
) -> anyhow::Result<MarketState> {
    let now = chrono::Utc::now().timestamp().max(0) as u64;
    MarketState::from_snapshot(&synchronizer.snapshot(), oracle_decoder, now).context("assembling market state")
}
