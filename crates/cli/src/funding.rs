use chrono::Utc;
use perp_funding_sdk::{
    funding::{FundingRecord, FundingSampler, FundingSink, SAMPLE_INTERVAL, funding_apr},
    oracle::OracleDecoder,
    sync::drift_market,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{MarketSynchronizer, market_state};

const DRIFT_VENUE: &str = "drift";

/// Writes funding averages to the log.
struct LogSink;

impl FundingSink for LogSink {
    async fn save(&self, record: FundingRecord) {
        info!(
            venue = %record.venue,
            periodicity = %record.periodicity,
            value_pct = record.value_pct,
            ts = %record.ts,
            "funding average"
        );
    }
}

pub(crate) async fn run(
    synchronizer: &MarketSynchronizer,
    oracle_decoder: &OracleDecoder,
    venue: String,
    with_drift: bool,
    num_samples: Option<u64>,
    cancellation_token: CancellationToken,
) -> anyhow::Result<()> {
    let mut market_sampler = FundingSampler::new(venue);
    let mut drift_sampler = with_drift.then(|| FundingSampler::new(DRIFT_VENUE));
    let mut interval = tokio::time::interval(SAMPLE_INTERVAL);
    let mut samples_left = num_samples;

    while samples_left.is_none_or(|count| count > 0) {
        tokio::select! {
            _ = cancellation_token.cancelled() => break,
            _ = interval.tick() => {},
        }

        if let Err(err) = synchronizer.poll().await {
            warn!(error = %err, "poll failed, skipping sample");
            continue;
        }
        let now = Utc::now();

        // Venues are sampled independently
        match market_state(synchronizer, oracle_decoder) {
            Ok(state) => {
                let apr = funding_apr(state.funding_rate());
                debug!(venue = market_sampler.venue(), apr, "funding sample");
                market_sampler.sample(&LogSink, now, apr).await;
            },
            Err(err) => warn!(venue = market_sampler.venue(), error = %err, "skipping sample"),
        }

        if let Some(sampler) = drift_sampler.as_mut() {
            let snapshot = synchronizer.snapshot();
            match drift_market(&snapshot).map(|market| market.funding_rate()) {
                Ok(Some(rate)) => {
                    let apr = funding_apr(rate);
                    debug!(venue = sampler.venue(), apr, "funding sample");
                    sampler.sample(&LogSink, now, apr).await;
                },
                Ok(None) => warn!(venue = sampler.venue(), "oracle TWAP not set, skipping sample"),
                Err(err) => warn!(venue = sampler.venue(), error = %err, "skipping sample"),
            }
        }

        if let Some(ref mut count) = samples_left {
            *count -= 1;
        }
    }

    Ok(())
}
