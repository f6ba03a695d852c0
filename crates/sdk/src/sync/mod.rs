//! Keeping decoded accounts fresh.
//!
//! A [`RecordSynchronizer`] owns a [`RecordSet`] of `{key, address, decoder}`
//! entries and publishes decoded [`Snapshot`]s of them, refreshed either by
//! [`RecordSynchronizer::poll`] or by account subscriptions. Network access is
//! abstracted by [`AccountFetcher`].
//!
//! [`market_records`] and [`MarketState`] wire the accounts of one perp
//! market into a synchronizer.

mod fetcher;
mod market;
mod synchronizer;

use std::time::Duration;

pub use fetcher::{AccountFetcher, RawAccount};
pub use market::{MarketKey, MarketRecord, MarketState, drift_market, market_records, with_drift_market};
pub use synchronizer::{Decoder, PollOutcome, Record, RecordSet, RecordSynchronizer, Snapshot};

/// Synchronizer timing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyncConfig {
    /// Polls within this interval after the last successful fetch are no-ops.
    pub min_poll_interval: Duration,
    /// Upper bound of one batch fetch.
    pub fetch_timeout: Duration,
    /// Subscriptions are torn down and re-established this often.
    pub resubscribe_interval: Duration,
    /// Delay before subscribing again after a failed subscription or a
    /// stream that ended.
    pub resubscribe_backoff: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            min_poll_interval: Duration::ZERO,
            fetch_timeout: Duration::from_secs(10),
            resubscribe_interval: Duration::from_secs(15 * 60),
            resubscribe_backoff: Duration::from_secs(1),
        }
    }
}

impl SyncConfig {
    pub fn with_min_poll_interval(self, min_poll_interval: Duration) -> Self {
        Self { min_poll_interval, ..self }
    }

    pub fn with_fetch_timeout(self, fetch_timeout: Duration) -> Self { Self { fetch_timeout, ..self } }

    pub fn with_resubscribe_interval(self, resubscribe_interval: Duration) -> Self {
        Self { resubscribe_interval, ..self }
    }

    pub fn with_resubscribe_backoff(self, resubscribe_backoff: Duration) -> Self {
        Self { resubscribe_backoff, ..self }
    }
}
