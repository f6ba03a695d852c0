use std::{sync::Arc, time::Duration};

use perp_funding_sdk::{
    MarketAccounts,
    error::{FetchError, SyncError},
    funding::funding_apr,
    layout::DRIFT_SOL_PERP_MARKET,
    oracle::OracleDecoder,
    sync::{
        MarketKey, MarketRecord, MarketState, PollOutcome, RecordSet, RecordSynchronizer, SyncConfig, drift_market,
        market_records, with_drift_market,
    },
    testing::{BookSideBuilder, DriftPerpMarketBuilder, MemoryFetcher, PerpMarketBuilder, pyth_oracle},
    types::{Pubkey, Side},
};

fn accounts() -> MarketAccounts {
    MarketAccounts::custom(
        Pubkey::new_from_array([1; 32]),
        Pubkey::new_from_array([2; 32]),
        Pubkey::new_from_array([3; 32]),
        Pubkey::new_from_array([4; 32]),
    )
}

fn bids_blob(price: i64) -> Vec<u8> { BookSideBuilder::new(Side::Bid).fixed(price, 100).build() }

fn asks_blob(price: i64) -> Vec<u8> { BookSideBuilder::new(Side::Ask).fixed(price, 100).build() }

/// Fetcher serving a market with the oracle at 21.5 and a 21.4 / 21.6 book.
fn fetcher(accounts: &MarketAccounts) -> MemoryFetcher {
    let fetcher = MemoryFetcher::new();
    let owner = Pubkey::new_from_array([9; 32]);
    fetcher.insert(accounts.perp_market(), owner, PerpMarketBuilder::new().build());
    fetcher.insert(accounts.bids(), owner, bids_blob(21_400));
    fetcher.insert(accounts.asks(), owner, asks_blob(21_600));
    fetcher.insert(accounts.oracle(), Pubkey::default(), pyth_oracle(2150, -2));
    fetcher
}

async fn polling(
    fetcher: &MemoryFetcher,
    config: SyncConfig,
) -> RecordSynchronizer<MarketKey, MarketRecord, MemoryFetcher> {
    let records = market_records(&accounts(), &OracleDecoder::default());
    RecordSynchronizer::new_with_polling(fetcher.clone(), records, config).await.unwrap()
}

async fn within<F: Future>(f: F) -> F::Output {
    tokio::time::timeout(Duration::from_secs(5), f).await.expect("timed out")
}

fn state(sync: &RecordSynchronizer<MarketKey, MarketRecord, MemoryFetcher>) -> MarketState {
    MarketState::from_snapshot(&sync.snapshot(), &OracleDecoder::default(), 0).unwrap()
}

#[tokio::test]
async fn test_initial_fetch() {
    let accounts = accounts();
    let fetcher = fetcher(&accounts);
    let sync = polling(&fetcher, SyncConfig::default()).await;

    assert_eq!(fetcher.fetch_count(), 1);
    let snapshot = sync.snapshot();
    assert_eq!(snapshot.len(), 4);
    assert_eq!(snapshot.get(&MarketKey::Bids).map(|r| r.address()), Some(accounts.bids()));

    let state = state(&sync);
    assert_eq!(state.market().name(), "SOL-PERP");
    assert_eq!(state.bids().best().map(|o| o.price_lots()), Some(21_400));
    assert_eq!(state.asks().best().map(|o| o.price_lots()), Some(21_600));
    assert!(state.funding_rate().abs() < 1e-12);
}

#[tokio::test]
async fn test_initial_fetch_with_missing_account() {
    let accounts = accounts();
    let fetcher = fetcher(&accounts);
    fetcher.remove(&accounts.oracle());

    let records = market_records(&accounts, &OracleDecoder::default());
    let err = RecordSynchronizer::new_with_polling(fetcher, records, SyncConfig::default()).await.err().unwrap();
    assert!(err.is_fetch_failure());
}

#[tokio::test]
async fn test_poll_publishes_new_snapshot() {
    let accounts = accounts();
    let fetcher = fetcher(&accounts);
    let sync = polling(&fetcher, SyncConfig::default()).await;
    let before = sync.snapshot();

    fetcher.insert(accounts.bids(), Pubkey::default(), bids_blob(21_550));
    assert_eq!(sync.poll().await.unwrap(), PollOutcome::Fetched);

    let after = sync.snapshot();
    assert!(!after.same_as(&before));
    // Earlier snapshots are not mutated
    let old = MarketState::from_snapshot(&before, &OracleDecoder::default(), 0).unwrap();
    assert_eq!(old.bids().best().map(|o| o.price_lots()), Some(21_400));
    assert_eq!(state(&sync).bids().best().map(|o| o.price_lots()), Some(21_550));
    assert!(state(&sync).funding_rate() > 0.0);
}

/// One missing account out of many fails the whole batch and keeps the
/// previous snapshot.
#[tokio::test]
async fn test_partial_batch_failure() {
    let accounts = accounts();
    let fetcher = fetcher(&accounts);
    let sync = polling(&fetcher, SyncConfig::default()).await;
    let before = sync.snapshot();

    fetcher.insert(accounts.bids(), Pubkey::default(), bids_blob(21_550));
    fetcher.remove(&accounts.asks());

    let err = sync.poll().await.unwrap_err();
    assert!(err.is_fetch_failure());
    match err {
        SyncError::PartialBatchFailure { missing, total } => {
            assert_eq!(missing, vec![accounts.asks()]);
            assert_eq!(total, 4);
        }
        other => panic!("unexpected error: {}", other),
    }
    assert!(sync.snapshot().same_as(&before));
}

#[tokio::test]
async fn test_fetch_failure_keeps_snapshot() {
    let accounts = accounts();
    let fetcher = fetcher(&accounts);
    let sync = polling(&fetcher, SyncConfig::default()).await;
    let before = sync.snapshot();

    fetcher.fail_with(Some(FetchError::Transport("connection reset".to_string())));
    let err = sync.poll().await.unwrap_err();
    assert!(matches!(err, SyncError::FetchFailure(FetchError::Transport(_))));
    assert!(sync.snapshot().same_as(&before));

    fetcher.fail_with(None);
    assert_eq!(sync.poll().await.unwrap(), PollOutcome::Fetched);
    assert!(!sync.snapshot().same_as(&before));
}

#[tokio::test]
async fn test_decode_failure_keeps_snapshot() {
    let accounts = accounts();
    let fetcher = fetcher(&accounts);
    let sync = polling(&fetcher, SyncConfig::default()).await;
    let before = sync.snapshot();

    fetcher.insert(accounts.asks(), Pubkey::default(), vec![0; 100]);
    let err = sync.poll().await.unwrap_err();
    assert!(!err.is_fetch_failure());
    assert!(matches!(&err, SyncError::Decode { key, .. } if key == "Asks"));
    assert!(sync.snapshot().same_as(&before));
}

#[tokio::test]
async fn test_timeout() {
    let accounts = accounts();
    let fetcher = fetcher(&accounts);
    let sync = polling(&fetcher, SyncConfig::default().with_fetch_timeout(Duration::from_millis(50))).await;
    let before = sync.snapshot();

    fetcher.set_delay(Some(Duration::from_millis(500)));
    let err = sync.poll().await.unwrap_err();
    assert!(matches!(err, SyncError::Timeout(_)));
    assert!(err.is_fetch_failure());
    assert!(sync.snapshot().same_as(&before));
}

#[tokio::test]
async fn test_min_poll_interval() {
    let accounts = accounts();
    let fetcher = fetcher(&accounts);
    let sync = polling(&fetcher, SyncConfig::default().with_min_poll_interval(Duration::from_secs(3600))).await;

    assert_eq!(sync.poll().await.unwrap(), PollOutcome::Skipped);
    assert_eq!(fetcher.fetch_count(), 1);
}

/// Concurrent polls share one round trip.
#[tokio::test]
async fn test_concurrent_polls_coalesce() {
    let accounts = accounts();
    let fetcher = fetcher(&accounts);
    let sync = Arc::new(polling(&fetcher, SyncConfig::default()).await);
    fetcher.set_delay(Some(Duration::from_millis(100)));

    let (a, b) = tokio::join!(sync.poll(), sync.poll());
    let mut outcomes = vec![a.unwrap(), b.unwrap()];
    outcomes.sort_by_key(|o| *o == PollOutcome::Coalesced);
    assert_eq!(outcomes, vec![PollOutcome::Fetched, PollOutcome::Coalesced]);
    assert_eq!(fetcher.fetch_count(), 2);
}

/// A poll queued behind another reports that poll's outcome, not an older
/// failure.
#[tokio::test]
async fn test_coalesced_poll_reports_latest_fetch() {
    let accounts = accounts();
    let fetcher = fetcher(&accounts);
    let sync = polling(&fetcher, SyncConfig::default()).await;

    fetcher.fail_with(Some(FetchError::Transport("connection reset".to_string())));
    assert!(sync.poll().await.is_err());

    fetcher.fail_with(None);
    fetcher.set_delay(Some(Duration::from_millis(100)));
    let (a, b, c) = tokio::join!(sync.poll(), sync.poll(), sync.poll());
    let mut outcomes = vec![a.unwrap(), b.unwrap(), c.unwrap()];
    outcomes.sort_by_key(|o| *o == PollOutcome::Coalesced);
    assert_eq!(outcomes, vec![PollOutcome::Fetched, PollOutcome::Coalesced, PollOutcome::Coalesced]);
    assert_eq!(fetcher.fetch_count(), 3);
}

/// Pushed updates replace single records, undecodable ones are dropped.
#[tokio::test]
async fn test_subscriptions() {
    let accounts = accounts();
    let fetcher = fetcher(&accounts);
    let records = market_records(&accounts, &OracleDecoder::default());
    let sync = RecordSynchronizer::new_with_subscriptions(fetcher.clone(), records, SyncConfig::default())
        .await
        .unwrap();
    assert_eq!(sync.poll().await.unwrap(), PollOutcome::Skipped);

    within(fetcher.wait_for_subscribers(&accounts.asks(), 1)).await;

    let before = sync.snapshot();
    assert_eq!(fetcher.push(accounts.asks(), Pubkey::default(), vec![1, 2, 3]), 1);
    assert_eq!(fetcher.push(accounts.asks(), Pubkey::default(), asks_blob(21_700)), 1);
    within(async {
        while sync.snapshot().same_as(&before) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;

    let snapshot = sync.snapshot();
    let state = MarketState::from_snapshot(&snapshot, &OracleDecoder::default(), 0).unwrap();
    assert_eq!(state.asks().best().map(|o| o.price_lots()), Some(21_700));
    // Other records are carried over
    assert!(Arc::ptr_eq(
        snapshot.get(&MarketKey::Bids).unwrap(),
        before.get(&MarketKey::Bids).unwrap()
    ));

    drop(sync);
    within(async {
        while fetcher.subscriber_count(&accounts.asks()) > 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
}

#[tokio::test]
async fn test_custom_record_set() {
    let fetcher = MemoryFetcher::new();
    let a = Pubkey::new_from_array([1; 32]);
    let b = Pubkey::new_from_array([2; 32]);
    fetcher.insert(a, Pubkey::default(), vec![1, 2]);
    fetcher.insert(b, Pubkey::default(), vec![3]);

    let records = RecordSet::new()
        .with("a", a, |account| Ok(account.data.len()))
        .with("b", b, |account| Ok(account.data.len()));
    let sync = RecordSynchronizer::new_with_polling(fetcher, records, SyncConfig::default()).await.unwrap();
    assert_eq!(sync.snapshot().value(&"a"), Some(&2));
    assert_eq!(sync.get(&"b").map(|r| *r.value()), Some(1));
}

/// One of three accounts missing leaves the published map untouched.
#[tokio::test]
async fn test_one_of_three_missing() {
    let fetcher = MemoryFetcher::new();
    let keys = [Pubkey::new_from_array([1; 32]), Pubkey::new_from_array([2; 32]), Pubkey::new_from_array([3; 32])];
    for key in keys {
        fetcher.insert(key, Pubkey::default(), key.to_bytes()[..4].to_vec());
    }
    let records = keys
        .iter()
        .enumerate()
        .fold(RecordSet::new(), |set, (i, key)| set.with(i, *key, |account| Ok(account.data.clone())));
    let sync = RecordSynchronizer::new_with_polling(fetcher.clone(), records, SyncConfig::default()).await.unwrap();
    let before = sync.snapshot();

    fetcher.insert(keys[0], Pubkey::default(), vec![9; 4]);
    fetcher.remove(&keys[2]);
    let err = sync.poll().await.unwrap_err();
    assert!(err.is_fetch_failure());
    assert!(matches!(err, SyncError::PartialBatchFailure { total: 3, .. }));

    let after = sync.snapshot();
    assert!(after.same_as(&before));
    assert_eq!(after.value(&0), Some(&vec![1; 4]));
}

#[tokio::test]
async fn test_state_requires_every_record() {
    let fetcher = MemoryFetcher::new();
    let accounts = accounts();
    fetcher.insert(accounts.perp_market(), Pubkey::default(), PerpMarketBuilder::new().build());

    let records = RecordSet::new().with(MarketKey::PerpMarket, accounts.perp_market(), |account| {
        perp_funding_sdk::layout::PerpMarketData::decode(&account.data).map(MarketRecord::PerpMarket)
    });
    let sync = RecordSynchronizer::new_with_polling(fetcher, records, SyncConfig::default()).await.unwrap();
    let err = MarketState::from_snapshot(&sync.snapshot(), &OracleDecoder::default(), 0).unwrap_err();
    assert!(matches!(err, SyncError::NotFetched(key) if key == "Oracle"));
}

async fn subscribed(
    fetcher: &MemoryFetcher,
    config: SyncConfig,
) -> RecordSynchronizer<MarketKey, MarketRecord, MemoryFetcher> {
    let records = market_records(&accounts(), &OracleDecoder::default());
    RecordSynchronizer::new_with_subscriptions(fetcher.clone(), records, config).await.unwrap()
}

/// Waits until every market account has a live subscription.
async fn wait_for_all_subscribed(fetcher: &MemoryFetcher, accounts: &MarketAccounts) {
    for address in [accounts.perp_market(), accounts.bids(), accounts.asks(), accounts.oracle()] {
        within(fetcher.wait_for_subscribers(&address, 1)).await;
    }
}

async fn wait_for_best_ask(sync: &RecordSynchronizer<MarketKey, MarketRecord, MemoryFetcher>, price: i64) {
    within(async {
        while state(sync).asks().best().map(|o| o.price_lots()) != Some(price) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
}

/// A stream that ends is followed by a new subscription after the backoff.
#[tokio::test]
async fn test_resubscribe_after_stream_ends() {
    let accounts = accounts();
    let fetcher = fetcher(&accounts);
    let config = SyncConfig::default().with_resubscribe_backoff(Duration::from_millis(50));
    let sync = subscribed(&fetcher, config).await;

    wait_for_all_subscribed(&fetcher, &accounts).await;
    let subscribes = fetcher.subscribe_count();

    fetcher.close_subscriptions(&accounts.asks());
    assert_eq!(fetcher.subscriber_count(&accounts.asks()), 0);
    within(fetcher.wait_for_subscribers(&accounts.asks(), 1)).await;
    assert_eq!(fetcher.subscribe_count(), subscribes + 1);

    assert_eq!(fetcher.push(accounts.asks(), Pubkey::default(), asks_blob(21_700)), 1);
    wait_for_best_ask(&sync, 21_700).await;
}

/// Streams that end right away are retried at the backoff pace, without
/// starving the runtime.
#[tokio::test]
async fn test_ended_streams_back_off() {
    let accounts = accounts();
    let fetcher = fetcher(&accounts);
    fetcher.end_new_streams(true);
    let config = SyncConfig::default().with_resubscribe_backoff(Duration::from_millis(100));
    let _sync = subscribed(&fetcher, config).await;

    tokio::time::sleep(Duration::from_millis(250)).await;
    // Four records, each subscribing at 0, 100 and 200 ms
    let subscribes = fetcher.subscribe_count();
    assert!((8..=16).contains(&subscribes), "{} subscribe calls", subscribes);

    fetcher.end_new_streams(false);
    within(fetcher.wait_for_subscribers(&accounts.asks(), 1)).await;
}

/// Subscriptions are refreshed on the resubscribe interval even when streams
/// stay open.
#[tokio::test]
async fn test_resubscribe_interval_refresh() {
    let accounts = accounts();
    let fetcher = fetcher(&accounts);
    let config = SyncConfig::default()
        .with_resubscribe_interval(Duration::from_millis(100))
        .with_resubscribe_backoff(Duration::from_secs(3600));
    let sync = subscribed(&fetcher, config).await;

    wait_for_all_subscribed(&fetcher, &accounts).await;
    let subscribes = fetcher.subscribe_count();
    within(async {
        while fetcher.subscribe_count() < subscribes + 4 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;

    // Replaced streams are dropped
    assert_eq!(fetcher.subscriber_count(&accounts.asks()), 1);
    assert_eq!(fetcher.push(accounts.asks(), Pubkey::default(), asks_blob(21_650)), 1);
    wait_for_best_ask(&sync, 21_650).await;
}

/// Drift market is fetched in the same batch and read next to the market.
#[tokio::test]
async fn test_drift_market_record() {
    let accounts = accounts();
    let fetcher = fetcher(&accounts);
    let drift = DriftPerpMarketBuilder::new().with_twaps(21_521_500, 21_500_000);
    fetcher.insert(DRIFT_SOL_PERP_MARKET, Pubkey::default(), drift.build());

    let records = with_drift_market(market_records(&accounts, &OracleDecoder::default()), DRIFT_SOL_PERP_MARKET);
    assert_eq!(records.len(), 5);
    let sync = RecordSynchronizer::new_with_polling(fetcher.clone(), records, SyncConfig::default()).await.unwrap();
    assert_eq!(fetcher.fetch_count(), 1);

    let snapshot = sync.snapshot();
    let market = drift_market(&snapshot).unwrap();
    assert_eq!(market, drift.data());
    let apr = funding_apr(market.funding_rate().unwrap());
    assert!((apr - 36.0).abs() < 1e-9);
    assert!(state(&sync).funding_rate().abs() < 1e-12);

    // Without the record the accessor reports it as not fetched
    let err = drift_market(&polling(&fetcher, SyncConfig::default()).await.snapshot()).unwrap_err();
    assert!(matches!(err, SyncError::NotFetched(key) if key == "DriftPerpMarket"));
}
