use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use chrono::Utc;
use futures::{
    StreamExt,
    channel::mpsc::{self, UnboundedSender},
    stream::BoxStream,
};
use solana_pubkey::Pubkey;

use crate::{
    error::FetchError,
    sync::{AccountFetcher, RawAccount},
};

#[derive(Default)]
struct State {
    accounts: HashMap<Pubkey, RawAccount>,
    failure: Option<FetchError>,
    delay: Option<Duration>,
    fetch_count: usize,
    subscribe_count: usize,
    end_new_streams: bool,
    subscribers: HashMap<Pubkey, Vec<UnboundedSender<RawAccount>>>,
}

/// In-memory [`AccountFetcher`].
///
/// Clones share state, so a test keeps one handle to mutate accounts while
/// the synchronizer owns another.
#[derive(Clone, Default)]
pub struct MemoryFetcher {
    state: Arc<Mutex<State>>,
}

impl MemoryFetcher {
    pub fn new() -> Self { Self::default() }

    /// Stores an account, visible to the next fetch but not pushed to
    /// subscribers.
    pub fn insert(&self, address: Pubkey, owner: Pubkey, data: Vec<u8>) {
        self.state().accounts.insert(address, RawAccount::new(address, owner, data));
    }

    pub fn remove(&self, address: &Pubkey) { self.state().accounts.remove(address); }

    /// Makes every following fetch fail with `failure`, or succeed again with
    /// `None`.
    pub fn fail_with(&self, failure: Option<FetchError>) { self.state().failure = failure; }

    /// Delays every following fetch.
    pub fn set_delay(&self, delay: Option<Duration>) { self.state().delay = delay; }

    /// Number of `fetch_raw` calls so far.
    pub fn fetch_count(&self) -> usize { self.state().fetch_count }

    /// Number of `subscribe` calls so far.
    pub fn subscribe_count(&self) -> usize { self.state().subscribe_count }

    /// Makes every following subscription stream end right away, as a remote
    /// accepting and then dropping the socket would.
    pub fn end_new_streams(&self, end: bool) { self.state().end_new_streams = end; }

    /// Number of live subscriptions to `address`.
    pub fn subscriber_count(&self, address: &Pubkey) -> usize {
        let mut state = self.state();
        let subscribers = state.subscribers.entry(*address).or_default();
        subscribers.retain(|tx| !tx.is_closed());
        subscribers.len()
    }

    /// Waits until `address` has at least `count` live subscriptions.
    pub async fn wait_for_subscribers(&self, address: &Pubkey, count: usize) {
        while self.subscriber_count(address) < count {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    /// Stores an account and pushes it to every subscriber of `address`,
    /// returning how many received it.
    pub fn push(&self, address: Pubkey, owner: Pubkey, data: Vec<u8>) -> usize {
        let account = RawAccount::new(address, owner, data);
        let mut state = self.state();
        state.accounts.insert(address, account.clone());
        let subscribers = state.subscribers.entry(address).or_default();
        subscribers.retain(|tx| tx.unbounded_send(account.clone()).is_ok());
        subscribers.len()
    }

    /// Ends every subscription stream of `address`.
    pub fn close_subscriptions(&self, address: &Pubkey) { self.state().subscribers.remove(address); }

    fn state(&self) -> MutexGuard<'_, State> { self.state.lock().unwrap_or_else(PoisonError::into_inner) }
}

impl AccountFetcher for MemoryFetcher {
    async fn fetch_raw(&self, addresses: &[Pubkey]) -> Result<Vec<Option<RawAccount>>, FetchError> {
        let (delay, failure) = {
            let mut state = self.state();
            state.fetch_count += 1;
            (state.delay, state.failure.clone())
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(failure) = failure {
            return Err(failure);
        }

        let state = self.state();
        let now = Utc::now();
        Ok(addresses
            .iter()
            .map(|address| {
                state.accounts.get(address).map(|account| RawAccount { fetched_at: now, ..account.clone() })
            })
            .collect())
    }

    async fn subscribe(&self, address: Pubkey) -> Result<BoxStream<'static, RawAccount>, FetchError> {
        let (tx, rx) = mpsc::unbounded();
        let mut state = self.state();
        state.subscribe_count += 1;
        if !state.end_new_streams {
            state.subscribers.entry(address).or_default().push(tx);
        }
        Ok(rx.boxed())
    }
}
