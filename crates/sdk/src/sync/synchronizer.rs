use std::{
    collections::HashMap,
    fmt::Debug,
    hash::Hash,
    pin::pin,
    sync::{
        Arc, PoisonError, RwLock,
        atomic::{AtomicU64, Ordering},
    },
    time::{Duration, Instant},
};

use futures::StreamExt;
use solana_pubkey::Pubkey;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{AccountFetcher, RawAccount, SyncConfig};
use crate::error::{DecodeError, FetchError, SyncError};

/// Decodes the raw account of one record.
pub type Decoder<V> = Arc<dyn Fn(&RawAccount) -> Result<V, DecodeError> + Send + Sync>;

struct Entry<K, V> {
    key: K,
    address: Pubkey,
    decoder: Decoder<V>,
}

/// Records to keep in sync, keyed by `K`, each decoded into a `V`.
pub struct RecordSet<K, V> {
    entries: Vec<Entry<K, V>>,
}

impl<K, V> Default for RecordSet<K, V> {
    fn default() -> Self { Self { entries: Vec::new() } }
}

impl<K: PartialEq, V> RecordSet<K, V> {
    pub fn new() -> Self { Self::default() }

    /// Adds or replaces the record under `key`.
    pub fn with<D>(mut self, key: K, address: Pubkey, decoder: D) -> Self
    where
        D: Fn(&RawAccount) -> Result<V, DecodeError> + Send + Sync + 'static,
    {
        self.entries.retain(|e| e.key != key);
        self.entries.push(Entry { key, address, decoder: Arc::new(decoder) });
        self
    }

    pub fn len(&self) -> usize { self.entries.len() }

    pub fn is_empty(&self) -> bool { self.entries.is_empty() }
}

/// Decoded value together with the raw account it was decoded from.
#[derive(Clone, Debug)]
pub struct Record<V> {
    value: V,
    account: RawAccount,
}

impl<V> Record<V> {
    pub fn value(&self) -> &V { &self.value }

    pub fn account(&self) -> &RawAccount { &self.account }

    pub fn address(&self) -> Pubkey { self.account.address }

    pub fn data(&self) -> &[u8] { &self.account.data }

    pub fn fetched_at(&self) -> chrono::DateTime<chrono::Utc> { self.account.fetched_at }
}

/// Immutable view of all decoded records at one point in time.
///
/// Records fetched by one poll are always from the same batch; a snapshot is
/// never observed half-updated.
pub struct Snapshot<K, V> {
    records: Arc<HashMap<K, Arc<Record<V>>>>,
}

impl<K, V> Clone for Snapshot<K, V> {
    fn clone(&self) -> Self { Self { records: self.records.clone() } }
}

impl<K: Debug, V> Debug for Snapshot<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.records.keys()).finish()
    }
}

impl<K: Eq + Hash, V> Snapshot<K, V> {
    fn empty() -> Self { Self { records: Arc::new(HashMap::new()) } }

    pub fn get(&self, key: &K) -> Option<&Arc<Record<V>>> { self.records.get(key) }

    pub fn value(&self, key: &K) -> Option<&V> { self.records.get(key).map(|r| r.value()) }

    pub fn len(&self) -> usize { self.records.len() }

    pub fn is_empty(&self) -> bool { self.records.is_empty() }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &Arc<Record<V>>)> { self.records.iter() }

    /// Whether both snapshots are the very same publication.
    pub fn same_as(&self, other: &Self) -> bool { Arc::ptr_eq(&self.records, &other.records) }
}

/// Result of a successful [`RecordSynchronizer::poll`] call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PollOutcome {
    /// All records were fetched and replaced.
    Fetched,
    /// Minimum poll interval has not elapsed yet, or the synchronizer is
    /// driven by subscriptions.
    Skipped,
    /// Another poll completed while this one was waiting for it.
    Coalesced,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Mode {
    Polling,
    Subscriptions,
}

#[derive(Default)]
struct PollState {
    last_success: Option<Instant>,
    last_error: Option<SyncError>,
}

struct Shared<K, V, F> {
    fetcher: F,
    config: SyncConfig,
    entries: Vec<Entry<K, V>>,
    snapshot: RwLock<Snapshot<K, V>>,
    poll: Mutex<PollState>,
    /// Completed fetches, bumped while `poll` is held.
    generation: AtomicU64,
    cancel: CancellationToken,
}

/// Keeps a set of decoded accounts fresh, either by polling or by following
/// account subscriptions.
///
/// Readers get consistent [`Snapshot`]s; every update publishes a new map
/// instead of mutating the current one.
pub struct RecordSynchronizer<K, V, F> {
    shared: Arc<Shared<K, V, F>>,
    mode: Mode,
}

impl<K, V, F> RecordSynchronizer<K, V, F>
where
    K: Clone + Eq + Hash + Debug + Send + Sync + 'static,
    V: Send + Sync + 'static,
    F: AccountFetcher,
{
    /// Fetches every record once, then refreshes them on [`poll`] calls.
    ///
    /// [`poll`]: RecordSynchronizer::poll
    pub async fn new_with_polling(
        fetcher: F,
        records: RecordSet<K, V>,
        config: SyncConfig,
    ) -> Result<Self, SyncError> {
        let this = Self::new(fetcher, records, config, Mode::Polling);
        this.fetch_locked(&mut *this.shared.poll.lock().await).await?;
        Ok(this)
    }

    /// Fetches every record once, then follows a subscription per record in
    /// background tasks until the synchronizer is dropped.
    ///
    /// Subscriptions are re-established every
    /// [`SyncConfig::resubscribe_interval`] and whenever a stream ends.
    /// Must be called within a tokio runtime.
    pub async fn new_with_subscriptions(
        fetcher: F,
        records: RecordSet<K, V>,
        config: SyncConfig,
    ) -> Result<Self, SyncError> {
        let this = Self::new(fetcher, records, config, Mode::Subscriptions);
        this.fetch_locked(&mut *this.shared.poll.lock().await).await?;
        for index in 0..this.shared.entries.len() {
            tokio::spawn(follow(this.shared.clone(), index));
        }
        Ok(this)
    }

    fn new(fetcher: F, records: RecordSet<K, V>, config: SyncConfig, mode: Mode) -> Self {
        Self {
            shared: Arc::new(Shared {
                fetcher,
                config,
                entries: records.entries,
                snapshot: RwLock::new(Snapshot::empty()),
                poll: Mutex::new(PollState::default()),
                generation: AtomicU64::new(0),
                cancel: CancellationToken::new(),
            }),
            mode,
        }
    }

    /// Refetches all records if the minimum poll interval has elapsed since
    /// the last successful fetch.
    ///
    /// Concurrent calls are serialized; a call that had to wait for another
    /// poll returns that poll's outcome instead of fetching again. On any
    /// failure, including a missing account or a record that fails to
    /// decode, nothing is published and the previous snapshot stays current.
    pub async fn poll(&self) -> Result<PollOutcome, SyncError> {
        if self.mode != Mode::Polling {
            return Ok(PollOutcome::Skipped);
        }

        let observed = self.shared.generation.load(Ordering::Acquire);
        let mut state = self.shared.poll.lock().await;
        // A fetch completed while waiting: its outcome is the current one
        if self.shared.generation.load(Ordering::Acquire) != observed {
            return match &state.last_error {
                Some(err) => Err(err.clone()),
                None => Ok(PollOutcome::Coalesced),
            };
        }
        if let Some(at) = state.last_success
            && at.elapsed() < self.shared.config.min_poll_interval
        {
            return Ok(PollOutcome::Skipped);
        }

        self.fetch_locked(&mut state).await?;
        Ok(PollOutcome::Fetched)
    }

    /// Currently published records.
    pub fn snapshot(&self) -> Snapshot<K, V> { self.shared.snapshot() }

    pub fn get(&self, key: &K) -> Option<Arc<Record<V>>> { self.snapshot().get(key).cloned() }

    pub fn config(&self) -> &SyncConfig { &self.shared.config }

    pub fn fetcher(&self) -> &F { &self.shared.fetcher }

    async fn fetch_locked(&self, state: &mut PollState) -> Result<(), SyncError> {
        let result = self.shared.fetch_all().await;
        self.shared.generation.fetch_add(1, Ordering::AcqRel);
        match &result {
            Ok(()) => {
                state.last_success = Some(Instant::now());
                state.last_error = None;
            }
            Err(err) => state.last_error = Some(err.clone()),
        }
        result
    }
}

impl<K, V, F> Drop for RecordSynchronizer<K, V, F> {
    fn drop(&mut self) { self.shared.cancel.cancel(); }
}

impl<K, V, F> Shared<K, V, F>
where
    K: Clone + Eq + Hash + Debug,
    F: AccountFetcher,
{
    fn snapshot(&self) -> Snapshot<K, V> {
        self.snapshot.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn publish(&self, update: impl FnOnce(&mut HashMap<K, Arc<Record<V>>>)) {
        let mut snapshot = self.snapshot.write().unwrap_or_else(PoisonError::into_inner);
        let mut records = HashMap::clone(&snapshot.records);
        update(&mut records);
        *snapshot = Snapshot { records: Arc::new(records) };
    }

    async fn fetch_all(&self) -> Result<(), SyncError> {
        let started = Instant::now();
        let addresses = self.entries.iter().map(|e| e.address).collect::<Vec<_>>();
        let timeout = self.config.fetch_timeout;

        let accounts = tokio::time::timeout(timeout, self.fetcher.fetch_raw(&addresses))
            .await
            .map_err(|_| SyncError::Timeout(timeout))??;

        if accounts.len() != addresses.len() {
            return Err(FetchError::InvalidResponse(format!(
                "expected {} accounts, got {}",
                addresses.len(),
                accounts.len()
            ))
            .into());
        }
        let missing = addresses
            .iter()
            .zip(&accounts)
            .filter(|(_, account)| account.is_none())
            .map(|(address, _)| *address)
            .collect::<Vec<_>>();
        if !missing.is_empty() {
            return Err(SyncError::PartialBatchFailure { missing, total: addresses.len() });
        }

        let mut decoded = Vec::with_capacity(accounts.len());
        for (entry, account) in self.entries.iter().zip(accounts.into_iter().flatten()) {
            let value = (entry.decoder)(&account)
                .map_err(|source| SyncError::Decode { key: format!("{:?}", entry.key), source })?;
            decoded.push((entry.key.clone(), Arc::new(Record { value, account })));
        }

        self.publish(|records| records.extend(decoded));
        debug!(records = self.entries.len(), elapsed = ?started.elapsed(), "fetched records");
        Ok(())
    }

    fn apply_update(&self, entry: &Entry<K, V>, account: RawAccount) {
        match (entry.decoder)(&account) {
            Ok(value) => {
                self.publish(|records| {
                    records.insert(entry.key.clone(), Arc::new(Record { value, account }));
                });
                debug!(key = ?entry.key, "applied account update");
            }
            Err(err) => {
                warn!(key = ?entry.key, address = %entry.address, error = %err, "failed to decode account update");
            }
        }
    }
}

async fn follow<K, V, F>(shared: Arc<Shared<K, V, F>>, index: usize)
where
    K: Clone + Eq + Hash + Debug,
    F: AccountFetcher,
{
    let entry = &shared.entries[index];
    loop {
        let updates = tokio::select! {
            _ = shared.cancel.cancelled() => return,
            updates = shared.fetcher.subscribe(entry.address) => updates,
        };
        let mut updates = match updates {
            Ok(updates) => updates,
            Err(err) => {
                warn!(key = ?entry.key, address = %entry.address, error = %err, "failed to subscribe");
                if !backoff(&shared.cancel, shared.config.resubscribe_backoff).await {
                    return;
                }
                continue;
            }
        };
        info!(key = ?entry.key, address = %entry.address, "subscribed to account");

        let mut resubscribe = pin!(tokio::time::sleep(shared.config.resubscribe_interval));
        loop {
            tokio::select! {
                _ = shared.cancel.cancelled() => return,
                _ = &mut resubscribe => {
                    info!(key = ?entry.key, "refreshing subscription");
                    break;
                }
                update = updates.next() => match update {
                    Some(account) => shared.apply_update(entry, account),
                    None => {
                        warn!(key = ?entry.key, "subscription ended, resubscribing");
                        if !backoff(&shared.cancel, shared.config.resubscribe_backoff).await {
                            return;
                        }
                        break;
                    }
                },
            }
        }
    }
}

/// Sleeps for `delay`, `false` if cancelled meanwhile.
async fn backoff(cancel: &CancellationToken, delay: Duration) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}
