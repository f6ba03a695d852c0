use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use solana_pubkey::Pubkey;

use crate::error::FetchError;

/// Account blob as returned by the network.
#[derive(Clone, derive_more::Debug, PartialEq, Eq)]
pub struct RawAccount {
    pub address: Pubkey,
    /// Program owning the account.
    pub owner: Pubkey,
    #[debug("{} bytes", data.len())]
    pub data: Vec<u8>,
    pub fetched_at: DateTime<Utc>,
}

impl RawAccount {
    pub fn new(address: Pubkey, owner: Pubkey, data: Vec<u8>) -> Self {
        Self { address, owner, data, fetched_at: Utc::now() }
    }
}

/// Network access to raw accounts.
///
/// Implemented over Solana JSON-RPC by the CLI and in memory by
/// [`crate::testing::MemoryFetcher`].
pub trait AccountFetcher: Send + Sync + 'static {
    /// Fetches all `addresses` in one round trip. The result holds one entry
    /// per address, in order, `None` for accounts that do not exist.
    fn fetch_raw(
        &self,
        addresses: &[Pubkey],
    ) -> impl Future<Output = Result<Vec<Option<RawAccount>>, FetchError>> + Send;

    /// Subscribes to changes of `address`. The stream ends when the
    /// subscription is dropped by the remote side.
    fn subscribe(
        &self,
        address: Pubkey,
    ) -> impl Future<Output = Result<BoxStream<'static, RawAccount>, FetchError>> + Send;
}
