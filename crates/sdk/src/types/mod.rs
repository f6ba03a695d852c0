mod order;

pub use order::{OrderType, Side};
pub use solana_pubkey::Pubkey;

/// Unix timestamp in seconds, as stored in order tree leaves.
pub type Timestamp = u64;

/// Order size or price expressed in market lots.
pub type Lots = i64;
