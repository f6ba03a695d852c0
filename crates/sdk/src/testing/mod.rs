//! Local testing environment: account blob builders and an in-memory
//! [`AccountFetcher`](crate::sync::AccountFetcher).
//!
//! Builders write the same byte layouts the decoders read, so tests exercise
//! decoding end to end.

mod book;
mod drift;
mod fetcher;
mod market;
mod oracle;

pub use book::BookSideBuilder;
pub use drift::DriftPerpMarketBuilder;
pub use fetcher::MemoryFetcher;
pub use market::PerpMarketBuilder;
pub use oracle::{pyth_oracle, stub_oracle, switchboard_oracle};
