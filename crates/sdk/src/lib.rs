//! Perpetual market funding SDK.
//!
//! # Overview
//!
//! Decodes on-chain perp market, order book and oracle accounts, rebuilds the
//! order book from its binary tree encoding and derives impact prices and the
//! instantaneous funding rate from it.
//!
//! Use [`sync::market_records`] with a [`sync::RecordSynchronizer`] to keep
//! the accounts of one market fresh, then [`sync::MarketState`] to assemble
//! them into a [`state::PerpMarket`] and its two [`state::BookSide`]s.
//!
//! A Drift perp market can be fetched in the same batch with
//! [`sync::with_drift_market`]; its funding rate comes from the mark and
//! oracle TWAPs stored in the account.
//!
//! Network access is left to an [`sync::AccountFetcher`] implementation; the
//! CLI crate provides one over Solana JSON-RPC.
//!
//! See `./tests` for examples.
//!
//! # Limitations/follow-ups
//!
//! * Only the perp market fields needed for pricing and funding are decoded.
//!
//! * Funding records are handed to a [`funding::FundingSink`]; persistent
//!   storage is up to the caller.
//!
//! # Features
//!
//! | Feature | Default | Description |
//! | --- | --- | --- |
//! | `display` | yes | Enables [`tabled::Tabled`] for orders and [`state::BookView`]. |
//! | `testing` | yes | Enables [`testing`] module. |
//!
//! # Testing
//!
//! [`testing`] module provides account blob builders and an in-memory
//! fetcher, so the whole decode and sync path runs without a network.

pub mod error;
pub mod funding;
pub mod layout;
pub mod num;
pub mod oracle;
pub mod state;
pub mod sync;
#[cfg(feature = "testing")]
pub mod testing;
pub mod types;

use solana_pubkey::Pubkey;

#[derive(Clone, Debug, PartialEq, Eq)]
/// Accounts of one perp market.
pub struct MarketAccounts {
    perp_market: Pubkey,
    bids: Pubkey,
    asks: Pubkey,
    oracle: Pubkey,
}

impl MarketAccounts {
    /// SOL-PERP on mainnet.
    pub fn sol_perp() -> Self {
        Self {
            // ESdnpnNLgTkBCZRuTJkZLi5wKEZ2z47SG3PJrhundSQ2
            perp_market: Pubkey::new_from_array([
                199, 185, 12, 134, 169, 51, 26, 54, 134, 46, 100, 222, 181, 6, 236, 105, 218, 45, 109, 153, 60,
                255, 81, 61, 207, 237, 202, 226, 51, 90, 197, 43,
            ]),
            // 4M8szuGnXvsnDuoJ2cN1bsE7Civ8d4DH7CSe8dRJXtnW
            bids: Pubkey::new_from_array([
                49, 187, 150, 10, 31, 164, 201, 145, 247, 101, 75, 190, 194, 57, 97, 57, 153, 155, 103, 142, 199,
                22, 248, 92, 86, 133, 188, 64, 197, 80, 243, 187,
            ]),
            // GD2WH95D6Ebe6T9qGsn8Q4fPBfCDQqReksksR9KELd73
            asks: Pubkey::new_from_array([
                225, 243, 249, 159, 31, 130, 102, 231, 189, 167, 102, 216, 188, 90, 145, 102, 162, 99, 35, 171,
                166, 3, 60, 157, 149, 155, 117, 164, 161, 155, 168, 118,
            ]),
            // H6ARHf6YXhGYeQfUzQNGk6rDNnLBQKrenN712K4AQJEG
            oracle: Pubkey::new_from_array([
                239, 13, 139, 111, 218, 44, 235, 164, 29, 161, 93, 64, 149, 209, 218, 57, 42, 13, 47, 142, 208,
                198, 199, 188, 15, 76, 250, 200, 194, 128, 181, 109,
            ]),
        }
    }

    pub fn custom(perp_market: Pubkey, bids: Pubkey, asks: Pubkey, oracle: Pubkey) -> Self {
        Self { perp_market, bids, asks, oracle }
    }

    pub fn perp_market(&self) -> Pubkey { self.perp_market }

    pub fn bids(&self) -> Pubkey { self.bids }

    pub fn asks(&self) -> Pubkey { self.asks }

    pub fn oracle(&self) -> Pubkey { self.oracle }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sol_perp_addresses() {
        let accounts = MarketAccounts::sol_perp();
        assert_eq!(accounts.perp_market().to_string(), "ESdnpnNLgTkBCZRuTJkZLi5wKEZ2z47SG3PJrhundSQ2");
        assert_eq!(accounts.oracle().to_string(), "H6ARHf6YXhGYeQfUzQNGk6rDNnLBQKrenN712K4AQJEG");
    }
}
