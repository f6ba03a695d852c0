use solana_pubkey::Pubkey;

use crate::{layout::PerpMarketData, num::I80F48, types::Lots};

/// Builds perp market account blobs.
///
/// Defaults describe a SOL-PERP like market: 9 base decimals, quote lot of
/// 10 and base lot of 10 000 000 native units (one price lot is 0.001 USD,
/// one base lot is 0.01 SOL), funding clamped to ±5% and an impact quantity
/// of 100 lots.
#[derive(Clone, Debug)]
pub struct PerpMarketBuilder {
    data: PerpMarketData,
}

impl Default for PerpMarketBuilder {
    fn default() -> Self {
        Self {
            data: PerpMarketData {
                group: Pubkey::new_from_array([10; 32]),
                perp_market_index: 2,
                base_decimals: 9,
                name: "SOL-PERP".to_string(),
                bids: Pubkey::new_from_array([11; 32]),
                asks: Pubkey::new_from_array([12; 32]),
                event_queue: Pubkey::new_from_array([13; 32]),
                oracle: Pubkey::new_from_array([14; 32]),
                stable_price: 0.0,
                quote_lot_size: 10,
                base_lot_size: 10_000_000,
                open_interest: 0,
                seq_num: 0,
                min_funding: I80F48::from_f64(-0.05),
                max_funding: I80F48::from_f64(0.05),
                impact_quantity: 100,
                long_funding: I80F48::ZERO,
                short_funding: I80F48::ZERO,
                funding_last_updated: 0,
                maker_fee: I80F48::ZERO,
                taker_fee: I80F48::ZERO,
                reduce_only: false,
            },
        }
    }
}

impl PerpMarketBuilder {
    pub fn new() -> Self { Self::default() }

    pub fn with_name(mut self, name: &str) -> Self {
        self.data.name = name.to_string();
        self
    }

    pub fn with_decimals(mut self, base_decimals: u8) -> Self {
        self.data.base_decimals = base_decimals;
        self
    }

    pub fn with_lot_sizes(mut self, base_lot_size: i64, quote_lot_size: i64) -> Self {
        self.data.base_lot_size = base_lot_size;
        self.data.quote_lot_size = quote_lot_size;
        self
    }

    pub fn with_funding_bounds(mut self, min_funding: I80F48, max_funding: I80F48) -> Self {
        self.data.min_funding = min_funding;
        self.data.max_funding = max_funding;
        self
    }

    pub fn with_impact_quantity(mut self, impact_quantity: Lots) -> Self {
        self.data.impact_quantity = impact_quantity;
        self
    }

    /// Addresses of the book sides and oracle the market points to.
    pub fn with_accounts(mut self, bids: Pubkey, asks: Pubkey, oracle: Pubkey) -> Self {
        self.data.bids = bids;
        self.data.asks = asks;
        self.data.oracle = oracle;
        self
    }

    pub fn data(&self) -> &PerpMarketData { &self.data }

    pub fn build(&self) -> Vec<u8> { self.data.encode() }
}
