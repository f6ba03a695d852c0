use solana_pubkey::Pubkey;

use crate::layout::{DRIFT_SOL_PERP_MARKET, DriftPerpMarketData};

/// Builds Drift perp market account blobs.
///
/// Defaults describe SOL-PERP with both TWAPs at 21.5, so funding is zero
/// until [`DriftPerpMarketBuilder::with_twaps`] moves them apart.
#[derive(Clone, Debug)]
pub struct DriftPerpMarketBuilder {
    data: DriftPerpMarketData,
}

impl Default for DriftPerpMarketBuilder {
    fn default() -> Self {
        Self {
            data: DriftPerpMarketData {
                pubkey: DRIFT_SOL_PERP_MARKET,
                market_index: 0,
                name: "SOL-PERP".to_string(),
                oracle: Pubkey::new_from_array([15; 32]),
                last_oracle_price: 21_500_000,
                last_oracle_price_twap: 21_500_000,
                last_oracle_price_twap_ts: 1_700_000_000,
                last_mark_price_twap: 21_500_000,
                last_mark_price_twap_ts: 1_700_000_000,
                last_funding_rate: 0,
                last_funding_rate_ts: 1_700_000_000,
                funding_period: 3600,
            },
        }
    }
}

impl DriftPerpMarketBuilder {
    pub fn new() -> Self { Self::default() }

    /// Mark and oracle price TWAPs, in units of 10^-6 quote.
    pub fn with_twaps(mut self, mark: u64, oracle: i64) -> Self {
        self.data.last_mark_price_twap = mark;
        self.data.last_oracle_price_twap = oracle;
        self
    }

    pub fn data(&self) -> &DriftPerpMarketData { &self.data }

    pub fn build(&self) -> Vec<u8> { self.data.encode() }
}
