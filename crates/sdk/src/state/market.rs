use fastnum::D128;
use solana_pubkey::Pubkey;

use super::{BookSide, InvalidPegPolicy};
use crate::{
    error::DecodeError,
    layout::{BookSideData, PerpMarketData},
    num::I80F48,
    oracle::{OracleDecoder, OraclePrice},
    types::{Lots, Side, Timestamp},
};

/// Conversion factors between lots and UI units, plus the oracle price in
/// lots that oracle pegged orders are resolved against.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PriceContext {
    oracle_price_lots: Lots,
    price_lots_to_ui: f64,
    base_lots_to_ui: f64,
}

impl PriceContext {
    pub fn new(oracle_price_lots: Lots, price_lots_to_ui: f64, base_lots_to_ui: f64) -> Self {
        Self { oracle_price_lots, price_lots_to_ui, base_lots_to_ui }
    }

    pub fn oracle_price_lots(&self) -> Lots { self.oracle_price_lots }

    pub fn price_lots_to_ui(&self, price: Lots) -> f64 { price as f64 * self.price_lots_to_ui }

    pub fn base_lots_to_ui(&self, quantity: Lots) -> f64 { quantity as f64 * self.base_lots_to_ui }
}

/// Perp market parameters combined with the current oracle price.
///
/// Conversion factors are derived once, in decimal arithmetic, when the
/// market is built; conversions themselves are plain `f64` multiplications.
/// The funding rate is a ratio and carries no more precision than that.
#[derive(Clone, derive_more::Debug)]
pub struct PerpMarket {
    address: Pubkey,
    data: PerpMarketData,
    oracle: OraclePrice,
    quote_decimals: u8,
    price_lots_to_ui: f64,
    base_lots_to_ui: f64,
}

impl PerpMarket {
    pub fn new(address: Pubkey, data: PerpMarketData, oracle: OraclePrice, quote_decimals: u8) -> Self {
        let quote_lot_size = D128::from(data.quote_lot_size);
        let base_lot_size = D128::from(data.base_lot_size);
        let base_decimals = data.base_decimals as i32;

        // 10^(base - quote) * quote_lot / base_lot
        let price_lots_to_ui = (D128::TEN.powi(base_decimals - quote_decimals as i32) * quote_lot_size
            / base_lot_size)
            .to_f64();
        // base_lot / 10^base
        let base_lots_to_ui = (base_lot_size / D128::TEN.powi(base_decimals)).to_f64();

        Self { address, data, oracle, quote_decimals, price_lots_to_ui, base_lots_to_ui }
    }

    /// Decodes the market account and its oracle account in one go.
    pub fn decode(
        address: Pubkey,
        market_data: &[u8],
        oracle_data: &[u8],
        oracle_owner: &Pubkey,
        oracle_decoder: &OracleDecoder,
    ) -> Result<Self, DecodeError> {
        let data = PerpMarketData::decode(market_data)?;
        let oracle = oracle_decoder.decode(oracle_data, oracle_owner, data.base_decimals)?;
        Ok(Self::new(address, data, oracle, oracle_decoder.config().quote_decimals))
    }

    /// Same market repriced against a newer oracle reading.
    pub fn with_oracle(&self, oracle: OraclePrice) -> Self { Self { oracle, ..self.clone() } }

    pub fn address(&self) -> Pubkey { self.address }

    /// Raw decoded market account.
    pub fn data(&self) -> &PerpMarketData { &self.data }

    pub fn name(&self) -> &str { &self.data.name }

    pub fn base_decimals(&self) -> u8 { self.data.base_decimals }

    pub fn quote_decimals(&self) -> u8 { self.quote_decimals }

    pub fn base_lot_size(&self) -> i64 { self.data.base_lot_size }

    pub fn quote_lot_size(&self) -> i64 { self.data.quote_lot_size }

    pub fn min_funding(&self) -> I80F48 { self.data.min_funding }

    pub fn max_funding(&self) -> I80F48 { self.data.max_funding }

    /// Base lots sampled on each side of the book for impact prices.
    pub fn impact_quantity(&self) -> Lots { self.data.impact_quantity }

    pub fn bids(&self) -> Pubkey { self.data.bids }

    pub fn asks(&self) -> Pubkey { self.data.asks }

    pub fn oracle(&self) -> Pubkey { self.data.oracle }

    pub fn oracle_price(&self) -> &OraclePrice { &self.oracle }

    /// Oracle price in native units, see [`OraclePrice::price`].
    pub fn price(&self) -> I80F48 { self.oracle.price }

    /// Oracle (index) price in UI units.
    pub fn ui_price(&self) -> f64 { self.oracle.ui_price }

    pub fn price_lots_to_ui(&self, price: Lots) -> f64 { price as f64 * self.price_lots_to_ui }

    pub fn base_lots_to_ui(&self, quantity: Lots) -> f64 { quantity as f64 * self.base_lots_to_ui }

    /// Converts a UI price to lots, truncating toward zero.
    pub fn ui_price_to_lots(&self, price: f64) -> Lots {
        let native = (price * 10f64.powi(self.quote_decimals as i32)).round() as i128;
        let denominator = 10i128
            .checked_pow(self.data.base_decimals as u32)
            .and_then(|pow| pow.checked_mul(self.data.quote_lot_size as i128))
            .filter(|d| *d != 0);
        let Some(denominator) = denominator else {
            return 0;
        };
        let lots = match native.checked_mul(self.data.base_lot_size as i128) {
            Some(numerator) => numerator / denominator,
            None => (native as f64 * self.data.base_lot_size as f64 / denominator as f64) as i128,
        };
        lots.clamp(Lots::MIN as i128, Lots::MAX as i128) as Lots
    }

    /// Oracle price in lots.
    pub fn oracle_price_lots(&self) -> Lots { self.ui_price_to_lots(self.oracle.ui_price) }

    pub fn price_context(&self) -> PriceContext {
        PriceContext::new(self.oracle_price_lots(), self.price_lots_to_ui, self.base_lots_to_ui)
    }

    /// Wraps a decoded book side of this market. `now` is the wall clock in
    /// unix seconds.
    pub fn book_side(&self, side: Side, data: BookSideData, now: Timestamp) -> BookSide {
        BookSide::new(side, data, self.price_context(), now)
    }

    pub fn decode_book_side(&self, side: Side, data: &[u8], now: Timestamp) -> Result<BookSide, DecodeError> {
        Ok(self.book_side(side, BookSideData::decode(data)?, now))
    }

    /// Instantaneous funding rate, per day, from impact prices of both sides
    /// of the book. Invalid oracle pegged orders are skipped.
    pub fn instantaneous_funding_rate(&self, bids: &BookSide, asks: &BookSide) -> f64 {
        self.instantaneous_funding_rate_with(bids, asks, InvalidPegPolicy::Exclude)
    }

    /// Same as [`PerpMarket::instantaneous_funding_rate`] with an explicit
    /// policy for invalid oracle pegged orders.
    ///
    /// With liquidity on one side only the rate saturates at the bound of
    /// that side; with no liquidity at all it is zero.
    pub fn instantaneous_funding_rate_with(
        &self,
        bids: &BookSide,
        asks: &BookSide,
        policy: InvalidPegPolicy,
    ) -> f64 {
        let min_funding = self.data.min_funding.to_f64();
        let max_funding = self.data.max_funding.to_f64();

        let bid = bids.impact_price_ui(self.data.impact_quantity, policy);
        let ask = asks.impact_price_ui(self.data.impact_quantity, policy);

        match (bid, ask) {
            (Some(bid), Some(ask)) => {
                let book_price = (bid + ask) / 2.0;
                let index_price = self.oracle.ui_price;
                ((book_price - index_price) / index_price).max(min_funding).min(max_funding)
            }
            (Some(_), None) => max_funding,
            (None, Some(_)) => min_funding,
            (None, None) => 0.0,
        }
    }
}

impl std::fmt::Display for PerpMarket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if f.alternate() {
            write!(f, "{} @ {} ({})", self.data.name, self.oracle.ui_price, self.oracle.source())
        } else {
            writeln!(f, "Market: {} ({})", self.data.name, self.address)?;
            writeln!(
                f,
                "Oracle: {} ({}, {} lots)",
                self.oracle.ui_price,
                self.oracle.source(),
                self.oracle_price_lots()
            )?;
            writeln!(
                f,
                "Lots: base {} ({} decimals), quote {} ({} decimals)",
                self.data.base_lot_size, self.data.base_decimals, self.data.quote_lot_size, self.quote_decimals
            )?;
            writeln!(
                f,
                "Funding bounds: [{}, {}] :: Impact quantity: {} lots ({})",
                self.data.min_funding,
                self.data.max_funding,
                self.data.impact_quantity,
                self.base_lots_to_ui(self.data.impact_quantity)
            )?;
            writeln!(f, "Open interest: {} lots", self.data.open_interest)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::OracleReading;

    fn sol_perp_data() -> PerpMarketData {
        PerpMarketData {
            group: Pubkey::default(),
            perp_market_index: 2,
            base_decimals: 9,
            name: "SOL-PERP".to_string(),
            bids: Pubkey::new_from_array([1; 32]),
            asks: Pubkey::new_from_array([2; 32]),
            event_queue: Pubkey::default(),
            oracle: Pubkey::new_from_array([3; 32]),
            stable_price: 0.0,
            quote_lot_size: 10,
            base_lot_size: 10_000_000,
            open_interest: 0,
            seq_num: 0,
            min_funding: "-0.05".parse().unwrap(),
            max_funding: "0.05".parse().unwrap(),
            impact_quantity: 100,
            long_funding: I80F48::ZERO,
            short_funding: I80F48::ZERO,
            funding_last_updated: 0,
            maker_fee: I80F48::ZERO,
            taker_fee: I80F48::ZERO,
            reduce_only: false,
        }
    }

    fn market(ui_price: f64) -> PerpMarket {
        let price = I80F48::from_f64(ui_price / 1000.0);
        let oracle = OraclePrice {
            price,
            ui_price,
            reading: OracleReading::Stub { price, last_updated: 0 },
        };
        PerpMarket::new(Pubkey::default(), sol_perp_data(), oracle, 6)
    }

    #[test]
    fn test_conversion_factors() {
        let market = market(21.5);
        assert!((market.price_lots_to_ui(1) - 0.001).abs() < 1e-15);
        assert!((market.base_lots_to_ui(1) - 0.01).abs() < 1e-15);
        assert!((market.price_lots_to_ui(21_500) - 21.5).abs() < 1e-9);
        assert!((market.base_lots_to_ui(250) - 2.5).abs() < 1e-12);
    }

    #[test]
    fn test_ui_price_to_lots() {
        let market = market(21.5);
        assert_eq!(market.ui_price_to_lots(21.5), 21_500);
        assert_eq!(market.oracle_price_lots(), 21_500);
        // Sub-lot remainder is truncated
        assert_eq!(market.ui_price_to_lots(21.5009), 21_500);
        assert_eq!(market.ui_price_to_lots(0.0), 0);
        assert_eq!(market.ui_price_to_lots(-1.0), -1_000);
    }

    #[test]
    fn test_with_oracle() {
        let market = market(21.5);
        let mut oracle = *market.oracle_price();
        oracle.ui_price = 30.0;
        let repriced = market.with_oracle(oracle);
        assert_eq!(repriced.oracle_price_lots(), 30_000);
        assert_eq!(repriced.price_context().oracle_price_lots(), 30_000);
        assert_eq!(repriced.name(), "SOL-PERP");
    }
}
