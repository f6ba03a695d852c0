use solana_pubkey::Pubkey;

use super::{RawAccount, RecordSet, Snapshot};
use crate::{
    MarketAccounts,
    error::SyncError,
    layout::{BookSideData, DriftPerpMarketData, PerpMarketData},
    oracle::{OracleDecoder, OracleReading},
    state::{BookSide, InvalidPegPolicy, PerpMarket},
    types::{Side, Timestamp},
};

/// Accounts backing one perp market.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MarketKey {
    PerpMarket,
    Bids,
    Asks,
    Oracle,
    /// Drift perp market sampled for comparison.
    DriftPerpMarket,
}

#[derive(Clone, Debug)]
pub enum MarketRecord {
    PerpMarket(PerpMarketData),
    BookSide(BookSideData),
    Oracle(OracleReading),
    DriftPerpMarket(DriftPerpMarketData),
}

/// Record set of the perp market, both book sides and the oracle of a
/// market.
///
/// The oracle is stored as a source-native reading, it is rescaled once the
/// market's base decimals are known.
pub fn market_records(
    accounts: &MarketAccounts,
    oracle_decoder: &OracleDecoder,
) -> RecordSet<MarketKey, MarketRecord> {
    let oracle_decoder = oracle_decoder.clone();
    RecordSet::new()
        .with(MarketKey::PerpMarket, accounts.perp_market(), |account: &RawAccount| {
            PerpMarketData::decode(&account.data).map(MarketRecord::PerpMarket)
        })
        .with(MarketKey::Bids, accounts.bids(), |account: &RawAccount| {
            BookSideData::decode(&account.data).map(MarketRecord::BookSide)
        })
        .with(MarketKey::Asks, accounts.asks(), |account: &RawAccount| {
            BookSideData::decode(&account.data).map(MarketRecord::BookSide)
        })
        .with(MarketKey::Oracle, accounts.oracle(), move |account: &RawAccount| {
            oracle_decoder.read(&account.data, &account.owner).map(MarketRecord::Oracle)
        })
}

/// Adds the Drift perp market at `address` to `records`, so both venues are
/// fetched in the same batch.
pub fn with_drift_market(
    records: RecordSet<MarketKey, MarketRecord>,
    address: Pubkey,
) -> RecordSet<MarketKey, MarketRecord> {
    records.with(MarketKey::DriftPerpMarket, address, |account: &RawAccount| {
        DriftPerpMarketData::decode(&account.data).map(MarketRecord::DriftPerpMarket)
    })
}

/// Drift perp market of a snapshot built with [`with_drift_market`].
pub fn drift_market(snapshot: &Snapshot<MarketKey, MarketRecord>) -> Result<&DriftPerpMarketData, SyncError> {
    match snapshot.value(&MarketKey::DriftPerpMarket) {
        Some(MarketRecord::DriftPerpMarket(data)) => Ok(data),
        _ => Err(not_fetched(MarketKey::DriftPerpMarket)),
    }
}

/// Market and both book sides assembled from one snapshot.
#[derive(Clone, Debug)]
pub struct MarketState {
    market: PerpMarket,
    bids: BookSide,
    asks: BookSide,
}

impl MarketState {
    /// Assembles the market from a snapshot of [`market_records`]. `now` is
    /// the wall clock in unix seconds.
    pub fn from_snapshot(
        snapshot: &Snapshot<MarketKey, MarketRecord>,
        oracle_decoder: &OracleDecoder,
        now: Timestamp,
    ) -> Result<Self, SyncError> {
        let (address, data) = match snapshot.get(&MarketKey::PerpMarket).map(|r| (r.address(), r.value())) {
            Some((address, MarketRecord::PerpMarket(data))) => (address, data.clone()),
            _ => return Err(not_fetched(MarketKey::PerpMarket)),
        };
        let reading = match snapshot.value(&MarketKey::Oracle) {
            Some(MarketRecord::Oracle(reading)) => *reading,
            _ => return Err(not_fetched(MarketKey::Oracle)),
        };
        let oracle = oracle_decoder.price(reading, data.base_decimals);
        let market = PerpMarket::new(address, data, oracle, oracle_decoder.config().quote_decimals);

        let book_side = |key: MarketKey, side: Side| match snapshot.value(&key) {
            Some(MarketRecord::BookSide(data)) => Ok(market.book_side(side, data.clone(), now)),
            _ => Err(not_fetched(key)),
        };
        let bids = book_side(MarketKey::Bids, Side::Bid)?;
        let asks = book_side(MarketKey::Asks, Side::Ask)?;

        Ok(Self { market, bids, asks })
    }

    pub fn market(&self) -> &PerpMarket { &self.market }

    pub fn bids(&self) -> &BookSide { &self.bids }

    pub fn asks(&self) -> &BookSide { &self.asks }

    pub fn address(&self) -> Pubkey { self.market.address() }

    /// Instantaneous funding rate, skipping invalid oracle pegged orders.
    pub fn funding_rate(&self) -> f64 { self.market.instantaneous_funding_rate(&self.bids, &self.asks) }

    pub fn funding_rate_with(&self, policy: InvalidPegPolicy) -> f64 {
        self.market.instantaneous_funding_rate_with(&self.bids, &self.asks, policy)
    }
}

fn not_fetched(key: MarketKey) -> SyncError { SyncError::NotFetched(format!("{:?}", key)) }
