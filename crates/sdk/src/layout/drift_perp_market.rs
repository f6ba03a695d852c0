//! Drift perp market account.
//!
//! Anchor zero-copy account: an 8-byte discriminator followed by the
//! `repr(C)` market struct. Only the AMM price TWAPs funding is derived from,
//! plus enough to identify the market, are decoded.

use solana_pubkey::Pubkey;

use super::Reader;
use crate::error::DecodeError;

const LAYOUT: &str = "drift perp market";

pub const DRIFT_PERP_MARKET_LEN: usize = 1216;

/// `sha256("account:PerpMarket")[..8]`
pub const DRIFT_PERP_MARKET_DISCRIMINATOR: [u8; 8] = [10, 223, 12, 44, 107, 245, 55, 247];

/// Prices are fixed point with 6 decimals.
pub const DRIFT_PRICE_PRECISION: f64 = 1e6;

/// dRiftyHA39MWEi3m9aunc5MzRF1JYuBsbn6VPcn33UH
pub const DRIFT_PROGRAM_ID: Pubkey = Pubkey::new_from_array([
    9, 84, 219, 190, 158, 201, 96, 201, 138, 122, 41, 63, 226, 19, 54, 150, 111, 225, 128, 209, 81, 174, 75, 129,
    121, 86, 31, 137, 133, 74, 83, 246,
]);

/// SOL-PERP (market index 0) on mainnet,
/// 8UJgxaiQx5nTrdDgph5FiahMmzduuLTLf5WmsPegYA6W
pub const DRIFT_SOL_PERP_MARKET: Pubkey = Pubkey::new_from_array([
    111, 0, 125, 196, 23, 174, 242, 6, 166, 148, 65, 234, 220, 182, 153, 184, 202, 170, 74, 249, 3, 82, 173, 112,
    144, 207, 190, 169, 248, 31, 164, 107,
]);

const PUBKEY_OFFSET: usize = 8;
// AMM starts at 40
const ORACLE_OFFSET: usize = 40;
const LAST_ORACLE_PRICE_OFFSET: usize = 72;
const LAST_ORACLE_PRICE_TWAP_OFFSET: usize = 96;
const LAST_ORACLE_PRICE_TWAP_TS_OFFSET: usize = 112;
const LAST_FUNDING_RATE_OFFSET: usize = 480;
const LAST_MARK_PRICE_TWAP_OFFSET: usize = 752;
const LAST_FUNDING_RATE_TS_OFFSET: usize = 792;
const FUNDING_PERIOD_OFFSET: usize = 800;
const LAST_MARK_PRICE_TWAP_TS_OFFSET: usize = 888;
const NAME_OFFSET: usize = 1000;
const NAME_LEN: usize = 32;
const MARKET_INDEX_OFFSET: usize = 1160;

/// Decoded Drift perp market account.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DriftPerpMarketData {
    pub pubkey: Pubkey,
    pub market_index: u16,
    pub name: String,
    pub oracle: Pubkey,
    pub last_oracle_price: i64,
    pub last_oracle_price_twap: i64,
    pub last_oracle_price_twap_ts: i64,
    pub last_mark_price_twap: u64,
    pub last_mark_price_twap_ts: i64,
    /// Last settled funding rate, in quote per base.
    pub last_funding_rate: i64,
    pub last_funding_rate_ts: i64,
    /// Seconds between funding settlements.
    pub funding_period: i64,
}

impl DriftPerpMarketData {
    pub fn decode(data: &[u8]) -> Result<Self, DecodeError> {
        let reader = Reader::new(data, LAYOUT);
        reader.require_len(DRIFT_PERP_MARKET_LEN)?;

        let discriminator = reader.bytes::<8>(0)?;
        if discriminator != DRIFT_PERP_MARKET_DISCRIMINATOR {
            return Err(DecodeError::malformed(LAYOUT, format!("unexpected discriminator {:?}", discriminator)));
        }

        // Names are space padded
        let name_bytes = reader.bytes::<NAME_LEN>(NAME_OFFSET)?;
        let name = String::from_utf8_lossy(&name_bytes).trim_end_matches([' ', '\0']).to_string();

        Ok(Self {
            pubkey: reader.pubkey(PUBKEY_OFFSET)?,
            market_index: reader.u16(MARKET_INDEX_OFFSET)?,
            name,
            oracle: reader.pubkey(ORACLE_OFFSET)?,
            last_oracle_price: reader.i64(LAST_ORACLE_PRICE_OFFSET)?,
            last_oracle_price_twap: reader.i64(LAST_ORACLE_PRICE_TWAP_OFFSET)?,
            last_oracle_price_twap_ts: reader.i64(LAST_ORACLE_PRICE_TWAP_TS_OFFSET)?,
            last_mark_price_twap: reader.u64(LAST_MARK_PRICE_TWAP_OFFSET)?,
            last_mark_price_twap_ts: reader.i64(LAST_MARK_PRICE_TWAP_TS_OFFSET)?,
            last_funding_rate: reader.i64(LAST_FUNDING_RATE_OFFSET)?,
            last_funding_rate_ts: reader.i64(LAST_FUNDING_RATE_TS_OFFSET)?,
            funding_period: reader.i64(FUNDING_PERIOD_OFFSET)?,
        })
    }

    /// Inverse of [`DriftPerpMarketData::decode`] for the decoded fields;
    /// every other byte is zero.
    pub fn encode(&self) -> Vec<u8> {
        let mut data = vec![0u8; DRIFT_PERP_MARKET_LEN];
        let mut put = |offset: usize, bytes: &[u8]| data[offset..offset + bytes.len()].copy_from_slice(bytes);
        put(0, &DRIFT_PERP_MARKET_DISCRIMINATOR);
        put(PUBKEY_OFFSET, self.pubkey.as_ref());
        put(ORACLE_OFFSET, self.oracle.as_ref());
        put(LAST_ORACLE_PRICE_OFFSET, &self.last_oracle_price.to_le_bytes());
        put(LAST_ORACLE_PRICE_TWAP_OFFSET, &self.last_oracle_price_twap.to_le_bytes());
        put(LAST_ORACLE_PRICE_TWAP_TS_OFFSET, &self.last_oracle_price_twap_ts.to_le_bytes());
        put(LAST_FUNDING_RATE_OFFSET, &self.last_funding_rate.to_le_bytes());
        put(LAST_MARK_PRICE_TWAP_OFFSET, &self.last_mark_price_twap.to_le_bytes());
        put(LAST_FUNDING_RATE_TS_OFFSET, &self.last_funding_rate_ts.to_le_bytes());
        put(FUNDING_PERIOD_OFFSET, &self.funding_period.to_le_bytes());
        put(LAST_MARK_PRICE_TWAP_TS_OFFSET, &self.last_mark_price_twap_ts.to_le_bytes());
        let mut name = [b' '; NAME_LEN];
        let len = self.name.len().min(NAME_LEN);
        name[..len].copy_from_slice(&self.name.as_bytes()[..len]);
        put(NAME_OFFSET, &name);
        put(MARKET_INDEX_OFFSET, &self.market_index.to_le_bytes());
        data
    }

    pub fn mark_price_twap_ui(&self) -> f64 { self.last_mark_price_twap as f64 / DRIFT_PRICE_PRECISION }

    pub fn oracle_price_twap_ui(&self) -> f64 { self.last_oracle_price_twap as f64 / DRIFT_PRICE_PRECISION }

    /// Premium of the mark TWAP over the oracle TWAP, `None` while the
    /// oracle TWAP is zero.
    pub fn funding_rate(&self) -> Option<f64> {
        if self.last_oracle_price_twap == 0 {
            return None;
        }
        let (mark, oracle) = (self.mark_price_twap_ui(), self.oracle_price_twap_ui());
        Some((mark - oracle) / oracle)
    }
}
