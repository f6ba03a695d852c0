//! Perp market account.
//!
//! Only the fields needed to price the book and derive funding are decoded;
//! the remaining risk parameters are skipped.

use solana_pubkey::Pubkey;

use super::Reader;
use crate::{error::DecodeError, num::I80F48};

const LAYOUT: &str = "perp market";

pub const PERP_MARKET_LEN: usize = 2816;

const GROUP_OFFSET: usize = 8;
const PERP_MARKET_INDEX_OFFSET: usize = 42;
const BASE_DECIMALS_OFFSET: usize = 47;
const NAME_OFFSET: usize = 48;
const NAME_LEN: usize = 16;
const BIDS_OFFSET: usize = 64;
const ASKS_OFFSET: usize = 96;
const EVENT_QUEUE_OFFSET: usize = 128;
const ORACLE_OFFSET: usize = 160;
const STABLE_PRICE_OFFSET: usize = 288;
const QUOTE_LOT_SIZE_OFFSET: usize = 576;
const BASE_LOT_SIZE_OFFSET: usize = 584;
const OPEN_INTEREST_OFFSET: usize = 656;
const SEQ_NUM_OFFSET: usize = 664;
const MIN_FUNDING_OFFSET: usize = 680;
const MAX_FUNDING_OFFSET: usize = 696;
const IMPACT_QUANTITY_OFFSET: usize = 712;
const LONG_FUNDING_OFFSET: usize = 720;
const SHORT_FUNDING_OFFSET: usize = 736;
const FUNDING_LAST_UPDATED_OFFSET: usize = 752;
const MAKER_FEE_OFFSET: usize = 776;
const TAKER_FEE_OFFSET: usize = 792;
const REDUCE_ONLY_OFFSET: usize = 872;

/// Decoded perp market account.
#[derive(Clone, derive_more::Debug, PartialEq)]
pub struct PerpMarketData {
    pub group: Pubkey,
    pub perp_market_index: u16,
    pub base_decimals: u8,
    pub name: String,
    pub bids: Pubkey,
    pub asks: Pubkey,
    pub event_queue: Pubkey,
    pub oracle: Pubkey,
    pub stable_price: f64,
    pub quote_lot_size: i64,
    pub base_lot_size: i64,
    pub open_interest: i64,
    pub seq_num: u64,
    #[debug("{min_funding}")]
    pub min_funding: I80F48,
    #[debug("{max_funding}")]
    pub max_funding: I80F48,
    /// Base lots sampled on each side of the book to get impact prices.
    pub impact_quantity: i64,
    #[debug("{long_funding}")]
    pub long_funding: I80F48,
    #[debug("{short_funding}")]
    pub short_funding: I80F48,
    pub funding_last_updated: u64,
    #[debug("{maker_fee}")]
    pub maker_fee: I80F48,
    #[debug("{taker_fee}")]
    pub taker_fee: I80F48,
    pub reduce_only: bool,
}

impl PerpMarketData {
    pub fn decode(data: &[u8]) -> Result<Self, DecodeError> {
        let reader = Reader::new(data, LAYOUT);
        reader.require_len(PERP_MARKET_LEN)?;

        let name_bytes = reader.bytes::<NAME_LEN>(NAME_OFFSET)?;
        let name_end = name_bytes.iter().position(|b| *b == 0).unwrap_or(NAME_LEN);
        let name = String::from_utf8_lossy(&name_bytes[..name_end]).into_owned();

        let quote_lot_size = reader.i64(QUOTE_LOT_SIZE_OFFSET)?;
        let base_lot_size = reader.i64(BASE_LOT_SIZE_OFFSET)?;
        if quote_lot_size <= 0 || base_lot_size <= 0 {
            return Err(DecodeError::malformed(
                LAYOUT,
                format!("non-positive lot sizes: quote {}, base {}", quote_lot_size, base_lot_size),
            ));
        }

        Ok(Self {
            group: reader.pubkey(GROUP_OFFSET)?,
            perp_market_index: reader.u16(PERP_MARKET_INDEX_OFFSET)?,
            base_decimals: reader.u8(BASE_DECIMALS_OFFSET)?,
            name,
            bids: reader.pubkey(BIDS_OFFSET)?,
            asks: reader.pubkey(ASKS_OFFSET)?,
            event_queue: reader.pubkey(EVENT_QUEUE_OFFSET)?,
            oracle: reader.pubkey(ORACLE_OFFSET)?,
            stable_price: reader.f64(STABLE_PRICE_OFFSET)?,
            quote_lot_size,
            base_lot_size,
            open_interest: reader.i64(OPEN_INTEREST_OFFSET)?,
            seq_num: reader.u64(SEQ_NUM_OFFSET)?,
            min_funding: reader.i80f48(MIN_FUNDING_OFFSET)?,
            max_funding: reader.i80f48(MAX_FUNDING_OFFSET)?,
            impact_quantity: reader.i64(IMPACT_QUANTITY_OFFSET)?,
            long_funding: reader.i80f48(LONG_FUNDING_OFFSET)?,
            short_funding: reader.i80f48(SHORT_FUNDING_OFFSET)?,
            funding_last_updated: reader.u64(FUNDING_LAST_UPDATED_OFFSET)?,
            maker_fee: reader.i80f48(MAKER_FEE_OFFSET)?,
            taker_fee: reader.i80f48(TAKER_FEE_OFFSET)?,
            reduce_only: reader.u8(REDUCE_ONLY_OFFSET)? != 0,
        })
    }

    /// Inverse of [`PerpMarketData::decode`] for the decoded fields; every
    /// other byte is zero.
    pub fn encode(&self) -> Vec<u8> {
        let mut data = vec![0u8; PERP_MARKET_LEN];
        let mut put = |offset: usize, bytes: &[u8]| data[offset..offset + bytes.len()].copy_from_slice(bytes);
        put(GROUP_OFFSET, self.group.as_ref());
        put(PERP_MARKET_INDEX_OFFSET, &self.perp_market_index.to_le_bytes());
        put(BASE_DECIMALS_OFFSET, &[self.base_decimals]);
        let name = self.name.as_bytes();
        put(NAME_OFFSET, &name[..name.len().min(NAME_LEN)]);
        put(BIDS_OFFSET, self.bids.as_ref());
        put(ASKS_OFFSET, self.asks.as_ref());
        put(EVENT_QUEUE_OFFSET, self.event_queue.as_ref());
        put(ORACLE_OFFSET, self.oracle.as_ref());
        put(STABLE_PRICE_OFFSET, &self.stable_price.to_le_bytes());
        put(QUOTE_LOT_SIZE_OFFSET, &self.quote_lot_size.to_le_bytes());
        put(BASE_LOT_SIZE_OFFSET, &self.base_lot_size.to_le_bytes());
        put(OPEN_INTEREST_OFFSET, &self.open_interest.to_le_bytes());
        put(SEQ_NUM_OFFSET, &self.seq_num.to_le_bytes());
        put(MIN_FUNDING_OFFSET, &self.min_funding.to_le_bytes());
        put(MAX_FUNDING_OFFSET, &self.max_funding.to_le_bytes());
        put(IMPACT_QUANTITY_OFFSET, &self.impact_quantity.to_le_bytes());
        put(LONG_FUNDING_OFFSET, &self.long_funding.to_le_bytes());
        put(SHORT_FUNDING_OFFSET, &self.short_funding.to_le_bytes());
        put(FUNDING_LAST_UPDATED_OFFSET, &self.funding_last_updated.to_le_bytes());
        put(MAKER_FEE_OFFSET, &self.maker_fee.to_le_bytes());
        put(TAKER_FEE_OFFSET, &self.taker_fee.to_le_bytes());
        put(REDUCE_ONLY_OFFSET, &[u8::from(self.reduce_only)]);
        data
    }
}
