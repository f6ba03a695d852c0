//! Oracle price decoding.
//!
//! Three account shapes are recognized, tried in this order:
//!
//! 1. Stub oracle, tagged by an 8-byte discriminator, holding an [`I80F48`]
//!    native price.
//! 2. Pyth price account, tagged by a 4-byte magic number.
//! 3. Switchboard V2 aggregator, recognized by its owning program only.
//!
//! Whatever the source, [`OraclePrice::price`] is expressed in native quote
//! units per native base unit, i.e. `ui_price * 10^(quote_decimals -
//! base_decimals)`.

use solana_pubkey::Pubkey;

use crate::{error::DecodeError, layout::Reader, num::I80F48};

pub const STUB_ORACLE_DISCRIMINATOR: [u8; 8] = [0xe0, 0xfb, 0xfe, 0x63, 0xb1, 0xae, 0x89, 0x04];
pub const STUB_ORACLE_LEN: usize = 96;
const STUB_PRICE_OFFSET: usize = 72;
const STUB_LAST_UPDATED_OFFSET: usize = 88;

pub const PYTH_MAGIC: u32 = 0xa1b2_c3d4;
pub const PYTH_PRICE_LEN: usize = 240;
const PYTH_EXPONENT_OFFSET: usize = 20;
const PYTH_PREV_PRICE_OFFSET: usize = 184;
const PYTH_AGG_PRICE_OFFSET: usize = 208;
const PYTH_AGG_STATUS_OFFSET: usize = 224;

pub const SWITCHBOARD_RESULT_LEN: usize = 386;
const SWITCHBOARD_MANTISSA_OFFSET: usize = 366;
const SWITCHBOARD_SCALE_OFFSET: usize = 382;

/// `SW1TCH7qEPTdLsDHRgPuMQjbQxKdH2aBStViMFnt64f`
pub const SWITCHBOARD_V2_PROGRAM_ID: Pubkey = Pubkey::new_from_array([
    6, 136, 81, 198, 140, 104, 50, 240, 47, 165, 129, 177, 191, 73, 27, 119, 202, 65, 119, 107, 162, 185,
    136, 181, 166, 250, 186, 142, 227, 162, 236, 144,
]);

/// Decimals of the quote token every market settles in.
pub const QUOTE_DECIMALS: u8 = 6;

#[derive(Clone, Debug)]
pub struct OracleConfig {
    pub quote_decimals: u8,
    /// Owner identifying Switchboard aggregator accounts.
    pub switchboard_program: Pubkey,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self { quote_decimals: QUOTE_DECIMALS, switchboard_program: SWITCHBOARD_V2_PROGRAM_ID }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OracleSource {
    Stub,
    Pyth,
    Switchboard,
}

impl std::fmt::Display for OracleSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OracleSource::Stub => write!(f, "stub"),
            OracleSource::Pyth => write!(f, "pyth"),
            OracleSource::Switchboard => write!(f, "switchboard"),
        }
    }
}

/// Source-native reading, before any rescaling.
#[derive(Clone, Copy, derive_more::Debug, PartialEq, Eq)]
pub enum OracleReading {
    Stub {
        #[debug("{price}")]
        price: I80F48,
        last_updated: i64,
    },
    Pyth {
        previous_price: i64,
        aggregate_price: i64,
        exponent: i32,
        aggregate_status: u32,
    },
    Switchboard {
        mantissa: i128,
        scale: u32,
    },
}

impl OracleReading {
    pub fn source(&self) -> OracleSource {
        match self {
            OracleReading::Stub { .. } => OracleSource::Stub,
            OracleReading::Pyth { .. } => OracleSource::Pyth,
            OracleReading::Switchboard { .. } => OracleSource::Switchboard,
        }
    }
}

/// Oracle price on the common native scale plus its human readable form.
#[derive(Clone, Copy, derive_more::Debug, PartialEq)]
pub struct OraclePrice {
    #[debug("{price}")]
    pub price: I80F48,
    pub ui_price: f64,
    pub reading: OracleReading,
}

impl OraclePrice {
    pub fn source(&self) -> OracleSource { self.reading.source() }
}

/// Detects the shape of an oracle account and decodes its price.
#[derive(Clone, Debug, Default)]
pub struct OracleDecoder {
    config: OracleConfig,
}

impl OracleDecoder {
    pub fn new(config: OracleConfig) -> Self { Self { config } }

    pub fn config(&self) -> &OracleConfig { &self.config }

    /// Reads the source-native price fields without rescaling.
    pub fn read(&self, data: &[u8], owner: &Pubkey) -> Result<OracleReading, DecodeError> {
        if data.starts_with(&STUB_ORACLE_DISCRIMINATOR) {
            let reader = Reader::new(data, "stub oracle");
            reader.require_len(STUB_ORACLE_LEN)?;
            return Ok(OracleReading::Stub {
                price: reader.i80f48(STUB_PRICE_OFFSET)?,
                last_updated: reader.i64(STUB_LAST_UPDATED_OFFSET)?,
            });
        }

        if data.len() >= 4 && Reader::new(data, "pyth price").u32(0)? == PYTH_MAGIC {
            let reader = Reader::new(data, "pyth price");
            reader.require_len(PYTH_PRICE_LEN)?;
            return Ok(OracleReading::Pyth {
                previous_price: reader.i64(PYTH_PREV_PRICE_OFFSET)?,
                aggregate_price: reader.i64(PYTH_AGG_PRICE_OFFSET)?,
                exponent: reader.i32(PYTH_EXPONENT_OFFSET)?,
                aggregate_status: reader.u32(PYTH_AGG_STATUS_OFFSET)?,
            });
        }

        if *owner == self.config.switchboard_program {
            let reader = Reader::new(data, "switchboard aggregator");
            reader.require_len(SWITCHBOARD_RESULT_LEN)?;
            return Ok(OracleReading::Switchboard {
                mantissa: reader.i128(SWITCHBOARD_MANTISSA_OFFSET)?,
                scale: reader.u32(SWITCHBOARD_SCALE_OFFSET)?,
            });
        }

        Err(DecodeError::UnrecognizedOracleFormat)
    }

    /// Decodes an oracle account of a market whose base token has
    /// `base_decimals` decimals.
    pub fn decode(&self, data: &[u8], owner: &Pubkey, base_decimals: u8) -> Result<OraclePrice, DecodeError> {
        Ok(self.price(self.read(data, owner)?, base_decimals))
    }

    /// Rescales a reading to the common native scale of a market whose base
    /// token has `base_decimals` decimals.
    pub fn price(&self, reading: OracleReading, base_decimals: u8) -> OraclePrice {
        let native_exp = self.config.quote_decimals as i32 - base_decimals as i32;
        let (price, ui_price) = match reading {
            OracleReading::Stub { price, .. } => (price, price.to_f64() / 10f64.powi(native_exp)),
            OracleReading::Pyth { previous_price, exponent, .. } => (
                I80F48::from_scaled(previous_price as i128, exponent + native_exp),
                previous_price as f64 * 10f64.powi(exponent),
            ),
            OracleReading::Switchboard { mantissa, scale } => {
                let scale = scale.min(i32::MAX as u32) as i32;
                (
                    I80F48::from_scaled(mantissa, native_exp - scale),
                    mantissa as f64 / 10f64.powi(scale),
                )
            }
        };
        OraclePrice { price, ui_price, reading }
    }
}
