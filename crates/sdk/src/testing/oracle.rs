use crate::{
    num::I80F48,
    oracle::{
        PYTH_MAGIC, PYTH_PRICE_LEN, STUB_ORACLE_DISCRIMINATOR, STUB_ORACLE_LEN, SWITCHBOARD_RESULT_LEN,
    },
};

/// Stub oracle account holding a native price.
pub fn stub_oracle(price: I80F48, last_updated: i64) -> Vec<u8> {
    let mut data = vec![0u8; STUB_ORACLE_LEN];
    data[..8].copy_from_slice(&STUB_ORACLE_DISCRIMINATOR);
    data[72..88].copy_from_slice(&price.to_le_bytes());
    data[88..96].copy_from_slice(&last_updated.to_le_bytes());
    data
}

/// Pyth price account whose previous and aggregate price are both `price *
/// 10^exponent`.
pub fn pyth_oracle(price: i64, exponent: i32) -> Vec<u8> {
    let mut data = vec![0u8; PYTH_PRICE_LEN];
    data[..4].copy_from_slice(&PYTH_MAGIC.to_le_bytes());
    data[20..24].copy_from_slice(&exponent.to_le_bytes());
    data[184..192].copy_from_slice(&price.to_le_bytes());
    data[208..216].copy_from_slice(&price.to_le_bytes());
    // Trading
    data[224..228].copy_from_slice(&1u32.to_le_bytes());
    data
}

/// Switchboard V2 aggregator account with a latest result of `mantissa /
/// 10^scale`. Must be owned by the Switchboard program to be recognized.
pub fn switchboard_oracle(mantissa: i128, scale: u32) -> Vec<u8> {
    let mut data = vec![0u8; SWITCHBOARD_RESULT_LEN];
    data[366..382].copy_from_slice(&mantissa.to_le_bytes());
    data[382..386].copy_from_slice(&scale.to_le_bytes());
    data
}
