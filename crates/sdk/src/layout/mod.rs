//! Fixed on-chain account layouts.
//!
//! All integers are little-endian. Offsets are absolute within the account
//! data, discriminator included.

pub mod book_side;
pub mod drift_perp_market;
pub mod perp_market;

use solana_pubkey::Pubkey;

use crate::{error::DecodeError, num::I80F48};

pub use book_side::{
    AnyNode, BOOK_SIDE_LEN, BookSideData, InnerNode, LeafNode, MAX_ORDER_TREE_NODES, NODE_SIZE,
    NodeHandle, OrderTreeRoot,
};
pub use drift_perp_market::{
    DRIFT_PERP_MARKET_DISCRIMINATOR, DRIFT_PERP_MARKET_LEN, DRIFT_PROGRAM_ID, DRIFT_SOL_PERP_MARKET,
    DriftPerpMarketData,
};
pub use perp_market::{PERP_MARKET_LEN, PerpMarketData};

/// Bounds-checked little-endian field reader over a borrowed account blob.
#[derive(Clone, Copy)]
pub(crate) struct Reader<'a> {
    data: &'a [u8],
    layout: &'static str,
}

impl<'a> Reader<'a> {
    pub(crate) fn new(data: &'a [u8], layout: &'static str) -> Self { Self { data, layout } }

    /// Fails unless the blob holds at least `len` bytes.
    pub(crate) fn require_len(&self, len: usize) -> Result<(), DecodeError> {
        if self.data.len() < len {
            return Err(DecodeError::malformed(
                self.layout,
                format!("expected at least {} bytes, got {}", len, self.data.len()),
            ));
        }
        Ok(())
    }

    pub(crate) fn bytes<const N: usize>(&self, offset: usize) -> Result<[u8; N], DecodeError> {
        self.data
            .get(offset..offset + N)
            .and_then(|slice| slice.try_into().ok())
            .ok_or_else(|| {
                DecodeError::malformed(
                    self.layout,
                    format!("field at {}..{} is out of bounds ({} bytes)", offset, offset + N, self.data.len()),
                )
            })
    }

    pub(crate) fn u8(&self, offset: usize) -> Result<u8, DecodeError> {
        Ok(self.bytes::<1>(offset)?[0])
    }

    pub(crate) fn u16(&self, offset: usize) -> Result<u16, DecodeError> {
        self.bytes(offset).map(u16::from_le_bytes)
    }

    pub(crate) fn u32(&self, offset: usize) -> Result<u32, DecodeError> {
        self.bytes(offset).map(u32::from_le_bytes)
    }

    pub(crate) fn i32(&self, offset: usize) -> Result<i32, DecodeError> {
        self.bytes(offset).map(i32::from_le_bytes)
    }

    pub(crate) fn u64(&self, offset: usize) -> Result<u64, DecodeError> {
        self.bytes(offset).map(u64::from_le_bytes)
    }

    pub(crate) fn i64(&self, offset: usize) -> Result<i64, DecodeError> {
        self.bytes(offset).map(i64::from_le_bytes)
    }

    pub(crate) fn f64(&self, offset: usize) -> Result<f64, DecodeError> {
        self.bytes(offset).map(f64::from_le_bytes)
    }

    pub(crate) fn u128(&self, offset: usize) -> Result<u128, DecodeError> {
        self.bytes(offset).map(u128::from_le_bytes)
    }

    pub(crate) fn i128(&self, offset: usize) -> Result<i128, DecodeError> {
        self.bytes(offset).map(i128::from_le_bytes)
    }

    pub(crate) fn i80f48(&self, offset: usize) -> Result<I80F48, DecodeError> {
        self.bytes(offset).map(I80F48::from_le_bytes)
    }

    pub(crate) fn pubkey(&self, offset: usize) -> Result<Pubkey, DecodeError> {
        self.bytes(offset).map(Pubkey::new_from_array)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reader_bounds() {
        let data = [1u8, 0, 0, 0, 2];
        let reader = Reader::new(&data, "test");
        assert_eq!(reader.u32(0).unwrap(), 1);
        assert_eq!(reader.u8(4).unwrap(), 2);
        assert!(matches!(
            reader.u32(2),
            Err(DecodeError::MalformedLayout { layout: "test", .. })
        ));
        assert!(reader.require_len(5).is_ok());
        assert!(reader.require_len(6).is_err());
    }
}
