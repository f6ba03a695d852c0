//! Book side ("slab") account: two order trees sharing one node arena.
//!
//! ```text
//! 0      discriminator           8
//! 8      roots                   2 x OrderTreeRoot (fixed, oracle pegged)
//! 24     reserved roots          4 x OrderTreeRoot
//! 56     reserved                256
//! 312    order tree type         u8, 3 bytes padding
//! 316    bump index              u32
//! 320    free list length        u32
//! 324    free list head          u32
//! 328    reserved                512
//! 840    nodes                   1024 x 120
//! ```
//!
//! Children of inner nodes are indices into the node array.

use solana_pubkey::Pubkey;
use tracing::warn;

use super::Reader;
use crate::{error::DecodeError, types::OrderType};

const LAYOUT: &str = "book side";

pub const NODE_SIZE: usize = 120;
pub const MAX_ORDER_TREE_NODES: usize = 1024;

const ROOTS_OFFSET: usize = 8;
const ROOT_SIZE: usize = 8;
const NUM_ROOTS: usize = 2;
const NUM_RESERVED_ROOTS: usize = 4;
const ORDER_TREE_TYPE_OFFSET: usize = 312;
const BUMP_INDEX_OFFSET: usize = 316;
const FREE_LIST_LEN_OFFSET: usize = 320;
const FREE_LIST_HEAD_OFFSET: usize = 324;
const NODES_OFFSET: usize = 840;

pub const BOOK_SIDE_LEN: usize = NODES_OFFSET + MAX_ORDER_TREE_NODES * NODE_SIZE;

pub const UNINITIALIZED_NODE_TAG: u8 = 0;
pub const INNER_NODE_TAG: u8 = 1;
pub const LEAF_NODE_TAG: u8 = 2;
pub const FREE_NODE_TAG: u8 = 3;
pub const LAST_FREE_NODE_TAG: u8 = 4;

/// Index of a node in the order tree node array.
pub type NodeHandle = u32;

/// Root of one order tree.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OrderTreeRoot {
    pub maybe_node: NodeHandle,
    pub leaf_count: u32,
}

impl OrderTreeRoot {
    /// Root node, `None` for an empty tree.
    pub fn node(&self) -> Option<NodeHandle> { (self.leaf_count > 0).then_some(self.maybe_node) }

    fn decode(reader: &Reader<'_>, offset: usize) -> Result<Self, DecodeError> {
        Ok(Self { maybe_node: reader.u32(offset)?, leaf_count: reader.u32(offset + 4)? })
    }
}

/// Branch point of a crit-bit tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InnerNode {
    pub prefix_len: u32,
    pub key: u128,
    /// Left (0) and right (1) children: the right subtree holds the larger keys.
    pub children: [NodeHandle; 2],
    /// Earliest expiry timestamp among the leaves below each child.
    pub child_earliest_expiry: [u64; 2],
}

impl InnerNode {
    fn decode(node: &Reader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            prefix_len: node.u32(4)?,
            key: node.u128(8)?,
            children: [node.u32(24)?, node.u32(28)?],
            child_earliest_expiry: [node.u64(32)?, node.u64(40)?],
        })
    }

    pub fn encode(&self) -> [u8; NODE_SIZE] {
        let mut buf = [0u8; NODE_SIZE];
        buf[0] = INNER_NODE_TAG;
        buf[4..8].copy_from_slice(&self.prefix_len.to_le_bytes());
        buf[8..24].copy_from_slice(&self.key.to_le_bytes());
        buf[24..28].copy_from_slice(&self.children[0].to_le_bytes());
        buf[28..32].copy_from_slice(&self.children[1].to_le_bytes());
        buf[32..40].copy_from_slice(&self.child_earliest_expiry[0].to_le_bytes());
        buf[40..48].copy_from_slice(&self.child_earliest_expiry[1].to_le_bytes());
        buf
    }
}

/// Resting order.
///
/// The key packs the price (in lots for fixed orders, biased peg offset for
/// oracle pegged ones) into the upper 64 bits and a sequence-derived value
/// into the lower 64 bits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LeafNode {
    pub owner_slot: u8,
    pub order_type: OrderType,
    /// Seconds the order stays valid after `timestamp`, zero for no expiry.
    pub time_in_force: u16,
    pub key: u128,
    pub owner: Pubkey,
    pub quantity: i64,
    pub timestamp: u64,
    /// Limit for oracle pegged orders, `-1` for none.
    pub peg_limit: i64,
    pub client_order_id: u64,
}

impl LeafNode {
    fn decode(node: &Reader<'_>) -> Result<Self, DecodeError> {
        let code = node.u8(2)?;
        let order_type = OrderType::try_from(code).unwrap_or_else(|err| {
            warn!(error = %err, "leaf with unknown order type");
            OrderType::Unknown(code)
        });
        Ok(Self {
            owner_slot: node.u8(1)?,
            order_type,
            time_in_force: node.u16(4)?,
            key: node.u128(8)?,
            owner: node.pubkey(24)?,
            quantity: node.i64(56)?,
            timestamp: node.u64(64)?,
            peg_limit: node.i64(72)?,
            client_order_id: node.u64(80)?,
        })
    }

    pub fn encode(&self) -> [u8; NODE_SIZE] {
        let mut buf = [0u8; NODE_SIZE];
        buf[0] = LEAF_NODE_TAG;
        buf[1] = self.owner_slot;
        buf[2] = self.order_type.into();
        buf[4..6].copy_from_slice(&self.time_in_force.to_le_bytes());
        buf[8..24].copy_from_slice(&self.key.to_le_bytes());
        buf[24..56].copy_from_slice(self.owner.as_ref());
        buf[56..64].copy_from_slice(&self.quantity.to_le_bytes());
        buf[64..72].copy_from_slice(&self.timestamp.to_le_bytes());
        buf[72..80].copy_from_slice(&self.peg_limit.to_le_bytes());
        buf[80..88].copy_from_slice(&self.client_order_id.to_le_bytes());
        buf
    }

    /// Upper half of the key.
    pub fn price_data(&self) -> u64 { (self.key >> 64) as u64 }

    /// Lower half of the key.
    pub fn key_low(&self) -> u64 { self.key as u64 }

    /// Expiry timestamp, `u64::MAX` if the order never expires.
    pub fn expiry(&self) -> u64 {
        if self.time_in_force == 0 {
            u64::MAX
        } else {
            self.timestamp.saturating_add(self.time_in_force as u64)
        }
    }

    pub fn is_expired(&self, now: u64) -> bool { now > self.expiry() }
}

/// Node of the arena, distinguished by its first byte.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AnyNode {
    Uninitialized,
    Inner(InnerNode),
    Leaf(LeafNode),
    Free { next: NodeHandle },
    LastFree,
}

impl AnyNode {
    fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        let node = Reader::new(bytes, LAYOUT);
        Ok(match node.u8(0)? {
            INNER_NODE_TAG => AnyNode::Inner(InnerNode::decode(&node)?),
            LEAF_NODE_TAG => AnyNode::Leaf(LeafNode::decode(&node)?),
            FREE_NODE_TAG => AnyNode::Free { next: node.u32(4)? },
            LAST_FREE_NODE_TAG => AnyNode::LastFree,
            _ => AnyNode::Uninitialized,
        })
    }

    pub fn as_leaf(&self) -> Option<&LeafNode> {
        match self {
            AnyNode::Leaf(leaf) => Some(leaf),
            _ => None,
        }
    }
}

/// Decoded book side account.
#[derive(Clone, Debug)]
pub struct BookSideData {
    roots: [OrderTreeRoot; NUM_ROOTS],
    reserved_roots: [OrderTreeRoot; NUM_RESERVED_ROOTS],
    order_tree_type: u8,
    bump_index: u32,
    free_list_len: u32,
    free_list_head: NodeHandle,
    nodes: Vec<AnyNode>,
}

impl BookSideData {
    /// Decodes a book side account.
    ///
    /// Fails if the blob is shorter than [`BOOK_SIDE_LEN`] or a root or child
    /// handle points outside the node array. Leaves with an order type code
    /// outside the known ones decode as [`OrderType::Unknown`].
    pub fn decode(data: &[u8]) -> Result<Self, DecodeError> {
        let reader = Reader::new(data, LAYOUT);
        reader.require_len(BOOK_SIDE_LEN)?;

        let mut roots = [OrderTreeRoot::default(); NUM_ROOTS];
        for (i, root) in roots.iter_mut().enumerate() {
            *root = OrderTreeRoot::decode(&reader, ROOTS_OFFSET + i * ROOT_SIZE)?;
        }
        let mut reserved_roots = [OrderTreeRoot::default(); NUM_RESERVED_ROOTS];
        for (i, root) in reserved_roots.iter_mut().enumerate() {
            *root = OrderTreeRoot::decode(&reader, ROOTS_OFFSET + (NUM_ROOTS + i) * ROOT_SIZE)?;
        }

        let nodes = data[NODES_OFFSET..BOOK_SIDE_LEN]
            .chunks_exact(NODE_SIZE)
            .map(AnyNode::decode)
            .collect::<Result<Vec<_>, _>>()?;

        let in_bounds = |handle: NodeHandle| (handle as usize) < nodes.len();
        for (i, root) in roots.iter().enumerate() {
            if let Some(handle) = root.node()
                && !in_bounds(handle)
            {
                return Err(DecodeError::malformed(
                    LAYOUT,
                    format!("root {} points to node {} out of bounds", i, handle),
                ));
            }
        }
        for (i, node) in nodes.iter().enumerate() {
            if let AnyNode::Inner(inner) = node
                && let Some(child) = inner.children.iter().find(|c| !in_bounds(**c))
            {
                return Err(DecodeError::malformed(
                    LAYOUT,
                    format!("inner node {} points to child {} out of bounds", i, child),
                ));
            }
        }

        Ok(Self {
            roots,
            reserved_roots,
            order_tree_type: reader.u8(ORDER_TREE_TYPE_OFFSET)?,
            bump_index: reader.u32(BUMP_INDEX_OFFSET)?,
            free_list_len: reader.u32(FREE_LIST_LEN_OFFSET)?,
            free_list_head: reader.u32(FREE_LIST_HEAD_OFFSET)?,
            nodes,
        })
    }

    /// Root of the tree of orders with a fixed price.
    pub fn fixed_root(&self) -> OrderTreeRoot { self.roots[0] }

    /// Root of the tree of orders pegged to the oracle price.
    pub fn oracle_pegged_root(&self) -> OrderTreeRoot { self.roots[1] }

    pub fn reserved_roots(&self) -> &[OrderTreeRoot; NUM_RESERVED_ROOTS] { &self.reserved_roots }

    /// Order tree type as stored on-chain: 0 for bids, 1 for asks.
    pub fn order_tree_type(&self) -> u8 { self.order_tree_type }

    pub fn bump_index(&self) -> u32 { self.bump_index }

    pub fn free_list_len(&self) -> u32 { self.free_list_len }

    pub fn free_list_head(&self) -> NodeHandle { self.free_list_head }

    pub fn node(&self, handle: NodeHandle) -> Option<&AnyNode> { self.nodes.get(handle as usize) }

    pub fn nodes(&self) -> &[AnyNode] { &self.nodes }

    /// All leaves of both trees in array order (not book order).
    pub fn leaves(&self) -> impl Iterator<Item = &LeafNode> { self.nodes.iter().filter_map(AnyNode::as_leaf) }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(key: u128) -> LeafNode {
        LeafNode {
            owner_slot: 3,
            order_type: OrderType::PostOnly,
            time_in_force: 60,
            key,
            owner: Pubkey::new_from_array([7; 32]),
            quantity: 12,
            timestamp: 1_700_000_000,
            peg_limit: -1,
            client_order_id: 99,
        }
    }

    #[test]
    fn test_len() {
        assert_eq!(BOOK_SIDE_LEN, 123_720);
    }

    #[test]
    fn test_leaf_field_offsets() {
        let bytes = leaf((5u128 << 64) | 8).encode();
        assert_eq!(bytes[0], LEAF_NODE_TAG);
        assert_eq!(bytes[1], 3);
        assert_eq!(bytes[2], 2);
        assert_eq!(u16::from_le_bytes([bytes[4], bytes[5]]), 60);
        assert_eq!(bytes[24..56], [7; 32]);
        assert_eq!(i64::from_le_bytes(bytes[56..64].try_into().unwrap()), 12);
        assert_eq!(u64::from_le_bytes(bytes[80..88].try_into().unwrap()), 99);

        let decoded = AnyNode::decode(&bytes).unwrap();
        assert_eq!(decoded, AnyNode::Leaf(leaf((5u128 << 64) | 8)));
        let AnyNode::Leaf(decoded) = decoded else { unreachable!() };
        assert_eq!(decoded.price_data(), 5);
        assert_eq!(decoded.key_low(), 8);
    }

    #[test]
    fn test_leaf_expiry() {
        let mut order = leaf(0);
        assert_eq!(order.expiry(), 1_700_000_060);
        assert!(!order.is_expired(1_700_000_060));
        assert!(order.is_expired(1_700_000_061));
        order.time_in_force = 0;
        assert_eq!(order.expiry(), u64::MAX);
        assert!(!order.is_expired(u64::MAX));
    }

    #[test]
    fn test_unknown_tags_are_not_orders() {
        let mut bytes = [0u8; NODE_SIZE];
        assert_eq!(AnyNode::decode(&bytes).unwrap(), AnyNode::Uninitialized);
        bytes[0] = FREE_NODE_TAG;
        bytes[4] = 9;
        assert_eq!(AnyNode::decode(&bytes).unwrap(), AnyNode::Free { next: 9 });
        bytes[0] = LAST_FREE_NODE_TAG;
        assert_eq!(AnyNode::decode(&bytes).unwrap(), AnyNode::LastFree);
        bytes[0] = 200;
        assert_eq!(AnyNode::decode(&bytes).unwrap(), AnyNode::Uninitialized);
    }

    #[test]
    fn test_unknown_order_type_is_kept() {
        let mut bytes = leaf(0).encode();
        bytes[2] = 17;
        let decoded = AnyNode::decode(&bytes).unwrap();
        assert_eq!(decoded.as_leaf().map(|l| l.order_type), Some(OrderType::Unknown(17)));
        assert_eq!(decoded.as_leaf().map(|l| l.quantity), Some(12));
    }

    #[test]
    fn test_decode_rejects_short_blob() {
        let data = vec![0u8; BOOK_SIDE_LEN - 1];
        assert!(matches!(
            BookSideData::decode(&data),
            Err(DecodeError::MalformedLayout { layout: "book side", .. })
        ));
    }

    #[test]
    fn test_decode_rejects_dangling_root() {
        let mut data = vec![0u8; BOOK_SIDE_LEN];
        data[8..12].copy_from_slice(&(MAX_ORDER_TREE_NODES as u32).to_le_bytes());
        data[12..16].copy_from_slice(&1u32.to_le_bytes());
        assert!(BookSideData::decode(&data).is_err());
    }

    #[test]
    fn test_decode_empty() {
        let data = vec![0u8; BOOK_SIDE_LEN];
        let book_side = BookSideData::decode(&data).unwrap();
        assert_eq!(book_side.fixed_root().node(), None);
        assert_eq!(book_side.oracle_pegged_root().node(), None);
        assert_eq!(book_side.nodes().len(), MAX_ORDER_TREE_NODES);
        assert_eq!(book_side.leaves().count(), 0);
    }
}
