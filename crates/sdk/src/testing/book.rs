use solana_pubkey::Pubkey;

use crate::{
    layout::{BOOK_SIDE_LEN, BookSideData, InnerNode, LeafNode, MAX_ORDER_TREE_NODES, NODE_SIZE},
    types::{Lots, OrderType, Side, Timestamp},
};

const ROOTS_OFFSET: usize = 8;
const ORDER_TREE_TYPE_OFFSET: usize = 312;
const BUMP_INDEX_OFFSET: usize = 316;
const NODES_OFFSET: usize = BOOK_SIDE_LEN - MAX_ORDER_TREE_NODES * NODE_SIZE;

/// Peg offsets are stored biased by 2^63.
const PEG_BIAS: u64 = 1 << 63;

/// Builds book side account blobs.
///
/// Orders get increasing sequence numbers in the order they are added, so
/// among orders at one price the first added has time priority. Each order
/// tree is laid out as a balanced binary tree over its leaves sorted by key.
#[derive(Clone, Debug)]
pub struct BookSideBuilder {
    side: Side,
    fixed: Vec<LeafNode>,
    oracle_pegged: Vec<LeafNode>,
    next_seq: u64,
    owner: Pubkey,
    timestamp: Timestamp,
    time_in_force: u16,
    order_type: OrderType,
}

impl BookSideBuilder {
    pub fn new(side: Side) -> Self {
        Self {
            side,
            fixed: Vec::new(),
            oracle_pegged: Vec::new(),
            next_seq: 1,
            owner: Pubkey::new_from_array([1; 32]),
            timestamp: 1_700_000_000,
            time_in_force: 0,
            order_type: OrderType::Limit,
        }
    }

    /// Owner of orders added from now on.
    pub fn with_owner(self, owner: Pubkey) -> Self { Self { owner, ..self } }

    /// Placement time of orders added from now on.
    pub fn with_timestamp(self, timestamp: Timestamp) -> Self { Self { timestamp, ..self } }

    /// Time in force of orders added from now on, zero for none.
    pub fn with_time_in_force(self, time_in_force: u16) -> Self { Self { time_in_force, ..self } }

    pub fn with_order_type(self, order_type: OrderType) -> Self { Self { order_type, ..self } }

    /// Adds an order at a fixed price.
    pub fn fixed(mut self, price_lots: Lots, quantity: Lots) -> Self {
        let leaf = self.next_leaf(price_lots as u64, quantity, -1);
        self.fixed.push(leaf);
        self
    }

    /// Adds an order pegged `offset` lots away from the oracle price, limited
    /// at `peg_limit` (`-1` for none).
    pub fn oracle_pegged(mut self, offset: Lots, quantity: Lots, peg_limit: Lots) -> Self {
        let leaf = self.next_leaf(PEG_BIAS.wrapping_add(offset as u64), quantity, peg_limit);
        self.oracle_pegged.push(leaf);
        self
    }

    /// Encodes the account.
    ///
    /// # Panics
    ///
    /// If the orders do not fit into the node array.
    pub fn build(&self) -> Vec<u8> {
        let mut nodes = Vec::<[u8; NODE_SIZE]>::new();
        let fixed_root = build_tree(&mut nodes, &self.fixed);
        let oracle_pegged_root = build_tree(&mut nodes, &self.oracle_pegged);
        assert!(nodes.len() <= MAX_ORDER_TREE_NODES, "too many orders for one book side");

        let mut data = vec![0u8; BOOK_SIDE_LEN];
        for (i, (root, leaves)) in
            [(fixed_root, self.fixed.len()), (oracle_pegged_root, self.oracle_pegged.len())].into_iter().enumerate()
        {
            let offset = ROOTS_OFFSET + i * 8;
            data[offset..offset + 4].copy_from_slice(&root.unwrap_or(0).to_le_bytes());
            data[offset + 4..offset + 8].copy_from_slice(&(leaves as u32).to_le_bytes());
        }
        data[ORDER_TREE_TYPE_OFFSET] = match self.side {
            Side::Bid => 0,
            Side::Ask => 1,
        };
        data[BUMP_INDEX_OFFSET..BUMP_INDEX_OFFSET + 4].copy_from_slice(&(nodes.len() as u32).to_le_bytes());
        for (i, node) in nodes.iter().enumerate() {
            let offset = NODES_OFFSET + i * NODE_SIZE;
            data[offset..offset + NODE_SIZE].copy_from_slice(node);
        }
        data
    }

    /// Encodes and decodes the account.
    pub fn build_data(&self) -> BookSideData {
        BookSideData::decode(&self.build()).expect("built book side must decode")
    }

    fn next_leaf(&mut self, price_data: u64, quantity: Lots, peg_limit: Lots) -> LeafNode {
        let seq = self.next_seq;
        self.next_seq += 1;
        let low = match self.side {
            Side::Bid => u64::MAX - seq,
            Side::Ask => seq,
        };
        LeafNode {
            owner_slot: 0,
            order_type: self.order_type,
            time_in_force: self.time_in_force,
            key: ((price_data as u128) << 64) | low as u128,
            owner: self.owner,
            quantity,
            timestamp: self.timestamp,
            peg_limit,
            client_order_id: seq,
        }
    }
}

/// Appends the tree over `leaves` to `nodes`, returning its root.
fn build_tree(nodes: &mut Vec<[u8; NODE_SIZE]>, leaves: &[LeafNode]) -> Option<u32> {
    if leaves.is_empty() {
        return None;
    }
    let mut sorted = leaves.to_vec();
    sorted.sort_by_key(|leaf| leaf.key);
    Some(build_subtree(nodes, &sorted).0)
}

/// Returns the subtree root and the earliest expiry below it.
fn build_subtree(nodes: &mut Vec<[u8; NODE_SIZE]>, leaves: &[LeafNode]) -> (u32, u64) {
    if let [leaf] = leaves {
        nodes.push(leaf.encode());
        return ((nodes.len() - 1) as u32, leaf.expiry());
    }
    let mid = leaves.len() / 2;
    let (left, left_expiry) = build_subtree(nodes, &leaves[..mid]);
    let (right, right_expiry) = build_subtree(nodes, &leaves[mid..]);
    let inner = InnerNode {
        prefix_len: (leaves[mid - 1].key ^ leaves[mid].key).leading_zeros(),
        key: leaves[mid].key,
        children: [left, right],
        child_earliest_expiry: [left_expiry, right_expiry],
    };
    nodes.push(inner.encode());
    ((nodes.len() - 1) as u32, left_expiry.min(right_expiry))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::AnyNode;

    #[test]
    fn test_layout() {
        let data = BookSideBuilder::new(Side::Ask).fixed(100, 1).fixed(101, 2).fixed(102, 3).build();
        assert_eq!(data.len(), BOOK_SIDE_LEN);

        let book = BookSideData::decode(&data).unwrap();
        assert_eq!(book.order_tree_type(), 1);
        assert_eq!(book.fixed_root().leaf_count, 3);
        assert_eq!(book.oracle_pegged_root().node(), None);
        // 3 leaves and 2 inner nodes
        assert_eq!(book.bump_index(), 5);
        assert_eq!(book.leaves().count(), 3);

        let root = book.fixed_root().node().unwrap();
        assert!(matches!(book.node(root), Some(AnyNode::Inner(_))));
    }

    #[test]
    fn test_bid_keys_invert_sequence() {
        let book = BookSideBuilder::new(Side::Bid).fixed(100, 1).fixed(100, 2).build_data();
        let lows = book.leaves().map(LeafNode::key_low).collect::<Vec<_>>();
        assert!(lows.contains(&(u64::MAX - 1)));
        assert!(lows.contains(&(u64::MAX - 2)));
    }

    #[test]
    fn test_peg_bias() {
        let book = BookSideBuilder::new(Side::Bid).oracle_pegged(-5, 1, -1).build_data();
        let leaf = book.leaves().next().unwrap();
        assert_eq!(leaf.price_data(), PEG_BIAS - 5);
        assert_eq!(leaf.peg_limit, -1);
    }
}
