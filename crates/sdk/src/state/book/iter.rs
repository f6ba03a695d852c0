use std::iter::{FusedIterator, Peekable};

use crate::{
    layout::{AnyNode, LeafNode, NodeHandle, OrderTreeRoot},
    state::{PerpOrder, PriceContext},
    types::{Side, Timestamp},
};

/// Depth-first walk over the leaves of one order tree, in book order.
///
/// Uses an explicit stack, so tree depth does not grow the call stack. The
/// walk visits at most as many nodes as the arena holds, which also cuts off
/// a corrupted tree that links back into itself.
#[derive(Clone, Debug)]
pub struct TreeWalker<'a> {
    nodes: &'a [AnyNode],
    side: Side,
    stack: Vec<NodeHandle>,
    budget: usize,
}

impl<'a> TreeWalker<'a> {
    pub fn new(nodes: &'a [AnyNode], root: OrderTreeRoot, side: Side) -> Self {
        Self { nodes, side, stack: root.node().into_iter().collect(), budget: nodes.len() }
    }
}

impl<'a> Iterator for TreeWalker<'a> {
    type Item = &'a LeafNode;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(handle) = self.stack.pop() {
            if self.budget == 0 {
                self.stack.clear();
                return None;
            }
            self.budget -= 1;

            match self.nodes.get(handle as usize) {
                Some(AnyNode::Inner(inner)) => {
                    // The higher-keyed child is children[1]; bids visit it
                    // first to get descending prices.
                    let (first, second) = match self.side {
                        Side::Bid => (inner.children[1], inner.children[0]),
                        Side::Ask => (inner.children[0], inner.children[1]),
                    };
                    self.stack.push(second);
                    self.stack.push(first);
                }
                Some(AnyNode::Leaf(leaf)) => return Some(leaf),
                _ => {}
            }
        }
        None
    }
}

impl FusedIterator for TreeWalker<'_> {}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum OrderTree {
    Fixed,
    OraclePegged,
}

/// Orders of one tree of a book side.
#[derive(Clone, Debug)]
pub struct OrderTreeIter<'a> {
    walker: TreeWalker<'a>,
    tree: OrderTree,
    side: Side,
    pricing: PriceContext,
    now: Timestamp,
}

impl<'a> OrderTreeIter<'a> {
    pub(crate) fn new(
        walker: TreeWalker<'a>,
        tree: OrderTree,
        side: Side,
        pricing: PriceContext,
        now: Timestamp,
    ) -> Self {
        Self { walker, tree, side, pricing, now }
    }
}

impl Iterator for OrderTreeIter<'_> {
    type Item = PerpOrder;

    fn next(&mut self) -> Option<Self::Item> {
        let leaf = self.walker.next()?;
        Some(match self.tree {
            OrderTree::Fixed => PerpOrder::from_fixed(leaf, self.side, &self.pricing, self.now),
            OrderTree::OraclePegged => {
                PerpOrder::from_oracle_pegged(leaf, self.side, &self.pricing, self.now)
            }
        })
    }
}

impl FusedIterator for OrderTreeIter<'_> {}

/// Both trees of a book side merged into a single price-time ordered
/// sequence.
///
/// Each tree is pulled only when its head is emitted, so abandoning the
/// iterator early leaves the rest of the book undecoded.
#[derive(Clone, Debug)]
pub struct BookSideIter<'a> {
    side: Side,
    fixed: Peekable<OrderTreeIter<'a>>,
    oracle_pegged: Peekable<OrderTreeIter<'a>>,
}

impl<'a> BookSideIter<'a> {
    pub(crate) fn new(side: Side, fixed: OrderTreeIter<'a>, oracle_pegged: OrderTreeIter<'a>) -> Self {
        Self { side, fixed: fixed.peekable(), oracle_pegged: oracle_pegged.peekable() }
    }
}

impl Iterator for BookSideIter<'_> {
    type Item = PerpOrder;

    fn next(&mut self) -> Option<Self::Item> {
        let take_fixed = match (self.fixed.peek(), self.oracle_pegged.peek()) {
            (Some(fixed), Some(pegged)) => self.side.is_better(fixed.priority(), pegged.priority()),
            (Some(_), None) => true,
            (None, Some(_)) => false,
            (None, None) => return None,
        };
        if take_fixed { self.fixed.next() } else { self.oracle_pegged.next() }
    }
}

impl FusedIterator for BookSideIter<'_> {}

#[cfg(test)]
mod tests {
    use solana_pubkey::Pubkey;

    use super::*;
    use crate::{layout::InnerNode, types::OrderType};

    fn leaf(price: u64, seq: u64) -> AnyNode {
        AnyNode::Leaf(LeafNode {
            owner_slot: 0,
            order_type: OrderType::Limit,
            time_in_force: 0,
            key: ((price as u128) << 64) | seq as u128,
            owner: Pubkey::default(),
            quantity: 1,
            timestamp: 0,
            peg_limit: -1,
            client_order_id: 0,
        })
    }

    fn inner(left: NodeHandle, right: NodeHandle) -> AnyNode {
        AnyNode::Inner(InnerNode {
            prefix_len: 0,
            key: 0,
            children: [left, right],
            child_earliest_expiry: [u64::MAX; 2],
        })
    }

    fn prices(walker: TreeWalker<'_>) -> Vec<u64> { walker.map(LeafNode::price_data).collect() }

    #[test]
    fn test_walk_order() {
        //       0
        //     /   \
        //    1     2
        //   / \   / \
        //  10 20 30 40
        let nodes = vec![
            inner(1, 2),
            inner(3, 4),
            inner(5, 6),
            leaf(10, 0),
            leaf(20, 0),
            leaf(30, 0),
            leaf(40, 0),
        ];
        let root = OrderTreeRoot { maybe_node: 0, leaf_count: 4 };
        assert_eq!(prices(TreeWalker::new(&nodes, root, Side::Ask)), vec![10, 20, 30, 40]);
        assert_eq!(prices(TreeWalker::new(&nodes, root, Side::Bid)), vec![40, 30, 20, 10]);
    }

    #[test]
    fn test_empty_root_and_skipped_tags() {
        let nodes = vec![inner(1, 2), AnyNode::Free { next: 0 }, leaf(7, 0)];
        let empty = OrderTreeRoot { maybe_node: 0, leaf_count: 0 };
        assert_eq!(TreeWalker::new(&nodes, empty, Side::Ask).count(), 0);

        let root = OrderTreeRoot { maybe_node: 0, leaf_count: 1 };
        assert_eq!(prices(TreeWalker::new(&nodes, root, Side::Ask)), vec![7]);
    }

    #[test]
    fn test_cycle_terminates() {
        let nodes = vec![inner(1, 0), leaf(5, 0)];
        let root = OrderTreeRoot { maybe_node: 0, leaf_count: 1 };
        let leaves = TreeWalker::new(&nodes, root, Side::Ask).count();
        assert!(leaves <= nodes.len());
    }

    #[test]
    fn test_merge_prefers_better_price_then_seq() {
        let pricing = PriceContext::new(0, 1.0, 1.0);
        let fixed_nodes = vec![inner(1, 2), leaf(100, 2), leaf(101, 4)];
        let pegged_nodes = vec![inner(1, 2), leaf(100, 1), leaf(102, 3)];
        let root = OrderTreeRoot { maybe_node: 0, leaf_count: 2 };

        let orders = |nodes| {
            OrderTreeIter::new(TreeWalker::new(nodes, root, Side::Ask), OrderTree::Fixed, Side::Ask, pricing, 0)
        };
        // Both trees are priced as fixed so keys compare directly.
        let merged = BookSideIter::new(Side::Ask, orders(&fixed_nodes[..]), orders(&pegged_nodes[..]))
            .map(|o| (o.price_lots(), o.seq_num()))
            .collect::<Vec<_>>();
        assert_eq!(merged, vec![(100, 1), (100, 2), (101, 4), (102, 3)]);
    }
}
