//! Order book side reconstructed from a slab account.

mod iter;
#[cfg(feature = "display")]
mod view;

use itertools::Itertools;

pub use iter::{BookSideIter, OrderTreeIter, TreeWalker};
use iter::OrderTree;
#[cfg(feature = "display")]
pub use view::BookView;

use super::{PerpOrder, PriceContext};
use crate::{
    error::DecodeError,
    layout::BookSideData,
    types::{Lots, Side, Timestamp},
};

/// How far behind the newest order the book clock may lag the wall clock.
const MAX_CLOCK_LAG_SECS: u64 = 3600;

/// Whether oracle pegged orders crossing their peg limit take part in impact
/// price computation.
///
/// Such orders are still yielded by iteration, flagged with
/// [`PerpOrder::is_invalid_peg`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum InvalidPegPolicy {
    Include,
    #[default]
    Exclude,
}

impl InvalidPegPolicy {
    fn admits(&self, order: &PerpOrder) -> bool {
        match self {
            InvalidPegPolicy::Include => true,
            InvalidPegPolicy::Exclude => !order.is_invalid_peg(),
        }
    }
}

/// Aggregated price level.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct L2Level {
    pub price_lots: Lots,
    pub ui_price: f64,
    pub size_lots: Lots,
    pub ui_size: f64,
    pub num_orders: usize,
}

/// One side of a perp order book.
#[derive(Clone, Debug)]
pub struct BookSide {
    side: Side,
    data: BookSideData,
    pricing: PriceContext,
    now: Timestamp,
}

impl BookSide {
    /// Wraps decoded book side data.
    ///
    /// The book clock used for expiry is the newest order timestamp, but no
    /// earlier than an hour before `wall_clock`, so a stale local clock does
    /// not expire fresh orders.
    pub fn new(side: Side, data: BookSideData, pricing: PriceContext, wall_clock: Timestamp) -> Self {
        let now = data
            .leaves()
            .map(|leaf| leaf.timestamp)
            .fold(wall_clock.saturating_sub(MAX_CLOCK_LAG_SECS), Timestamp::max);
        Self { side, data, pricing, now }
    }

    pub fn decode(
        side: Side,
        data: &[u8],
        pricing: PriceContext,
        wall_clock: Timestamp,
    ) -> Result<Self, DecodeError> {
        Ok(Self::new(side, BookSideData::decode(data)?, pricing, wall_clock))
    }

    /// Same book side priced against another oracle price.
    pub fn with_pricing(self, pricing: PriceContext) -> Self { Self { pricing, ..self } }

    pub fn side(&self) -> Side { self.side }

    pub fn data(&self) -> &BookSideData { &self.data }

    pub fn pricing(&self) -> &PriceContext { &self.pricing }

    /// Book clock orders are expired against.
    pub fn now(&self) -> Timestamp { self.now }

    /// Orders with a fixed price, best first.
    pub fn fixed_orders(&self) -> OrderTreeIter<'_> { self.tree_orders(OrderTree::Fixed) }

    /// Orders pegged to the oracle, best first.
    pub fn oracle_pegged_orders(&self) -> OrderTreeIter<'_> { self.tree_orders(OrderTree::OraclePegged) }

    /// All orders in price-time priority.
    pub fn items(&self) -> BookSideIter<'_> {
        BookSideIter::new(self.side, self.fixed_orders(), self.oracle_pegged_orders())
    }

    /// Best order, if any.
    pub fn best(&self) -> Option<PerpOrder> { self.items().next() }

    /// Price of the order at which the cumulative size from the top of the
    /// book first reaches `base_lots`, `None` if the side is too thin.
    pub fn impact_price_ui(&self, base_lots: Lots, policy: InvalidPegPolicy) -> Option<f64> {
        let mut cumulative: i128 = 0;
        self.items().filter(|order| policy.admits(order)).find_map(|order| {
            cumulative += order.size_lots() as i128;
            (cumulative >= base_lots as i128).then_some(order.ui_price())
        })
    }

    /// Up to `depth` price levels, each summing consecutive orders at the
    /// same price.
    pub fn l2_ui(&self, depth: usize) -> Vec<L2Level> {
        let mut levels = Vec::with_capacity(depth.min(64));
        for (price_lots, orders) in &self.items().chunk_by(PerpOrder::price_lots) {
            if levels.len() == depth {
                break;
            }
            let mut level = L2Level {
                price_lots,
                ui_price: self.pricing.price_lots_to_ui(price_lots),
                size_lots: 0,
                ui_size: 0.0,
                num_orders: 0,
            };
            for order in orders {
                level.size_lots = level.size_lots.saturating_add(order.size_lots());
                level.ui_size += order.ui_size();
                level.num_orders += 1;
            }
            levels.push(level);
        }
        levels
    }

    fn tree_orders(&self, tree: OrderTree) -> OrderTreeIter<'_> {
        let root = match tree {
            OrderTree::Fixed => self.data.fixed_root(),
            OrderTree::OraclePegged => self.data.oracle_pegged_root(),
        };
        let walker = TreeWalker::new(self.data.nodes(), root, self.side);
        OrderTreeIter::new(walker, tree, self.side, self.pricing, self.now)
    }
}
