//! Decoded market state: perp market parameters, book sides and the orders
//! resting in them.

mod book;
mod market;
mod order;

#[cfg(feature = "display")]
pub use book::BookView;
pub use book::{BookSide, BookSideIter, InvalidPegPolicy, L2Level, OrderTreeIter, TreeWalker};
pub use market::{PerpMarket, PriceContext};
pub use order::{OraclePeggedProperties, PerpOrder};
