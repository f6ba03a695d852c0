use solana_pubkey::Pubkey;

use super::PriceContext;
use crate::{
    layout::LeafNode,
    types::{Lots, OrderType, Side, Timestamp},
};

/// Peg properties of an order whose price tracks the oracle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OraclePeggedProperties {
    /// Resolved price crosses the peg limit, so the order would not match.
    pub is_invalid: bool,
    pub price_offset: Lots,
    pub ui_price_offset: f64,
    /// `-1` when the order has no limit.
    pub peg_limit: Lots,
    pub ui_peg_limit: f64,
}

/// Resting order produced by walking a book side.
///
/// Orders are derived on demand from leaf nodes and are not stored anywhere;
/// prices of oracle pegged orders are resolved against the oracle price the
/// book side was built with.
#[derive(Clone, Copy, derive_more::Debug, PartialEq)]
pub struct PerpOrder {
    owner: Pubkey,
    #[debug("{order_id:#x}")]
    order_id: u128,
    client_order_id: u64,
    side: Side,
    seq_num: u64,
    price_lots: Lots,
    ui_price: f64,
    size_lots: Lots,
    ui_size: f64,
    order_type: OrderType,
    timestamp: Timestamp,
    expiry: Timestamp,
    is_expired: bool,
    oracle_pegged: Option<OraclePeggedProperties>,
}

impl PerpOrder {
    pub(crate) fn from_fixed(leaf: &LeafNode, side: Side, pricing: &PriceContext, now: Timestamp) -> Self {
        Self::new(leaf, side, pricing, now, leaf.price_data() as Lots, None)
    }

    pub(crate) fn from_oracle_pegged(
        leaf: &LeafNode,
        side: Side,
        pricing: &PriceContext,
        now: Timestamp,
    ) -> Self {
        // Offsets are stored biased by 2^63 so they order as unsigned keys.
        let price_offset = leaf.price_data().wrapping_sub(1 << 63) as Lots;
        let price_lots = pricing.oracle_price_lots().saturating_add(price_offset);
        let is_invalid = match side {
            Side::Bid => price_lots > leaf.peg_limit && leaf.peg_limit != -1,
            Side::Ask => leaf.peg_limit > price_lots,
        };
        let peg = OraclePeggedProperties {
            is_invalid,
            price_offset,
            ui_price_offset: pricing.price_lots_to_ui(price_offset),
            peg_limit: leaf.peg_limit,
            ui_peg_limit: pricing.price_lots_to_ui(leaf.peg_limit),
        };
        Self::new(leaf, side, pricing, now, price_lots, Some(peg))
    }

    fn new(
        leaf: &LeafNode,
        side: Side,
        pricing: &PriceContext,
        now: Timestamp,
        price_lots: Lots,
        oracle_pegged: Option<OraclePeggedProperties>,
    ) -> Self {
        // Bid keys store the inverted sequence number so that earlier orders
        // sort higher in the descending bid tree.
        let seq_num = match side {
            Side::Bid => u64::MAX - leaf.key_low(),
            Side::Ask => leaf.key_low(),
        };
        Self {
            owner: leaf.owner,
            order_id: leaf.key,
            client_order_id: leaf.client_order_id,
            side,
            seq_num,
            price_lots,
            ui_price: pricing.price_lots_to_ui(price_lots),
            size_lots: leaf.quantity,
            ui_size: pricing.base_lots_to_ui(leaf.quantity),
            order_type: leaf.order_type,
            timestamp: leaf.timestamp,
            expiry: leaf.expiry(),
            is_expired: leaf.is_expired(now),
            oracle_pegged,
        }
    }

    /// Account owning the order.
    pub fn owner(&self) -> Pubkey { self.owner }

    /// Full order tree key.
    pub fn order_id(&self) -> u128 { self.order_id }

    pub fn client_order_id(&self) -> u64 { self.client_order_id }

    pub fn side(&self) -> Side { self.side }

    /// Time priority within a price level, lower is earlier.
    pub fn seq_num(&self) -> u64 { self.seq_num }

    pub fn price_lots(&self) -> Lots { self.price_lots }

    pub fn ui_price(&self) -> f64 { self.ui_price }

    pub fn size_lots(&self) -> Lots { self.size_lots }

    pub fn ui_size(&self) -> f64 { self.ui_size }

    pub fn order_type(&self) -> OrderType { self.order_type }

    /// Placement timestamp.
    pub fn timestamp(&self) -> Timestamp { self.timestamp }

    /// Expiry timestamp, `u64::MAX` if the order never expires.
    pub fn expiry(&self) -> Timestamp { self.expiry }

    /// Whether the order had expired at the book side's clock.
    pub fn is_expired(&self) -> bool { self.is_expired }

    pub fn is_oracle_pegged(&self) -> bool { self.oracle_pegged.is_some() }

    pub fn oracle_pegged(&self) -> Option<&OraclePeggedProperties> { self.oracle_pegged.as_ref() }

    /// Whether this is an oracle pegged order whose price crosses its limit.
    pub fn is_invalid_peg(&self) -> bool { self.oracle_pegged.is_some_and(|peg| peg.is_invalid) }

    pub(crate) fn priority(&self) -> (Lots, u64) { (self.price_lots, self.seq_num) }
}

fn short_owner(owner: &Pubkey) -> String {
    let owner = owner.to_string();
    owner.chars().take(6).collect()
}

impl std::fmt::Display for PerpOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if f.alternate() {
            // Short order representation
            let mut short = format!(
                "{} {:#} #{} 👤{}",
                self.ui_size,
                self.order_type,
                self.seq_num,
                short_owner(&self.owner),
            );
            if self.oracle_pegged.is_some() {
                short.push_str(" ⚓");
            }
            if self.expiry != u64::MAX {
                short.push_str(format!(" ⏳{}", self.expiry).as_str());
            }
            write!(f, "[{}]", short)
        } else {
            write!(
                f,
                "[{}@{} {} {:#} seq:{} owner:{} cid:{}{}{}{}]",
                self.ui_size,
                self.ui_price,
                self.side,
                self.order_type,
                self.seq_num,
                self.owner,
                self.client_order_id,
                match self.oracle_pegged {
                    Some(peg) => format!(" peg:{:+}", peg.ui_price_offset),
                    None => String::new(),
                },
                if self.is_invalid_peg() { " (invalid)" } else { "" },
                if self.is_expired { " (expired)" } else { "" },
            )
        }
    }
}

#[cfg(feature = "display")]
impl tabled::Tabled for PerpOrder {
    const LENGTH: usize = 8;

    fn fields(&self) -> Vec<std::borrow::Cow<'_, str>> {
        use colored::Colorize;

        let paint = |s: String| match self.side {
            Side::Ask => s.red().to_string(),
            Side::Bid => s.green().to_string(),
        };

        vec![
            paint(self.ui_price.to_string()).into(),
            paint(self.ui_size.to_string()).into(),
            paint(self.order_type.to_string()).into(),
            self.seq_num.to_string().into(),
            short_owner(&self.owner).into(),
            self.client_order_id.to_string().into(),
            if self.expiry == u64::MAX {
                "-".to_string().into()
            } else if self.is_expired {
                (self.expiry.to_string() + " (expired)").bright_red().to_string().into()
            } else {
                self.expiry.to_string().into()
            },
            match self.oracle_pegged {
                Some(peg) if peg.is_invalid => {
                    format!("{:+} (invalid)", peg.ui_price_offset).bright_red().to_string().into()
                }
                Some(peg) => format!("{:+}", peg.ui_price_offset).into(),
                None => "-".to_string().into(),
            },
        ]
    }

    fn headers() -> Vec<std::borrow::Cow<'static, str>> {
        vec![
            "Price".into(),
            "Size".into(),
            "Type".into(),
            "Seq".into(),
            "Owner".into(),
            "Client Order ID".into(),
            "Expiry".into(),
            "Peg Offset".into(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pricing() -> PriceContext { PriceContext::new(100, 0.01, 0.1) }

    fn leaf(price_data: u64, low: u64, peg_limit: Lots) -> LeafNode {
        LeafNode {
            owner_slot: 0,
            order_type: OrderType::Limit,
            time_in_force: 0,
            key: ((price_data as u128) << 64) | low as u128,
            owner: Pubkey::new_from_array([7; 32]),
            quantity: 5,
            timestamp: 1_000,
            peg_limit,
            client_order_id: 42,
        }
    }

    #[test]
    fn test_fixed_order() {
        let bid = PerpOrder::from_fixed(&leaf(250, 3, -1), Side::Bid, &pricing(), 1_000);
        assert_eq!(bid.price_lots(), 250);
        assert_eq!(bid.seq_num(), u64::MAX - 3);
        assert!((bid.ui_price() - 2.5).abs() < 1e-12);
        assert!((bid.ui_size() - 0.5).abs() < 1e-12);
        assert!(!bid.is_oracle_pegged());
        assert!(!bid.is_expired());

        let ask = PerpOrder::from_fixed(&leaf(250, 3, -1), Side::Ask, &pricing(), 1_000);
        assert_eq!(ask.seq_num(), 3);
    }

    #[test]
    fn test_oracle_pegged_price() {
        let below = (1u64 << 63) - 2;
        let order = PerpOrder::from_oracle_pegged(&leaf(below, 1, -1), Side::Bid, &pricing(), 0);
        assert_eq!(order.price_lots(), 98);
        let peg = order.oracle_pegged().unwrap();
        assert_eq!(peg.price_offset, -2);
        assert!(!peg.is_invalid);

        let above = (1u64 << 63) + 5;
        let order = PerpOrder::from_oracle_pegged(&leaf(above, 1, -1), Side::Ask, &pricing(), 0);
        assert_eq!(order.price_lots(), 105);
    }

    #[test]
    fn test_peg_limit_validity() {
        let offset = (1u64 << 63) + 10; // resolves to 110 lots
        let bid = |limit| PerpOrder::from_oracle_pegged(&leaf(offset, 1, limit), Side::Bid, &pricing(), 0);
        assert!(!bid(-1).is_invalid_peg());
        assert!(!bid(110).is_invalid_peg());
        assert!(bid(109).is_invalid_peg());

        let ask = |limit| PerpOrder::from_oracle_pegged(&leaf(offset, 1, limit), Side::Ask, &pricing(), 0);
        assert!(!ask(-1).is_invalid_peg());
        assert!(!ask(110).is_invalid_peg());
        assert!(ask(111).is_invalid_peg());
    }

    #[test]
    fn test_expiry() {
        let mut node = leaf(100, 1, -1);
        node.time_in_force = 10;
        let order = PerpOrder::from_fixed(&node, Side::Ask, &pricing(), 1_010);
        assert_eq!(order.expiry(), 1_010);
        assert!(!order.is_expired());
        assert!(PerpOrder::from_fixed(&node, Side::Ask, &pricing(), 1_011).is_expired());
    }
}
