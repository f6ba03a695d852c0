use std::fmt::Display;

use crate::error::DecodeError;

/// Order type of a resting perp order.
///
/// Orders resting in the book are almost always [`OrderType::Limit`] or one
/// of the post-only variants; the remaining variants only appear transiently
/// while an order is being matched.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum OrderType {
    Limit,
    ImmediateOrCancel,
    PostOnly,
    Market,
    PostOnlySlide,
    /// Code this SDK does not know, kept as read.
    Unknown(u8),
}

/// Side of the book.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Side {
    Bid,
    Ask,
}

impl Side {
    pub fn opposite(&self) -> Side {
        match self {
            Side::Bid => Side::Ask,
            Side::Ask => Side::Bid,
        }
    }

    /// Whether `a` sits ahead of `b` on this side of the book: better price
    /// first (higher for bids, lower for asks), then lower sequence number.
    pub fn is_better(&self, a: (i64, u64), b: (i64, u64)) -> bool {
        let (price_a, seq_a) = a;
        let (price_b, seq_b) = b;
        if price_a == price_b {
            return seq_a < seq_b;
        }
        match self {
            Side::Bid => price_a > price_b,
            Side::Ask => price_a < price_b,
        }
    }
}

impl TryFrom<u8> for OrderType {
    type Error = DecodeError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(OrderType::Limit),
            1 => Ok(OrderType::ImmediateOrCancel),
            2 => Ok(OrderType::PostOnly),
            3 => Ok(OrderType::Market),
            4 => Ok(OrderType::PostOnlySlide),
            other => Err(DecodeError::InvalidOrderType(other)),
        }
    }
}

impl From<OrderType> for u8 {
    fn from(value: OrderType) -> Self {
        match value {
            OrderType::Limit => 0,
            OrderType::ImmediateOrCancel => 1,
            OrderType::PostOnly => 2,
            OrderType::Market => 3,
            OrderType::PostOnlySlide => 4,
            OrderType::Unknown(code) => code,
        }
    }
}

impl Display for OrderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if f.alternate() {
            match self {
                OrderType::Limit => write!(f, "L"),
                OrderType::ImmediateOrCancel => write!(f, "IOC"),
                OrderType::PostOnly => write!(f, "PO"),
                OrderType::Market => write!(f, "M"),
                OrderType::PostOnlySlide => write!(f, "POS"),
                OrderType::Unknown(code) => write!(f, "?{}", code),
            }
        } else {
            match self {
                OrderType::Limit => write!(f, "Limit"),
                OrderType::ImmediateOrCancel => write!(f, "Immediate or Cancel"),
                OrderType::PostOnly => write!(f, "Post Only"),
                OrderType::Market => write!(f, "Market"),
                OrderType::PostOnlySlide => write!(f, "Post Only Slide"),
                OrderType::Unknown(code) => write!(f, "Unknown ({})", code),
            }
        }
    }
}

impl Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Bid => write!(f, "Bid"),
            Side::Ask => write!(f, "Ask"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority() {
        assert!(Side::Bid.is_better((101, 5), (100, 1)));
        assert!(!Side::Bid.is_better((100, 1), (101, 5)));
        assert!(Side::Ask.is_better((100, 5), (101, 1)));
        assert!(Side::Ask.is_better((100, 1), (100, 2)));
        assert!(Side::Bid.is_better((100, 1), (100, 2)));
        assert!(!Side::Bid.is_better((100, 2), (100, 2)));
    }

    #[test]
    fn test_order_type_codes() {
        for code in 0u8..5 {
            let order_type = OrderType::try_from(code).unwrap();
            assert_eq!(u8::from(order_type), code);
        }
        assert_eq!(OrderType::try_from(9), Err(DecodeError::InvalidOrderType(9)));
        assert_eq!(u8::from(OrderType::Unknown(9)), 9);
        assert_eq!(OrderType::Unknown(9).to_string(), "Unknown (9)");
    }
}
