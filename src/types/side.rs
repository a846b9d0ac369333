// meridian_core/src/types/side.rs
//
// The order-side and contract-side enums.
//
// Kept as single-byte, `Copy` enums in the teacher's style: a trading
// engine compares these millions of times per second and a string or a
// boxed variant would be a false economy.

use std::fmt;

/// Which direction an order trades in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[repr(u8)]
pub enum Side {
    Buy = 1,
    Sell = 2,
}

impl Side {
    pub fn opposite(&self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }

    pub fn is_buy(&self) -> bool {
        matches!(self, Side::Buy)
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

/// Which binary contract an order is for. A market always has exactly
/// two contracts, YES and NO, whose prices are linked by `p_yes + p_no`
/// economics rather than by being the same instrument (§4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[repr(u8)]
pub enum Contract {
    Yes = 1,
    No = 2,
}

impl Contract {
    pub fn opposite(&self) -> Contract {
        match self {
            Contract::Yes => Contract::No,
            Contract::No => Contract::Yes,
        }
    }
}

impl fmt::Display for Contract {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Contract::Yes => write!(f, "YES"),
            Contract::No => write!(f, "NO"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn side_opposite_is_involutive() {
        assert_eq!(Side::Buy.opposite(), Side::Sell);
        assert_eq!(Side::Sell.opposite(), Side::Buy);
        assert_eq!(Side::Buy.opposite().opposite(), Side::Buy);
    }

    #[test]
    fn contract_opposite_is_involutive() {
        assert_eq!(Contract::Yes.opposite(), Contract::No);
        assert_eq!(Contract::No.opposite().opposite(), Contract::No);
    }
}
