// meridian_core/src/types/money.rs
//
// Fixed-Point Money and Price Types.
//
// WHY FIXED-POINT:
// IEEE 754 floats cannot represent $0.10 exactly. Over millions of trades
// this drift is a real financial loss, not a rounding curiosity. Every
// monetary value in this engine is an integer count of cents, so addition
// and subtraction are exact and there is no accumulated error.
//
// WHY NO HEAP ALLOCATION:
// `Cents` and `Shares` are `Copy`. They live on the stack or inside the
// order book's price-level queues. The matching engine never allocates
// to move a money value around.

use std::fmt;
use std::ops::{Add, AddAssign, Sub, SubAssign};

/// A signed quantity of US cents. Used for balances, reservations, and
/// trade proceeds — anything that can be negative in an intermediate
/// computation (e.g. a signed transaction amount) but most call sites
/// keep it non-negative by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Cents(i64);

impl Cents {
    pub const ZERO: Cents = Cents(0);

    pub const fn new(raw: i64) -> Self {
        Self(raw)
    }

    pub const fn raw(&self) -> i64 {
        self.0
    }

    pub fn checked_sub(&self, rhs: Cents) -> Option<Cents> {
        self.0.checked_sub(rhs.0).map(Cents)
    }
}

impl Add for Cents {
    type Output = Cents;
    fn add(self, rhs: Cents) -> Cents {
        Cents(self.0 + rhs.0)
    }
}

impl AddAssign for Cents {
    fn add_assign(&mut self, rhs: Cents) {
        self.0 += rhs.0;
    }
}

impl Sub for Cents {
    type Output = Cents;
    fn sub(self, rhs: Cents) -> Cents {
        Cents(self.0 - rhs.0)
    }
}

impl SubAssign for Cents {
    fn sub_assign(&mut self, rhs: Cents) {
        self.0 -= rhs.0;
    }
}

impl fmt::Display for Cents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cents = self.0;
        let sign = if cents < 0 { "-" } else { "" };
        let abs = cents.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

/// A price expressed in integer cents, always in `[1, 99]` for a resting
/// or incoming order (see `Price::in_valid_range`). `0` and `100` are
/// reserved for the synthetic MERGE/MINT trade price fields (§4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Price(u8);

impl Price {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 99;
    /// Synthetic trade price recorded for a MINT match.
    pub const MINT: u8 = 100;
    /// Synthetic trade price recorded for a MERGE match.
    pub const MERGE: u8 = 0;

    pub fn new(cents: u8) -> Option<Self> {
        if (Self::MIN..=Self::MAX).contains(&cents) {
            Some(Self(cents))
        } else {
            None
        }
    }

    /// The most aggressive bound used to reserve funds/shares for a MARKET
    /// order: 99 for BUY, 1 for SELL (§4.3 "Market orders").
    pub fn market_bound(is_buy: bool) -> Self {
        Self(if is_buy { Self::MAX } else { Self::MIN })
    }

    pub const fn cents(&self) -> u8 {
        self.0
    }

    /// The complementary contract's implied price: a YES share at `p` is
    /// economically "not-NO" at `100 - p`.
    pub fn implied_complement(&self) -> u8 {
        100 - self.0
    }

    /// Notional value of `qty` shares at this price.
    pub fn notional(&self, qty: Shares) -> Cents {
        Cents::new(self.0 as i64 * qty.raw() as i64)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", Cents::new(self.0 as i64))
    }
}

/// A non-negative integer count of shares. Partial shares do not exist
/// in this system (§1 Non-goals).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Shares(u64);

impl Shares {
    pub const ZERO: Shares = Shares(0);

    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn raw(&self) -> u64 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn checked_sub(&self, rhs: Shares) -> Option<Shares> {
        self.0.checked_sub(rhs.0).map(Shares)
    }

    pub fn min(self, other: Shares) -> Shares {
        Shares(self.0.min(other.0))
    }
}

impl Add for Shares {
    type Output = Shares;
    fn add(self, rhs: Shares) -> Shares {
        Shares(self.0 + rhs.0)
    }
}

impl AddAssign for Shares {
    fn add_assign(&mut self, rhs: Shares) {
        self.0 += rhs.0;
    }
}

impl Sub for Shares {
    type Output = Shares;
    fn sub(self, rhs: Shares) -> Shares {
        Shares(self.0 - rhs.0)
    }
}

impl SubAssign for Shares {
    fn sub_assign(&mut self, rhs: Shares) {
        self.0 -= rhs.0;
    }
}

impl fmt::Display for Shares {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cents_display_matches_two_decimal_convention() {
        assert_eq!(Cents::new(9400).to_string(), "94.00");
        assert_eq!(Cents::new(5).to_string(), "0.05");
        assert_eq!(Cents::new(-325).to_string(), "-3.25");
    }

    #[test]
    fn price_rejects_zero_and_hundred() {
        assert!(Price::new(0).is_none());
        assert!(Price::new(100).is_none());
        assert!(Price::new(1).is_some());
        assert!(Price::new(99).is_some());
    }

    #[test]
    fn price_implied_complement() {
        let p = Price::new(70).unwrap();
        assert_eq!(p.implied_complement(), 30);
    }

    #[test]
    fn price_notional_is_exact() {
        let p = Price::new(60).unwrap();
        assert_eq!(p.notional(Shares::new(10)), Cents::new(600));
    }

    #[test]
    fn market_bound_sides() {
        assert_eq!(Price::market_bound(true).cents(), 99);
        assert_eq!(Price::market_bound(false).cents(), 1);
    }
}
