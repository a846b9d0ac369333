// meridian_core/src/types/market.rs
//
// The Market entity (§3) and its status/resolution lifecycle. A market
// starts ACTIVE and moves to exactly one terminal state, SETTLED (via
// `settle_market`) or CANCELLED (via the rare administrative
// `cancel_market`) — never both, never back to ACTIVE.

use crate::types::ids::MarketId;
use crate::types::money::Price;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MarketStatus {
    Active,
    Settled,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Resolution {
    Yes,
    No,
}

#[derive(Debug, Clone)]
pub struct Market {
    pub id: MarketId,
    pub status: MarketStatus,
    pub resolution: Option<Resolution>,
    pub last_yes_price: Option<Price>,
    pub last_no_price: Option<Price>,
    /// Monotonic per-market clock driving `Order::created_at` (§5):
    /// advanced only by the matcher thread that owns this market.
    pub clock: u64,
}

impl Market {
    pub fn new(id: MarketId) -> Self {
        Self {
            id,
            status: MarketStatus::Active,
            resolution: None,
            last_yes_price: None,
            last_no_price: None,
            clock: 0,
        }
    }

    pub fn is_trading_active(&self) -> bool {
        matches!(self.status, MarketStatus::Active)
    }

    /// Advance the per-market logical clock. The returned value becomes
    /// the authoritative `created_at` timestamp for the next order the
    /// matcher accepts (§5 — request-time timestamps are only a
    /// tiebreaker, never authoritative).
    pub fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_market_is_active_with_no_resolution() {
        let m = Market::new(MarketId(1));
        assert!(m.is_trading_active());
        assert_eq!(m.resolution, None);
    }

    #[test]
    fn tick_is_monotonic() {
        let mut m = Market::new(MarketId(1));
        assert_eq!(m.tick(), 1);
        assert_eq!(m.tick(), 2);
        assert_eq!(m.tick(), 3);
    }
}
