// meridian_core/src/types/order.rs
//
// The Order entity and its lifecycle (§3, §4.3 state machine).
//
// Polymorphic order subtypes (LIMIT vs MARKET) are a tagged field on one
// struct rather than a class hierarchy — MINT_SET/REDEEM_SET are deliberately
// not represented here at all, since they never enter the book (§4.6, §9).

use std::fmt;

use crate::types::ids::{MarketId, OrderId, UserId};
use crate::types::money::{Price, Shares};
use crate::types::side::{Contract, Side};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum OrderType {
    Limit,
    Market,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderStatus {
    Open,
    PartiallyFilled,
    Filled,
    Cancelled,
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Filled | OrderStatus::Cancelled)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderStatus::Open => write!(f, "OPEN"),
            OrderStatus::PartiallyFilled => write!(f, "PARTIALLY_FILLED"),
            OrderStatus::Filled => write!(f, "FILLED"),
            OrderStatus::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

/// A resting or just-accepted order. `limit_price` is `None` only for a
/// `Market` order's logical identity; reservation math still uses the
/// aggressive bound (`Price::market_bound`) computed by the intake layer
/// and stored separately so a MARKET order's book record (if any,
/// transiently, before match) always carries a concrete price.
#[derive(Debug, Clone)]
pub struct Order {
    pub id: OrderId,
    pub user: UserId,
    pub market: MarketId,
    pub side: Side,
    pub contract: Contract,
    pub order_type: OrderType,
    pub limit_price: Option<Price>,
    pub quantity: Shares,
    pub filled_quantity: Shares,
    pub status: OrderStatus,
    /// Assigned by the matcher at the moment the order enters the book;
    /// monotonic per market (§5). Request-time creation is not used for
    /// ordering, only this field is.
    pub created_at: u64,
}

impl Order {
    pub fn remaining(&self) -> Shares {
        self.quantity
            .checked_sub(self.filled_quantity)
            .unwrap_or(Shares::ZERO)
    }

    pub fn is_buy(&self) -> bool {
        self.side.is_buy()
    }

    /// Record a fill of `qty` against this order, transitioning its status.
    /// Panics if `qty` would overfill — a caller bug, not a runtime
    /// condition, so this is an assertion rather than a `Result`.
    pub fn apply_fill(&mut self, qty: Shares) {
        self.filled_quantity += qty;
        assert!(
            self.filled_quantity <= self.quantity,
            "fill exceeds order quantity"
        );
        self.status = if self.filled_quantity == self.quantity {
            OrderStatus::Filled
        } else {
            OrderStatus::PartiallyFilled
        };
    }

    /// Transition to CANCELLED. Only valid from a non-terminal state;
    /// the caller (cancel/settlement path) is responsible for checking
    /// `status.is_terminal()` before calling this.
    pub fn cancel(&mut self) {
        debug_assert!(!self.status.is_terminal());
        self.status = OrderStatus::Cancelled;
    }

    /// The price used for reservation and for DIRECT-match comparisons:
    /// the limit price for a LIMIT order, or the aggressive bound for a
    /// MARKET order.
    pub fn effective_price(&self) -> Price {
        match self.limit_price {
            Some(p) => p,
            None => Price::market_bound(self.is_buy()),
        }
    }
}
