// meridian_core/src/types/position.rs
//
// A (user, market) position row (§3): share counts for both contracts,
// their reservations, and their running cost basis.

use crate::types::ids::{MarketId, UserId};
use crate::types::money::{Cents, Shares};
use crate::types::side::Contract;

#[derive(Debug, Clone)]
pub struct Position {
    pub user: UserId,
    pub market: MarketId,
    pub yes_qty: Shares,
    pub no_qty: Shares,
    pub reserved_yes_qty: Shares,
    pub reserved_no_qty: Shares,
    pub yes_cost_basis: Cents,
    pub no_cost_basis: Cents,
}

impl Position {
    pub fn new(user: UserId, market: MarketId) -> Self {
        Self {
            user,
            market,
            yes_qty: Shares::ZERO,
            no_qty: Shares::ZERO,
            reserved_yes_qty: Shares::ZERO,
            reserved_no_qty: Shares::ZERO,
            yes_cost_basis: Cents::ZERO,
            no_cost_basis: Cents::ZERO,
        }
    }

    pub fn qty(&self, contract: Contract) -> Shares {
        match contract {
            Contract::Yes => self.yes_qty,
            Contract::No => self.no_qty,
        }
    }

    pub fn reserved_qty(&self, contract: Contract) -> Shares {
        match contract {
            Contract::Yes => self.reserved_yes_qty,
            Contract::No => self.reserved_no_qty,
        }
    }

    /// Shares of `contract` not already earmarked for a resting sell order.
    pub fn available_qty(&self, contract: Contract) -> Shares {
        self.qty(contract)
            .checked_sub(self.reserved_qty(contract))
            .unwrap_or(Shares::ZERO)
    }

    pub fn cost_basis(&self, contract: Contract) -> Cents {
        match contract {
            Contract::Yes => self.yes_cost_basis,
            Contract::No => self.no_cost_basis,
        }
    }
}
