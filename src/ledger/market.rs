// meridian_core/src/ledger/market.rs
//
// MarketLedger — the `Position` rows for exactly one market (§3, §4.1).
// Unlike `GlobalLedger`, this has exactly one legitimate writer: the
// matcher thread that owns this market (§5). It needs no internal
// locking at all — the "transactional context" §4.1 asks for is simply
// every primitive call made while processing one `EngineEvent` on that
// one thread.

use std::collections::HashMap;

use crate::error::EngineError;
use crate::types::ids::UserId;
use crate::types::money::{Cents, Price, Shares};
use crate::types::position::Position;
use crate::types::side::Contract;

/// The slice of `basis` attributable to `consumed` of `held` shares,
/// rounded down. `held` is the quantity on hand before the consume, so
/// this is exact on a full consume and a conservative (basis-retaining)
/// approximation on a partial one.
fn proportional_basis(basis: Cents, held: Shares, consumed: Shares) -> Cents {
    if held.is_zero() {
        return Cents::ZERO;
    }
    Cents::new(basis.raw() * consumed.raw() as i64 / held.raw() as i64)
}

pub struct MarketLedger {
    positions: HashMap<UserId, Position>,
}

impl MarketLedger {
    pub fn new() -> Self {
        Self {
            positions: HashMap::new(),
        }
    }

    fn entry(&mut self, user: UserId, market: crate::types::ids::MarketId) -> &mut Position {
        self.positions
            .entry(user)
            .or_insert_with(|| Position::new(user, market))
    }

    pub fn position(&self, user: UserId) -> Option<&Position> {
        self.positions.get(&user)
    }

    pub fn position_mut(&mut self, user: UserId) -> Option<&mut Position> {
        self.positions.get_mut(&user)
    }

    /// All positions with a non-zero share count, for settlement sweeps
    /// (§4.5) and property tests (§8).
    pub fn all_positions(&self) -> impl Iterator<Item = &Position> {
        self.positions.values()
    }

    /// Earmark `qty` shares of `contract` against a resting SELL order.
    pub fn reserve_shares(
        &mut self,
        user: UserId,
        market: crate::types::ids::MarketId,
        contract: Contract,
        qty: Shares,
    ) -> Result<(), EngineError> {
        let position = self.entry(user, market);
        if position.available_qty(contract) < qty {
            return Err(EngineError::InsufficientPosition {
                required: qty.raw(),
                available: position.available_qty(contract).raw(),
            });
        }
        match contract {
            Contract::Yes => position.reserved_yes_qty += qty,
            Contract::No => position.reserved_no_qty += qty,
        }
        Ok(())
    }

    /// Release a share reservation without settling it (cancel/expire).
    pub fn release_shares(
        &mut self,
        user: UserId,
        market: crate::types::ids::MarketId,
        contract: Contract,
        qty: Shares,
    ) {
        let position = self.entry(user, market);
        match contract {
            Contract::Yes => {
                position.reserved_yes_qty = position.reserved_yes_qty.checked_sub(qty).unwrap_or(Shares::ZERO)
            }
            Contract::No => {
                position.reserved_no_qty = position.reserved_no_qty.checked_sub(qty).unwrap_or(Shares::ZERO)
            }
        }
    }

    /// Destroy `qty` shares on a sell-side fill, consuming the matching
    /// reservation at the same time and retiring a proportional share of
    /// the accumulated cost basis, so a later partial redeem/merge/sell
    /// doesn't leave the basis overstated against the shares still held.
    pub fn consume_shares(
        &mut self,
        user: UserId,
        market: crate::types::ids::MarketId,
        contract: Contract,
        qty: Shares,
    ) {
        let position = self.entry(user, market);
        match contract {
            Contract::Yes => {
                let retired = proportional_basis(position.yes_cost_basis, position.yes_qty, qty);
                position.yes_qty = position.yes_qty.checked_sub(qty).unwrap_or(Shares::ZERO);
                position.reserved_yes_qty =
                    position.reserved_yes_qty.checked_sub(qty).unwrap_or(Shares::ZERO);
                position.yes_cost_basis = position.yes_cost_basis.checked_sub(retired).unwrap_or(Cents::ZERO);
            }
            Contract::No => {
                let retired = proportional_basis(position.no_cost_basis, position.no_qty, qty);
                position.no_qty = position.no_qty.checked_sub(qty).unwrap_or(Shares::ZERO);
                position.reserved_no_qty =
                    position.reserved_no_qty.checked_sub(qty).unwrap_or(Shares::ZERO);
                position.no_cost_basis = position.no_cost_basis.checked_sub(retired).unwrap_or(Cents::ZERO);
            }
        }
    }

    /// Credit `qty` shares on a buy-side fill, mint, or mint-match,
    /// accumulating cost basis at `price` per share (§4.1).
    pub fn credit_shares(
        &mut self,
        user: UserId,
        market: crate::types::ids::MarketId,
        contract: Contract,
        qty: Shares,
        price: Price,
    ) {
        let position = self.entry(user, market);
        let cost = price.notional(qty);
        match contract {
            Contract::Yes => {
                position.yes_qty += qty;
                position.yes_cost_basis += cost;
            }
            Contract::No => {
                position.no_qty += qty;
                position.no_cost_basis += cost;
            }
        }
    }

    /// Credit `qty` shares at an explicit total cost rather than a
    /// per-share `Price` — used by direct mint (§4.6), where the cost is
    /// a flat $1.00/share split across both legs and so falls outside
    /// the `[1, 99]` range `Price` enforces for order-book prices.
    pub fn credit_shares_at_cost(
        &mut self,
        user: UserId,
        market: crate::types::ids::MarketId,
        contract: Contract,
        qty: Shares,
        cost: Cents,
    ) {
        let position = self.entry(user, market);
        match contract {
            Contract::Yes => {
                position.yes_qty += qty;
                position.yes_cost_basis += cost;
            }
            Contract::No => {
                position.no_qty += qty;
                position.no_cost_basis += cost;
            }
        }
    }

    /// Zero out the winning or losing side of a position at settlement
    /// (§4.5), returning the quantity that was zeroed so the caller can
    /// compute the payout/loss amount and ledger entry.
    pub fn zero_contract(
        &mut self,
        user: UserId,
        market: crate::types::ids::MarketId,
        contract: Contract,
    ) -> Shares {
        let position = self.entry(user, market);
        match contract {
            Contract::Yes => {
                let qty = position.yes_qty;
                position.yes_qty = Shares::ZERO;
                position.reserved_yes_qty = Shares::ZERO;
                position.yes_cost_basis = Cents::ZERO;
                qty
            }
            Contract::No => {
                let qty = position.no_qty;
                position.no_qty = Shares::ZERO;
                position.reserved_no_qty = Shares::ZERO;
                position.no_cost_basis = Cents::ZERO;
                qty
            }
        }
    }
}

impl Default for MarketLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ids::MarketId;

    #[test]
    fn reserve_shares_rejects_over_available() {
        let mut l = MarketLedger::new();
        let u = UserId(1);
        let m = MarketId(1);
        l.credit_shares(u, m, Contract::Yes, Shares::new(5), Price::new(60).unwrap());
        let err = l.reserve_shares(u, m, Contract::Yes, Shares::new(10)).unwrap_err();
        assert_eq!(
            err,
            EngineError::InsufficientPosition { required: 10, available: 5 }
        );
    }

    #[test]
    fn consume_shares_clears_reservation_too() {
        let mut l = MarketLedger::new();
        let u = UserId(1);
        let m = MarketId(1);
        l.credit_shares(u, m, Contract::Yes, Shares::new(10), Price::new(60).unwrap());
        l.reserve_shares(u, m, Contract::Yes, Shares::new(10)).unwrap();
        l.consume_shares(u, m, Contract::Yes, Shares::new(4));
        let p = l.position(u).unwrap();
        assert_eq!(p.yes_qty, Shares::new(6));
        assert_eq!(p.reserved_yes_qty, Shares::new(6));
        // 4 of the 10 shares (basis 600) were consumed: 240 of the basis
        // retires with them, leaving 360 against the 6 still held.
        assert_eq!(p.yes_cost_basis, Cents::new(360));
    }

    #[test]
    fn consume_shares_fully_zeroes_cost_basis() {
        let mut l = MarketLedger::new();
        let u = UserId(1);
        let m = MarketId(1);
        l.credit_shares(u, m, Contract::No, Shares::new(5), Price::new(40).unwrap());
        l.consume_shares(u, m, Contract::No, Shares::new(5));
        let p = l.position(u).unwrap();
        assert_eq!(p.no_qty, Shares::ZERO);
        assert_eq!(p.no_cost_basis, Cents::ZERO);
    }

    #[test]
    fn zero_contract_clears_qty_reservation_and_basis() {
        let mut l = MarketLedger::new();
        let u = UserId(1);
        let m = MarketId(1);
        l.credit_shares(u, m, Contract::No, Shares::new(3), Price::new(40).unwrap());
        let zeroed = l.zero_contract(u, m, Contract::No);
        assert_eq!(zeroed, Shares::new(3));
        let p = l.position(u).unwrap();
        assert_eq!(p.no_qty, Shares::ZERO);
        assert_eq!(p.no_cost_basis, Cents::ZERO);
    }
}
