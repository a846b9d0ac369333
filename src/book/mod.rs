// meridian_core/src/book/mod.rs
//
// The Order Book (§4.2): four price-sorted queues per market — YES-bids,
// YES-asks, NO-bids, NO-asks. Each queue is a `BTreeMap<price, FIFO of
// OrderId>` plus a running aggregate quantity, the same shape the
// teacher's single-instrument book uses (`asks.levels` / `asks.total_qty`
// walked via `BTreeMap` keys), generalized to four queues instead of one
// bid/ask pair and storing `OrderId`s rather than whole `Order` structs —
// the authoritative, mutable `Order` rows live in the matching engine's
// order table (one writer, the matcher thread), so the book only needs
// to remember *which ids rest, in what order, at what price*.
//
// A price level is removed from its map the instant its queue drains, so
// "a price level with zero aggregate quantity must not appear" (§4.2)
// holds without a separate sweep.

use std::collections::{BTreeMap, VecDeque};

use crate::types::ids::OrderId;
use crate::types::money::Shares;
use crate::types::side::{Contract, Side};

/// One side of one contract's book: e.g. "YES bids".
#[derive(Debug, Default)]
struct PriceLevels {
    levels: BTreeMap<u8, VecDeque<OrderId>>,
    total_qty: Shares,
}

impl PriceLevels {
    fn push(&mut self, price: u8, order: OrderId, qty: Shares) {
        self.levels.entry(price).or_default().push_back(order);
        self.total_qty += qty;
    }

    /// Remove a specific order from its price level (cancel path, or a
    /// fully-filled resting order). No-ops if the order isn't present.
    fn remove(&mut self, price: u8, order: OrderId, qty: Shares) {
        if let Some(queue) = self.levels.get_mut(&price) {
            if let Some(pos) = queue.iter().position(|id| *id == order) {
                queue.remove(pos);
            }
            if queue.is_empty() {
                self.levels.remove(&price);
            }
        }
        self.total_qty = self.total_qty.checked_sub(qty).unwrap_or(Shares::ZERO);
    }

    /// Pop the fully-filled order at the front of `price`'s queue.
    fn pop_front(&mut self, price: u8) -> Option<OrderId> {
        let (empty, popped) = {
            let queue = self.levels.get_mut(&price)?;
            let popped = queue.pop_front();
            (queue.is_empty(), popped)
        };
        if empty {
            self.levels.remove(&price);
        }
        popped
    }

    fn front(&self, price: u8) -> Option<OrderId> {
        self.levels.get(&price).and_then(|q| q.front().copied())
    }

    fn best_bid_price(&self) -> Option<u8> {
        self.levels.keys().next_back().copied()
    }

    fn best_ask_price(&self) -> Option<u8> {
        self.levels.keys().next().copied()
    }

    /// Price levels in bid priority order: highest price first.
    fn prices_bid_first(&self) -> Vec<u8> {
        self.levels.keys().rev().copied().collect()
    }

    /// Price levels in ask priority order: lowest price first.
    fn prices_ask_first(&self) -> Vec<u8> {
        self.levels.keys().copied().collect()
    }

    fn l2(&self) -> Vec<(u8, usize)> {
        self.levels.iter().map(|(p, q)| (*p, q.len())).collect()
    }
}

/// The four queues for one market.
#[derive(Debug, Default)]
pub struct OrderBook {
    yes_bids: PriceLevels,
    yes_asks: PriceLevels,
    no_bids: PriceLevels,
    no_asks: PriceLevels,
}

impl OrderBook {
    pub fn new() -> Self {
        Self::default()
    }

    fn side_mut(&mut self, contract: Contract, side: Side) -> &mut PriceLevels {
        match (contract, side) {
            (Contract::Yes, Side::Buy) => &mut self.yes_bids,
            (Contract::Yes, Side::Sell) => &mut self.yes_asks,
            (Contract::No, Side::Buy) => &mut self.no_bids,
            (Contract::No, Side::Sell) => &mut self.no_asks,
        }
    }

    fn side(&self, contract: Contract, side: Side) -> &PriceLevels {
        match (contract, side) {
            (Contract::Yes, Side::Buy) => &self.yes_bids,
            (Contract::Yes, Side::Sell) => &self.yes_asks,
            (Contract::No, Side::Buy) => &self.no_bids,
            (Contract::No, Side::Sell) => &self.no_asks,
        }
    }

    pub fn insert(&mut self, contract: Contract, side: Side, price: u8, order: OrderId, qty: Shares) {
        self.side_mut(contract, side).push(price, order, qty);
    }

    pub fn remove(&mut self, contract: Contract, side: Side, price: u8, order: OrderId, qty: Shares) {
        self.side_mut(contract, side).remove(price, order, qty);
    }

    pub fn pop_front(&mut self, contract: Contract, side: Side, price: u8) -> Option<OrderId> {
        self.side_mut(contract, side).pop_front(price)
    }

    pub fn front(&self, contract: Contract, side: Side, price: u8) -> Option<OrderId> {
        self.side(contract, side).front(price)
    }

    /// Best (highest) resting bid price for `contract`, O(1) via the
    /// `BTreeMap`'s cached max.
    pub fn best_bid(&self, contract: Contract) -> Option<u8> {
        self.side(contract, Side::Buy).best_bid_price()
    }

    /// Best (lowest) resting ask price for `contract`.
    pub fn best_ask(&self, contract: Contract) -> Option<u8> {
        self.side(contract, Side::Sell).best_ask_price()
    }

    /// Price levels to sweep for a DIRECT match against `contract`'s
    /// opposite side, in priority order (best price first).
    pub fn sweep_prices(&self, contract: Contract, resting_side: Side) -> Vec<u8> {
        match resting_side {
            Side::Sell => self.side(contract, Side::Sell).prices_ask_first(),
            Side::Buy => self.side(contract, Side::Buy).prices_bid_first(),
        }
    }

    pub fn total_qty(&self, contract: Contract, side: Side) -> Shares {
        self.side(contract, side).total_qty
    }

    pub fn l2_snapshot(&self, contract: Contract, side: Side) -> Vec<(u8, usize)> {
        self.side(contract, side).l2()
    }

    /// Read-only snapshot of one price level's FIFO order, for self-trade
    /// scanning (§4.3.A) that needs to look past the front entry without
    /// taking a mutable borrow of the whole book.
    pub fn level_ids(&self, contract: Contract, side: Side, price: u8) -> Option<Vec<OrderId>> {
        self.side(contract, side).levels.get(&price).map(|q| q.iter().copied().collect())
    }

    /// Remove one specific resting order from its level without touching
    /// the aggregate quantity — the matching engine reduces `total_qty`
    /// itself via `reduce_total_qty` as it applies each fill, whether or
    /// not the resting order drains completely.
    pub fn remove_specific(&mut self, contract: Contract, side: Side, price: u8, order: OrderId) {
        let levels = self.side_mut(contract, side);
        if let Some(queue) = levels.levels.get_mut(&price) {
            if let Some(pos) = queue.iter().position(|id| *id == order) {
                queue.remove(pos);
            }
            if queue.is_empty() {
                levels.levels.remove(&price);
            }
        }
    }

    pub fn drop_level_if_empty(&mut self, contract: Contract, side: Side, price: u8) {
        let levels = self.side_mut(contract, side);
        if levels.levels.get(&price).is_some_and(|q| q.is_empty()) {
            levels.levels.remove(&price);
        }
    }

    pub fn reduce_total_qty(&mut self, contract: Contract, side: Side, qty: Shares) {
        let levels = self.side_mut(contract, side);
        levels.total_qty = levels.total_qty.checked_sub(qty).unwrap_or(Shares::ZERO);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn best_bid_is_max_price() {
        let mut b = OrderBook::new();
        b.insert(Contract::Yes, Side::Buy, 40, OrderId(1), Shares::new(10));
        b.insert(Contract::Yes, Side::Buy, 60, OrderId(2), Shares::new(10));
        assert_eq!(b.best_bid(Contract::Yes), Some(60));
    }

    #[test]
    fn best_ask_is_min_price() {
        let mut b = OrderBook::new();
        b.insert(Contract::Yes, Side::Sell, 70, OrderId(1), Shares::new(10));
        b.insert(Contract::Yes, Side::Sell, 55, OrderId(2), Shares::new(10));
        assert_eq!(b.best_ask(Contract::Yes), Some(55));
    }

    #[test]
    fn draining_a_level_removes_it() {
        let mut b = OrderBook::new();
        b.insert(Contract::Yes, Side::Sell, 55, OrderId(1), Shares::new(10));
        assert_eq!(b.pop_front(Contract::Yes, Side::Sell, 55), Some(OrderId(1)));
        assert_eq!(b.best_ask(Contract::Yes), None);
    }

    #[test]
    fn fifo_within_a_price_level() {
        let mut b = OrderBook::new();
        b.insert(Contract::Yes, Side::Sell, 50, OrderId(1), Shares::new(10));
        b.insert(Contract::Yes, Side::Sell, 50, OrderId(2), Shares::new(10));
        assert_eq!(b.front(Contract::Yes, Side::Sell, 50), Some(OrderId(1)));
        b.pop_front(Contract::Yes, Side::Sell, 50);
        assert_eq!(b.front(Contract::Yes, Side::Sell, 50), Some(OrderId(2)));
    }

    #[test]
    fn sweep_prices_orders_asks_ascending_and_bids_descending() {
        let mut b = OrderBook::new();
        b.insert(Contract::Yes, Side::Sell, 60, OrderId(1), Shares::new(1));
        b.insert(Contract::Yes, Side::Sell, 50, OrderId(2), Shares::new(1));
        assert_eq!(b.sweep_prices(Contract::Yes, Side::Sell), vec![50, 60]);

        b.insert(Contract::No, Side::Buy, 30, OrderId(3), Shares::new(1));
        b.insert(Contract::No, Side::Buy, 45, OrderId(4), Shares::new(1));
        assert_eq!(b.sweep_prices(Contract::No, Side::Buy), vec![45, 30]);
    }
}
