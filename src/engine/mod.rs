// meridian_core/src/engine/mod.rs
//
// MarketEngine — one market's order book, position ledger, and order
// table, owned exclusively by that market's matcher thread (§2.4, §5).
// This module wires together intake validation & reservation (§4.4),
// settlement (§4.5), and mint/redeem (§4.6); the matching algorithm
// itself (DIRECT/MINT/MERGE, §4.3) lives in `crate::matching` as a
// second `impl MarketEngine` block, split out because it is the
// largest single piece of logic in the system and deserves its own file
// the way the teacher keeps its matching loop in its own module.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, info, instrument, warn};

use crate::book::OrderBook;
use crate::error::EngineError;
use crate::ledger::{GlobalLedger, MarketLedger};
use crate::types::ids::{MarketId, OrderId, TradeId, UserId};
use crate::types::market::{Market, MarketStatus, Resolution};
use crate::types::money::{Cents, Price, Shares};
use crate::types::order::{Order, OrderStatus, OrderType};
use crate::types::position::Position;
use crate::types::side::{Contract, Side};
use crate::types::trade::Trade;
use crate::types::transaction::TransactionType;

/// Bound on the in-memory recent-trades ring buffer (§4.7/§6 — "recent
/// trades ... are bounded in-memory ring buffers per market, since no
/// external time-series store exists at this layer").
pub const RECENT_TRADES_CAPACITY: usize = 1_024;

/// Process-wide monotonic allocators for `OrderId`/`TradeId`, shared
/// across every market's `MarketEngine` so ids stay globally unique
/// even though each market's book is otherwise independent (§5).
#[derive(Debug, Default)]
pub struct IdAllocator {
    next_order_id: AtomicU64,
    next_trade_id: AtomicU64,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self {
            next_order_id: AtomicU64::new(1),
            next_trade_id: AtomicU64::new(1),
        }
    }

    pub fn next_order_id(&self) -> OrderId {
        OrderId(self.next_order_id.fetch_add(1, Ordering::Relaxed))
    }

    pub fn next_trade_id(&self) -> TradeId {
        TradeId(self.next_trade_id.fetch_add(1, Ordering::Relaxed))
    }
}

/// The result of a successful `place_order` call (§6).
#[derive(Debug, Clone)]
pub struct PlaceOrderOutcome {
    pub order: Order,
    /// Trades that matched synchronously within this one call (§9: the
    /// caller observes the rest via subsequent reads).
    pub fills: Vec<Trade>,
}

/// The result of a successful `cancel_order` call (§6).
#[derive(Debug, Clone)]
pub struct CancelOutcome {
    pub order: Order,
    pub refunded_cents: Cents,
    pub refunded_shares: Shares,
}

/// The result of `settle_market` (§4.5).
#[derive(Debug, Clone)]
pub struct SettlementOutcome {
    pub resolution: Resolution,
    pub cancelled_orders: Vec<OrderId>,
    pub total_paid: Cents,
    pub positions_settled: usize,
}

pub struct MarketEngine {
    pub market: Market,
    pub(crate) book: OrderBook,
    pub(crate) positions: MarketLedger,
    pub(crate) orders: HashMap<OrderId, Order>,
    recent_trades: VecDeque<Trade>,
}

impl MarketEngine {
    pub fn new(id: MarketId) -> Self {
        Self {
            market: Market::new(id),
            book: OrderBook::new(),
            positions: MarketLedger::new(),
            orders: HashMap::new(),
            recent_trades: VecDeque::with_capacity(RECENT_TRADES_CAPACITY),
        }
    }

    pub(crate) fn push_trade(&mut self, trade: Trade) {
        if self.recent_trades.len() == RECENT_TRADES_CAPACITY {
            self.recent_trades.pop_front();
        }
        self.recent_trades.push_back(trade);
    }

    pub fn recent_trades(&self, limit: usize) -> Vec<Trade> {
        self.recent_trades.iter().rev().take(limit).cloned().collect()
    }

    pub fn order(&self, id: OrderId) -> Option<&Order> {
        self.orders.get(&id)
    }

    pub fn position(&self, user: UserId) -> Option<&Position> {
        self.positions.position(user)
    }

    pub fn all_positions(&self) -> impl Iterator<Item = &Position> {
        self.positions.all_positions()
    }

    pub fn best_bid(&self, contract: Contract) -> Option<u8> {
        self.book.best_bid(contract)
    }

    pub fn best_ask(&self, contract: Contract) -> Option<u8> {
        self.book.best_ask(contract)
    }

    pub fn l2_snapshot(&self, contract: Contract, side: Side) -> Vec<(u8, usize)> {
        self.book.l2_snapshot(contract, side)
    }

    fn require_active(&self) -> Result<(), EngineError> {
        if !self.market.is_trading_active() {
            return Err(EngineError::MarketNotActive(self.market.id));
        }
        Ok(())
    }

    /// §4.4 Order Intake.
    #[instrument(skip(self, global, ids), fields(market_id = %self.market.id))]
    pub fn place_order(
        &mut self,
        global: &GlobalLedger,
        ids: &IdAllocator,
        user: UserId,
        side: Side,
        contract: Contract,
        order_type: OrderType,
        limit_price: Option<u8>,
        quantity: Shares,
        max_order_quantity: u64,
    ) -> Result<PlaceOrderOutcome, EngineError> {
        self.require_active()?;

        if quantity.is_zero() {
            return Err(EngineError::InvalidQuantity);
        }
        if quantity.raw() > max_order_quantity {
            return Err(EngineError::QuantityExceedsRiskLimit {
                requested: quantity.raw(),
                max: max_order_quantity,
            });
        }

        let price = match order_type {
            OrderType::Limit => {
                let cents = limit_price.ok_or(EngineError::InvalidPrice)?;
                Price::new(cents).ok_or(EngineError::InvalidPrice)?
            }
            OrderType::Market => Price::market_bound(side.is_buy()),
        };

        // Reservation (§4.4 steps 2-3): BUY reserves cents at `price`
        // (the aggressive bound for MARKET, §4.3's reservation ceiling);
        // SELL reserves shares of `contract`.
        match side {
            Side::Buy => {
                let required = price.notional(quantity);
                global.reserve_funds(user, self.market.id, required)?;
            }
            Side::Sell => {
                self.positions.reserve_shares(user, self.market.id, contract, quantity)?;
            }
        }

        let created_at = self.market.tick();
        let order_id = ids.next_order_id();
        let mut order = Order {
            id: order_id,
            user,
            market: self.market.id,
            side,
            contract,
            order_type,
            limit_price: match order_type {
                OrderType::Limit => Some(price),
                OrderType::Market => None,
            },
            quantity,
            filled_quantity: Shares::ZERO,
            status: OrderStatus::Open,
            created_at,
        };

        info!(order_id = %order.id, %side, %contract, price = price.cents(), qty = quantity.raw(), "order accepted");

        let fills = self.match_incoming(global, ids, &mut order);

        match order.order_type {
            OrderType::Limit => {
                if !order.remaining().is_zero() {
                    self.book.insert(contract, side, price.cents(), order_id, order.remaining());
                }
            }
            OrderType::Market => {
                // Never rests: refund whatever of the reservation ceiling
                // the matcher didn't use (§4.3 "Market orders").
                if !order.remaining().is_zero() {
                    order.status = OrderStatus::Cancelled;
                    self.refund_unfilled(global, &order);
                    debug!(order_id = %order.id, remaining = order.remaining().raw(), "market order remainder cancelled");
                }
            }
        }

        self.orders.insert(order_id, order.clone());
        Ok(PlaceOrderOutcome { order, fills })
    }

    /// Release whatever portion of an order's reservation its unfilled
    /// remainder still holds (used for MARKET-order sweep-up and for
    /// explicit cancel, §4.4/§4.3).
    fn refund_unfilled(&mut self, global: &GlobalLedger, order: &Order) {
        let remaining = order.remaining();
        if remaining.is_zero() {
            return;
        }
        match order.side {
            Side::Buy => {
                let price = order.effective_price();
                global.release_funds(order.user, self.market.id, price.notional(remaining));
            }
            Side::Sell => {
                self.positions.release_shares(order.user, self.market.id, order.contract, remaining);
            }
        }
    }

    /// §4.4 Cancel.
    #[instrument(skip(self, global), fields(market_id = %self.market.id))]
    pub fn cancel_order(&mut self, global: &GlobalLedger, user: UserId, order_id: OrderId) -> Result<CancelOutcome, EngineError> {
        let order = self.orders.get(&order_id).ok_or(EngineError::OrderNotFound(order_id))?;
        if order.user != user {
            return Err(EngineError::NotOrderOwner { who: user, order: order_id });
        }
        if order.status.is_terminal() {
            return Err(EngineError::OrderNotCancellable(order_id));
        }
        // A MARKET order is never observably resting (§9 Open Question):
        // by the time a caller could issue a cancel, place_order already
        // ran it to completion synchronously.
        if order.order_type == OrderType::Market {
            return Err(EngineError::OrderNotCancellable(order_id));
        }

        let mut order = order.clone();
        let price = order.effective_price();
        self.book.remove(order.contract, order.side, price.cents(), order_id, order.remaining());

        let remaining = order.remaining();
        self.refund_unfilled(global, &order);
        order.cancel();
        self.orders.insert(order_id, order.clone());

        let (refunded_cents, refunded_shares) = match order.side {
            Side::Buy => (price.notional(remaining), Shares::ZERO),
            Side::Sell => (Cents::ZERO, remaining),
        };

        info!(order_id = %order.id, "order cancelled");
        Ok(CancelOutcome { order, refunded_cents, refunded_shares })
    }

    /// §4.6 Mint: bypasses the book entirely.
    #[instrument(skip(self, global, ids), fields(market_id = %self.market.id))]
    pub fn mint_set(&mut self, global: &GlobalLedger, ids: &IdAllocator, user: UserId, quantity: Shares) -> Result<Trade, EngineError> {
        self.require_active()?;
        if quantity.is_zero() {
            return Err(EngineError::InvalidQuantity);
        }
        let cost = Cents::new(quantity.raw() as i64 * 100);
        global.reserve_funds(user, self.market.id, cost)?;
        let trade_id = ids.next_trade_id();
        global.consume_funds_as(user, self.market.id, cost, trade_id, TransactionType::Mint, format!("mint {quantity} sets"));
        // $1.00/set cost basis split evenly across the two legs (§4.6):
        // crediting the full `cost` to each leg would double the recorded
        // basis against the single payment actually taken above.
        let leg_cost = Cents::new(cost.raw() / 2);
        self.positions.credit_shares_at_cost(user, self.market.id, Contract::Yes, quantity, leg_cost);
        self.positions.credit_shares_at_cost(user, self.market.id, Contract::No, quantity, leg_cost);

        let at = self.market.tick();
        let trade = Trade::mint(trade_id, self.market.id, quantity, OrderId(0), OrderId(0), at);
        self.push_trade(trade.clone());
        info!(user = %user, qty = quantity.raw(), "direct mint");
        Ok(trade)
    }

    /// §4.6 Redeem: bypasses the book entirely.
    #[instrument(skip(self, global, ids), fields(market_id = %self.market.id))]
    pub fn redeem_set(&mut self, global: &GlobalLedger, ids: &IdAllocator, user: UserId, quantity: Shares) -> Result<Trade, EngineError> {
        self.require_active()?;
        if quantity.is_zero() {
            return Err(EngineError::InvalidQuantity);
        }
        {
            let position = self.positions.position(user);
            let (yes_avail, no_avail) = position
                .map(|p| (p.available_qty(Contract::Yes), p.available_qty(Contract::No)))
                .unwrap_or((Shares::ZERO, Shares::ZERO));
            if yes_avail < quantity {
                return Err(EngineError::InsufficientPosition { required: quantity.raw(), available: yes_avail.raw() });
            }
            if no_avail < quantity {
                return Err(EngineError::InsufficientPosition { required: quantity.raw(), available: no_avail.raw() });
            }
        }
        self.positions.consume_shares(user, self.market.id, Contract::Yes, quantity);
        self.positions.consume_shares(user, self.market.id, Contract::No, quantity);
        let payout = Cents::new(quantity.raw() as i64 * 100);
        global.credit_funds(user, Some(self.market.id), payout, TransactionType::Redeem, None, format!("redeem {quantity} sets"));

        let trade_id = ids.next_trade_id();
        let at = self.market.tick();
        let trade = Trade::merge(trade_id, self.market.id, quantity, OrderId(0), OrderId(0), at);
        self.push_trade(trade.clone());
        info!(user = %user, qty = quantity.raw(), "direct redeem");
        Ok(trade)
    }

    /// §4.5 Settlement.
    #[instrument(skip(self, global), fields(market_id = %self.market.id))]
    pub fn settle(&mut self, global: &GlobalLedger, resolution: Resolution) -> Result<SettlementOutcome, EngineError> {
        if self.market.status != MarketStatus::Active {
            return Err(EngineError::MarketAlreadyResolved(self.market.id));
        }

        self.market.status = MarketStatus::Settled;
        self.market.resolution = Some(resolution);

        let cancelled_orders = self.cancel_all_open_orders(global);

        let users: Vec<UserId> = self.positions.all_positions().map(|p| p.user).collect();
        let winning = match resolution {
            Resolution::Yes => Contract::Yes,
            Resolution::No => Contract::No,
        };
        let losing = winning.opposite();

        let mut total_paid = Cents::ZERO;
        let mut positions_settled = 0usize;
        for user in users {
            let qty = self.positions.position(user).map(|p| p.qty(winning)).unwrap_or(Shares::ZERO);
            if !qty.is_zero() {
                self.positions.zero_contract(user, self.market.id, winning);
                let payout = Cents::new(qty.raw() as i64 * 100);
                global.credit_funds(
                    user,
                    Some(self.market.id),
                    payout,
                    TransactionType::SettlementWin,
                    None,
                    format!("settlement win: {qty} {winning}"),
                );
                total_paid += payout;
                positions_settled += 1;
            }
            let losing_qty = self.positions.position(user).map(|p| p.qty(losing)).unwrap_or(Shares::ZERO);
            if !losing_qty.is_zero() {
                self.positions.zero_contract(user, self.market.id, losing);
                global.record_zero(user, Some(self.market.id), TransactionType::SettlementLoss, format!("settlement loss: {losing_qty} {losing}"));
                positions_settled += 1;
            }
        }

        warn!(resolution = ?resolution, paid = %total_paid, "market settled");
        Ok(SettlementOutcome { resolution, cancelled_orders, total_paid, positions_settled })
    }

    /// Rare administrative market cancellation (§4.5): refunds cost basis
    /// of every position and cancels every order, without synthesizing a
    /// resolution.
    #[instrument(skip(self, global), fields(market_id = %self.market.id))]
    pub fn cancel_market(&mut self, global: &GlobalLedger) -> Result<(), EngineError> {
        if self.market.status != MarketStatus::Active {
            return Err(EngineError::MarketAlreadyResolved(self.market.id));
        }
        self.market.status = MarketStatus::Cancelled;
        self.cancel_all_open_orders(global);

        let users: Vec<UserId> = self.positions.all_positions().map(|p| p.user).collect();
        for user in users {
            let (yes_basis, no_basis) = self
                .positions
                .position(user)
                .map(|p| (p.cost_basis(Contract::Yes), p.cost_basis(Contract::No)))
                .unwrap_or((Cents::ZERO, Cents::ZERO));
            self.positions.zero_contract(user, self.market.id, Contract::Yes);
            self.positions.zero_contract(user, self.market.id, Contract::No);
            if yes_basis != Cents::ZERO {
                global.credit_funds(user, Some(self.market.id), yes_basis, TransactionType::Refund, None, "market cancelled: YES cost basis refund");
            }
            if no_basis != Cents::ZERO {
                global.credit_funds(user, Some(self.market.id), no_basis, TransactionType::Refund, None, "market cancelled: NO cost basis refund");
            }
        }
        warn!("market cancelled administratively");
        Ok(())
    }

    fn cancel_all_open_orders(&mut self, global: &GlobalLedger) -> Vec<OrderId> {
        let open: Vec<OrderId> = self
            .orders
            .values()
            .filter(|o| !o.status.is_terminal())
            .map(|o| o.id)
            .collect();
        let mut cancelled = Vec::with_capacity(open.len());
        for id in open {
            let mut order = self.orders.get(&id).expect("just collected").clone();
            let price = order.effective_price();
            self.book.remove(order.contract, order.side, price.cents(), id, order.remaining());
            self.refund_unfilled(global, &order);
            order.cancel();
            self.orders.insert(id, order);
            cancelled.push(id);
        }
        cancelled
    }
}
