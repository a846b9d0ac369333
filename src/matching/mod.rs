// meridian_core/src/matching/mod.rs
//
// The matching algorithm (§4.3): DIRECT, then MINT (on a BUY) or MERGE
// (on a SELL), in that priority order, against one market's four-way
// book. Split out of `crate::engine` into its own `impl MarketEngine`
// block the way the teacher keeps `match_against_asks`/`match_against_bids`
// out of its order-intake path — this is the hottest loop in the system
// and the one most worth reading in isolation.
//
// Self-trade prevention (§4.3.A) here SKIPS a same-user resting order
// rather than cancelling it: the aggressor walks past it to the next
// resting order at that price level, leaving the skipped order exactly
// where it was. This is a deliberate point of departure from an STP
// style that cancels the resting order on contact.

use tracing::{debug, instrument};

use crate::engine::{IdAllocator, MarketEngine};
use crate::error::EngineFault;
use crate::ledger::GlobalLedger;
use crate::types::ids::{OrderId, TradeId, UserId};
use crate::types::money::{Cents, Price, Shares};
use crate::types::order::Order;
use crate::types::side::{Contract, Side};
use crate::types::trade::Trade;
use crate::types::transaction::TransactionType;

impl MarketEngine {
    /// Entry point called by `place_order` once the incoming order has
    /// been validated and its funds/shares reserved. Returns every trade
    /// produced synchronously against the resting book.
    #[instrument(skip(self, global, ids, order), fields(market_id = %self.market.id, order_id = %order.id))]
    pub(crate) fn match_incoming(
        &mut self,
        global: &GlobalLedger,
        ids: &IdAllocator,
        order: &mut Order,
    ) -> Vec<Trade> {
        let mut trades = Vec::new();

        self.match_direct(global, ids, order, &mut trades);

        // Market orders are DIRECT-only (§4.3 "Market orders"): whatever
        // doesn't fill against the opposite side is cancelled back in
        // `place_order`, never routed into MINT/MERGE.
        if order.order_type == crate::types::order::OrderType::Market {
            return trades;
        }
        if order.remaining().is_zero() {
            return trades;
        }

        match order.side {
            Side::Buy => self.match_mint(global, ids, order, &mut trades),
            Side::Sell => self.match_merge(global, ids, order, &mut trades),
        }

        trades
    }

    /// Phase A: match against the resting opposite side of the same
    /// contract, at crossing prices, best price first.
    fn match_direct(
        &mut self,
        global: &GlobalLedger,
        ids: &IdAllocator,
        order: &mut Order,
        trades: &mut Vec<Trade>,
    ) {
        let contract = order.contract;
        let resting_side = order.side.opposite();
        let limit = order.effective_price().cents();

        for price in self.book.sweep_prices(contract, resting_side) {
            if order.remaining().is_zero() {
                break;
            }
            let crosses = match order.side {
                Side::Buy => price <= limit,
                Side::Sell => price >= limit,
            };
            if !crosses {
                break;
            }
            self.drain_level_direct(global, ids, order, contract, resting_side, price, trades);
            self.book.drop_level_if_empty(contract, resting_side, price);
        }
    }

    /// Phase B (BUY aggressor only): match against resting BUY orders on
    /// the opposite contract whose combined price clears 100 (§4.3 MINT).
    fn match_mint(
        &mut self,
        global: &GlobalLedger,
        ids: &IdAllocator,
        order: &mut Order,
        trades: &mut Vec<Trade>,
    ) {
        let resting_contract = order.contract.opposite();
        let aggressor_price = order.effective_price().cents() as u16;

        for price in self.book.sweep_prices(resting_contract, Side::Buy) {
            if order.remaining().is_zero() {
                break;
            }
            // Sorted highest-first; once the combined price falls short
            // of 100 every lower price does too.
            if aggressor_price + price as u16 < 100 {
                break;
            }
            self.drain_level_mint(global, ids, order, resting_contract, price, trades);
            self.book.drop_level_if_empty(resting_contract, Side::Buy, price);
        }
    }

    /// Phase B (SELL aggressor only): match against resting SELL orders
    /// on the opposite contract whose combined price clears at most 100
    /// (§4.3 MERGE).
    fn match_merge(
        &mut self,
        global: &GlobalLedger,
        ids: &IdAllocator,
        order: &mut Order,
        trades: &mut Vec<Trade>,
    ) {
        let resting_contract = order.contract.opposite();
        let aggressor_price = order.effective_price().cents() as u16;

        for price in self.book.sweep_prices(resting_contract, Side::Sell) {
            if order.remaining().is_zero() {
                break;
            }
            // Sorted lowest-first; once the combined price exceeds 100
            // every higher price does too.
            if aggressor_price + price as u16 > 100 {
                break;
            }
            self.drain_level_merge(global, ids, order, resting_contract, price, trades);
            self.book.drop_level_if_empty(resting_contract, Side::Sell, price);
        }
    }

    /// Walk one price level of the DIRECT-opposite book, applying fills
    /// FIFO and skipping (not cancelling) any resting order owned by the
    /// same user as the aggressor.
    fn drain_level_direct(
        &mut self,
        global: &GlobalLedger,
        ids: &IdAllocator,
        order: &mut Order,
        contract: Contract,
        resting_side: Side,
        price: u8,
        trades: &mut Vec<Trade>,
    ) {
        loop {
            if order.remaining().is_zero() {
                break;
            }
            let resting_id = match self.next_eligible(contract, resting_side, price, order.user) {
                Some(id) => id,
                None => break,
            };
            let (resting_user, resting_remaining, trade_price) = {
                let resting = self.orders.get(&resting_id).expect("book/order table desync");
                (resting.user, resting.remaining(), resting.effective_price())
            };
            let fill_qty = order.remaining().min(resting_remaining);

            order.apply_fill(fill_qty);
            let resting_filled = {
                let resting = self.orders.get_mut(&resting_id).unwrap();
                resting.apply_fill(fill_qty);
                resting.remaining().is_zero()
            };

            let trade_id = ids.next_trade_id();
            let (buyer_order, buyer_user, buyer_reserved, seller_order, seller_user) = match order.side {
                Side::Buy => (order.id, order.user, order.effective_price(), resting_id, resting_user),
                Side::Sell => (resting_id, resting_user, trade_price, order.id, order.user),
            };

            self.settle_buy_leg(
                global,
                buyer_user,
                buyer_reserved,
                trade_price,
                fill_qty,
                trade_id,
                TransactionType::TradeBuy,
                "direct match buy fill",
            );
            self.positions.consume_shares(seller_user, self.market.id, contract, fill_qty);
            global.credit_funds(
                seller_user,
                Some(self.market.id),
                trade_price.notional(fill_qty),
                TransactionType::TradeSell,
                Some(trade_id),
                "direct match sell fill",
            );
            self.positions.credit_shares_at_cost(
                buyer_user,
                self.market.id,
                contract,
                fill_qty,
                trade_price.notional(fill_qty),
            );

            let complement = Price::new(100 - trade_price.cents()).expect("complement of [1,99] is in range");
            match contract {
                Contract::Yes => {
                    self.market.last_yes_price = Some(trade_price);
                    self.market.last_no_price = Some(complement);
                }
                Contract::No => {
                    self.market.last_no_price = Some(trade_price);
                    self.market.last_yes_price = Some(complement);
                }
            }

            let at = self.market.tick();
            let trade = Trade::direct(trade_id, self.market.id, contract, trade_price, fill_qty, buyer_order, seller_order, at);
            self.push_trade(trade.clone());
            trades.push(trade);

            self.book.reduce_total_qty(contract, resting_side, fill_qty);
            if resting_filled {
                self.book.remove_specific(contract, resting_side, price, resting_id);
            }
            debug!(resting_id = %resting_id, qty = fill_qty.raw(), price = trade_price.cents(), "direct fill");
        }
    }

    /// Walk one price level of the opposite contract's BID book for a
    /// MINT match.
    fn drain_level_mint(
        &mut self,
        global: &GlobalLedger,
        ids: &IdAllocator,
        order: &mut Order,
        resting_contract: Contract,
        price: u8,
        trades: &mut Vec<Trade>,
    ) {
        loop {
            if order.remaining().is_zero() {
                break;
            }
            let resting_id = match self.next_eligible(resting_contract, Side::Buy, price, order.user) {
                Some(id) => id,
                None => break,
            };
            let (resting_user, resting_remaining, resting_price) = {
                let resting = self.orders.get(&resting_id).expect("book/order table desync");
                (resting.user, resting.remaining(), resting.effective_price())
            };
            let fill_qty = order.remaining().min(resting_remaining);

            order.apply_fill(fill_qty);
            let resting_filled = {
                let resting = self.orders.get_mut(&resting_id).unwrap();
                resting.apply_fill(fill_qty);
                resting.remaining().is_zero()
            };

            let trade_id = ids.next_trade_id();
            let aggressor_contract = order.contract;
            // A resting price in [1, 99] always has an in-range
            // complement, so the aggressor's implied per-share cost is
            // itself a valid `Price` (§4.3 MINT: p_yes + p_no >= 100 is
            // what crossed them, so 100 - resting_price <= aggressor's
            // own quote).
            let actual_buy_price = Price::new(100 - resting_price.cents()).expect("complement of [1,99] is in range");

            self.settle_buy_leg(
                global,
                order.user,
                order.effective_price(),
                actual_buy_price,
                fill_qty,
                trade_id,
                TransactionType::MintMatch,
                "mint match buy leg",
            );
            global.consume_funds_as(
                resting_user,
                self.market.id,
                resting_price.notional(fill_qty),
                trade_id,
                TransactionType::MintMatch,
                "mint match buy leg",
            );
            Self::assert_mint_conservation(fill_qty, actual_buy_price.notional(fill_qty), resting_price.notional(fill_qty));

            self.positions
                .credit_shares_at_cost(order.user, self.market.id, aggressor_contract, fill_qty, actual_buy_price.notional(fill_qty));
            self.positions
                .credit_shares_at_cost(resting_user, self.market.id, resting_contract, fill_qty, resting_price.notional(fill_qty));

            let (yes_order, yes_price, no_order, no_price) = if aggressor_contract == Contract::Yes {
                (order.id, order.effective_price(), resting_id, resting_price)
            } else {
                (resting_id, resting_price, order.id, order.effective_price())
            };
            self.market.last_yes_price = Some(yes_price);
            self.market.last_no_price = Some(no_price);

            let at = self.market.tick();
            let trade = Trade::mint(trade_id, self.market.id, fill_qty, yes_order, no_order, at);
            self.push_trade(trade.clone());
            trades.push(trade);

            self.book.reduce_total_qty(resting_contract, Side::Buy, fill_qty);
            if resting_filled {
                self.book.remove_specific(resting_contract, Side::Buy, price, resting_id);
            }
            debug!(resting_id = %resting_id, qty = fill_qty.raw(), "mint match fill");
        }
    }

    /// Walk one price level of the opposite contract's ASK book for a
    /// MERGE match.
    fn drain_level_merge(
        &mut self,
        global: &GlobalLedger,
        ids: &IdAllocator,
        order: &mut Order,
        resting_contract: Contract,
        price: u8,
        trades: &mut Vec<Trade>,
    ) {
        loop {
            if order.remaining().is_zero() {
                break;
            }
            let resting_id = match self.next_eligible(resting_contract, Side::Sell, price, order.user) {
                Some(id) => id,
                None => break,
            };
            let (resting_user, resting_remaining, resting_price) = {
                let resting = self.orders.get(&resting_id).expect("book/order table desync");
                (resting.user, resting.remaining(), resting.effective_price())
            };
            let fill_qty = order.remaining().min(resting_remaining);

            order.apply_fill(fill_qty);
            let resting_filled = {
                let resting = self.orders.get_mut(&resting_id).unwrap();
                resting.apply_fill(fill_qty);
                resting.remaining().is_zero()
            };

            let trade_id = ids.next_trade_id();
            let aggressor_contract = order.contract;
            let aggressor_price = order.effective_price();

            self.positions.consume_shares(order.user, self.market.id, aggressor_contract, fill_qty);
            self.positions.consume_shares(resting_user, self.market.id, resting_contract, fill_qty);
            global.credit_funds(
                order.user,
                Some(self.market.id),
                aggressor_price.notional(fill_qty),
                TransactionType::MergeMatch,
                Some(trade_id),
                "merge match sell leg",
            );
            global.credit_funds(
                resting_user,
                Some(self.market.id),
                resting_price.notional(fill_qty),
                TransactionType::MergeMatch,
                Some(trade_id),
                "merge match sell leg",
            );
            Self::assert_merge_conservation(fill_qty, aggressor_price.notional(fill_qty), resting_price.notional(fill_qty));

            let (yes_price, no_price) = if aggressor_contract == Contract::Yes {
                (aggressor_price, resting_price)
            } else {
                (resting_price, aggressor_price)
            };
            self.market.last_yes_price = Some(yes_price);
            self.market.last_no_price = Some(no_price);

            let (yes_order, no_order) = if aggressor_contract == Contract::Yes {
                (order.id, resting_id)
            } else {
                (resting_id, order.id)
            };
            let at = self.market.tick();
            let trade = Trade::merge(trade_id, self.market.id, fill_qty, yes_order, no_order, at);
            self.push_trade(trade.clone());
            trades.push(trade);

            self.book.reduce_total_qty(resting_contract, Side::Sell, fill_qty);
            if resting_filled {
                self.book.remove_specific(resting_contract, Side::Sell, price, resting_id);
            }
            debug!(resting_id = %resting_id, qty = fill_qty.raw(), "merge match fill");
        }
    }

    /// The next resting order at `price` not owned by `aggressor` (§4.3.A
    /// self-trade prevention). Orders belonging to `aggressor` that sort
    /// ahead of it are left untouched in the queue.
    fn next_eligible(&self, contract: Contract, side: Side, price: u8, aggressor: UserId) -> Option<OrderId> {
        let ids = self.book.level_ids(contract, side, price)?;
        ids.into_iter().find(|id| self.orders.get(id).map(|o| o.user) != Some(aggressor))
    }

    /// Settle a buy leg shared by DIRECT and MINT: the buyer always
    /// pays `actual_price`, refunding the gap to their own quoted or
    /// reserved price if it was more conservative (price improvement on
    /// DIRECT, mint surplus on MINT, §4.3/§4.6).
    #[allow(clippy::too_many_arguments)]
    fn settle_buy_leg(
        &self,
        global: &GlobalLedger,
        user: UserId,
        reserved_price: Price,
        actual_price: Price,
        qty: Shares,
        trade: TradeId,
        transaction_type: TransactionType,
        description: &str,
    ) {
        let cost = actual_price.notional(qty);
        global.consume_funds_as(user, self.market.id, cost, trade, transaction_type, description.to_string());
        if reserved_price.cents() > actual_price.cents() {
            let refund = reserved_price.notional(qty) - cost;
            global.release_funds(user, self.market.id, refund);
        }
    }

    /// §8.1 money conservation for a MINT match: the two legs' complementary
    /// prices must sum to exactly 100 cents/share, so together they must
    /// pay exactly what `qty` sets cost to mint. A mismatch means the two
    /// settle_buy_leg/consume_funds_as calls above paid against prices that
    /// weren't true complements.
    fn assert_mint_conservation(qty: Shares, yes_leg_paid: Cents, no_leg_paid: Cents) {
        let expected = Cents::new(qty.raw() as i64 * 100);
        let paid = yes_leg_paid + no_leg_paid;
        if paid != expected {
            EngineFault::ConservationViolated(format!(
                "mint match for {qty} sets paid {paid}, expected exactly {expected}"
            ))
            .raise();
        }
    }

    /// §8.1 money conservation for a MERGE match: redeeming `qty` sets
    /// pays out at most 100 cents/share combined across both legs.
    fn assert_merge_conservation(qty: Shares, yes_leg_paid: Cents, no_leg_paid: Cents) {
        let limit = Cents::new(qty.raw() as i64 * 100);
        let paid = yes_leg_paid + no_leg_paid;
        if paid > limit {
            EngineFault::ConservationViolated(format!(
                "merge match for {qty} sets paid out {paid}, exceeding the {limit} limit"
            ))
            .raise();
        }
    }
}
