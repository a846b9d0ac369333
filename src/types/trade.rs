// meridian_core/src/types/trade.rs
//
// The Trade entity (§3): an immutable record of one matched unit of
// quantity. `price` carries the synthetic `0`/`100` sentinels for
// MERGE/MINT per §4.3 rather than a separate field, since a trade
// always has exactly one price regardless of type.

use crate::types::ids::{MarketId, OrderId, TradeId};
use crate::types::money::{Price, Shares};
use crate::types::side::Contract;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TradeType {
    Direct,
    Mint,
    Merge,
}

#[derive(Debug, Clone)]
pub struct Trade {
    pub id: TradeId,
    pub market: MarketId,
    pub contract: Contract,
    pub price: u8,
    pub quantity: Shares,
    pub trade_type: TradeType,
    pub buyer_order: OrderId,
    pub seller_order: OrderId,
    pub executed_at: u64,
}

impl Trade {
    /// Build a DIRECT trade. `price` must be a valid in-range contract
    /// price (§3: 1–99).
    pub fn direct(
        id: TradeId,
        market: MarketId,
        contract: Contract,
        price: Price,
        quantity: Shares,
        buyer_order: OrderId,
        seller_order: OrderId,
        executed_at: u64,
    ) -> Self {
        Self {
            id,
            market,
            contract,
            price: price.cents(),
            quantity,
            trade_type: TradeType::Direct,
            buyer_order,
            seller_order,
            executed_at,
        }
    }

    /// Build a MINT trade. Both legs are BUY orders (§4.3/§9); by
    /// convention the YES-side order is recorded as `buyer_order` and
    /// the NO-side order as `seller_order` so both remain addressable.
    pub fn mint(
        id: TradeId,
        market: MarketId,
        quantity: Shares,
        yes_order: OrderId,
        no_order: OrderId,
        executed_at: u64,
    ) -> Self {
        Self {
            id,
            market,
            contract: Contract::Yes,
            price: crate::types::money::Price::MINT,
            quantity,
            trade_type: TradeType::Mint,
            buyer_order: yes_order,
            seller_order: no_order,
            executed_at,
        }
    }

    /// Build a MERGE trade. Both legs are SELL orders; same addressing
    /// convention as `mint`.
    pub fn merge(
        id: TradeId,
        market: MarketId,
        quantity: Shares,
        yes_order: OrderId,
        no_order: OrderId,
        executed_at: u64,
    ) -> Self {
        Self {
            id,
            market,
            contract: Contract::Yes,
            price: crate::types::money::Price::MERGE,
            quantity,
            trade_type: TradeType::Merge,
            buyer_order: yes_order,
            seller_order: no_order,
            executed_at,
        }
    }
}
