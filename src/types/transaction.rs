// meridian_core/src/types/transaction.rs
//
// The Transaction entity (§3, §6): one append-only ledger row per
// balance-affecting (or reservation-affecting) event. `amount` is
// signed; `balance_after` is the denormalized snapshot the ledger
// writes in lock-step with the append (§4.1).

use crate::types::ids::{MarketId, TradeId, TransactionId, UserId};
use crate::types::money::Cents;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionType {
    Deposit,
    Withdrawal,
    TradeBuy,
    TradeSell,
    SettlementWin,
    SettlementLoss,
    OrderReserve,
    OrderRelease,
    Refund,
    Mint,
    Redeem,
    MintMatch,
    MergeMatch,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Deposit => "DEPOSIT",
            TransactionType::Withdrawal => "WITHDRAWAL",
            TransactionType::TradeBuy => "TRADE_BUY",
            TransactionType::TradeSell => "TRADE_SELL",
            TransactionType::SettlementWin => "SETTLEMENT_WIN",
            TransactionType::SettlementLoss => "SETTLEMENT_LOSS",
            TransactionType::OrderReserve => "ORDER_RESERVE",
            TransactionType::OrderRelease => "ORDER_RELEASE",
            TransactionType::Refund => "REFUND",
            TransactionType::Mint => "MINT",
            TransactionType::Redeem => "REDEEM",
            TransactionType::MintMatch => "MINT_MATCH",
            TransactionType::MergeMatch => "MERGE_MATCH",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Transaction {
    pub id: TransactionId,
    pub user: UserId,
    pub transaction_type: TransactionType,
    pub amount: Cents,
    pub balance_after: Cents,
    pub market: Option<MarketId>,
    pub related_trade: Option<TradeId>,
    pub description: String,
    pub created_at: u64,
}
