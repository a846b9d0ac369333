// meridian_core/src/lib.rs
//
// Meridian Core — the root library crate for the prediction-market
// trading engine (§2): the ledger, the four-way order book, the
// matching algorithm (DIRECT/MINT/MERGE), the per-market exchange
// process, and the write-ahead journal that backs crash recovery.
//
// Pure Rust: cargo test

pub mod book;
pub mod config;
pub mod engine;
pub mod error;
pub mod exchange;
pub mod ledger;
pub mod matching;
pub mod persistence;
pub mod types;

pub use config::EngineConfig;
pub use engine::{CancelOutcome, IdAllocator, MarketEngine, PlaceOrderOutcome, SettlementOutcome};
pub use error::{EngineError, EngineFault};
pub use exchange::{Exchange, MarketSnapshot};
pub use ledger::{GlobalLedger, MarketLedger};
pub use persistence::{JournalEntry, JournalHeader, JournalRecord, Sentinel};
pub use types::{
    Cents, Contract, Market, MarketId, MarketStatus, Order, OrderId, OrderStatus, OrderType,
    Position, Price, Resolution, Shares, Side, Trade, TradeId, TradeType, Transaction,
    TransactionType, User, UserId,
};
