// meridian_core/src/error.rs
//
// The closed error taxonomy (§7, §9 "dynamic error dispatch is replaced
// by a closed sum of error kinds"). Every business-rule rejection a
// caller can observe is a variant here; each carries the machine code
// from §7 as its name and a human message via `thiserror`'s `Display`.
//
// `EngineFault` is deliberately NOT part of `EngineError` — §7 says an
// invariant violation "must never surface in a correct implementation".
// It is logged at `ERROR` (§4.9) and converted into fail-safe behavior
// (the triggering order is cancelled and refunded) rather than returned
// through the normal `Result` path.

use thiserror::Error;

use crate::types::ids::{MarketId, OrderId, UserId};
use crate::types::money::Cents;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("price must be an integer number of cents in [1, 99]")]
    InvalidPrice,

    #[error("quantity must be a positive integer number of shares")]
    InvalidQuantity,

    #[error("market {0} is not active")]
    MarketNotActive(MarketId),

    #[error("insufficient funds: need {required}, have {available} available")]
    InsufficientFunds { required: Cents, available: Cents },

    #[error("insufficient position: need {required} shares, have {available} available")]
    InsufficientPosition { required: u64, available: u64 },

    #[error("order {0} not found")]
    OrderNotFound(OrderId),

    #[error("order {0} is not cancellable (already terminal)")]
    OrderNotCancellable(OrderId),

    #[error("user {who} does not own order {order}")]
    NotOrderOwner { who: UserId, order: OrderId },

    #[error("market {0} is already settled or cancelled")]
    MarketAlreadyResolved(MarketId),

    #[error("market {0} was not found")]
    MarketNotFound(MarketId),

    #[error("user {0} was not found")]
    UserNotFound(UserId),

    #[error("quantity {requested} exceeds the market's risk limit of {max}")]
    QuantityExceedsRiskLimit { requested: u64, max: u64 },
}

/// An invariant violation detected mid-event (§7 "Invariant" category).
/// Raised internally, never returned to an external caller as a business
/// error; see module docs.
#[derive(Debug, Error)]
pub enum EngineFault {
    #[error("ledger conservation violated: {0}")]
    ConservationViolated(String),

    #[error("journal I/O failure: {0}")]
    JournalIo(#[from] std::io::Error),

    #[error("journal entry corrupt at sequence {sequence}")]
    JournalCorrupt { sequence: u64 },
}

impl EngineFault {
    /// Log this fault at `ERROR` and abort the process. §7: a fault
    /// "must never surface in a correct implementation"; by the time one
    /// is raised, the engine has observed state it cannot trust, and a
    /// best-effort `Result` return would let the caller act on it.
    #[track_caller]
    pub fn raise(self) -> ! {
        tracing::error!(fault = %self, "hard fault: engine invariant violated");
        panic!("{self}");
    }
}
