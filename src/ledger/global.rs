// meridian_core/src/ledger/global.rs
//
// GlobalLedger — owns every `User` row and the append-only `Transaction`
// log (§3, §4.1). A trader can have resting orders in several markets at
// once, so a user's balance is touched by more than one market's matcher
// thread; per §5 this is the one place in the ledger that is NOT owned
// by a single market thread, and so it is the one place that needs a
// lock. The lock is per-user, not global, so two matcher threads
// crediting two different users never contend.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, RwLock};

use crate::error::EngineError;
use crate::types::ids::{MarketId, TradeId, TransactionId, UserId};
use crate::types::money::Cents;
use crate::types::transaction::{Transaction, TransactionType};
use crate::types::user::User;

/// A user's balance row plus its own append-only transaction history,
/// guarded together so the two can never be observed out of lock-step
/// (§4.1: "the primitives update in lock-step with the append, never
/// independently").
struct UserAccount {
    user: User,
    transactions: Vec<Transaction>,
}

impl UserAccount {
    fn new(id: UserId) -> Self {
        Self {
            user: User::new(id),
            transactions: Vec::new(),
        }
    }
}

pub struct GlobalLedger {
    accounts: RwLock<HashMap<UserId, Mutex<UserAccount>>>,
    next_transaction_id: AtomicU64,
    clock: AtomicU64,
}

impl GlobalLedger {
    pub fn new() -> Self {
        Self {
            accounts: RwLock::new(HashMap::new()),
            next_transaction_id: AtomicU64::new(1),
            clock: AtomicU64::new(0),
        }
    }

    fn next_id(&self) -> TransactionId {
        TransactionId(self.next_transaction_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Monotonic wall-clock stand-in used for `Transaction::created_at`.
    /// Not tied to any one market's clock (§4.3's per-market `tick` is
    /// distinct and drives `Order::created_at` instead).
    fn now(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Ensure a user row exists, creating a zero-balance account on first
    /// reference. Real deployments create the row at registration time
    /// (out of scope, §1); tests and fixtures rely on this lazy path.
    pub fn ensure_user(&self, user: UserId) {
        if self.accounts.read().unwrap().contains_key(&user) {
            return;
        }
        self.accounts
            .write()
            .unwrap()
            .entry(user)
            .or_insert_with(|| Mutex::new(UserAccount::new(user)));
    }

    fn with_account<T>(&self, user: UserId, f: impl FnOnce(&mut UserAccount) -> T) -> T {
        self.ensure_user(user);
        let guard = self.accounts.read().unwrap();
        let mut account = guard.get(&user).expect("ensure_user just inserted it").lock().unwrap();
        f(&mut account)
    }

    /// Read-only snapshot of a user's balance row.
    pub fn user(&self, user: UserId) -> User {
        self.with_account(user, |a| a.user.clone())
    }

    /// Read-only snapshot of a user's transaction history, oldest first.
    pub fn transactions_for(&self, user: UserId) -> Vec<Transaction> {
        self.with_account(user, |a| a.transactions.clone())
    }

    fn record(
        &self,
        account: &mut UserAccount,
        transaction_type: TransactionType,
        amount: Cents,
        market: Option<MarketId>,
        related_trade: Option<TradeId>,
        description: impl Into<String>,
    ) -> Transaction {
        let txn = Transaction {
            id: self.next_id(),
            user: account.user.id,
            transaction_type,
            amount,
            balance_after: account.user.balance,
            market,
            related_trade,
            description: description.into(),
            created_at: self.now(),
        };
        account.transactions.push(txn.clone());
        txn
    }

    /// External money entering the system (§6: the only entry point for
    /// real-world funds in this core).
    pub fn credit_deposit(&self, user: UserId, cents: Cents) -> Transaction {
        self.with_account(user, |a| {
            a.user.balance += cents;
            self.record(a, TransactionType::Deposit, cents, None, None, "deposit")
        })
    }

    /// External money leaving the system.
    pub fn debit_withdrawal(&self, user: UserId, cents: Cents) -> Result<Transaction, EngineError> {
        self.with_account(user, |a| {
            if a.user.available() < cents {
                return Err(EngineError::InsufficientFunds {
                    required: cents,
                    available: a.user.available(),
                });
            }
            a.user.balance -= cents;
            Ok(self.record(
                a,
                TransactionType::Withdrawal,
                Cents::ZERO - cents,
                None,
                None,
                "withdrawal",
            ))
        })
    }

    /// Earmark `cents` of a user's balance against a resting BUY order
    /// (§4.1). Logged as a zero-amount `ORDER_RESERVE` entry — the
    /// reservation moves cents between `balance` and `reserved_balance`,
    /// not into or out of the user's total.
    pub fn reserve_funds(
        &self,
        user: UserId,
        market: MarketId,
        cents: Cents,
    ) -> Result<Transaction, EngineError> {
        self.with_account(user, |a| {
            if a.user.available() < cents {
                return Err(EngineError::InsufficientFunds {
                    required: cents,
                    available: a.user.available(),
                });
            }
            a.user.reserved_balance += cents;
            Ok(self.record(
                a,
                TransactionType::OrderReserve,
                Cents::ZERO,
                Some(market),
                None,
                format!("reserve {cents}"),
            ))
        })
    }

    /// Release a reservation without settling it (cancel/expire path).
    pub fn release_funds(
        &self,
        user: UserId,
        market: MarketId,
        cents: Cents,
    ) -> Transaction {
        self.with_account(user, |a| {
            a.user.reserved_balance = a
                .user
                .reserved_balance
                .checked_sub(cents)
                .unwrap_or(Cents::ZERO);
            self.record(
                a,
                TransactionType::OrderRelease,
                Cents::ZERO,
                Some(market),
                None,
                format!("release {cents}"),
            )
        })
    }

    /// Settle a buy-side fill: the reservation becomes an actual spend.
    pub fn consume_funds(
        &self,
        user: UserId,
        market: MarketId,
        cents: Cents,
        trade: TradeId,
    ) -> Transaction {
        self.consume_funds_as(user, market, cents, trade, TransactionType::TradeBuy, format!("buy fill {cents}"))
    }

    /// Same as `consume_funds` but under a caller-chosen transaction type
    /// (e.g. `MINT_MATCH` for a buy leg minted across the YES/NO books,
    /// §6) — the balance/reservation arithmetic is identical, only the
    /// ledger entry's label differs.
    pub fn consume_funds_as(
        &self,
        user: UserId,
        market: MarketId,
        cents: Cents,
        trade: TradeId,
        transaction_type: TransactionType,
        description: impl Into<String>,
    ) -> Transaction {
        self.with_account(user, |a| {
            a.user.balance -= cents;
            a.user.reserved_balance = a
                .user
                .reserved_balance
                .checked_sub(cents)
                .unwrap_or(Cents::ZERO);
            self.record(
                a,
                transaction_type,
                Cents::ZERO - cents,
                Some(market),
                Some(trade),
                description,
            )
        })
    }

    /// Settle a sell-side fill, a settlement win, a redeem, or a refund —
    /// any event that increases `balance` without touching a
    /// reservation (§4.1).
    pub fn credit_funds(
        &self,
        user: UserId,
        market: Option<MarketId>,
        cents: Cents,
        transaction_type: TransactionType,
        related_trade: Option<TradeId>,
        description: impl Into<String>,
    ) -> Transaction {
        self.with_account(user, |a| {
            a.user.balance += cents;
            self.record(a, transaction_type, cents, market, related_trade, description)
        })
    }

    /// A zero-amount ledger entry (e.g. `SETTLEMENT_LOSS`) for auditability
    /// without any balance effect.
    pub fn record_zero(
        &self,
        user: UserId,
        market: Option<MarketId>,
        transaction_type: TransactionType,
        description: impl Into<String>,
    ) -> Transaction {
        self.with_account(user, |a| {
            self.record(a, transaction_type, Cents::ZERO, market, None, description)
        })
    }
}

impl Default for GlobalLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserve_then_release_restores_available() {
        let ledger = GlobalLedger::new();
        let u = UserId(1);
        ledger.credit_deposit(u, Cents::new(10_000));
        ledger.reserve_funds(u, MarketId(1), Cents::new(4_000)).unwrap();
        assert_eq!(ledger.user(u).available(), Cents::new(6_000));
        ledger.release_funds(u, MarketId(1), Cents::new(4_000));
        assert_eq!(ledger.user(u).available(), Cents::new(10_000));
    }

    #[test]
    fn reserve_past_available_fails() {
        let ledger = GlobalLedger::new();
        let u = UserId(1);
        ledger.credit_deposit(u, Cents::new(100));
        let err = ledger.reserve_funds(u, MarketId(1), Cents::new(200)).unwrap_err();
        assert_eq!(
            err,
            EngineError::InsufficientFunds {
                required: Cents::new(200),
                available: Cents::new(100),
            }
        );
    }

    #[test]
    fn consume_funds_reduces_balance_and_reservation_together() {
        let ledger = GlobalLedger::new();
        let u = UserId(1);
        ledger.credit_deposit(u, Cents::new(1_000));
        ledger.reserve_funds(u, MarketId(1), Cents::new(600)).unwrap();
        ledger.consume_funds(u, MarketId(1), Cents::new(600), TradeId(1));
        let user = ledger.user(u);
        assert_eq!(user.balance, Cents::new(400));
        assert_eq!(user.reserved_balance, Cents::ZERO);
    }

    #[test]
    fn transaction_log_grows_in_lockstep_with_balance() {
        let ledger = GlobalLedger::new();
        let u = UserId(1);
        ledger.credit_deposit(u, Cents::new(500));
        ledger.credit_funds(u, None, Cents::new(250), TransactionType::Refund, None, "test");
        let txns = ledger.transactions_for(u);
        assert_eq!(txns.len(), 2);
        assert_eq!(txns.last().unwrap().balance_after, Cents::new(750));
    }
}
