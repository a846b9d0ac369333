// meridian_core/src/exchange/mod.rs
//
// The Exchange — the process-level object gluing the ledger, order
// book, and matching engine together into a running system (§4.7).
// One matcher thread per market, fed by a bounded `crossbeam-channel`
// intake queue; request handlers are plain function calls that
// validate/reserve on the caller's own thread, then hand a fully
// formed `EngineCommand` to the matcher and block on a one-shot reply.
//
// This mirrors the teacher's channel-per-instrument concurrency shape
// generalized from one engine to many (one per market), with the
// addition of the write-ahead journal sitting inside each matcher's
// loop rather than bolted on afterward: every command is journaled
// before being applied, so a crash mid-apply loses nothing (§5).

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::thread::JoinHandle;

use crossbeam_channel::{bounded, Receiver, Sender};
use tracing::{error, info, instrument, warn};

use crate::config::EngineConfig;
use crate::engine::{CancelOutcome, IdAllocator, MarketEngine, PlaceOrderOutcome, SettlementOutcome};
use crate::error::{EngineError, EngineFault};
use crate::ledger::GlobalLedger;
use crate::persistence::{JournalEntry, JournalRecord, Sentinel};
use crate::types::ids::{MarketId, OrderId, UserId};
use crate::types::market::{Market, Resolution};
use crate::types::money::Shares;
use crate::types::order::OrderType;
use crate::types::position::Position;
use crate::types::side::{Contract, Side};
use crate::types::trade::Trade;

/// A point-in-time read of one market, returned by the `Snapshot`
/// command (§5: "other components read from a point-in-time snapshot
/// taken by asking the matcher thread ... rather than a lagging
/// external projection").
#[derive(Debug, Clone)]
pub struct MarketSnapshot {
    pub market: Market,
    pub best_bid_yes: Option<u8>,
    pub best_ask_yes: Option<u8>,
    pub best_bid_no: Option<u8>,
    pub best_ask_no: Option<u8>,
    pub recent_trades: Vec<Trade>,
}

/// One command routed through a market's intake channel (§4.7). Every
/// variant but `Snapshot` carries a one-shot reply sender; `Snapshot`
/// is read-only and never journaled.
pub enum EngineCommand {
    PlaceOrder {
        user: UserId,
        side: Side,
        contract: Contract,
        order_type: OrderType,
        limit_price: Option<u8>,
        quantity: Shares,
        reply: Sender<Result<PlaceOrderOutcome, EngineError>>,
    },
    CancelOrder {
        user: UserId,
        order_id: OrderId,
        reply: Sender<Result<CancelOutcome, EngineError>>,
    },
    Mint {
        user: UserId,
        quantity: Shares,
        reply: Sender<Result<Trade, EngineError>>,
    },
    Redeem {
        user: UserId,
        quantity: Shares,
        reply: Sender<Result<Trade, EngineError>>,
    },
    Settle {
        resolution: Resolution,
        reply: Sender<Result<SettlementOutcome, EngineError>>,
    },
    CancelMarket {
        reply: Sender<Result<(), EngineError>>,
    },
    Snapshot {
        reply: Sender<MarketSnapshot>,
    },
    PositionQuery {
        user: UserId,
        reply: Sender<Option<Position>>,
    },
    Shutdown,
}

struct MarketHandle {
    sender: Sender<EngineCommand>,
    join: Option<JoinHandle<()>>,
}

/// Owns one `MarketEngine` (and its WAL) per market, each on its own
/// thread, plus the cross-market `GlobalLedger` and id allocator.
pub struct Exchange {
    ledger: Arc<GlobalLedger>,
    ids: Arc<IdAllocator>,
    config: EngineConfig,
    markets: RwLock<HashMap<MarketId, MarketHandle>>,
}

impl Exchange {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            ledger: Arc::new(GlobalLedger::new()),
            ids: Arc::new(IdAllocator::new()),
            config,
            markets: RwLock::new(HashMap::new()),
        }
    }

    pub fn ledger(&self) -> &GlobalLedger {
        &self.ledger
    }

    /// Spawn a matcher thread for `market_id`, replaying its WAL first
    /// (§4.7/§5 crash recovery) if one already exists on disk.
    #[instrument(skip(self), fields(market_id = %market_id))]
    pub fn create_market(&self, market_id: MarketId) -> io::Result<()> {
        let wal_path = self.config.wal_dir.join(format!("market-{}.wal", market_id.0));
        let journal = Sentinel::open(&wal_path, self.config.wal_segment_size)?;

        let (sender, receiver) = bounded(self.config.intake_channel_capacity);
        let ledger = Arc::clone(&self.ledger);
        let ids = Arc::clone(&self.ids);
        let max_order_quantity = self.config.default_max_order_quantity;

        let join = std::thread::Builder::new()
            .name(format!("matcher-{}", market_id.0))
            .spawn(move || run_matcher(market_id, receiver, ledger, ids, max_order_quantity, journal))
            .expect("spawning a matcher thread should not fail under normal OS resource limits");

        self.markets.write().unwrap().insert(market_id, MarketHandle { sender, join: Some(join) });
        info!("market matcher thread started");
        Ok(())
    }

    fn sender(&self, market_id: MarketId) -> Result<Sender<EngineCommand>, EngineError> {
        self.markets
            .read()
            .unwrap()
            .get(&market_id)
            .map(|h| h.sender.clone())
            .ok_or(EngineError::MarketNotFound(market_id))
    }

    pub fn place_order(
        &self,
        market_id: MarketId,
        user: UserId,
        side: Side,
        contract: Contract,
        order_type: OrderType,
        limit_price: Option<u8>,
        quantity: Shares,
    ) -> Result<PlaceOrderOutcome, EngineError> {
        let (reply_tx, reply_rx) = bounded(1);
        self.sender(market_id)?
            .send(EngineCommand::PlaceOrder { user, side, contract, order_type, limit_price, quantity, reply: reply_tx })
            .map_err(|_| EngineError::MarketNotActive(market_id))?;
        reply_rx.recv().map_err(|_| EngineError::MarketNotActive(market_id))?
    }

    pub fn cancel_order(&self, market_id: MarketId, user: UserId, order_id: OrderId) -> Result<CancelOutcome, EngineError> {
        let (reply_tx, reply_rx) = bounded(1);
        self.sender(market_id)?
            .send(EngineCommand::CancelOrder { user, order_id, reply: reply_tx })
            .map_err(|_| EngineError::MarketNotActive(market_id))?;
        reply_rx.recv().map_err(|_| EngineError::MarketNotActive(market_id))?
    }

    pub fn mint_set(&self, market_id: MarketId, user: UserId, quantity: Shares) -> Result<Trade, EngineError> {
        let (reply_tx, reply_rx) = bounded(1);
        self.sender(market_id)?
            .send(EngineCommand::Mint { user, quantity, reply: reply_tx })
            .map_err(|_| EngineError::MarketNotActive(market_id))?;
        reply_rx.recv().map_err(|_| EngineError::MarketNotActive(market_id))?
    }

    pub fn redeem_set(&self, market_id: MarketId, user: UserId, quantity: Shares) -> Result<Trade, EngineError> {
        let (reply_tx, reply_rx) = bounded(1);
        self.sender(market_id)?
            .send(EngineCommand::Redeem { user, quantity, reply: reply_tx })
            .map_err(|_| EngineError::MarketNotActive(market_id))?;
        reply_rx.recv().map_err(|_| EngineError::MarketNotActive(market_id))?
    }

    pub fn settle_market(&self, market_id: MarketId, resolution: Resolution) -> Result<SettlementOutcome, EngineError> {
        let (reply_tx, reply_rx) = bounded(1);
        self.sender(market_id)?
            .send(EngineCommand::Settle { resolution, reply: reply_tx })
            .map_err(|_| EngineError::MarketNotActive(market_id))?;
        reply_rx.recv().map_err(|_| EngineError::MarketNotActive(market_id))?
    }

    pub fn cancel_market(&self, market_id: MarketId) -> Result<(), EngineError> {
        let (reply_tx, reply_rx) = bounded(1);
        self.sender(market_id)?
            .send(EngineCommand::CancelMarket { reply: reply_tx })
            .map_err(|_| EngineError::MarketNotActive(market_id))?;
        reply_rx.recv().map_err(|_| EngineError::MarketNotActive(market_id))?
    }

    pub fn snapshot(&self, market_id: MarketId) -> Result<MarketSnapshot, EngineError> {
        let (reply_tx, reply_rx) = bounded(1);
        self.sender(market_id)?
            .send(EngineCommand::Snapshot { reply: reply_tx })
            .map_err(|_| EngineError::MarketNotActive(market_id))?;
        reply_rx.recv().map_err(|_| EngineError::MarketNotActive(market_id))
    }

    /// Read-only projection of one user's position in one market (§6).
    /// Routed through the market's matcher like every other query so it
    /// never observes a position mid-fill.
    pub fn position(&self, market_id: MarketId, user: UserId) -> Result<Option<Position>, EngineError> {
        let (reply_tx, reply_rx) = bounded(1);
        self.sender(market_id)?
            .send(EngineCommand::PositionQuery { user, reply: reply_tx })
            .map_err(|_| EngineError::MarketNotActive(market_id))?;
        reply_rx.recv().map_err(|_| EngineError::MarketNotActive(market_id))
    }

    /// Stop every matcher thread, draining nothing further; used at
    /// process shutdown.
    pub fn shutdown(&self) {
        let mut markets = self.markets.write().unwrap();
        for (market_id, handle) in markets.iter() {
            if handle.sender.send(EngineCommand::Shutdown).is_err() {
                warn!(%market_id, "matcher channel already closed at shutdown");
            }
        }
        for (_, handle) in markets.iter_mut() {
            if let Some(join) = handle.join.take() {
                let _ = join.join();
            }
        }
    }
}

use std::io;

fn run_matcher(
    market_id: MarketId,
    receiver: Receiver<EngineCommand>,
    ledger: Arc<GlobalLedger>,
    ids: Arc<IdAllocator>,
    max_order_quantity: u64,
    mut journal: Sentinel,
) {
    let mut engine = MarketEngine::new(market_id);

    let replayed: Vec<JournalEntry> = journal.read_all_entries();
    let replay_count = replayed.len();
    for entry in replayed {
        apply_record(&mut engine, &ledger, &ids, max_order_quantity, entry.record);
    }
    if replay_count > 0 {
        info!(%market_id, replayed = replay_count, "recovered market from journal");
    }

    for command in receiver.iter() {
        tracing::debug!(%market_id, "matcher dequeued command");
        match command {
            EngineCommand::PlaceOrder { user, side, contract, order_type, limit_price, quantity, reply } => {
                let record = JournalRecord::PlaceOrder { user, side, contract, order_type, limit_price, quantity: quantity.raw() };
                let at = engine.market.clock;
                if let Err(error) = journal.append(&record, at) {
                    let fault = EngineFault::from(error);
                    error!(%market_id, %fault, "journal append failed, rejecting command");
                    let _ = reply.send(Err(EngineError::MarketNotActive(market_id)));
                    continue;
                }
                let result = engine.place_order(&ledger, &ids, user, side, contract, order_type, limit_price, quantity, max_order_quantity);
                let _ = reply.send(result);
            }
            EngineCommand::CancelOrder { user, order_id, reply } => {
                let record = JournalRecord::CancelOrder { user, order_id };
                let at = engine.market.clock;
                if let Err(error) = journal.append(&record, at) {
                    let fault = EngineFault::from(error);
                    error!(%market_id, %fault, "journal append failed, rejecting command");
                    let _ = reply.send(Err(EngineError::MarketNotActive(market_id)));
                    continue;
                }
                let result = engine.cancel_order(&ledger, user, order_id);
                let _ = reply.send(result);
            }
            EngineCommand::Mint { user, quantity, reply } => {
                let record = JournalRecord::Mint { user, quantity: quantity.raw() };
                let at = engine.market.clock;
                if let Err(error) = journal.append(&record, at) {
                    let fault = EngineFault::from(error);
                    error!(%market_id, %fault, "journal append failed, rejecting command");
                    let _ = reply.send(Err(EngineError::MarketNotActive(market_id)));
                    continue;
                }
                let result = engine.mint_set(&ledger, &ids, user, quantity);
                let _ = reply.send(result);
            }
            EngineCommand::Redeem { user, quantity, reply } => {
                let record = JournalRecord::Redeem { user, quantity: quantity.raw() };
                let at = engine.market.clock;
                if let Err(error) = journal.append(&record, at) {
                    let fault = EngineFault::from(error);
                    error!(%market_id, %fault, "journal append failed, rejecting command");
                    let _ = reply.send(Err(EngineError::MarketNotActive(market_id)));
                    continue;
                }
                let result = engine.redeem_set(&ledger, &ids, user, quantity);
                let _ = reply.send(result);
            }
            EngineCommand::Settle { resolution, reply } => {
                let record = JournalRecord::Settle { resolution };
                let at = engine.market.clock;
                if let Err(error) = journal.append(&record, at) {
                    let fault = EngineFault::from(error);
                    error!(%market_id, %fault, "journal append failed, rejecting command");
                    let _ = reply.send(Err(EngineError::MarketNotActive(market_id)));
                    continue;
                }
                let result = engine.settle(&ledger, resolution);
                let _ = reply.send(result);
            }
            EngineCommand::CancelMarket { reply } => {
                let at = engine.market.clock;
                if let Err(error) = journal.append(&JournalRecord::CancelMarket, at) {
                    let fault = EngineFault::from(error);
                    error!(%market_id, %fault, "journal append failed, rejecting command");
                    let _ = reply.send(Err(EngineError::MarketNotActive(market_id)));
                    continue;
                }
                let result = engine.cancel_market(&ledger);
                let _ = reply.send(result);
            }
            EngineCommand::Snapshot { reply } => {
                let snapshot = MarketSnapshot {
                    market: engine.market.clone(),
                    best_bid_yes: engine.best_bid(Contract::Yes),
                    best_ask_yes: engine.best_ask(Contract::Yes),
                    best_bid_no: engine.best_bid(Contract::No),
                    best_ask_no: engine.best_ask(Contract::No),
                    recent_trades: engine.recent_trades(64),
                };
                let _ = reply.send(snapshot);
            }
            EngineCommand::PositionQuery { user, reply } => {
                let _ = reply.send(engine.position(user).cloned());
            }
            EngineCommand::Shutdown => break,
        }
    }
    let _ = journal.flush();
    info!(%market_id, "matcher thread stopped");
}

/// Re-apply one journaled command during recovery. Errors here indicate
/// the journal disagrees with a command that must have succeeded the
/// first time (the command was only journaled after passing intake
/// validation); that is an invariant violation, not a business error,
/// so it is logged rather than propagated.
fn apply_record(engine: &mut MarketEngine, ledger: &GlobalLedger, ids: &IdAllocator, max_order_quantity: u64, record: JournalRecord) {
    let outcome = match record {
        JournalRecord::PlaceOrder { user, side, contract, order_type, limit_price, quantity } => engine
            .place_order(ledger, ids, user, side, contract, order_type, limit_price, Shares::new(quantity), max_order_quantity)
            .map(|_| ()),
        JournalRecord::CancelOrder { user, order_id } => engine.cancel_order(ledger, user, order_id).map(|_| ()),
        JournalRecord::Mint { user, quantity } => engine.mint_set(ledger, ids, user, Shares::new(quantity)).map(|_| ()),
        JournalRecord::Redeem { user, quantity } => engine.redeem_set(ledger, ids, user, Shares::new(quantity)).map(|_| ()),
        JournalRecord::Settle { resolution } => engine.settle(ledger, resolution).map(|_| ()),
        JournalRecord::CancelMarket => engine.cancel_market(ledger),
    };
    if let Err(error) = outcome {
        error!(market_id = %engine.market.id, %error, "replayed command failed to reapply");
    }
}
