// Literal end-to-end scenarios (S1-S6) against a single `MarketEngine`
// driven directly, the way the teacher's integration tests drive its
// engine without going through the channel/thread plumbing — that
// plumbing is covered separately by `concurrency.rs`.

use meridian_core::{
    Cents, Contract, GlobalLedger, IdAllocator, MarketEngine, MarketId, OrderStatus, OrderType,
    Price, Resolution, Shares, Side, TradeType, UserId,
};

const MAX_QTY: u64 = 1_000_000;

fn setup(deposits: &[(UserId, i64)]) -> (GlobalLedger, IdAllocator, MarketEngine) {
    let ledger = GlobalLedger::new();
    for (user, cents) in deposits {
        ledger.credit_deposit(*user, Cents::new(*cents));
    }
    (ledger, IdAllocator::new(), MarketEngine::new(MarketId(1)))
}

#[test]
fn s1_simple_direct_fill() {
    let user_a = UserId(1);
    let user_b = UserId(2);
    let (ledger, ids, mut engine) = setup(&[(user_a, 10_000), (user_b, 0)]);

    // B needs 10 YES to sell; mint a complete set for B first.
    ledger.credit_deposit(user_b, Cents::new(1_000));
    engine.mint_set(&ledger, &ids, user_b, Shares::new(10)).unwrap();

    let a_outcome = engine
        .place_order(&ledger, &ids, user_a, Side::Buy, Contract::Yes, OrderType::Limit, Some(60), Shares::new(10), MAX_QTY)
        .unwrap();
    assert!(a_outcome.fills.is_empty());
    assert_eq!(ledger.user(user_a).available(), Cents::new(10_000 - 600));

    let b_outcome = engine
        .place_order(&ledger, &ids, user_b, Side::Sell, Contract::Yes, OrderType::Limit, Some(55), Shares::new(10), MAX_QTY)
        .unwrap();

    assert_eq!(b_outcome.fills.len(), 1);
    let trade = &b_outcome.fills[0];
    assert_eq!(trade.trade_type, TradeType::Direct);
    assert_eq!(trade.price, 60); // resting order's price, not the aggressor's
    assert_eq!(trade.quantity, Shares::new(10));

    let a_position = engine.position(user_a).unwrap();
    assert_eq!(a_position.yes_qty, Shares::new(10));
    assert_eq!(a_position.yes_cost_basis, Cents::new(600));
    assert_eq!(ledger.user(user_a).balance, Cents::new(10_000 - 600));
    assert_eq!(ledger.user(user_a).reserved_balance, Cents::ZERO);

    // B started at 0, minted (spent $10), sold 10 YES @ 60 (+$6.00).
    assert_eq!(ledger.user(user_b).balance, Cents::new(1_000 - 1_000 + 600));
    let b_position = engine.position(user_b).unwrap();
    assert_eq!(b_position.yes_qty, Shares::ZERO);

    let a_order = engine.order(a_outcome.order.id).unwrap();
    assert_eq!(a_order.status, OrderStatus::Filled);
    let b_order = engine.order(b_outcome.order.id).unwrap();
    assert_eq!(b_order.status, OrderStatus::Filled);
}

#[test]
fn s2_partial_fill_then_rest() {
    let user_a = UserId(1);
    let user_b = UserId(2);
    let (ledger, ids, mut engine) = setup(&[(user_a, 10_000), (user_b, 1_000)]);
    engine.mint_set(&ledger, &ids, user_b, Shares::new(4)).unwrap();

    let a_outcome = engine
        .place_order(&ledger, &ids, user_a, Side::Buy, Contract::Yes, OrderType::Limit, Some(50), Shares::new(10), MAX_QTY)
        .unwrap();
    assert!(a_outcome.fills.is_empty());
    assert_eq!(ledger.user(user_a).available(), Cents::new(10_000 - 500));

    let b_outcome = engine
        .place_order(&ledger, &ids, user_b, Side::Sell, Contract::Yes, OrderType::Limit, Some(50), Shares::new(4), MAX_QTY)
        .unwrap();
    assert_eq!(b_outcome.fills.len(), 1);
    assert_eq!(b_outcome.fills[0].quantity, Shares::new(4));

    let a_order = engine.order(a_outcome.order.id).unwrap();
    assert_eq!(a_order.status, OrderStatus::PartiallyFilled);
    assert_eq!(a_order.filled_quantity, Shares::new(4));
    assert_eq!(a_order.remaining(), Shares::new(6));
    // 6 remaining @ 50c = $3.00 still reserved.
    assert_eq!(ledger.user(user_a).reserved_balance, Cents::new(300));

    let b_order = engine.order(b_outcome.order.id).unwrap();
    assert_eq!(b_order.status, OrderStatus::Filled);
    assert_eq!(b_order.remaining(), Shares::ZERO);
}

#[test]
fn s3_mint_match() {
    let user_a = UserId(1);
    let user_b = UserId(2);
    let (ledger, ids, mut engine) = setup(&[(user_a, 10_000), (user_b, 10_000)]);
    let a_pre = ledger.user(user_a).balance + ledger.user(user_b).balance;

    let a_outcome = engine
        .place_order(&ledger, &ids, user_a, Side::Buy, Contract::Yes, OrderType::Limit, Some(70), Shares::new(5), MAX_QTY)
        .unwrap();
    assert!(a_outcome.fills.is_empty());

    let b_outcome = engine
        .place_order(&ledger, &ids, user_b, Side::Buy, Contract::No, OrderType::Limit, Some(35), Shares::new(5), MAX_QTY)
        .unwrap();

    assert_eq!(b_outcome.fills.len(), 1);
    let trade = &b_outcome.fills[0];
    assert_eq!(trade.trade_type, TradeType::Mint);
    assert_eq!(trade.price, Price::MINT);
    assert_eq!(trade.quantity, Shares::new(5));

    // A is the resting order here (placed first, rests as BUY YES @70) and
    // pays its own quoted price in full: 70c/share => $3.50 for 5, exactly
    // what was reserved.
    assert_eq!(ledger.user(user_a).balance, Cents::new(10_000 - 350));
    assert_eq!(ledger.user(user_a).reserved_balance, Cents::ZERO);
    // B is the aggressor and pays 100 - 70 = 30c/share => $1.50 for 5, had
    // reserved $1.75 (5 @ 35); the 25c gap is refunded to B.
    assert_eq!(ledger.user(user_b).balance, Cents::new(10_000 - 150));
    assert_eq!(ledger.user(user_b).reserved_balance, Cents::ZERO);

    let a_position = engine.position(user_a).unwrap();
    assert_eq!(a_position.yes_qty, Shares::new(5));
    let b_position = engine.position(user_b).unwrap();
    assert_eq!(b_position.no_qty, Shares::new(5));

    // 5 sets minted at $1.00 each: total balances drop by exactly $5.00.
    let post = ledger.user(user_a).balance + ledger.user(user_b).balance;
    assert_eq!(a_pre - post, Cents::new(500));
}

#[test]
fn s4_merge_match() {
    let user_a = UserId(1);
    let user_b = UserId(2);
    let (ledger, ids, mut engine) = setup(&[(user_a, 1_000), (user_b, 1_000)]);
    engine.mint_set(&ledger, &ids, user_a, Shares::new(10)).unwrap();
    engine.mint_set(&ledger, &ids, user_b, Shares::new(10)).unwrap();
    let balance_a_before = ledger.user(user_a).balance;
    let balance_b_before = ledger.user(user_b).balance;

    let a_outcome = engine
        .place_order(&ledger, &ids, user_a, Side::Sell, Contract::Yes, OrderType::Limit, Some(60), Shares::new(10), MAX_QTY)
        .unwrap();
    assert!(a_outcome.fills.is_empty());

    let b_outcome = engine
        .place_order(&ledger, &ids, user_b, Side::Sell, Contract::No, OrderType::Limit, Some(30), Shares::new(10), MAX_QTY)
        .unwrap();

    assert_eq!(b_outcome.fills.len(), 1);
    let trade = &b_outcome.fills[0];
    assert_eq!(trade.trade_type, TradeType::Merge);
    assert_eq!(trade.price, Price::MERGE);
    assert_eq!(trade.quantity, Shares::new(10));

    assert_eq!(ledger.user(user_a).balance, balance_a_before + Cents::new(600));
    assert_eq!(ledger.user(user_b).balance, balance_b_before + Cents::new(300));

    let a_position = engine.position(user_a).unwrap();
    assert_eq!(a_position.yes_qty, Shares::ZERO);
    let b_position = engine.position(user_b).unwrap();
    assert_eq!(b_position.no_qty, Shares::ZERO);

    // System spent $9.00 buying back a set worth $10.00 at settlement:
    // the $1.00 differential is retained, not credited to either seller.
}

#[test]
fn s5_self_trade_skip() {
    let user_a = UserId(1);
    let (ledger, ids, mut engine) = setup(&[(user_a, 1_000)]);
    engine.mint_set(&ledger, &ids, user_a, Shares::new(5)).unwrap();

    let sell_outcome = engine
        .place_order(&ledger, &ids, user_a, Side::Sell, Contract::Yes, OrderType::Limit, Some(40), Shares::new(5), MAX_QTY)
        .unwrap();
    assert!(sell_outcome.fills.is_empty());

    let buy_outcome = engine
        .place_order(&ledger, &ids, user_a, Side::Buy, Contract::Yes, OrderType::Limit, Some(40), Shares::new(5), MAX_QTY)
        .unwrap();

    assert!(buy_outcome.fills.is_empty(), "self-trade must not execute");
    assert_eq!(engine.order(sell_outcome.order.id).unwrap().status, OrderStatus::Open);
    assert_eq!(engine.order(buy_outcome.order.id).unwrap().status, OrderStatus::Open);
    assert_eq!(engine.best_ask(Contract::Yes), Some(40));
    assert_eq!(engine.best_bid(Contract::Yes), Some(40));
}

#[test]
fn s6_settlement() {
    let user_a = UserId(1);
    let (ledger, ids, mut engine) = setup(&[(user_a, 10_000)]);
    engine.mint_set(&ledger, &ids, user_a, Shares::new(2)).unwrap();
    // Buy 8 more YES from a minted counterparty so A ends up 10 YES / 2 NO.
    let user_b = UserId(2);
    ledger.credit_deposit(user_b, Cents::new(1_000));
    engine.mint_set(&ledger, &ids, user_b, Shares::new(8)).unwrap();
    engine
        .place_order(&ledger, &ids, user_b, Side::Sell, Contract::Yes, OrderType::Limit, Some(50), Shares::new(8), MAX_QTY)
        .unwrap();
    engine
        .place_order(&ledger, &ids, user_a, Side::Buy, Contract::Yes, OrderType::Limit, Some(50), Shares::new(8), MAX_QTY)
        .unwrap();

    let a_position = engine.position(user_a).unwrap();
    assert_eq!(a_position.yes_qty, Shares::new(10));
    assert_eq!(a_position.no_qty, Shares::new(2));

    // A rests a BUY order that must be cancelled and refunded by settlement.
    ledger.credit_deposit(user_a, Cents::new(500));
    let resting = engine
        .place_order(&ledger, &ids, user_a, Side::Buy, Contract::No, OrderType::Limit, Some(20), Shares::new(5), MAX_QTY)
        .unwrap();
    assert!(resting.fills.is_empty());
    let reserved_before_settle = ledger.user(user_a).reserved_balance;
    assert_eq!(reserved_before_settle, Cents::new(100));

    let balance_before = ledger.user(user_a).balance;
    let outcome = engine.settle(&ledger, Resolution::Yes).unwrap();

    assert_eq!(outcome.resolution, Resolution::Yes);
    assert!(outcome.cancelled_orders.contains(&resting.order.id));
    assert_eq!(ledger.user(user_a).balance, balance_before + Cents::new(1_000));
    assert_eq!(ledger.user(user_a).reserved_balance, Cents::ZERO);

    let a_position_after = engine.position(user_a).unwrap();
    assert_eq!(a_position_after.yes_qty, Shares::ZERO);
    assert_eq!(a_position_after.no_qty, Shares::ZERO);
    assert_eq!(a_position_after.no_cost_basis, Cents::ZERO);

    assert_eq!(engine.order(resting.order.id).unwrap().status, OrderStatus::Cancelled);

    // Idempotent settlement (§8.8): settling again fails, no state change.
    let err = engine.settle(&ledger, Resolution::No).unwrap_err();
    assert!(matches!(err, meridian_core::EngineError::MarketAlreadyResolved(_)));
}
