//! Matching Engine: validates and inserts an incoming order into its
//! pair's book (insertion-first policy), drains the opposite side while
//! the two sides cross, then enforces time-in-force on whatever remains.
//!
//! Grounded on `other_examples/bfc4b568_leeleeEcho-polymarket-backend`'s
//! `engine`/`orderbook` module split (one `MatchingEngine` fronting a
//! map of per-symbol books) adapted to this crate's synchronous,
//! `parking_lot`-guarded model instead of that file's async/`DashMap`
//! one, per the concurrency model this core actually uses.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rust_decimal::Decimal;

use crate::book::OrderBook;
use crate::error::MatchingError;
use crate::order::{Order, OrderType, Side, TimeInForce};
use crate::trade::{trade_side_ids, Trade, TradeExecution, TradeLog};

struct EngineState {
    log: TradeLog,
    next_trade_id: u64,
}

/// Decides whether `incoming` may trade against `resting` right now.
/// Shared between the real matching loop and the Fill-or-Kill
/// feasibility simulation so both agree on the stopping condition.
fn crosses(incoming: &Order, resting: &Order) -> bool {
    if matches!(incoming.order_type, OrderType::Market) {
        return true;
    }
    match incoming.side {
        Side::Buy => match incoming.price {
            Some(p) => resting.price.map(|rp| p >= rp).unwrap_or(true),
            None => true,
        },
        Side::Sell => match incoming.price {
            Some(p) => resting.price.map(|rp| p <= rp).unwrap_or(true),
            None => true,
        },
    }
}

/// Execution price for a single match: a buy incoming trades at the
/// resting ask's price (price improvement for the buyer); a priced sell
/// incoming trades at its own price, matching the base specification's
/// documented (asymmetric) source semantics. A market incoming order
/// always takes the resting side's price since it has none of its own.
fn trade_price(incoming: &Order, resting: &Order) -> Decimal {
    match (incoming.order_type, incoming.side, incoming.price) {
        (OrderType::Market, _, _) => resting.price.unwrap_or(Decimal::ZERO),
        (_, Side::Sell, Some(p)) => p,
        _ => resting.price.unwrap_or_else(|| incoming.price.unwrap_or(Decimal::ZERO)),
    }
}

pub struct MatchingEngine {
    books: RwLock<HashMap<String, Arc<OrderBook>>>,
    state: RwLock<EngineState>,
}

impl Default for MatchingEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MatchingEngine {
    pub fn new() -> Self {
        MatchingEngine {
            books: RwLock::new(HashMap::new()),
            state: RwLock::new(EngineState { log: TradeLog::new(), next_trade_id: 1 }),
        }
    }

    pub fn book(&self, pair: &str) -> Option<Arc<OrderBook>> {
        self.books.read().get(pair).cloned()
    }

    fn get_or_create_book(&self, pair: &str, now: DateTime<Utc>) -> Arc<OrderBook> {
        if let Some(book) = self.books.read().get(pair) {
            return book.clone();
        }
        self.books
            .write()
            .entry(pair.to_string())
            .or_insert_with(|| Arc::new(OrderBook::new(pair, now)))
            .clone()
    }

    fn next_trade_id(&self) -> u64 {
        let mut state = self.state.write();
        let id = state.next_trade_id;
        state.next_trade_id += 1;
        id
    }

    fn record_trade(&self, trade: Trade) {
        self.state.write().log.record(trade);
    }

    /// Fill-or-Kill feasibility check: would draining the opposite side
    /// under the same crossing rule the real loop uses satisfy the full
    /// incoming quantity? Reads a priority-sorted snapshot of the
    /// opposite side without mutating the book.
    fn can_fill_fully(&self, incoming: &Order, book: &OrderBook, now: DateTime<Utc>) -> bool {
        let mut remaining = incoming.remaining_qty;
        for resting in book.resting(incoming.side.opposite(), now) {
            if remaining.is_zero() {
                break;
            }
            if !crosses(incoming, &resting) {
                break;
            }
            remaining -= remaining.min(resting.remaining_qty);
        }
        remaining.is_zero()
    }

    /// Drains the opposite side of `book` against `incoming` until it
    /// stops crossing, incoming is fully filled, or the opposite side is
    /// exhausted. Mutates `incoming` in place and keeps the book's
    /// resting orders (and its own previously-inserted entry) in sync via
    /// `update_order`/`remove_order` after every fill, mirroring the
    /// matching engine's documented per-iteration pseudocode.
    fn drain(&self, book: &OrderBook, incoming: &mut Order, now: DateTime<Utc>) -> (Vec<Trade>, Option<Order>) {
        let mut trades = Vec::new();
        let mut last_counterparty = None;
        loop {
            if incoming.remaining_qty.is_zero() {
                break;
            }
            let best = match incoming.side {
                Side::Buy => book.best_ask(),
                Side::Sell => book.best_bid(),
            };
            let mut resting = match best {
                Some(o) if o.id != incoming.id => o,
                _ => break,
            };

            // A resting order can carry its own `expires_at` and pass it
            // between `cancel_expired_orders` sweeps; `best_bid`/`best_ask`
            // don't filter on expiry, so catch it here rather than letting
            // a doomed `fill` call panic on user-supplied data.
            if resting.is_expired(now) {
                book.remove_order(&resting.id, now).expect("resting order is present while matching");
                continue;
            }

            if !crosses(incoming, &resting) {
                break;
            }

            let qty = incoming.remaining_qty.min(resting.remaining_qty);
            let price = trade_price(incoming, &resting);
            let (buy_id, sell_id) = trade_side_ids(incoming.side, &incoming.id, &resting.id);
            let (buy_user, sell_user) = match incoming.side {
                Side::Buy => (incoming.user_id.clone(), resting.user_id.clone()),
                Side::Sell => (resting.user_id.clone(), incoming.user_id.clone()),
            };
            let trade = Trade {
                id: self.next_trade_id(),
                buy_order_id: buy_id,
                sell_order_id: sell_id,
                pair: book.pair().to_string(),
                quantity: qty,
                price,
                buy_user_id: buy_user,
                sell_user_id: sell_user,
                timestamp: now,
                fee: Decimal::ZERO,
                fee_currency: String::new(),
            };
            self.record_trade(trade.clone());
            trades.push(trade);

            incoming.fill(qty, now).expect("trade qty is bounded by incoming.remaining_qty above");
            resting.fill(qty, now).expect("trade qty is bounded by resting.remaining_qty above");

            if resting.remaining_qty.is_zero() {
                book.remove_order(&resting.id, now).expect("resting order is present while matching");
            } else {
                book.update_order(resting.clone(), now).expect("resting order is present while matching");
            }
            book.update_order(incoming.clone(), now).expect("incoming order was inserted before matching began");
            last_counterparty = Some(resting);
        }
        (trades, last_counterparty)
    }

    /// `ProcessOrder`: validates (already done by `Order::new`), inserts
    /// the order into its pair's book, matches, and applies
    /// time-in-force to whatever remains.
    pub fn process_order(&self, mut order: Order, now: DateTime<Utc>) -> Result<TradeExecution, MatchingError> {
        let book = self.get_or_create_book(&order.pair, now);

        if matches!(order.time_in_force, TimeInForce::FOK) && !self.can_fill_fully(&order, &book, now) {
            order.reject(now)?;
            return Ok(TradeExecution {
                incoming_order_snapshot: order,
                counterparty_order_snapshot: None,
                partial_fills: Vec::new(),
                remaining_buy: None,
                remaining_sell: None,
            });
        }

        book.add_order(order.clone(), now)?;
        let (trades, counterparty) = self.drain(&book, &mut order, now);

        if order.remaining_qty.is_zero() {
            // Filled is terminal: drop the now-empty resting entry (the
            // order book invariant that a filled order lives in neither
            // structure, per §4.7).
            book.remove_order(&order.id, now)?;
        } else if matches!(order.time_in_force, TimeInForce::IOC | TimeInForce::FOK) {
            // FOK only reaches here if the feasibility check above raced
            // with itself under the invariants it relies on; treat any
            // leftover the same way IOC does rather than resting it.
            book.remove_order(&order.id, now)?;
            order.cancel(now)?;
        }

        let (remaining_buy, remaining_sell) = match order.side {
            Side::Buy => (Some(order.remaining_qty), None),
            Side::Sell => (None, Some(order.remaining_qty)),
        };

        Ok(TradeExecution {
            incoming_order_snapshot: order,
            counterparty_order_snapshot: counterparty,
            partial_fills: trades,
            remaining_buy,
            remaining_sell,
        })
    }

    pub fn get_trades(&self) -> Vec<Trade> {
        self.state.read().log.all().to_vec()
    }

    pub fn get_trades_by_pair(&self, pair: &str) -> Vec<Trade> {
        self.state.read().log.by_pair(pair)
    }

    pub fn get_trades_by_user(&self, user_id: &str) -> Vec<Trade> {
        self.state.read().log.by_user(user_id)
    }

    pub fn get_trade_count(&self) -> usize {
        self.state.read().log.count()
    }

    pub fn clear_trades(&self) {
        self.state.write().log.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn limit(id: &str, user: &str, side: Side, price: &str, qty: &str, created_at: DateTime<Utc>) -> Order {
        Order::new(
            id.into(),
            user.into(),
            "BTC-USD".into(),
            side,
            OrderType::Limit,
            qty.parse().unwrap(),
            Some(price.parse().unwrap()),
            None,
            TimeInForce::GTC,
            created_at,
            None,
        )
        .unwrap()
    }

    #[test]
    fn s4_order_book_crossing() {
        let engine = MatchingEngine::new();
        engine.process_order(limit("A", "seller", Side::Sell, "100", "10", t(0)), t(0)).unwrap();
        let exec = engine.process_order(limit("B", "buyer", Side::Buy, "105", "6", t(1)), t(1)).unwrap();

        assert_eq!(exec.partial_fills.len(), 1);
        assert_eq!(exec.partial_fills[0].quantity, "6".parse().unwrap());
        assert_eq!(exec.partial_fills[0].price, "100".parse().unwrap());

        let book = engine.book("BTC-USD").unwrap();
        let resting_a = book.get_order("A").unwrap();
        assert_eq!(resting_a.remaining_qty, "4".parse().unwrap());
        assert_eq!(resting_a.status, crate::order::OrderStatus::Partial);

        let b = exec.incoming_order_snapshot;
        assert_eq!(b.status, crate::order::OrderStatus::Filled);
        assert_eq!(b.remaining_qty, Decimal::ZERO);
    }

    #[test]
    fn s5_partial_fill_with_priority() {
        let engine = MatchingEngine::new();
        engine.process_order(limit("A", "sa", Side::Sell, "100", "5", t(1)), t(1)).unwrap();
        engine.process_order(limit("B", "sb", Side::Sell, "100", "5", t(2)), t(2)).unwrap();
        engine.process_order(limit("C", "sc", Side::Sell, "101", "10", t(0)), t(0)).unwrap();

        let exec = engine.process_order(limit("D", "buyer", Side::Buy, "101", "8", t(3)), t(3)).unwrap();

        assert_eq!(exec.partial_fills.len(), 2);
        assert_eq!(exec.partial_fills[0].sell_order_id, "A");
        assert_eq!(exec.partial_fills[0].quantity, "5".parse().unwrap());
        assert_eq!(exec.partial_fills[1].sell_order_id, "B");
        assert_eq!(exec.partial_fills[1].quantity, "3".parse().unwrap());

        let book = engine.book("BTC-USD").unwrap();
        let b = book.get_order("B").unwrap();
        assert_eq!(b.remaining_qty, "2".parse().unwrap());
        let c = book.get_order("C").unwrap();
        assert_eq!(c.remaining_qty, "10".parse().unwrap());
    }

    #[test]
    fn ioc_cancels_unfilled_remainder_instead_of_resting() {
        let engine = MatchingEngine::new();
        engine.process_order(limit("A", "seller", Side::Sell, "100", "5", t(0)), t(0)).unwrap();
        let mut taker = limit("B", "buyer", Side::Buy, "100", "8", t(1));
        taker.time_in_force = TimeInForce::IOC;
        let exec = engine.process_order(taker, t(1)).unwrap();

        assert_eq!(exec.partial_fills.len(), 1);
        assert_eq!(exec.incoming_order_snapshot.status, crate::order::OrderStatus::Cancelled);
        let book = engine.book("BTC-USD").unwrap();
        assert!(matches!(book.get_order("B"), Err(crate::error::BookError::OrderNotFound(_))));
    }

    #[test]
    fn fok_rejects_before_touching_book_when_unfillable() {
        let engine = MatchingEngine::new();
        engine.process_order(limit("A", "seller", Side::Sell, "100", "3", t(0)), t(0)).unwrap();
        let mut taker = limit("B", "buyer", Side::Buy, "100", "8", t(1));
        taker.time_in_force = TimeInForce::FOK;
        let exec = engine.process_order(taker, t(1)).unwrap();

        assert!(exec.partial_fills.is_empty());
        assert_eq!(exec.incoming_order_snapshot.status, crate::order::OrderStatus::Rejected);
        let book = engine.book("BTC-USD").unwrap();
        assert!(matches!(book.get_order("B"), Err(crate::error::BookError::OrderNotFound(_))));
        assert_eq!(book.get_order("A").unwrap().remaining_qty, "3".parse().unwrap());
    }

    #[test]
    fn fok_fills_fully_when_liquidity_suffices() {
        let engine = MatchingEngine::new();
        engine.process_order(limit("A", "seller", Side::Sell, "100", "10", t(0)), t(0)).unwrap();
        let mut taker = limit("B", "buyer", Side::Buy, "100", "8", t(1));
        taker.time_in_force = TimeInForce::FOK;
        let exec = engine.process_order(taker, t(1)).unwrap();

        assert_eq!(exec.partial_fills.len(), 1);
        assert_eq!(exec.incoming_order_snapshot.status, crate::order::OrderStatus::Filled);
    }

    #[test]
    fn drain_skips_expired_resting_order_instead_of_panicking() {
        let engine = MatchingEngine::new();
        let mut stale = limit("A", "seller", Side::Sell, "100", "5", t(0));
        stale.expires_at = Some(t(5));
        engine.process_order(stale, t(0)).unwrap();

        let exec = engine.process_order(limit("B", "buyer", Side::Buy, "100", "5", t(10)), t(10)).unwrap();

        assert!(exec.partial_fills.is_empty());
        assert_eq!(exec.incoming_order_snapshot.status, crate::order::OrderStatus::Pending);
        let book = engine.book("BTC-USD").unwrap();
        assert!(matches!(book.get_order("A"), Err(crate::error::BookError::OrderNotFound(_))));
        assert_eq!(book.get_order("B").unwrap().remaining_qty, "5".parse().unwrap());
    }

    #[test]
    fn trade_ids_strictly_increase() {
        let engine = MatchingEngine::new();
        engine.process_order(limit("A", "s1", Side::Sell, "100", "5", t(0)), t(0)).unwrap();
        engine.process_order(limit("B", "s2", Side::Sell, "100", "5", t(1)), t(1)).unwrap();
        engine.process_order(limit("C", "buyer", Side::Buy, "100", "10", t(2)), t(2)).unwrap();
        let trades = engine.get_trades_by_pair("BTC-USD");
        assert_eq!(trades.len(), 2);
        assert!(trades[0].id < trades[1].id);
    }
}
