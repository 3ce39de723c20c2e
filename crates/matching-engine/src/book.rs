//! Order Book: two priority structures plus an authoritative id-index.
//!
//! Grounded on `other_examples/a9b353ea_joaquinbejar-OrderBook-rs` for the
//! dual-`BinaryHeap` shape and on the base specification's auxiliary-index
//! design note (§9): entries are removed from the id-index eagerly but left
//! as tombstones in the heap, discarded lazily on pop instead of requiring
//! a linear scan. A per-id version counter (bumped on every `update_order`)
//! lets a stale heap entry be recognized even when an order's price hasn't
//! changed, which a price-only staleness check would miss.
//!
//! Locking follows the facade's own convention (`vm-engine::facade`): a
//! single `parking_lot::RwLock` guards bids/asks/index/versions together,
//! taken for the duration of each individual operation.

use std::collections::{BinaryHeap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rust_decimal::Decimal;

use crate::error::BookError;
use crate::order::{Order, Side};

#[derive(Clone, Debug, PartialEq, Eq)]
struct HeapEntry {
    price: Option<Decimal>,
    created_at: DateTime<Utc>,
    id: String,
    version: u64,
}

/// Bid ordering: market orders first, then price descending, then
/// earlier `created_at` first. `BinaryHeap` is a max-heap, so "should pop
/// first" must compare as `Ordering::Greater`.
#[derive(Clone, Debug, PartialEq, Eq)]
struct BidEntry(HeapEntry);

impl Ord for BidEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        match (self.0.price, other.0.price) {
            (None, None) => other.0.created_at.cmp(&self.0.created_at),
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (Some(_), None) => std::cmp::Ordering::Less,
            (Some(a), Some(b)) => a.cmp(&b).then_with(|| other.0.created_at.cmp(&self.0.created_at)),
        }
    }
}

impl PartialOrd for BidEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Ask ordering: market orders first, then price ascending, then earlier
/// `created_at` first.
#[derive(Clone, Debug, PartialEq, Eq)]
struct AskEntry(HeapEntry);

impl Ord for AskEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        match (self.0.price, other.0.price) {
            (None, None) => other.0.created_at.cmp(&self.0.created_at),
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (Some(_), None) => std::cmp::Ordering::Less,
            (Some(a), Some(b)) => b.cmp(&a).then_with(|| other.0.created_at.cmp(&self.0.created_at)),
        }
    }
}

impl PartialOrd for AskEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Derived, non-stored view of aggregate liquidity at a price.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PriceLevel {
    pub price: Decimal,
    pub total_remaining: Decimal,
    pub order_count: usize,
}

struct BookState {
    bids: BinaryHeap<BidEntry>,
    asks: BinaryHeap<AskEntry>,
    index: HashMap<String, Order>,
    versions: HashMap<String, u64>,
    last_update: DateTime<Utc>,
}

pub struct OrderBook {
    pair: String,
    inner: RwLock<BookState>,
    sequence: AtomicU64,
}

impl OrderBook {
    pub fn new(pair: impl Into<String>, now: DateTime<Utc>) -> Self {
        OrderBook {
            pair: pair.into(),
            inner: RwLock::new(BookState {
                bids: BinaryHeap::new(),
                asks: BinaryHeap::new(),
                index: HashMap::new(),
                versions: HashMap::new(),
                last_update: now,
            }),
            sequence: AtomicU64::new(0),
        }
    }

    pub fn pair(&self) -> &str {
        &self.pair
    }

    fn check_pair(&self, order: &Order) -> Result<(), BookError> {
        if order.pair != self.pair {
            return Err(BookError::TradingPairMismatch(order.id.clone(), order.pair.clone(), self.pair.clone()));
        }
        Ok(())
    }

    fn push_entry(state: &mut BookState, order: &Order, version: u64) {
        let entry = HeapEntry { price: order.price, created_at: order.created_at, id: order.id.clone(), version };
        match order.side {
            Side::Buy => state.bids.push(BidEntry(entry)),
            Side::Sell => state.asks.push(AskEntry(entry)),
        }
    }

    pub fn add_order(&self, order: Order, now: DateTime<Utc>) -> Result<(), BookError> {
        self.check_pair(&order)?;
        let mut state = self.inner.write();
        if state.index.contains_key(&order.id) {
            return Err(BookError::OrderAlreadyExists(order.id));
        }
        let version = self.sequence.fetch_add(1, AtomicOrdering::Relaxed);
        Self::push_entry(&mut state, &order, version);
        state.versions.insert(order.id.clone(), version);
        state.index.insert(order.id.clone(), order);
        state.last_update = now;
        Ok(())
    }

    pub fn remove_order(&self, id: &str, now: DateTime<Utc>) -> Result<Order, BookError> {
        let mut state = self.inner.write();
        let order = state.index.remove(id).ok_or_else(|| BookError::OrderNotFound(id.to_string()))?;
        state.versions.remove(id);
        state.last_update = now;
        Ok(order)
    }

    /// `updated` must carry the same id and pair as the resting order.
    /// Bumps the id's version, which tombstones every heap entry pushed
    /// under the previous version, and pushes a fresh entry reflecting
    /// the new price/remaining snapshot.
    pub fn update_order(&self, updated: Order, now: DateTime<Utc>) -> Result<(), BookError> {
        self.check_pair(&updated)?;
        let mut state = self.inner.write();
        if !state.index.contains_key(&updated.id) {
            return Err(BookError::OrderNotFound(updated.id));
        }
        let version = self.sequence.fetch_add(1, AtomicOrdering::Relaxed);
        Self::push_entry(&mut state, &updated, version);
        state.versions.insert(updated.id.clone(), version);
        state.index.insert(updated.id.clone(), updated);
        state.last_update = now;
        Ok(())
    }

    pub fn get_order(&self, id: &str) -> Result<Order, BookError> {
        self.inner
            .read()
            .index
            .get(id)
            .cloned()
            .ok_or_else(|| BookError::OrderNotFound(id.to_string()))
    }

    fn is_live(state: &BookState, entry: &HeapEntry) -> bool {
        matches!(state.versions.get(&entry.id), Some(&v) if v == entry.version)
    }

    /// Peeks the highest-priority bid, discarding any tombstoned entries
    /// encountered along the way. Does not remove the live entry.
    pub fn best_bid(&self) -> Option<Order> {
        let mut state = self.inner.write();
        loop {
            match state.bids.peek() {
                Some(top) if Self::is_live(&state, &top.0) => return state.index.get(&top.0.id).cloned(),
                Some(_) => {
                    state.bids.pop();
                }
                None => return None,
            }
        }
    }

    pub fn best_ask(&self) -> Option<Order> {
        let mut state = self.inner.write();
        loop {
            match state.asks.peek() {
                Some(top) if Self::is_live(&state, &top.0) => return state.index.get(&top.0.id).cloned(),
                Some(_) => {
                    state.asks.pop();
                }
                None => return None,
            }
        }
    }

    pub fn spread(&self) -> Result<Decimal, BookError> {
        let bid = self.best_bid().ok_or_else(|| BookError::OrderBookEmpty(self.pair.clone()))?;
        let ask = self.best_ask().ok_or_else(|| BookError::OrderBookEmpty(self.pair.clone()))?;
        let (bid_price, ask_price) = (
            bid.price.ok_or_else(|| BookError::OrderBookEmpty(self.pair.clone()))?,
            ask.price.ok_or_else(|| BookError::OrderBookEmpty(self.pair.clone()))?,
        );
        Ok(ask_price - bid_price)
    }

    pub fn mid_price(&self) -> Result<Decimal, BookError> {
        let bid = self.best_bid().ok_or_else(|| BookError::OrderBookEmpty(self.pair.clone()))?;
        let ask = self.best_ask().ok_or_else(|| BookError::OrderBookEmpty(self.pair.clone()))?;
        let (bid_price, ask_price) = (
            bid.price.ok_or_else(|| BookError::OrderBookEmpty(self.pair.clone()))?,
            ask.price.ok_or_else(|| BookError::OrderBookEmpty(self.pair.clone()))?,
        );
        Ok((ask_price + bid_price) / Decimal::from(2))
    }

    /// Live, unexpired resting orders on one side, sorted best-first under
    /// the same priority rule the heaps enforce (market orders first, then
    /// price, then earlier `created_at`). Used by `MatchingEngine`'s
    /// Fill-or-Kill feasibility simulation, which must inspect the book
    /// without mutating it.
    pub fn resting(&self, side: Side, now: DateTime<Utc>) -> Vec<Order> {
        let state = self.inner.read();
        let mut orders: Vec<Order> =
            state.index.values().filter(|o| o.side == side && !o.is_expired(now)).cloned().collect();
        match side {
            Side::Buy => orders.sort_by(|a, b| match (a.price, b.price) {
                (None, None) => a.created_at.cmp(&b.created_at),
                (None, Some(_)) => std::cmp::Ordering::Less,
                (Some(_), None) => std::cmp::Ordering::Greater,
                (Some(x), Some(y)) => y.cmp(&x).then_with(|| a.created_at.cmp(&b.created_at)),
            }),
            Side::Sell => orders.sort_by(|a, b| match (a.price, b.price) {
                (None, None) => a.created_at.cmp(&b.created_at),
                (None, Some(_)) => std::cmp::Ordering::Less,
                (Some(_), None) => std::cmp::Ordering::Greater,
                (Some(x), Some(y)) => x.cmp(&y).then_with(|| a.created_at.cmp(&b.created_at)),
            }),
        }
        orders
    }

    /// Aggregates the top `n` price levels per side from live, priced
    /// (non-market) resting orders. Bid levels are price-descending, ask
    /// levels price-ascending.
    pub fn depth(&self, n: usize) -> (Vec<PriceLevel>, Vec<PriceLevel>) {
        let state = self.inner.read();
        let mut bid_levels: Vec<(Decimal, Decimal, usize)> = Vec::new();
        for order in state.index.values().filter(|o| o.side == Side::Buy) {
            if let Some(price) = order.price {
                match bid_levels.iter_mut().find(|(p, _, _)| *p == price) {
                    Some((_, vol, count)) => {
                        *vol += order.remaining_qty;
                        *count += 1;
                    }
                    None => bid_levels.push((price, order.remaining_qty, 1)),
                }
            }
        }
        let mut ask_levels: Vec<(Decimal, Decimal, usize)> = Vec::new();
        for order in state.index.values().filter(|o| o.side == Side::Sell) {
            if let Some(price) = order.price {
                match ask_levels.iter_mut().find(|(p, _, _)| *p == price) {
                    Some((_, vol, count)) => {
                        *vol += order.remaining_qty;
                        *count += 1;
                    }
                    None => ask_levels.push((price, order.remaining_qty, 1)),
                }
            }
        }
        bid_levels.sort_by(|a, b| b.0.cmp(&a.0));
        ask_levels.sort_by(|a, b| a.0.cmp(&b.0));
        bid_levels.truncate(n);
        ask_levels.truncate(n);
        let into_levels = |levels: Vec<(Decimal, Decimal, usize)>| {
            levels
                .into_iter()
                .map(|(price, total_remaining, order_count)| PriceLevel { price, total_remaining, order_count })
                .collect()
        };
        (into_levels(bid_levels), into_levels(ask_levels))
    }

    /// Sweeps the id-index for expired orders, removing them from both
    /// structures (lazily, same as `remove_order`). Returns how many were
    /// removed.
    pub fn cancel_expired_orders(&self, now: DateTime<Utc>) -> usize {
        let mut state = self.inner.write();
        let expired: Vec<String> = state
            .index
            .iter()
            .filter(|(_, order)| order.is_expired(now))
            .map(|(id, _)| id.clone())
            .collect();
        for id in &expired {
            state.index.remove(id);
            state.versions.remove(id);
        }
        if !expired.is_empty() {
            state.last_update = now;
        }
        expired.len()
    }

    pub fn last_update(&self) -> DateTime<Utc> {
        self.inner.read().last_update
    }

    pub fn len(&self) -> usize {
        self.inner.read().index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::{OrderType, TimeInForce};
    use chrono::TimeZone;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn ask(id: &str, price: &str, qty: &str, created_at: DateTime<Utc>) -> Order {
        Order::new(
            id.into(),
            "u1".into(),
            "BTC-USD".into(),
            Side::Sell,
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
    fn best_ask_picks_lowest_price_then_earliest() {
        let book = OrderBook::new("BTC-USD", t(0));
        book.add_order(ask("A", "100", "5", t(1)), t(1)).unwrap();
        book.add_order(ask("B", "100", "5", t(2)), t(2)).unwrap();
        book.add_order(ask("C", "101", "10", t(0)), t(0)).unwrap();
        let best = book.best_ask().unwrap();
        assert_eq!(best.id, "A");
    }

    #[test]
    fn remove_order_is_invisible_to_best_ask_and_get_order() {
        let book = OrderBook::new("BTC-USD", t(0));
        book.add_order(ask("A", "100", "5", t(1)), t(1)).unwrap();
        book.add_order(ask("B", "101", "5", t(2)), t(2)).unwrap();
        book.remove_order("A", t(3)).unwrap();
        assert!(matches!(book.get_order("A"), Err(BookError::OrderNotFound(_))));
        assert_eq!(book.best_ask().unwrap().id, "B");
    }

    #[test]
    fn update_order_changes_priority_and_tombstones_old_entry() {
        let book = OrderBook::new("BTC-USD", t(0));
        book.add_order(ask("A", "101", "5", t(1)), t(1)).unwrap();
        book.add_order(ask("B", "100", "5", t(2)), t(2)).unwrap();
        assert_eq!(book.best_ask().unwrap().id, "B");
        let mut a = book.get_order("A").unwrap();
        a.price = Some("99".parse().unwrap());
        book.update_order(a, t(3)).unwrap();
        assert_eq!(book.best_ask().unwrap().id, "A");
        assert_eq!(book.len(), 2);
    }

    #[test]
    fn duplicate_id_rejected() {
        let book = OrderBook::new("BTC-USD", t(0));
        book.add_order(ask("A", "100", "5", t(1)), t(1)).unwrap();
        let err = book.add_order(ask("A", "101", "5", t(2)), t(2)).unwrap_err();
        assert!(matches!(err, BookError::OrderAlreadyExists(_)));
    }

    #[test]
    fn depth_aggregates_same_price_levels() {
        let book = OrderBook::new("BTC-USD", t(0));
        book.add_order(ask("A", "100", "5", t(1)), t(1)).unwrap();
        book.add_order(ask("B", "100", "5", t(2)), t(2)).unwrap();
        book.add_order(ask("C", "101", "10", t(0)), t(0)).unwrap();
        let (_, asks) = book.depth(10);
        assert_eq!(asks.len(), 2);
        assert_eq!(asks[0].price, "100".parse().unwrap());
        assert_eq!(asks[0].total_remaining, "10".parse().unwrap());
        assert_eq!(asks[0].order_count, 2);
    }
}
