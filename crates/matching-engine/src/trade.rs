//! Append-only trade record and log, queryable by pair and user.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::order::Side;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub id: u64,
    pub buy_order_id: String,
    pub sell_order_id: String,
    pub pair: String,
    pub quantity: Decimal,
    pub price: Decimal,
    pub buy_user_id: String,
    pub sell_user_id: String,
    pub timestamp: DateTime<Utc>,
    pub fee: Decimal,
    pub fee_currency: String,
}

/// Everything resulting from running one incoming order through
/// `MatchingEngine::process_order`, per the matching engine's external
/// boundary.
#[derive(Clone, Debug, PartialEq)]
pub struct TradeExecution {
    pub incoming_order_snapshot: crate::order::Order,
    pub counterparty_order_snapshot: Option<crate::order::Order>,
    pub partial_fills: Vec<Trade>,
    pub remaining_buy: Option<Decimal>,
    pub remaining_sell: Option<Decimal>,
}

/// Append-only. Never mutates or removes a recorded `Trade`.
#[derive(Default)]
pub struct TradeLog {
    trades: Vec<Trade>,
}

impl TradeLog {
    pub fn new() -> Self {
        TradeLog { trades: Vec::new() }
    }

    pub fn record(&mut self, trade: Trade) {
        self.trades.push(trade);
    }

    pub fn all(&self) -> &[Trade] {
        &self.trades
    }

    pub fn by_pair(&self, pair: &str) -> Vec<Trade> {
        self.trades.iter().filter(|t| t.pair == pair).cloned().collect()
    }

    pub fn by_user(&self, user_id: &str) -> Vec<Trade> {
        self.trades
            .iter()
            .filter(|t| t.buy_user_id == user_id || t.sell_user_id == user_id)
            .cloned()
            .collect()
    }

    pub fn count(&self) -> usize {
        self.trades.len()
    }

    pub fn clear(&mut self) {
        self.trades.clear();
    }
}

pub fn trade_side_ids(side: Side, incoming_id: &str, resting_id: &str) -> (String, String) {
    match side {
        Side::Buy => (incoming_id.to_string(), resting_id.to_string()),
        Side::Sell => (resting_id.to_string(), incoming_id.to_string()),
    }
}
