//! Order type, validation, and lifecycle transitions.
//!
//! Field layout and the `Side`/`OrderType`/`TimeInForce` enums are grounded
//! on the teacher pack's `e493f002` (borja-eth) and `f21b9548`
//! (koconnell-dire) domain models: a flat, serde-derived struct with a
//! `Decimal` quantity/price rather than floats, `chrono::DateTime<Utc>`
//! timestamps, and validation performed in a fallible constructor instead
//! of at the call site.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::OrderError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
    Limit,
    Market,
    StopLoss,
    TakeProfit,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    Pending,
    Partial,
    Filled,
    Cancelled,
    Rejected,
}

impl OrderStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Filled | OrderStatus::Cancelled | OrderStatus::Rejected)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeInForce {
    /// Good-Till-Cancel: unfilled remainder rests in the book.
    GTC,
    /// Immediate-or-Cancel: unfilled remainder is cancelled, never rests.
    IOC,
    /// Fill-or-Kill: rejected up front unless fully fillable immediately.
    FOK,
}

/// Immutable-identity order record. `id`, `user_id`, `pair`, `side`,
/// `order_type`, `time_in_force` and `created_at` never change after
/// construction; `status`, `filled_qty`, `remaining_qty` and `updated_at`
/// are the mutable lifecycle state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub user_id: String,
    pub pair: String,
    pub side: Side,
    pub order_type: OrderType,
    pub status: OrderStatus,
    pub quantity: Decimal,
    pub price: Option<Decimal>,
    pub filled_qty: Decimal,
    pub remaining_qty: Decimal,
    pub stop_price: Option<Decimal>,
    pub time_in_force: TimeInForce,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Order {
    /// Constructs and validates an order. Rejects empty identifiers,
    /// non-positive quantity, a priced market order, an unpriced limit
    /// order, a stop/take-profit order without a stop price, and an
    /// already-past expiration.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: String,
        user_id: String,
        pair: String,
        side: Side,
        order_type: OrderType,
        quantity: Decimal,
        price: Option<Decimal>,
        stop_price: Option<Decimal>,
        time_in_force: TimeInForce,
        created_at: DateTime<Utc>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<Self, OrderError> {
        if id.is_empty() {
            return Err(OrderError::InvalidId);
        }
        if user_id.is_empty() {
            return Err(OrderError::InvalidUser);
        }
        if pair.is_empty() {
            return Err(OrderError::InvalidPair);
        }
        if quantity <= Decimal::ZERO {
            return Err(OrderError::InvalidQuantity);
        }
        match order_type {
            OrderType::Market => {
                if price.is_some() {
                    return Err(OrderError::MarketOrderWithPrice);
                }
            }
            OrderType::Limit => match price {
                Some(p) if p > Decimal::ZERO => {}
                Some(_) => return Err(OrderError::InvalidPrice),
                None => return Err(OrderError::InvalidPrice),
            },
            OrderType::StopLoss | OrderType::TakeProfit => {
                match stop_price {
                    Some(p) if p > Decimal::ZERO => {}
                    Some(_) => return Err(OrderError::InvalidStopPrice),
                    None => return Err(OrderError::StopOrderWithoutStopPrice),
                }
                if let Some(p) = price {
                    if p <= Decimal::ZERO {
                        return Err(OrderError::InvalidPrice);
                    }
                }
            }
        }
        if let Some(expires_at) = expires_at {
            if expires_at <= created_at {
                return Err(OrderError::ExpiredOrder);
            }
        }

        Ok(Order {
            id,
            user_id,
            pair,
            side,
            order_type,
            status: OrderStatus::Pending,
            quantity,
            price,
            filled_qty: Decimal::ZERO,
            remaining_qty: quantity,
            stop_price,
            time_in_force,
            created_at,
            updated_at: created_at,
            expires_at,
        })
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|at| now >= at).unwrap_or(false)
    }

    pub fn can_fill(&self, qty: Decimal, now: DateTime<Utc>) -> bool {
        matches!(self.status, OrderStatus::Pending | OrderStatus::Partial)
            && !self.is_expired(now)
            && self.remaining_qty > Decimal::ZERO
            && qty > Decimal::ZERO
            && qty <= self.remaining_qty
    }

    /// Applies a fill of `qty` at `price`. `price` is not stored on the
    /// order itself (only in the resulting `Trade`); this only updates
    /// the fill/remaining bookkeeping and status.
    pub fn fill(&mut self, qty: Decimal, now: DateTime<Utc>) -> Result<(), OrderError> {
        if !self.can_fill(qty, now) {
            return Err(OrderError::CannotFill(self.id.clone(), qty, self.remaining_qty));
        }
        self.filled_qty += qty;
        self.remaining_qty -= qty;
        self.status = if self.remaining_qty.is_zero() {
            OrderStatus::Filled
        } else {
            OrderStatus::Partial
        };
        self.updated_at = now;
        Ok(())
    }

    fn require_cancellable(&self) -> Result<(), OrderError> {
        match self.status {
            OrderStatus::Pending | OrderStatus::Partial => Ok(()),
            OrderStatus::Filled => Err(OrderError::AlreadyFilled(self.id.clone())),
            OrderStatus::Cancelled => Err(OrderError::AlreadyCancelled(self.id.clone())),
            OrderStatus::Rejected => Err(OrderError::AlreadyRejected(self.id.clone())),
        }
    }

    pub fn cancel(&mut self, now: DateTime<Utc>) -> Result<(), OrderError> {
        self.require_cancellable()?;
        self.status = OrderStatus::Cancelled;
        self.updated_at = now;
        Ok(())
    }

    pub fn reject(&mut self, now: DateTime<Utc>) -> Result<(), OrderError> {
        self.require_cancellable()?;
        self.status = OrderStatus::Rejected;
        self.updated_at = now;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    fn limit_order(qty: &str, price: &str) -> Order {
        Order::new(
            "o1".into(),
            "u1".into(),
            "BTC-USD".into(),
            Side::Buy,
            OrderType::Limit,
            qty.parse().unwrap(),
            Some(price.parse().unwrap()),
            None,
            TimeInForce::GTC,
            now(),
            None,
        )
        .unwrap()
    }

    #[test]
    fn rejects_empty_identifiers() {
        assert_eq!(
            Order::new(
                "".into(),
                "u1".into(),
                "BTC-USD".into(),
                Side::Buy,
                OrderType::Limit,
                Decimal::ONE,
                Some(Decimal::ONE),
                None,
                TimeInForce::GTC,
                now(),
                None
            )
            .unwrap_err(),
            OrderError::InvalidId
        );
    }

    #[test]
    fn rejects_market_order_with_price() {
        let err = Order::new(
            "o1".into(),
            "u1".into(),
            "BTC-USD".into(),
            Side::Buy,
            OrderType::Market,
            Decimal::ONE,
            Some(Decimal::ONE),
            None,
            TimeInForce::IOC,
            now(),
            None,
        )
        .unwrap_err();
        assert_eq!(err, OrderError::MarketOrderWithPrice);
    }

    #[test]
    fn rejects_limit_order_without_price() {
        let err = Order::new(
            "o1".into(),
            "u1".into(),
            "BTC-USD".into(),
            Side::Buy,
            OrderType::Limit,
            Decimal::ONE,
            None,
            None,
            TimeInForce::GTC,
            now(),
            None,
        )
        .unwrap_err();
        assert_eq!(err, OrderError::InvalidPrice);
    }

    #[test]
    fn rejects_stop_order_without_stop_price() {
        let err = Order::new(
            "o1".into(),
            "u1".into(),
            "BTC-USD".into(),
            Side::Sell,
            OrderType::StopLoss,
            Decimal::ONE,
            None,
            None,
            TimeInForce::GTC,
            now(),
            None,
        )
        .unwrap_err();
        assert_eq!(err, OrderError::StopOrderWithoutStopPrice);
    }

    #[test]
    fn fill_transitions_to_partial_then_filled() {
        let mut order = limit_order("10", "100");
        order.fill(Decimal::new(6, 0), now()).unwrap();
        assert_eq!(order.status, OrderStatus::Partial);
        assert_eq!(order.remaining_qty, Decimal::new(4, 0));
        order.fill(Decimal::new(4, 0), now()).unwrap();
        assert_eq!(order.status, OrderStatus::Filled);
        assert_eq!(order.remaining_qty, Decimal::ZERO);
    }

    #[test]
    fn cannot_fill_past_remaining() {
        let mut order = limit_order("5", "100");
        let err = order.fill(Decimal::new(6, 0), now()).unwrap_err();
        assert!(matches!(err, OrderError::CannotFill(_, _, _)));
    }

    #[test]
    fn cancel_then_fill_fails() {
        let mut order = limit_order("5", "100");
        order.cancel(now()).unwrap();
        assert_eq!(order.status, OrderStatus::Cancelled);
        let err = order.fill(Decimal::ONE, now()).unwrap_err();
        assert!(matches!(err, OrderError::CannotFill(_, _, _)));
        let err = order.cancel(now()).unwrap_err();
        assert_eq!(err, OrderError::AlreadyCancelled("o1".into()));
    }
}
