//! Error kinds for order validation, order lifecycle transitions, the
//! order book, and the matching engine, split the way the teacher splits
//! VM errors from registry/storage errors: each layer gets its own
//! `thiserror`-derived enum rather than one grab-bag type.

/// Rejected at construction time or by a lifecycle transition.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum OrderError {
    #[error("order id must not be empty")]
    InvalidId,
    #[error("user id must not be empty")]
    InvalidUser,
    #[error("trading pair must not be empty")]
    InvalidPair,
    #[error("time-in-force {0:?} is not a recognized value")]
    InvalidTimeInForce(String),
    #[error("quantity must be positive")]
    InvalidQuantity,
    #[error("price must be positive for a priced order")]
    InvalidPrice,
    #[error("stop price must be positive")]
    InvalidStopPrice,
    #[error("market orders must not carry a price")]
    MarketOrderWithPrice,
    #[error("stop-loss/take-profit orders require a stop price")]
    StopOrderWithoutStopPrice,
    #[error("order's expiration is already in the past")]
    ExpiredOrder,
    #[error("order {0} is already filled")]
    AlreadyFilled(String),
    #[error("order {0} is already cancelled")]
    AlreadyCancelled(String),
    #[error("order {0} is already rejected")]
    AlreadyRejected(String),
    #[error("order {0} cannot fill {1} units against {2} remaining")]
    CannotFill(String, rust_decimal::Decimal, rust_decimal::Decimal),
}

/// Order Book errors, per the order book's boundary.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum BookError {
    #[error("order {0} not found")]
    OrderNotFound(String),
    #[error("order {0} already exists")]
    OrderAlreadyExists(String),
    #[error("order book for {0} is empty")]
    OrderBookEmpty(String),
    #[error("insufficient liquidity to fill order {0}")]
    InsufficientLiquidity(String),
    #[error("order {0} belongs to pair {1}, not {2}")]
    TradingPairMismatch(String, String, String),
    #[error(transparent)]
    Order(#[from] OrderError),
}

/// Matching Engine errors returned from `ProcessOrder`.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MatchingError {
    #[error(transparent)]
    Book(#[from] BookError),
    #[error(transparent)]
    Order(#[from] OrderError),
}
