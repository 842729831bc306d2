//! Order identity and lifecycle state (spec.md §3, grounded in
//! `original_source/include/matching/order.h`).

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

/// No-cap / no-price sentinel for market-buy crossing price and the
/// pre-trade sell reference price (spec.md §6).
pub const NO_CAP: u64 = u64::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
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

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderType {
    Market,
    Limit,
    Stop,
    StopLimit,
    TrailingStop,
    TrailingStopLimit,
}

impl OrderType {
    pub fn is_stop_kind(self) -> bool {
        matches!(
            self,
            OrderType::Stop | OrderType::StopLimit | OrderType::TrailingStop | OrderType::TrailingStopLimit
        )
    }

    pub fn is_trailing(self) -> bool {
        matches!(self, OrderType::TrailingStop | OrderType::TrailingStopLimit)
    }

    /// The type a stop order converts into once triggered: Market for
    /// Stop/TrailingStop, Limit for StopLimit/TrailingStopLimit.
    pub fn activated_type(self) -> OrderType {
        match self {
            OrderType::Stop | OrderType::TrailingStop => OrderType::Market,
            OrderType::StopLimit | OrderType::TrailingStopLimit => OrderType::Limit,
            other => other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeInForce {
    /// Good till cancelled — rests indefinitely.
    Gtc,
    /// Immediate or cancel — fill what you can, cancel the rest.
    Ioc,
    /// All or none — only ever executes in one matching pass, in full.
    Aon,
    /// Fill or kill — immediately or not at all.
    Fok,
}

/// An immutable identity with mutable lifecycle state (spec.md §3).
///
/// Invariants: `executed_quantity + open_quantity <= quantity` at all
/// times; `open_quantity == 0` implies the order has been fully filled and
/// is removed from the book before the operation that filled it returns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: u64,
    pub order_type: OrderType,
    pub side: Side,
    pub time_in_force: TimeInForce,
    pub symbol_id: u32,
    pub price: u64,
    pub stop_price: u64,
    pub trail_amount: u64,
    pub quantity: u64,
    pub executed_quantity: u64,
    pub open_quantity: u64,
    pub last_executed_price: u64,
    pub last_executed_quantity: u64,
    /// Monotonic tick at admission; defines time priority.
    pub timestamp: u64,
}

impl Order {
    #[allow(clippy::too_many_arguments)]
    fn new(
        id: u64,
        order_type: OrderType,
        side: Side,
        time_in_force: TimeInForce,
        symbol_id: u32,
        price: u64,
        stop_price: u64,
        trail_amount: u64,
        quantity: u64,
        timestamp: u64,
    ) -> EngineResult<Self> {
        if quantity == 0 {
            return Err(EngineError::InvalidOrder("quantity must be > 0".into()));
        }
        if order_type.is_stop_kind() {
            if order_type.is_trailing() {
                if trail_amount == 0 {
                    return Err(EngineError::InvalidOrder(
                        "trailing stop variants require a non-zero trail_amount".into(),
                    ));
                }
            } else if stop_price == 0 {
                return Err(EngineError::InvalidOrder(
                    "stop variants require a non-zero stop_price".into(),
                ));
            }
        }
        Ok(Order {
            id,
            order_type,
            side,
            time_in_force,
            symbol_id,
            price,
            stop_price,
            trail_amount,
            quantity,
            executed_quantity: 0,
            open_quantity: quantity,
            last_executed_price: 0,
            last_executed_quantity: 0,
            timestamp,
        })
    }

    pub fn market(
        id: u64,
        symbol_id: u32,
        side: Side,
        quantity: u64,
        time_in_force: TimeInForce,
        timestamp: u64,
    ) -> EngineResult<Self> {
        let price = match side {
            Side::Buy => NO_CAP,
            Side::Sell => 0,
        };
        Self::new(
            id,
            OrderType::Market,
            side,
            time_in_force,
            symbol_id,
            price,
            0,
            0,
            quantity,
            timestamp,
        )
    }

    pub fn limit(
        id: u64,
        symbol_id: u32,
        side: Side,
        price: u64,
        quantity: u64,
        time_in_force: TimeInForce,
        timestamp: u64,
    ) -> EngineResult<Self> {
        Self::new(
            id,
            OrderType::Limit,
            side,
            time_in_force,
            symbol_id,
            price,
            0,
            0,
            quantity,
            timestamp,
        )
    }

    pub fn stop(
        id: u64,
        symbol_id: u32,
        side: Side,
        stop_price: u64,
        quantity: u64,
        time_in_force: TimeInForce,
        timestamp: u64,
    ) -> EngineResult<Self> {
        Self::new(
            id,
            OrderType::Stop,
            side,
            time_in_force,
            symbol_id,
            0,
            stop_price,
            0,
            quantity,
            timestamp,
        )
    }

    pub fn stop_limit(
        id: u64,
        symbol_id: u32,
        side: Side,
        price: u64,
        stop_price: u64,
        quantity: u64,
        time_in_force: TimeInForce,
        timestamp: u64,
    ) -> EngineResult<Self> {
        Self::new(
            id,
            OrderType::StopLimit,
            side,
            time_in_force,
            symbol_id,
            price,
            stop_price,
            0,
            quantity,
            timestamp,
        )
    }

    pub fn trailing_stop(
        id: u64,
        symbol_id: u32,
        side: Side,
        trail_amount: u64,
        quantity: u64,
        time_in_force: TimeInForce,
        timestamp: u64,
    ) -> EngineResult<Self> {
        Self::new(
            id,
            OrderType::TrailingStop,
            side,
            time_in_force,
            symbol_id,
            0,
            0,
            trail_amount,
            quantity,
            timestamp,
        )
    }

    pub fn trailing_stop_limit(
        id: u64,
        symbol_id: u32,
        side: Side,
        price: u64,
        trail_amount: u64,
        quantity: u64,
        time_in_force: TimeInForce,
        timestamp: u64,
    ) -> EngineResult<Self> {
        Self::new(
            id,
            OrderType::TrailingStopLimit,
            side,
            time_in_force,
            symbol_id,
            price,
            0,
            trail_amount,
            quantity,
            timestamp,
        )
    }

    /// Reduce the order's logical quantity to `new_quantity` (cancel semantics,
    /// spec.md §3/§4.4): `open_quantity := min(new_quantity, open_quantity)`.
    pub fn set_quantity(&mut self, new_quantity: u64) {
        self.open_quantity = new_quantity.min(self.open_quantity);
        self.quantity = new_quantity;
    }

    /// Apply a fill of `quantity` at `price`; updates executed/open quantity
    /// and the last-fill fields.
    pub fn execute(&mut self, price: u64, quantity: u64) {
        debug_assert!(quantity <= self.open_quantity);
        self.open_quantity -= quantity;
        self.executed_quantity += quantity;
        self.last_executed_price = price;
        self.last_executed_quantity = quantity;
    }
}
