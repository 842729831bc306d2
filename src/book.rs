//! The per-symbol order book and its matching / stop-activation engine
//! (spec.md §§3–4 and §9), grounded directly in
//! `original_source/src/matching/price_level_order_book.cpp`.

use std::collections::{BTreeMap, HashMap};

use tracing::{debug, trace};

use crate::error::{EngineError, EngineResult};
use crate::event::EventObserver;
use crate::level::{Level, LevelKind};
use crate::order::{NO_CAP, Order, OrderType, Side, TimeInForce};

/// Where a resting order lives: which side/kind map, and which price key.
///
/// This is the "ownership-safe (price, side, kind) re-lookup" back-reference
/// spec.md §9 offers as the alternative to a stable-address arena — cheaper
/// to reason about in safe Rust than a raw pointer into a `BTreeMap` node
/// that might be invalidated by a sibling mutation (see DESIGN.md).
#[derive(Debug, Clone, Copy)]
struct OrderLocation {
    side: Side,
    kind: LevelKind,
    price: u64,
}

/// One symbol's order book: six price-ordered level indexes, the order
/// index, and the last-traded-price / trailing-stop watermarks (spec.md §3).
pub struct OrderBook {
    symbol_id: u32,
    buy_limit: BTreeMap<u64, Level>,
    sell_limit: BTreeMap<u64, Level>,
    buy_stop: BTreeMap<u64, Level>,
    sell_stop: BTreeMap<u64, Level>,
    buy_trailing_stop: BTreeMap<u64, Level>,
    sell_trailing_stop: BTreeMap<u64, Level>,
    locations: HashMap<u64, OrderLocation>,
    last_traded_price: u64,
    has_traded: bool,
    trailing_buy_price: u64,
    trailing_sell_price: u64,
    next_tick: u64,
}

impl OrderBook {
    pub fn new(symbol_id: u32) -> Self {
        OrderBook {
            symbol_id,
            buy_limit: BTreeMap::new(),
            sell_limit: BTreeMap::new(),
            buy_stop: BTreeMap::new(),
            sell_stop: BTreeMap::new(),
            buy_trailing_stop: BTreeMap::new(),
            sell_trailing_stop: BTreeMap::new(),
            locations: HashMap::new(),
            last_traded_price: 0,
            has_traded: false,
            trailing_buy_price: 0,
            trailing_sell_price: NO_CAP,
            next_tick: 0,
        }
    }

    pub fn symbol_id(&self) -> u32 {
        self.symbol_id
    }

    fn next_timestamp(&mut self) -> u64 {
        let tick = self.next_tick;
        self.next_tick += 1;
        tick
    }

    /// Reference buy price: `last_traded_price` once any trade has
    /// occurred, else 0 (spec.md §4.3 — "these defaults are chosen so that
    /// no stop triggers before the first trade").
    fn ref_buy_price(&self) -> u64 {
        if self.has_traded { self.last_traded_price } else { 0 }
    }

    /// Reference sell price: `last_traded_price` once any trade has
    /// occurred, else `u64::MAX`.
    fn ref_sell_price(&self) -> u64 {
        if self.has_traded { self.last_traded_price } else { NO_CAP }
    }

    fn level_map(&self, side: Side, kind: LevelKind) -> &BTreeMap<u64, Level> {
        match (side, kind) {
            (Side::Buy, LevelKind::Limit) => &self.buy_limit,
            (Side::Sell, LevelKind::Limit) => &self.sell_limit,
            (Side::Buy, LevelKind::Stop) => &self.buy_stop,
            (Side::Sell, LevelKind::Stop) => &self.sell_stop,
            (Side::Buy, LevelKind::TrailingStop) => &self.buy_trailing_stop,
            (Side::Sell, LevelKind::TrailingStop) => &self.sell_trailing_stop,
        }
    }

    fn level_map_mut(&mut self, side: Side, kind: LevelKind) -> &mut BTreeMap<u64, Level> {
        match (side, kind) {
            (Side::Buy, LevelKind::Limit) => &mut self.buy_limit,
            (Side::Sell, LevelKind::Limit) => &mut self.sell_limit,
            (Side::Buy, LevelKind::Stop) => &mut self.buy_stop,
            (Side::Sell, LevelKind::Stop) => &mut self.sell_stop,
            (Side::Buy, LevelKind::TrailingStop) => &mut self.buy_trailing_stop,
            (Side::Sell, LevelKind::TrailingStop) => &mut self.sell_trailing_stop,
        }
    }

    // ---- public contract (spec.md §4.1) -----------------------------------

    /// Admit a new order. Emits `OrderAdded`, dispatches by type, then runs
    /// stop activation to a fixed point.
    pub fn add_order(&mut self, mut order: Order, obs: &mut dyn EventObserver) -> EngineResult<()> {
        if self.locations.contains_key(&order.id) {
            return Err(EngineError::DuplicateOrder(order.id));
        }
        order.timestamp = self.next_timestamp();
        obs.on_order_added(&order);
        match order.order_type {
            OrderType::Market => self.add_market_order(order, obs),
            OrderType::Limit => self.add_limit_order(order, obs),
            _ => self.add_stop_order(order, obs),
        }
        self.activate_stop_orders(obs);
        Ok(())
    }

    pub fn delete_order(&mut self, id: u64, obs: &mut dyn EventObserver) -> EngineResult<()> {
        self.delete_order_inner(id, obs)?;
        self.activate_stop_orders(obs);
        Ok(())
    }

    /// Cancel/replace: delete `id` and re-add it under `new_id` at
    /// `new_price` with the same other attributes and a fresh timestamp —
    /// time priority is intentionally lost (spec.md §4.1/§9).
    pub fn modify_order(
        &mut self,
        id: u64,
        new_id: u64,
        new_price: u64,
        obs: &mut dyn EventObserver,
    ) -> EngineResult<()> {
        if new_id != id && self.locations.contains_key(&new_id) {
            return Err(EngineError::DuplicateOrder(new_id));
        }
        let loc = *self.locations.get(&id).ok_or(EngineError::UnknownOrder(id))?;
        let mut replacement = self
            .level_map(loc.side, loc.kind)
            .get(&loc.price)
            .and_then(|level| level.iter().find(|o| o.id == id))
            .cloned()
            .expect("location must point at the order");
        replacement.id = new_id;
        replacement.price = new_price;

        self.delete_order_inner(id, obs)?;
        self.add_order(replacement, obs)
    }

    /// Reduce the order's logical quantity to `new_quantity`; deletes the
    /// order if that leaves it with zero open quantity (spec.md §4.4).
    pub fn cancel_order(
        &mut self,
        id: u64,
        new_quantity: u64,
        obs: &mut dyn EventObserver,
    ) -> EngineResult<()> {
        let loc = *self.locations.get(&id).ok_or(EngineError::UnknownOrder(id))?;
        let open_after = {
            let map = self.level_map_mut(loc.side, loc.kind);
            let level = map.get_mut(&loc.price).expect("location must point at a live level");
            let order = level.get_mut(id).expect("location must point at the order");
            let open_before = order.open_quantity;
            order.set_quantity(new_quantity);
            let open_after = order.open_quantity;
            obs.on_order_updated(order);
            level.reduce_volume(open_before.saturating_sub(open_after));
            open_after
        };
        if open_after == 0 {
            self.delete_order_inner(id, obs)?;
        }
        self.activate_stop_orders(obs);
        Ok(())
    }

    /// Externally-forced fill (spec.md §4.1/§4.4): `price` defaults to the
    /// order's own price when `None`. Caps `quantity` at the order's open
    /// quantity; updates `last_traded_price` and triggers stop activation.
    pub fn execute_order(
        &mut self,
        id: u64,
        quantity: u64,
        price: Option<u64>,
        obs: &mut dyn EventObserver,
    ) -> EngineResult<()> {
        let loc = *self.locations.get(&id).ok_or(EngineError::UnknownOrder(id))?;
        let (open_after, executing_price) = {
            let map = self.level_map_mut(loc.side, loc.kind);
            let level = map.get_mut(&loc.price).expect("location must point at a live level");
            let order = level.get_mut(id).expect("location must point at the order");
            let qty = quantity.min(order.open_quantity);
            let executing_price = price.unwrap_or(order.price);
            order.execute(executing_price, qty);
            obs.on_order_executed(order);
            level.reduce_volume(order.last_executed_quantity);
            (order.open_quantity, executing_price)
        };
        self.last_traded_price = executing_price;
        self.has_traded = true;
        if open_after == 0 {
            self.delete_order_inner(id, obs)?;
        }
        self.activate_stop_orders(obs);
        Ok(())
    }

    pub fn best_buy(&self) -> Option<u64> {
        self.buy_limit.keys().next_back().copied()
    }

    pub fn best_sell(&self) -> Option<u64> {
        self.sell_limit.keys().next().copied()
    }

    pub fn last_traded_price(&self) -> u64 {
        self.last_traded_price
    }

    pub fn has_order(&self, id: u64) -> bool {
        self.locations.contains_key(&id)
    }

    pub fn get_order(&self, id: u64) -> Option<&Order> {
        let loc = self.locations.get(&id)?;
        self.level_map(loc.side, loc.kind)
            .get(&loc.price)?
            .iter()
            .find(|o| o.id == id)
    }

    pub fn empty(&self) -> bool {
        self.locations.is_empty()
    }

    /// Textual/JSON snapshot of every level index. Not part of the
    /// matching-semantics contract (spec.md §6).
    pub fn dump_levels(&self) -> serde_json::Value {
        fn dump_map(map: &BTreeMap<u64, Level>) -> serde_json::Value {
            serde_json::Value::Array(
                map.values()
                    .map(|level| {
                        serde_json::json!({
                            "price": level.price,
                            "volume": level.volume(),
                            "orders": level.len(),
                        })
                    })
                    .collect(),
            )
        }
        serde_json::json!({
            "symbol_id": self.symbol_id,
            "last_traded_price": self.last_traded_price,
            "buy_limit": dump_map(&self.buy_limit),
            "sell_limit": dump_map(&self.sell_limit),
            "buy_stop": dump_map(&self.buy_stop),
            "sell_stop": dump_map(&self.sell_stop),
            "buy_trailing_stop": dump_map(&self.buy_trailing_stop),
            "sell_trailing_stop": dump_map(&self.sell_trailing_stop),
        })
    }

    // ---- admission by type (spec.md §4.2) ---------------------------------

    fn delete_order_inner(&mut self, id: u64, obs: &mut dyn EventObserver) -> EngineResult<()> {
        let loc = *self.locations.get(&id).ok_or(EngineError::UnknownOrder(id))?;
        let map = self.level_map_mut(loc.side, loc.kind);
        let level = map.get_mut(&loc.price).expect("location must point at a live level");
        let order = level.remove(id).expect("location must point at the order");
        if level.is_empty() {
            map.remove(&loc.price);
        }
        self.locations.remove(&id);
        obs.on_order_deleted(&order);
        Ok(())
    }

    /// Market orders are traded instantly at the best available opposite
    /// price and never rest, regardless of residual quantity.
    fn add_market_order(&mut self, mut order: Order, obs: &mut dyn EventObserver) {
        self.run_match(&mut order, obs);
        obs.on_order_deleted(&order);
    }

    /// Limit orders match first; if quantity remains and the TIF allows
    /// resting (neither IOC nor FOK), the remainder is inserted.
    fn add_limit_order(&mut self, mut order: Order, obs: &mut dyn EventObserver) {
        self.run_match(&mut order, obs);
        let rests = order.open_quantity != 0
            && order.time_in_force != TimeInForce::Ioc
            && order.time_in_force != TimeInForce::Fok;
        if rests {
            self.insert_limit_order(order);
        } else {
            obs.on_order_deleted(&order);
        }
    }

    fn insert_limit_order(&mut self, order: Order) {
        let (side, price, id) = (order.side, order.price, order.id);
        let symbol_id = self.symbol_id;
        let map = match side {
            Side::Buy => &mut self.buy_limit,
            Side::Sell => &mut self.sell_limit,
        };
        map.entry(price)
            .or_insert_with(|| Level::new(price, side, symbol_id))
            .push_back(order);
        self.locations.insert(
            id,
            OrderLocation {
                side,
                kind: LevelKind::Limit,
                price,
            },
        );
    }

    /// Stop/stop-limit/trailing-stop admission (spec.md §4.3): compute a
    /// trailing stop's initial trigger price, then either convert and
    /// re-admit immediately if already triggered, or park it.
    fn add_stop_order(&mut self, mut order: Order, obs: &mut dyn EventObserver) {
        if order.order_type.is_trailing() {
            self.calculate_stop_price(&mut order);
        }
        let market_price = match order.side {
            Side::Sell => self.ref_buy_price(),
            Side::Buy => self.ref_sell_price(),
        };
        let triggers = match order.side {
            Side::Sell => market_price <= order.stop_price,
            Side::Buy => market_price >= order.stop_price,
        };
        if triggers {
            self.convert_and_readmit(order, obs);
            return;
        }
        if order.order_type.is_trailing() {
            self.insert_trailing_stop_order(order);
        } else {
            self.insert_stop_order(order);
        }
    }

    fn insert_stop_order(&mut self, order: Order) {
        let (side, price, id) = (order.side, order.stop_price, order.id);
        let symbol_id = self.symbol_id;
        let map = match side {
            Side::Buy => &mut self.buy_stop,
            Side::Sell => &mut self.sell_stop,
        };
        map.entry(price)
            .or_insert_with(|| Level::new(price, side, symbol_id))
            .push_back(order);
        self.locations.insert(
            id,
            OrderLocation {
                side,
                kind: LevelKind::Stop,
                price,
            },
        );
    }

    fn insert_trailing_stop_order(&mut self, order: Order) {
        let (side, price, id) = (order.side, order.stop_price, order.id);
        let symbol_id = self.symbol_id;
        let map = match side {
            Side::Buy => &mut self.buy_trailing_stop,
            Side::Sell => &mut self.sell_trailing_stop,
        };
        map.entry(price)
            .or_insert_with(|| Level::new(price, side, symbol_id))
            .push_back(order);
        self.locations.insert(
            id,
            OrderLocation {
                side,
                kind: LevelKind::TrailingStop,
                price,
            },
        );
    }

    /// `calculate_stop_price` (spec.md §4.3): for a sell, `max(0, ref_buy -
    /// trail)`; for a buy, `min(MAX, ref_sell + trail)` with overflow clamp.
    fn calculate_stop_price(&mut self, order: &mut Order) -> u64 {
        let new_stop_price = match order.side {
            Side::Sell => self.ref_buy_price().saturating_sub(order.trail_amount),
            Side::Buy => self.ref_sell_price().saturating_add(order.trail_amount),
        };
        order.stop_price = new_stop_price;
        new_stop_price
    }

    /// A triggered stop order loses its stop attributes, converts to a
    /// market or limit order, emits `OrderUpdated`, and is re-admitted.
    fn convert_and_readmit(&mut self, mut order: Order, obs: &mut dyn EventObserver) {
        order.order_type = order.order_type.activated_type();
        order.stop_price = 0;
        order.trail_amount = 0;
        obs.on_order_updated(&order);
        match order.order_type {
            OrderType::Market => self.add_market_order(order, obs),
            OrderType::Limit => self.add_limit_order(order, obs),
            other => unreachable!("stop orders only activate into Market or Limit, got {other:?}"),
        }
    }

    // ---- matching (spec.md §4.2) ------------------------------------------

    fn run_match(&mut self, order: &mut Order, obs: &mut dyn EventObserver) {
        if matches!(order.time_in_force, TimeInForce::Fok | TimeInForce::Aon) && !self.can_match(order) {
            trace!(order_id = order.id, "order cannot be matched in full, skipping");
            return;
        }
        match order.side {
            Side::Sell => self.match_against_buy(order, obs),
            Side::Buy => self.match_against_sell(order, obs),
        }
    }

    /// Whether `order.open_quantity` can be satisfied in one pass against
    /// the opposite limit levels (spec.md §4.2, used for FOK/AON pre-check).
    fn can_match(&self, order: &Order) -> bool {
        let required = order.open_quantity;
        let mut available = 0u64;
        match order.side {
            Side::Sell => {
                for (&price, level) in self.buy_limit.iter().rev() {
                    if price < order.price {
                        break;
                    }
                    available = available.saturating_add(level.volume());
                    if available >= required {
                        return true;
                    }
                }
            }
            Side::Buy => {
                for (&price, level) in self.sell_limit.iter() {
                    if price > order.price {
                        break;
                    }
                    available = available.saturating_add(level.volume());
                    if available >= required {
                        return true;
                    }
                }
            }
        }
        available >= required
    }

    /// Sell `incoming` against resting buy levels, highest price first.
    ///
    /// Resting orders are matched purely on price/time priority regardless
    /// of their own time-in-force — a resting AON order is not given any
    /// special protection against partial fills by a later incoming order
    /// (`original_source/src/matching/price_level_order_book.cpp` matches
    /// AON orders exactly like GTC; spec.md §4.2's all-or-none guarantee is
    /// about an AON order's own admission pass via `can_match`, not a rule
    /// that blocks unrelated incoming orders from reaching a compatible
    /// price level — see DESIGN.md).
    fn match_against_buy(&mut self, incoming: &mut Order, obs: &mut dyn EventObserver) {
        while incoming.open_quantity > 0 {
            let Some(top_price) = self.buy_limit.keys().next_back().copied() else {
                break;
            };
            if top_price < incoming.price {
                break;
            }
            self.execute_against_top(incoming, Side::Buy, top_price, obs);
        }
    }

    /// Buy `incoming` against resting sell levels, lowest price first.
    fn match_against_sell(&mut self, incoming: &mut Order, obs: &mut dyn EventObserver) {
        while incoming.open_quantity > 0 {
            let Some(bottom_price) = self.sell_limit.keys().next().copied() else {
                break;
            };
            if bottom_price > incoming.price {
                break;
            }
            self.execute_against_top(incoming, Side::Sell, bottom_price, obs);
        }
    }

    /// Execute `incoming` against the front order of the opposite level at
    /// `price`, in price/time priority. The resting order always sets the
    /// executing price. Restarts the caller's loop from the new best level
    /// since deleting the resting order mutates the level map.
    fn execute_against_top(
        &mut self,
        incoming: &mut Order,
        resting_side: Side,
        price: u64,
        obs: &mut dyn EventObserver,
    ) {
        let map = match resting_side {
            Side::Buy => &mut self.buy_limit,
            Side::Sell => &mut self.sell_limit,
        };
        let level = map.get_mut(&price).expect("level present at its own key");
        let mut resting = level.pop_front().expect("non-empty level at its own key");

        let executing_price = resting.price;
        let quantity = incoming.open_quantity.min(resting.open_quantity);
        incoming.execute(executing_price, quantity);
        resting.execute(executing_price, quantity);
        obs.on_order_executed(incoming);
        obs.on_order_executed(&resting);
        debug!(
            price = executing_price,
            quantity, taker = incoming.id, maker = resting.id, "matched"
        );

        self.last_traded_price = executing_price;
        self.has_traded = true;

        let map = match resting_side {
            Side::Buy => &mut self.buy_limit,
            Side::Sell => &mut self.sell_limit,
        };
        if resting.open_quantity > 0 {
            map.get_mut(&price).expect("level still present").push_front(resting);
        } else {
            self.locations.remove(&resting.id);
            obs.on_order_deleted(&resting);
            if map.get(&price).is_some_and(Level::is_empty) {
                map.remove(&price);
            }
        }
    }

    // ---- stop activation (spec.md §4.3) -----------------------------------

    /// Runs to a fixed point: activating a stop may trade, which may move
    /// `last_traded_price`, which may trigger further stops.
    fn activate_stop_orders(&mut self, obs: &mut dyn EventObserver) {
        loop {
            let changed_buy = self.activate_buy_stops(obs);
            self.update_trailing_sell_stops(obs);
            let changed_sell = self.activate_sell_stops(obs);
            self.update_trailing_buy_stops(obs);
            if !(changed_buy || changed_sell) {
                break;
            }
        }
    }

    /// Prefix `[begin, ref_sell_price]` of `buy_stop` then of
    /// `buy_trailing_stop` — a buy stop triggers when the reference
    /// sell-side last price rises to meet its trigger.
    fn activate_buy_stops(&mut self, obs: &mut dyn EventObserver) -> bool {
        let mut activated = false;
        let ref_price = self.ref_sell_price();
        while self.buy_stop.keys().next().is_some_and(|&p| p <= ref_price) {
            activated = true;
            let order = self.take_front_at(Side::Buy, LevelKind::Stop, *self.buy_stop.keys().next().unwrap());
            self.convert_and_readmit(order, obs);
        }
        let ref_price = self.ref_sell_price();
        while self
            .buy_trailing_stop
            .keys()
            .next()
            .is_some_and(|&p| p <= ref_price)
        {
            activated = true;
            let price = *self.buy_trailing_stop.keys().next().unwrap();
            let order = self.take_front_at(Side::Buy, LevelKind::TrailingStop, price);
            self.convert_and_readmit(order, obs);
        }
        activated
    }

    /// Suffix (highest price first) of `sell_stop` then `sell_trailing_stop`
    /// whose trigger is `>= ref_buy_price` — a sell stop triggers when the
    /// reference buy-side last price falls to meet its trigger.
    fn activate_sell_stops(&mut self, obs: &mut dyn EventObserver) -> bool {
        let mut activated = false;
        let ref_price = self.ref_buy_price();
        while self.sell_stop.keys().next_back().is_some_and(|&p| p >= ref_price) {
            activated = true;
            let price = *self.sell_stop.keys().next_back().unwrap();
            let order = self.take_front_at(Side::Sell, LevelKind::Stop, price);
            self.convert_and_readmit(order, obs);
        }
        let ref_price = self.ref_buy_price();
        while self
            .sell_trailing_stop
            .keys()
            .next_back()
            .is_some_and(|&p| p >= ref_price)
        {
            activated = true;
            let price = *self.sell_trailing_stop.keys().next_back().unwrap();
            let order = self.take_front_at(Side::Sell, LevelKind::TrailingStop, price);
            self.convert_and_readmit(order, obs);
        }
        activated
    }

    fn take_front_at(&mut self, side: Side, kind: LevelKind, price: u64) -> Order {
        let map = self.level_map_mut(side, kind);
        let level = map.get_mut(&price).expect("price key must be live");
        let order = level.pop_front().expect("level at its own key is non-empty");
        if level.is_empty() {
            map.remove(&price);
        }
        self.locations.remove(&order.id);
        order
    }

    /// Recomputes `sell_trailing_stop` trigger prices when the market has
    /// moved favorably for trailing sells (buy-side last price rose above
    /// the watermark); otherwise advances the watermark.
    fn update_trailing_sell_stops(&mut self, obs: &mut dyn EventObserver) {
        let ref_buy = self.ref_buy_price();
        if self.trailing_buy_price < ref_buy && !self.sell_trailing_stop.is_empty() {
            self.rebuild_trailing(Side::Sell, obs);
        } else {
            self.trailing_buy_price = self.last_traded_price;
        }
    }

    /// Recomputes `buy_trailing_stop` trigger prices when the market has
    /// moved favorably for trailing buys (sell-side last price fell below
    /// the watermark); otherwise advances the watermark.
    fn update_trailing_buy_stops(&mut self, obs: &mut dyn EventObserver) {
        let ref_sell = self.ref_sell_price();
        if self.trailing_sell_price > ref_sell && !self.buy_trailing_stop.is_empty() {
            self.rebuild_trailing(Side::Buy, obs);
        } else {
            self.trailing_sell_price = self.last_traded_price;
        }
    }

    fn rebuild_trailing(&mut self, side: Side, obs: &mut dyn EventObserver) {
        let symbol_id = self.symbol_id;
        let old = match side {
            Side::Buy => std::mem::take(&mut self.buy_trailing_stop),
            Side::Sell => std::mem::take(&mut self.sell_trailing_stop),
        };
        let mut rebuilt: BTreeMap<u64, Level> = BTreeMap::new();
        for (_, mut level) in old {
            while let Some(mut order) = level.pop_front() {
                let new_price = self.calculate_stop_price(&mut order);
                obs.on_order_updated(&order);
                self.locations.insert(
                    order.id,
                    OrderLocation {
                        side,
                        kind: LevelKind::TrailingStop,
                        price: new_price,
                    },
                );
                rebuilt
                    .entry(new_price)
                    .or_insert_with(|| Level::new(new_price, side, symbol_id))
                    .push_back(order);
            }
        }
        match side {
            Side::Buy => self.buy_trailing_stop = rebuilt,
            Side::Sell => self.sell_trailing_stop = rebuilt,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{NullObserver, RecordedEvent, RecordingObserver};
    use crate::order::TimeInForce;

    fn limit(id: u64, side: Side, price: u64, qty: u64) -> Order {
        Order::limit(id, 1, side, price, qty, TimeInForce::Gtc, 0).unwrap()
    }

    /// S1 — simple cross.
    #[test]
    fn simple_cross_matches_and_leaves_resting_remainder() {
        let mut book = OrderBook::new(1);
        let mut obs = RecordingObserver::default();

        book.add_order(limit(1, Side::Buy, 350, 200), &mut obs).unwrap();
        book.add_order(limit(2, Side::Sell, 300, 300), &mut obs).unwrap();

        assert_eq!(
            obs.events,
            vec![
                RecordedEvent::OrderAdded(1),
                RecordedEvent::OrderAdded(2),
                RecordedEvent::OrderExecuted(2, 350, 200),
                RecordedEvent::OrderExecuted(1, 350, 200),
                RecordedEvent::OrderDeleted(1),
            ]
        );
        assert_eq!(book.last_traded_price(), 350);
        assert!(!book.has_order(1));
        let resting = book.get_order(2).unwrap();
        assert_eq!(resting.open_quantity, 100);
        assert_eq!(book.best_sell(), Some(300));
        assert_eq!(book.best_buy(), None);
    }

    /// S2 — price/time priority.
    #[test]
    fn price_then_time_priority_within_a_level() {
        let mut book = OrderBook::new(1);
        let mut obs = RecordingObserver::default();

        book.add_order(limit(10, Side::Buy, 100, 50), &mut obs).unwrap();
        book.add_order(limit(11, Side::Buy, 100, 50), &mut obs).unwrap();
        book.add_order(limit(12, Side::Buy, 101, 30), &mut obs).unwrap();
        book.add_order(limit(20, Side::Sell, 100, 60), &mut obs).unwrap();

        // id=12 (best price) fills in full, then id=10 (first in at 100) for
        // the remaining 30; id=11 is untouched.
        assert_eq!(book.get_order(10).unwrap().open_quantity, 20);
        assert!(!book.has_order(12));
        assert_eq!(book.get_order(11).unwrap().open_quantity, 50);
        assert_eq!(book.last_traded_price(), 100);
    }

    /// S3 — FOK rejection.
    #[test]
    fn fok_rejects_when_book_cannot_fill_in_full() {
        let mut book = OrderBook::new(1);
        let mut obs = RecordingObserver::default();

        book.add_order(limit(1, Side::Buy, 95, 40), &mut obs).unwrap();
        obs.events.clear();

        let sell = Order::limit(30, 1, Side::Sell, 95, 50, TimeInForce::Fok, 0).unwrap();
        book.add_order(sell, &mut obs).unwrap();

        assert_eq!(
            obs.events,
            vec![RecordedEvent::OrderAdded(30), RecordedEvent::OrderDeleted(30)]
        );
        assert_eq!(book.last_traded_price(), 0);
        assert_eq!(book.get_order(1).unwrap().open_quantity, 40);
    }

    /// S4 — stop trigger on a later trade tick.
    #[test]
    fn stop_buy_activates_when_sell_side_last_price_reaches_trigger() {
        let mut book = OrderBook::new(1);
        let mut obs = RecordingObserver::default();

        // establish last_traded_price = 100
        book.add_order(limit(1, Side::Buy, 100, 10), &mut obs).unwrap();
        book.add_order(limit(2, Side::Sell, 100, 10), &mut obs).unwrap();
        assert_eq!(book.last_traded_price(), 100);
        obs.events.clear();

        let stop_buy = Order::stop(40, 1, Side::Buy, 105, 10, TimeInForce::Gtc, 0).unwrap();
        book.add_order(stop_buy, &mut obs).unwrap();
        assert!(obs.events.iter().all(|e| !matches!(e, RecordedEvent::OrderUpdated(40))));
        assert!(book.has_order(40));
        obs.events.clear();

        // a resting sell at 105 lets a later trade print at 105
        book.add_order(limit(3, Side::Sell, 105, 5), &mut obs).unwrap();
        obs.events.clear();
        book.execute_order(3, 5, Some(105), &mut obs).unwrap();

        // id=40 converts to market and trades against nothing further
        // (no opposite resting liquidity left), so it is deleted rather
        // than matched, but it must have left the stop map.
        assert!(!book.has_order(40));
    }

    /// S5 — trailing stop recompute.
    #[test]
    fn trailing_sell_stop_recomputes_on_favorable_move() {
        let mut book = OrderBook::new(1);
        let mut obs = RecordingObserver::default();

        book.add_order(limit(1, Side::Buy, 100, 10), &mut obs).unwrap();
        book.add_order(limit(2, Side::Sell, 100, 10), &mut obs).unwrap();
        assert_eq!(book.last_traded_price(), 100);
        obs.events.clear();

        let trailing_sell = Order::trailing_stop(50, 1, Side::Sell, 5, 10, TimeInForce::Gtc, 0).unwrap();
        book.add_order(trailing_sell, &mut obs).unwrap();
        assert_eq!(book.get_order(50).unwrap().stop_price, 95);
        obs.events.clear();

        book.add_order(limit(3, Side::Buy, 110, 10), &mut obs).unwrap();
        book.add_order(limit(4, Side::Sell, 110, 10), &mut obs).unwrap();
        assert_eq!(book.last_traded_price(), 110);

        assert_eq!(book.get_order(50).unwrap().stop_price, 105);
        assert!(obs.events.contains(&RecordedEvent::OrderUpdated(50)));
    }

    /// S6 — cancel to zero.
    #[test]
    fn cancel_to_zero_deletes_the_order_and_the_level() {
        let mut book = OrderBook::new(1);
        let mut obs = RecordingObserver::default();

        book.add_order(limit(60, Side::Buy, 50, 40), &mut obs).unwrap();
        obs.events.clear();

        book.cancel_order(60, 0, &mut obs).unwrap();

        assert_eq!(
            obs.events,
            vec![RecordedEvent::OrderUpdated(60), RecordedEvent::OrderDeleted(60)]
        );
        assert!(!book.has_order(60));
        assert_eq!(book.best_buy(), None);
    }

    #[test]
    fn cancel_nonexistent_order_is_an_error() {
        let mut book = OrderBook::new(1);
        let mut obs = NullObserver;
        let err = book.cancel_order(999, 0, &mut obs).unwrap_err();
        assert!(matches!(err, EngineError::UnknownOrder(999)));
    }

    #[test]
    fn add_order_rejects_duplicate_id() {
        let mut book = OrderBook::new(1);
        let mut obs = NullObserver;
        book.add_order(limit(1, Side::Buy, 100, 10), &mut obs).unwrap();
        let err = book.add_order(limit(1, Side::Sell, 100, 5), &mut obs).unwrap_err();
        assert!(matches!(err, EngineError::DuplicateOrder(1)));
    }

    #[test]
    fn modify_order_loses_time_priority() {
        let mut book = OrderBook::new(1);
        let mut obs = NullObserver;
        book.add_order(limit(1, Side::Buy, 100, 10), &mut obs).unwrap();
        book.add_order(limit(2, Side::Buy, 100, 10), &mut obs).unwrap();

        // move id=1 to a new id at the same price; it should now be behind id=2
        book.modify_order(1, 3, 100, &mut obs).unwrap();
        assert!(!book.has_order(1));
        assert!(book.has_order(3));

        book.add_order(limit(9, Side::Sell, 100, 10), &mut obs).unwrap();
        // id=2 arrived first among the two still-resting buys, so it fills.
        assert!(!book.has_order(2));
        assert!(book.has_order(3));
    }

    #[test]
    fn execute_order_caps_at_open_quantity() {
        let mut book = OrderBook::new(1);
        let mut obs = NullObserver;
        book.add_order(limit(1, Side::Buy, 100, 10), &mut obs).unwrap();
        book.execute_order(1, 999, None, &mut obs).unwrap();
        assert!(!book.has_order(1));
        assert_eq!(book.last_traded_price(), 100);
    }

    #[test]
    fn best_buy_never_crosses_best_sell_at_rest() {
        let mut book = OrderBook::new(1);
        let mut obs = NullObserver;
        book.add_order(limit(1, Side::Buy, 99, 10), &mut obs).unwrap();
        book.add_order(limit(2, Side::Sell, 101, 10), &mut obs).unwrap();
        assert!(book.best_buy().unwrap() < book.best_sell().unwrap());
    }

    #[test]
    fn aon_order_waits_for_full_liquidity() {
        let mut book = OrderBook::new(1);
        let mut obs = NullObserver;
        book.add_order(limit(1, Side::Sell, 100, 5), &mut obs).unwrap();

        let aon_buy = Order::limit(2, 1, Side::Buy, 100, 10, TimeInForce::Aon, 0).unwrap();
        book.add_order(aon_buy, &mut obs).unwrap();
        // can't fill 10 against only 5 available: it must rest untouched
        assert_eq!(book.get_order(2).unwrap().open_quantity, 10);
        assert_eq!(book.get_order(1).unwrap().open_quantity, 5);
    }

    /// A resting AON order carries no special protection against later
    /// partial fills — it is matched purely on price/time priority just
    /// like a GTC order once it rests, matching `original_source`, which
    /// does not special-case AON in its match loop. The all-or-none
    /// guarantee only applies while the AON order is itself the incoming
    /// side (see `aon_order_waits_for_full_liquidity`).
    #[test]
    fn resting_aon_order_can_be_partially_filled_by_a_later_incoming_order() {
        let mut book = OrderBook::new(1);
        let mut obs = NullObserver;
        book.add_order(limit(1, Side::Sell, 100, 5), &mut obs).unwrap();
        let aon_buy = Order::limit(2, 1, Side::Buy, 100, 10, TimeInForce::Aon, 0).unwrap();
        book.add_order(aon_buy, &mut obs).unwrap();

        book.add_order(limit(3, Side::Sell, 100, 3), &mut obs).unwrap();
        assert!(!book.has_order(3));
        assert_eq!(book.get_order(2).unwrap().open_quantity, 7);

        book.add_order(limit(4, Side::Sell, 100, 7), &mut obs).unwrap();
        assert!(!book.has_order(2));
    }

    /// Regression for a FOK order crossing levels where a worse-priced
    /// level's front order is AON: the admission pre-check and the actual
    /// match walk must agree on whether the full quantity is reachable, so
    /// a FOK order never ends up partially executed. Mirrors a resting
    /// buy-limit book of `{100: GTC qty=20, 99: AON qty=50}` against an
    /// incoming `Sell FOK price=99 qty=30`.
    #[test]
    fn fok_order_never_partially_executes_across_mixed_aon_and_gtc_levels() {
        let mut book = OrderBook::new(1);
        let mut obs = RecordingObserver::default();
        book.add_order(limit(1, Side::Buy, 100, 20), &mut obs).unwrap();
        let aon_buy = Order::limit(2, 1, Side::Buy, 99, 50, TimeInForce::Aon, 0).unwrap();
        book.add_order(aon_buy, &mut obs).unwrap();
        obs.events.clear();

        let sell_fok = Order::limit(3, 1, Side::Sell, 99, 30, TimeInForce::Fok, 0).unwrap();
        book.add_order(sell_fok, &mut obs).unwrap();

        let filled: u64 = obs
            .events
            .iter()
            .filter_map(|e| match e {
                RecordedEvent::OrderExecuted(3, _, qty) => Some(*qty),
                _ => None,
            })
            .sum();
        assert!(filled == 0 || filled == 30, "FOK order partially executed: {filled}");
        assert!(!book.has_order(3), "a fillable FOK order must not rest");
        assert_eq!(book.get_order(1), None);
        assert_eq!(book.get_order(2).unwrap().open_quantity, 40);
    }

    /// Regression: an ordinary GTC incoming order must never be stopped by
    /// a resting AON order at a compatible price, since that would leave a
    /// crossed book (spec.md §8 property 4). Mirrors a resting buy-limit
    /// book of `{100: AON GTC qty=50}` against an incoming
    /// `Sell GTC price=90 qty=10`.
    #[test]
    fn gtc_order_matches_through_resting_aon_level_without_crossing_the_book() {
        let mut book = OrderBook::new(1);
        let mut obs = NullObserver;
        let aon_buy = Order::limit(1, 1, Side::Buy, 100, 50, TimeInForce::Aon, 0).unwrap();
        book.add_order(aon_buy, &mut obs).unwrap();

        book.add_order(limit(2, Side::Sell, 90, 10), &mut obs).unwrap();

        assert!(!book.has_order(2));
        assert_eq!(book.get_order(1).unwrap().open_quantity, 40);
        if let (Some(buy), Some(sell)) = (book.best_buy(), book.best_sell()) {
            assert!(buy < sell, "book is crossed: best_buy={buy} best_sell={sell}");
        }
    }
}
