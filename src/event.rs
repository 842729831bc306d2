//! The passive event-observer collaborator (spec.md §6, grounded in
//! `original_source/include/event_handling/event_handler.h`).

use crate::order::Order;

/// Callbacks fired as a book's (or the dispatching engine's) state changes.
///
/// Every method has a no-op default, mirroring the original's
/// `virtual void handle...(...) {}` pattern — implementers only override
/// the events they care about. Each order event carries a post-change
/// snapshot of the affected order; for `on_order_executed` that snapshot's
/// `last_executed_price`/`last_executed_quantity` describe the fill that
/// just happened.
///
/// Passed explicitly to every mutating call rather than stored on `Engine`
/// or `OrderBook` (see DESIGN.md) — this keeps the book free of a
/// self-referential lifetime while still guaranteeing the single
/// sequential event stream per book spec.md §5 requires.
pub trait EventObserver {
    fn on_symbol_added(&mut self, _symbol_id: u32, _name: &str) {}
    fn on_symbol_deleted(&mut self, _symbol_id: u32, _name: &str) {}

    fn on_order_added(&mut self, _order: &Order) {}
    fn on_order_deleted(&mut self, _order: &Order) {}
    fn on_order_updated(&mut self, _order: &Order) {}
    fn on_order_executed(&mut self, _order: &Order) {}
}

/// An observer that does nothing; useful for tests that only care about
/// the book's resulting state, not the event stream.
#[derive(Debug, Default)]
pub struct NullObserver;

impl EventObserver for NullObserver {}

/// An observer that records every event it receives, in order. Useful for
/// asserting on the exact event sequence a scenario produces.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    pub events: Vec<RecordedEvent>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedEvent {
    SymbolAdded(u32, String),
    SymbolDeleted(u32, String),
    OrderAdded(u64),
    OrderDeleted(u64),
    OrderUpdated(u64),
    OrderExecuted(u64, u64, u64), // id, last_executed_price, last_executed_quantity
}

impl EventObserver for RecordingObserver {
    fn on_symbol_added(&mut self, symbol_id: u32, name: &str) {
        self.events
            .push(RecordedEvent::SymbolAdded(symbol_id, name.to_string()));
    }

    fn on_symbol_deleted(&mut self, symbol_id: u32, name: &str) {
        self.events
            .push(RecordedEvent::SymbolDeleted(symbol_id, name.to_string()));
    }

    fn on_order_added(&mut self, order: &Order) {
        self.events.push(RecordedEvent::OrderAdded(order.id));
    }

    fn on_order_deleted(&mut self, order: &Order) {
        self.events.push(RecordedEvent::OrderDeleted(order.id));
    }

    fn on_order_updated(&mut self, order: &Order) {
        self.events.push(RecordedEvent::OrderUpdated(order.id));
    }

    fn on_order_executed(&mut self, order: &Order) {
        self.events.push(RecordedEvent::OrderExecuted(
            order.id,
            order.last_executed_price,
            order.last_executed_quantity,
        ));
    }
}
