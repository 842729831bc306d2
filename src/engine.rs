//! Multi-symbol dispatcher (spec.md §6, grounded in
//! `original_source/include/matching/engine.h` and `src/matching/engine.cpp`).
//!
//! The original splits this into an `OrderBookHandler` (symbol → book
//! lookup) and an `Engine` that owns one handler. Both collapse into this
//! single struct here since nothing else in the spec sits between them.

use std::collections::HashMap;

use crate::book::OrderBook;
use crate::error::{EngineError, EngineResult};
use crate::event::EventObserver;
use crate::order::Order;
use crate::symbol::Symbol;

#[derive(Default)]
pub struct Engine {
    books: HashMap<u32, OrderBook>,
    symbols: HashMap<u32, Symbol>,
}

impl Engine {
    pub fn new() -> Self {
        Engine {
            books: HashMap::new(),
            symbols: HashMap::new(),
        }
    }

    pub fn has_symbol(&self, symbol_id: u32) -> bool {
        self.symbols.contains_key(&symbol_id)
    }

    pub fn symbol(&self, symbol_id: u32) -> Option<&Symbol> {
        self.symbols.get(&symbol_id)
    }

    pub fn book(&self, symbol_id: u32) -> Option<&OrderBook> {
        self.books.get(&symbol_id)
    }

    pub fn add_symbol(&mut self, symbol: Symbol, obs: &mut dyn EventObserver) -> EngineResult<()> {
        if self.symbols.contains_key(&symbol.id) {
            return Err(EngineError::DuplicateSymbol(symbol.id));
        }
        let id = symbol.id;
        obs.on_symbol_added(id, &symbol.name);
        self.books.insert(id, OrderBook::new(id));
        self.symbols.insert(id, symbol);
        Ok(())
    }

    pub fn delete_symbol(&mut self, symbol_id: u32, obs: &mut dyn EventObserver) -> EngineResult<()> {
        let symbol = self
            .symbols
            .remove(&symbol_id)
            .ok_or(EngineError::UnknownSymbol(symbol_id))?;
        self.books.remove(&symbol_id);
        obs.on_symbol_deleted(symbol_id, &symbol.name);
        Ok(())
    }

    /// Admit `order` into the book for `order.symbol_id`.
    pub fn add_order(&mut self, order: Order, obs: &mut dyn EventObserver) -> EngineResult<()> {
        let book = self
            .books
            .get_mut(&order.symbol_id)
            .ok_or(EngineError::UnknownSymbol(order.symbol_id))?;
        book.add_order(order, obs)
    }

    pub fn delete_order(
        &mut self,
        symbol_id: u32,
        order_id: u64,
        obs: &mut dyn EventObserver,
    ) -> EngineResult<()> {
        self.book_mut(symbol_id)?.delete_order(order_id, obs)
    }

    pub fn modify_order(
        &mut self,
        symbol_id: u32,
        order_id: u64,
        new_id: u64,
        new_price: u64,
        obs: &mut dyn EventObserver,
    ) -> EngineResult<()> {
        self.book_mut(symbol_id)?
            .modify_order(order_id, new_id, new_price, obs)
    }

    pub fn cancel_order(
        &mut self,
        symbol_id: u32,
        order_id: u64,
        new_quantity: u64,
        obs: &mut dyn EventObserver,
    ) -> EngineResult<()> {
        self.book_mut(symbol_id)?
            .cancel_order(order_id, new_quantity, obs)
    }

    pub fn execute_order(
        &mut self,
        symbol_id: u32,
        order_id: u64,
        quantity: u64,
        price: Option<u64>,
        obs: &mut dyn EventObserver,
    ) -> EngineResult<()> {
        self.book_mut(symbol_id)?
            .execute_order(order_id, quantity, price, obs)
    }

    fn book_mut(&mut self, symbol_id: u32) -> EngineResult<&mut OrderBook> {
        self.books
            .get_mut(&symbol_id)
            .ok_or(EngineError::UnknownSymbol(symbol_id))
    }
}
