//! Order book data structure (part of C4)
//!
//! Two price-ordered collections of resting orders. The source keeps
//! intrusive linked lists and finds best-bid/ask by linear scan; per the
//! design notes that's an implementation detail the spec does not
//! constrain, so here the book is a pair of price-keyed ordered maps (the
//! substitution the notes call out explicitly) with FIFO price levels for a
//! deterministic, cheap tie-break the spec does not require but tests
//! should not contradict.

use crate::core_types::{OrderId, Price, Quantity};
use crate::session::Session;
use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Buy,
    Sell,
}

/// A resting order. While it rests here, its economic cost is encumbered on
/// `trader`'s account; [`crate::exchange::Exchange`] owns the encumbrance
/// bookkeeping, this struct just carries the reference that keeps the
/// trader's [`Session`] alive.
pub struct Order {
    pub id: OrderId,
    pub side: Side,
    pub trader: Arc<Session>,
    pub quantity: Quantity,
    pub limit_price: Price,
}

#[derive(Debug)]
pub enum CancelError {
    NotFound,
    NotOwner,
}

pub struct OrderBook {
    bids: BTreeMap<Reverse<Price>, VecDeque<Order>>,
    asks: BTreeMap<Price, VecDeque<Order>>,
    index: HashMap<OrderId, (Side, Price)>,
}

impl OrderBook {
    pub fn new() -> Self {
        Self {
            bids: BTreeMap::new(),
            asks: BTreeMap::new(),
            index: HashMap::new(),
        }
    }

    pub fn insert(&mut self, order: Order) {
        self.index.insert(order.id, (order.side, order.limit_price));
        match order.side {
            Side::Buy => self
                .bids
                .entry(Reverse(order.limit_price))
                .or_default()
                .push_back(order),
            Side::Sell => self
                .asks
                .entry(order.limit_price)
                .or_default()
                .push_back(order),
        }
    }

    /// Highest resting buy price, 0 if none.
    pub fn best_bid_price(&self) -> Price {
        self.bids.keys().next().map(|Reverse(p)| *p).unwrap_or(0)
    }

    /// Lowest resting sell price, 0 if none.
    pub fn best_ask_price(&self) -> Price {
        self.asks.keys().next().copied().unwrap_or(0)
    }

    pub fn best_bid(&self) -> Option<&Order> {
        self.bids.values().next().and_then(|level| level.front())
    }

    pub fn best_ask(&self) -> Option<&Order> {
        self.asks.values().next().and_then(|level| level.front())
    }

    pub fn best_bid_mut(&mut self) -> Option<&mut Order> {
        self.bids.values_mut().next().and_then(|level| level.front_mut())
    }

    pub fn best_ask_mut(&mut self) -> Option<&mut Order> {
        self.asks.values_mut().next().and_then(|level| level.front_mut())
    }

    /// Remove the order at the front of the best bid level (its quantity
    /// must already be zero — the matcher calls this only once it has
    /// fully filled the resting order).
    pub fn pop_best_bid(&mut self) -> Option<Order> {
        let (price, level) = self.bids.iter_mut().next()?;
        let price = *price;
        let order = level.pop_front()?;
        if level.is_empty() {
            self.bids.remove(&price);
        }
        self.index.remove(&order.id);
        Some(order)
    }

    pub fn pop_best_ask(&mut self) -> Option<Order> {
        let (price, level) = self.asks.iter_mut().next()?;
        let price = *price;
        let order = level.pop_front()?;
        if level.is_empty() {
            self.asks.remove(&price);
        }
        self.index.remove(&order.id);
        Some(order)
    }

    /// Find `id`, verify `trader_name` owns it, and remove it from the book.
    /// Distinguishes "no such order" from "order belongs to someone else"
    /// so a cross-account cancel attempt is rejected without disturbing the
    /// actual owner's order.
    pub fn remove_owned(&mut self, id: OrderId, trader_name: &str) -> Result<Order, CancelError> {
        let (side, price) = *self.index.get(&id).ok_or(CancelError::NotFound)?;
        let level = match side {
            Side::Buy => self.bids.get_mut(&Reverse(price)),
            Side::Sell => self.asks.get_mut(&price),
        }
        .ok_or(CancelError::NotFound)?;

        let pos = level.iter().position(|o| o.id == id).ok_or(CancelError::NotFound)?;
        if level[pos].trader.name() != trader_name {
            return Err(CancelError::NotOwner);
        }
        let order = level.remove(pos).expect("position just located");
        if level.is_empty() {
            match side {
                Side::Buy => {
                    self.bids.remove(&Reverse(price));
                }
                Side::Sell => {
                    self.asks.remove(&price);
                }
            }
        }
        self.index.remove(&id);
        Ok(order)
    }

    /// Drain every resting order from both sides, for shutdown teardown.
    pub fn drain_all(&mut self) -> Vec<Order> {
        let mut drained = Vec::new();
        for (_, mut level) in std::mem::take(&mut self.bids) {
            drained.extend(level.drain(..));
        }
        for (_, mut level) in std::mem::take(&mut self.asks) {
            drained.extend(level.drain(..));
        }
        self.index.clear();
        drained
    }
}

impl Default for OrderBook {
    fn default() -> Self {
        Self::new()
    }
}
