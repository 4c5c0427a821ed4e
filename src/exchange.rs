//! Exchange: order book plus matching engine (C4)
//!
//! Owns the two-sided book, the monotone order-id counter and
//! `last_trade_price`, all behind one lock, plus a dedicated matcher thread
//! woken on every post. The source wakes its matcher with a counting
//! semaphore; a `Condvar` plus a dirty flag is the idiomatic std
//! equivalent — multiple posts before the matcher wakes just collapse into
//! one dirty flag, which is exactly the "may coalesce spurious wakeups"
//! allowance the design calls out.

use crate::core_types::{OrderId, Price, Quantity};
use crate::ledger::Account;
use crate::metrics::ExchangeMetrics;
use crate::orderbook::{CancelError, Order, OrderBook, Side};
use crate::proto::{MessageType, NotifyInfo};
use crate::session::{Session, SessionRegistry};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("invalid order")]
    InvalidOrder,

    #[error("order not found")]
    NotFound,

    #[error("order belongs to a different trader")]
    NotOwner,
}

/// Account balance/inventory + book snapshot, the ACK payload for STATUS and
/// every operation that returns one.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatusSnapshot {
    pub balance: Quantity,
    pub inventory: Quantity,
    pub bid: Price,
    pub ask: Price,
    pub last: Price,
}

struct Inner {
    book: OrderBook,
    next_order_id: OrderId,
    last_trade_price: Price,
    dirty: bool,
}

pub struct Exchange {
    state: Mutex<Inner>,
    wake: Condvar,
    shutting_down: AtomicBool,
    sessions: Arc<SessionRegistry>,
    metrics: Arc<ExchangeMetrics>,
}

impl Exchange {
    pub fn new(sessions: Arc<SessionRegistry>, metrics: Arc<ExchangeMetrics>) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(Inner {
                book: OrderBook::new(),
                next_order_id: 1,
                last_trade_price: 0,
                dirty: false,
            }),
            wake: Condvar::new(),
            shutting_down: AtomicBool::new(false),
            sessions,
            metrics,
        })
    }

    pub fn status(&self, account: &Account) -> StatusSnapshot {
        let acct = account.status();
        let state = self.state.lock().unwrap();
        StatusSnapshot {
            balance: acct.balance,
            inventory: acct.inventory,
            bid: state.book.best_bid_price(),
            ask: state.book.best_ask_price(),
            last: state.last_trade_price,
        }
    }

    pub fn post_buy(
        &self,
        trader: Arc<Session>,
        qty: Quantity,
        price: Price,
    ) -> Result<OrderId, ExchangeError> {
        self.post(trader, Side::Buy, qty, price)
    }

    pub fn post_sell(
        &self,
        trader: Arc<Session>,
        qty: Quantity,
        price: Price,
    ) -> Result<OrderId, ExchangeError> {
        self.post(trader, Side::Sell, qty, price)
    }

    fn post(
        &self,
        trader: Arc<Session>,
        side: Side,
        qty: Quantity,
        price: Price,
    ) -> Result<OrderId, ExchangeError> {
        if qty == 0 || price == 0 {
            return Err(ExchangeError::InvalidOrder);
        }

        match side {
            Side::Buy => {
                let cost = qty
                    .checked_mul(price)
                    .expect("qty * price overflow is an internal invariant violation");
                trader
                    .account()
                    .debit_balance(cost)
                    .map_err(|_| ExchangeError::InvalidOrder)?;
            }
            Side::Sell => {
                trader
                    .account()
                    .debit_inventory(qty)
                    .map_err(|_| ExchangeError::InvalidOrder)?;
            }
        }

        let id = {
            let mut state = self.state.lock().unwrap();
            let id = state.next_order_id;
            state.next_order_id += 1;
            state.book.insert(Order {
                id,
                side,
                trader,
                quantity: qty,
                limit_price: price,
            });
            state.dirty = true;
            id
        };
        self.wake.notify_one();
        self.metrics.record_order_posted();
        Ok(id)
    }

    pub fn cancel(&self, trader: &Arc<Session>, id: OrderId) -> Result<Quantity, ExchangeError> {
        let order = {
            let mut state = self.state.lock().unwrap();
            state
                .book
                .remove_owned(id, trader.name())
                .map_err(|e| match e {
                    CancelError::NotFound => ExchangeError::NotFound,
                    CancelError::NotOwner => ExchangeError::NotOwner,
                })?
        };

        let residual = order.quantity;
        match order.side {
            Side::Buy => order.trader.account().credit_balance(residual * order.limit_price),
            Side::Sell => order.trader.account().credit_inventory(residual),
        }
        self.metrics.record_order_canceled();

        let notify = match order.side {
            Side::Buy => NotifyInfo {
                buyer_id: order.id as u32,
                seller_id: 0,
                quantity: residual as u32,
                price: 0,
            },
            Side::Sell => NotifyInfo {
                buyer_id: 0,
                seller_id: order.id as u32,
                quantity: residual as u32,
                price: 0,
            },
        };
        self.broadcast_notify(MessageType::Canceled, &notify);
        Ok(residual)
    }

    fn broadcast_notify(&self, msg_type: MessageType, info: &NotifyInfo) {
        let mut buf = Vec::new();
        info.write_to(&mut buf).expect("writing to a Vec cannot fail");
        self.sessions.broadcast(msg_type, &buf);
    }

    /// Run the matcher thread until [`Self::shutdown`] is called. Meant to
    /// be spawned once, right after construction.
    pub fn run_matcher(self: Arc<Self>) -> JoinHandle<()> {
        std::thread::spawn(move || self.matcher_loop())
    }

    fn matcher_loop(&self) {
        let mut state = self.state.lock().unwrap();
        loop {
            while !state.dirty && !self.shutting_down.load(Ordering::Acquire) {
                state = self.wake.wait(state).unwrap();
            }
            if self.shutting_down.load(Ordering::Acquire) {
                return;
            }
            state.dirty = false;
            self.run_matching_pass(&mut state);
        }
    }

    /// Consume every available cross against the book, holding the exchange
    /// lock for the whole pass so the book-and-ledger transition is atomic
    /// from any other trader's viewpoint.
    fn run_matching_pass(&self, state: &mut Inner) {
        loop {
            let buy_price = state.book.best_bid_price();
            let sell_price = state.book.best_ask_price();
            if buy_price == 0 || sell_price == 0 || buy_price < sell_price {
                return;
            }

            let min_price = sell_price;
            let max_price = buy_price;
            let trade_price = if state.last_trade_price == 0 {
                (min_price + max_price) / 2
            } else if state.last_trade_price < min_price {
                min_price
            } else if state.last_trade_price > max_price {
                max_price
            } else {
                state.last_trade_price
            };

            let buy_qty = state.book.best_bid().expect("checked non-empty above").quantity;
            let sell_qty = state.book.best_ask().expect("checked non-empty above").quantity;
            let trade_qty = buy_qty.min(sell_qty);
            let buy_limit = state.book.best_bid().expect("checked non-empty above").limit_price;

            let buyer = Arc::clone(&state.book.best_bid().expect("checked non-empty above").trader);
            let seller = Arc::clone(&state.book.best_ask().expect("checked non-empty above").trader);

            seller.account().credit_balance(trade_qty * trade_price);
            buyer.account().credit_inventory(trade_qty);
            let over_encumbrance = trade_qty * (buy_limit - trade_price);
            if over_encumbrance > 0 {
                buyer.account().credit_balance(over_encumbrance);
            }

            state.book.best_bid_mut().expect("checked non-empty above").quantity -= trade_qty;
            state.book.best_ask_mut().expect("checked non-empty above").quantity -= trade_qty;

            let buy_id = state.book.best_bid().expect("checked non-empty above").id;
            let sell_id = state.book.best_ask().expect("checked non-empty above").id;

            if state.book.best_bid().expect("checked non-empty above").quantity == 0 {
                state.book.pop_best_bid();
            }
            if state.book.best_ask().expect("checked non-empty above").quantity == 0 {
                state.book.pop_best_ask();
            }

            state.last_trade_price = trade_price;
            self.metrics.record_trade();

            let notify = NotifyInfo {
                buyer_id: buy_id as u32,
                seller_id: sell_id as u32,
                quantity: trade_qty as u32,
                price: trade_price as u32,
            };
            let mut buf = Vec::new();
            notify.write_to(&mut buf).expect("writing to a Vec cannot fail");
            let _ = buyer.send(MessageType::Bought, &buf);
            let _ = seller.send(MessageType::Sold, &buf);
            self.sessions.broadcast(MessageType::Traded, &buf);
        }
    }

    pub fn broadcast_posted(&self, side: Side, order_id: OrderId, qty: Quantity, price: Price) {
        let notify = match side {
            Side::Buy => NotifyInfo {
                buyer_id: order_id as u32,
                seller_id: 0,
                quantity: qty as u32,
                price: price as u32,
            },
            Side::Sell => NotifyInfo {
                buyer_id: 0,
                seller_id: order_id as u32,
                quantity: qty as u32,
                price: price as u32,
            },
        };
        self.broadcast_notify(MessageType::Posted, &notify);
    }

    /// Stop the matcher, then drain and refund every resting order. No
    /// notifications are emitted — this is teardown, not trading.
    pub fn shutdown(&self, matcher: JoinHandle<()>) {
        self.shutting_down.store(true, Ordering::Release);
        self.wake.notify_all();
        let _ = matcher.join();

        let mut state = self.state.lock().unwrap();
        for order in state.book.drain_all() {
            match order.side {
                Side::Buy => order
                    .trader
                    .account()
                    .credit_balance(order.quantity * order.limit_price),
                Side::Sell => order.trader.account().credit_inventory(order.quantity),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::AccountLedger;
    use std::net::{TcpListener, TcpStream};
    use std::thread::sleep;
    use std::time::Duration;

    /// A throwaway loopback connection, just to give a test [`Session`] a
    /// real socket to write into.
    fn loopback_pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).unwrap();
        let (server, _) = listener.accept().unwrap();
        (client, server)
    }

    fn new_session(registry: &SessionRegistry, ledger: &AccountLedger, name: &str) -> Arc<Session> {
        let (_peer, mine) = loopback_pair();
        registry.login(name, ledger, mine).unwrap()
    }

    fn wait_until_quiescent(exchange: &Arc<Exchange>) {
        // The matcher runs on its own thread; poll until it has cleared the
        // dirty flag, meaning it has finished its latest matching pass.
        for _ in 0..200 {
            if !exchange.state.lock().unwrap().dirty {
                return;
            }
            sleep(Duration::from_millis(2));
        }
    }

    #[test]
    fn simple_trade_settles_at_the_midpoint_on_first_trade() {
        let ledger = AccountLedger::new(10);
        let registry = Arc::new(SessionRegistry::new(10));
        let metrics = Arc::new(ExchangeMetrics::new());
        let exchange = Exchange::new(Arc::clone(&registry), metrics);
        let matcher = Arc::clone(&exchange).run_matcher();

        let alice = new_session(&registry, &ledger, "alice");
        alice.account().credit_balance(1000);
        let bob = new_session(&registry, &ledger, "bob");
        bob.account().credit_inventory(10);

        let sell_id = exchange.post_sell(Arc::clone(&bob), 5, 100).unwrap();
        assert_eq!(sell_id, 1);
        let buy_id = exchange.post_buy(Arc::clone(&alice), 5, 120).unwrap();
        assert_eq!(buy_id, 2);

        wait_until_quiescent(&exchange);

        assert_eq!(alice.account().status().balance, 1000 - 5 * 110);
        assert_eq!(alice.account().status().inventory, 5);
        assert_eq!(bob.account().status().balance, 5 * 110);
        assert_eq!(bob.account().status().inventory, 10 - 5);
        assert_eq!(exchange.state.lock().unwrap().last_trade_price, 110);

        exchange.shutdown(matcher);
    }

    #[test]
    fn partial_fill_leaves_remainder_resting_with_no_refund_when_prices_match() {
        let ledger = AccountLedger::new(10);
        let registry = Arc::new(SessionRegistry::new(10));
        let metrics = Arc::new(ExchangeMetrics::new());
        let exchange = Exchange::new(Arc::clone(&registry), metrics);
        let matcher = Arc::clone(&exchange).run_matcher();

        let alice = new_session(&registry, &ledger, "alice");
        alice.account().credit_balance(1000);
        let bob = new_session(&registry, &ledger, "bob");
        bob.account().credit_inventory(10);

        exchange.post_sell(Arc::clone(&bob), 10, 50).unwrap();
        exchange.post_buy(Arc::clone(&alice), 4, 50).unwrap();

        wait_until_quiescent(&exchange);

        assert_eq!(alice.account().status().balance, 1000 - 4 * 50);
        assert_eq!(alice.account().status().inventory, 4);
        assert_eq!(exchange.state.lock().unwrap().book.best_ask().unwrap().quantity, 6);

        exchange.shutdown(matcher);
    }

    #[test]
    fn buyer_is_refunded_the_spread_between_limit_and_trade_price() {
        let ledger = AccountLedger::new(10);
        let registry = Arc::new(SessionRegistry::new(10));
        let metrics = Arc::new(ExchangeMetrics::new());
        let exchange = Exchange::new(Arc::clone(&registry), metrics);
        let matcher = Arc::clone(&exchange).run_matcher();

        let alice = new_session(&registry, &ledger, "alice");
        alice.account().credit_balance(1000);
        let bob = new_session(&registry, &ledger, "bob");
        bob.account().credit_inventory(10);

        exchange.post_sell(Arc::clone(&bob), 3, 100).unwrap();
        exchange.post_buy(Arc::clone(&alice), 3, 200).unwrap();

        wait_until_quiescent(&exchange);

        // trade_price = midpoint(100, 200) = 150; alice encumbered 600,
        // actually owes 450, so 150 comes back.
        assert_eq!(alice.account().status().balance, 1000 - 450);

        exchange.shutdown(matcher);
    }

    #[test]
    fn cancel_refunds_full_residual_encumbrance() {
        let ledger = AccountLedger::new(10);
        let registry = Arc::new(SessionRegistry::new(10));
        let metrics = Arc::new(ExchangeMetrics::new());
        let exchange = Exchange::new(Arc::clone(&registry), metrics);
        let matcher = Arc::clone(&exchange).run_matcher();

        let alice = new_session(&registry, &ledger, "alice");
        alice.account().credit_balance(1000);

        let order_id = exchange.post_buy(Arc::clone(&alice), 2, 50).unwrap();
        assert_eq!(alice.account().status().balance, 1000 - 100);

        let residual = exchange.cancel(&alice, order_id).unwrap();
        assert_eq!(residual, 2);
        assert_eq!(alice.account().status().balance, 1000);

        exchange.shutdown(matcher);
    }

    #[test]
    fn cancel_by_a_non_owner_fails_and_does_not_mutate_state() {
        let ledger = AccountLedger::new(10);
        let registry = Arc::new(SessionRegistry::new(10));
        let metrics = Arc::new(ExchangeMetrics::new());
        let exchange = Exchange::new(Arc::clone(&registry), metrics);
        let matcher = Arc::clone(&exchange).run_matcher();

        let alice = new_session(&registry, &ledger, "alice");
        alice.account().credit_balance(1000);
        let bob = new_session(&registry, &ledger, "bob");

        let order_id = exchange.post_buy(Arc::clone(&alice), 2, 50).unwrap();
        let err = exchange.cancel(&bob, order_id).unwrap_err();
        assert!(matches!(err, ExchangeError::NotOwner));
        assert_eq!(alice.account().status().balance, 1000 - 100);

        exchange.shutdown(matcher);
    }

    #[test]
    fn cancel_of_unknown_id_fails() {
        let ledger = AccountLedger::new(10);
        let registry = Arc::new(SessionRegistry::new(10));
        let metrics = Arc::new(ExchangeMetrics::new());
        let exchange = Exchange::new(Arc::clone(&registry), metrics);
        let matcher = Arc::clone(&exchange).run_matcher();

        let alice = new_session(&registry, &ledger, "alice");
        let err = exchange.cancel(&alice, 999).unwrap_err();
        assert!(matches!(err, ExchangeError::NotFound));

        exchange.shutdown(matcher);
    }

    #[test]
    fn shutdown_refunds_outstanding_orders_without_notifications() {
        let ledger = AccountLedger::new(10);
        let registry = Arc::new(SessionRegistry::new(10));
        let metrics = Arc::new(ExchangeMetrics::new());
        let exchange = Exchange::new(Arc::clone(&registry), metrics);
        let matcher = Arc::clone(&exchange).run_matcher();

        let alice = new_session(&registry, &ledger, "alice");
        alice.account().credit_balance(1000);
        exchange.post_buy(Arc::clone(&alice), 2, 50).unwrap();

        exchange.shutdown(matcher);
        assert_eq!(alice.account().status().balance, 1000);
    }
}
