//! Core types used throughout the system
//!
//! Fundamental type aliases shared by every module, kept separate so that
//! widening a field (e.g. 32-bit funds to 64-bit) touches one place.

/// Monetary amount: account balance, or a deposit/withdraw delta.
///
/// The wire protocol carries these as 32-bit fields (see [`crate::proto`]); we
/// keep the in-process representation at 64 bits so that `quantity * price`
/// never overflows while computing encumbrance, and narrow only at the wire
/// boundary.
pub type Amount = u64;

/// Inventory quantity: an account's holdings, or an order's quantity.
pub type Quantity = u64;

/// A resting order's limit price, or a trade's execution price.
pub type Price = u64;

/// Order ID - unique and strictly increasing within one exchange's lifetime.
/// Never zero; zero is reserved to mean "no order" on the wire.
pub type OrderId = u64;

/// Trade ID - unique within one exchange's lifetime, used only for logging.
pub type TradeId = u64;
