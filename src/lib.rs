//! bourse — a continuous double-auction exchange for a single fungible
//! instrument.
//!
//! # Modules
//!
//! - [`core_types`] — shared numeric type aliases (`Amount`, `Quantity`, `Price`, `OrderId`)
//! - [`config`] — process configuration (`BourseConfig`)
//! - [`logging`] — `tracing` subscriber setup
//! - [`proto`] — the 12-byte header + typed payload wire format
//! - [`ledger`] — the account ledger: balances, inventory, encumbrance (C1)
//! - [`session`] — the session registry: logged-in traders (C2)
//! - [`connection_registry`] — the live-connection set and shutdown barrier (C3)
//! - [`orderbook`] — the two-sided resting-order book (part of C4)
//! - [`exchange`] — the matching engine and its background thread (C4)
//! - [`client`] — the per-connection session loop (C5)
//! - [`server`] — process wiring: constructs C1–C4, runs the accept loop and shutdown
//! - [`metrics`] — in-process lifecycle counters

pub mod client;
pub mod config;
pub mod connection_registry;
pub mod core_types;
pub mod exchange;
pub mod ledger;
pub mod logging;
pub mod metrics;
pub mod orderbook;
pub mod proto;
pub mod server;
pub mod session;
