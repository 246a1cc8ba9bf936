//! Validated-ledger stream feeding the request engine.
//!
//! `LedgerMonitor` walks closed ledgers in order and publishes every
//! transaction; `PaymentListener` hands each one to the engine.

pub mod listener;
pub mod monitor;

pub use listener::PaymentListener;
pub use monitor::{LedgerMonitor, STREAM_CAPACITY};
