//! Khata: a shopkeeper's customer ledger.
//!
//! Customers owe money through signed transactions (positive is credit given,
//! negative is debit received). [`stat`] computes per-customer totals and the
//! dashboard metrics, [`store`] persists rows in memory or Postgres, and
//! [`tui`] is the terminal front end.

pub mod config;
pub mod error;
pub mod form;
pub mod format;
pub mod listing;
pub mod stat;
pub mod store;
pub mod tui;

pub use error::{LedgerError, Result};
