//! # Database backend contracts.
//!
//! This module defines the interface contracts that a storage backend must implement to drive the delivery engine.
//!
//! * [`DeliveryDatabase`] defines the transactional operations of the order pipeline: order insertion, status
//!   transitions (including the commission-crediting side effect), stepper assignment and ratings.
//! * [`OrderManagement`] defines read-only queries over orders.
//! * [`WalletLedger`] defines the stepper wallet: commission history, deposits, and the withdrawal workflow with
//!   its available-balance invariant.
//!
//! All money-moving methods are specified as single atomic units; a conforming backend must make each of them
//! all-or-nothing. The SQLite backend in [`crate::sqlite`] implements all three traits.
mod delivery_database;
mod order_management;
mod wallet_ledger;

pub use delivery_database::{DeliveryDatabase, OrderFlowError};
pub use order_management::OrderManagement;
pub use wallet_ledger::{WalletLedger, WalletLedgerError};
