//! Campus Delivery Engine
//!
//! The delivery engine is the core of a campus food-delivery marketplace: customers order from vendors, and
//! "steppers" (delivery riders) carry the orders and earn commissions into an in-app wallet. This library holds
//! the business logic; HTTP, sessions and payment-provider plumbing live in the server layer above it.
//!
//! The library is divided into two main sections:
//! 1. Database management and control ([`mod@sqlite`]). SQLite is the supported backend. You should never need
//!    to access the database directly; use the public API instead. The exception is the data types used in the
//!    database, defined in the public [`mod@db_types`] module.
//! 2. The engine public API ([`mod@cde_api`]). [`OrderFlowApi`] drives the order state machine and the
//!    commission side effect; [`WalletApi`] handles the stepper wallet, withdrawals and deposits. Backends
//!    implement the traits in [`mod@traits`] to serve these APIs.
//!
//! Side effects (push notifications, the withdrawal 2FA email, real-time order broadcasts) hang off the events
//! in [`mod@events`]: subscribe hooks, collect the producers, and hand them to the APIs. Events fire only after
//! the underlying transaction has committed.
pub mod cde_api;
pub mod db_types;
pub mod events;
pub mod helpers;
pub mod traits;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

pub use cde_api::{
    errors::WalletApiError,
    order_flow_api::OrderFlowApi,
    order_objects,
    wallet_api::WalletApi,
    wallet_objects,
};
pub use events::{EventHandlers, EventHooks, EventProducers};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
pub use traits::{DeliveryDatabase, OrderFlowError, OrderManagement, WalletLedger, WalletLedgerError};
