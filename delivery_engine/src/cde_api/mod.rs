//! # Delivery engine public API
//!
//! The `cde_api` module exposes the programmatic API for the delivery engine. The API is modular, so that
//! clients can pick the functionality they need; order flow and wallet concerns can even be served by different
//! backend instances.
//!
//! * [`order_flow_api`] drives the order state machine: status transitions, stepper assignment, cancellation and
//!   ratings, plus the commission side effect on delivery.
//! * [`wallet_api`] is the stepper wallet ledger: withdrawal workflow, deposits and history queries.
//!
//! The pattern for using the APIs is the same as elsewhere: construct an API instance over a database backend
//! that implements the required traits, plus the event producers for side-effect sinks:
//!
//! ```rust,ignore
//! use delivery_engine::{EventProducers, OrderFlowApi, SqliteDatabase};
//! let db = SqliteDatabase::new_with_url("sqlite://data/delivery_store.db", 25).await?;
//! let api = OrderFlowApi::new(db, EventProducers::default());
//! let orders = api.available_orders().await?;
//! ```
pub mod errors;
pub mod order_flow_api;
pub mod order_objects;
pub mod wallet_api;
pub mod wallet_objects;

use crate::db_types::{Caller, Role};

/// Role gate applied at the boundary of every mutating operation. Admins pass any gate.
pub(crate) fn has_role(caller: &Caller, required: Role) -> bool {
    caller.role == required || caller.role == Role::Admin
}
