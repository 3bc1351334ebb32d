use thiserror::Error;

use crate::{
    db_types::{Cedi, NewOrder, NewRating, Order, OrderId, OrderStatus, Role, StepperProfile},
    traits::{OrderManagement, WalletLedger, WalletLedgerError},
};

/// The transactional heart of the order pipeline. Backends implementing this trait own the order state machine
/// and the commission-crediting side effect.
#[allow(async_fn_in_trait)]
pub trait DeliveryDatabase: Clone + OrderManagement + WalletLedger {
    /// The URL of the database
    fn url(&self) -> &str;

    /// Stores a new order and its items in a single atomic transaction. The order total is computed from the
    /// item snapshots at insert time and never recomputed afterwards. Fails if the order id already exists.
    async fn insert_order(&self, order: NewOrder) -> Result<Order, OrderFlowError>;

    /// Moves an order to `new_status`.
    ///
    /// In a single atomic transaction:
    /// * the order is loaded (failing with [`OrderFlowError::OrderNotFound`]),
    /// * the requested edge is validated against the transition table, failing with
    ///   [`OrderFlowError::InvalidTransition`] for illegal jumps,
    /// * the status is persisted,
    /// * if `new_status` is `Delivered` and a stepper is assigned, the commission is credited: a commission row
    ///   is inserted and the stepper's wallet `balance` and `total_earned` are incremented by 80% of the
    ///   delivery fee (GHC 5.00 assumed when the order has none). The `UNIQUE(order_id)` constraint on the
    ///   commissions table makes repeated Delivered transitions no-ops for crediting.
    ///
    /// Returns the updated order and the commission credited by *this* call, if any.
    async fn transition_order(
        &self,
        order_id: &OrderId,
        new_status: OrderStatus,
    ) -> Result<(Order, Option<Cedi>), OrderFlowError>;

    /// Assigns a stepper to an unassigned order and forces its status to `Accepted`.
    ///
    /// The `stepper_id IS NULL` check runs as part of the same UPDATE that sets it, so of two concurrent
    /// assignment calls exactly one succeeds; the loser observes [`OrderFlowError::AlreadyAssigned`]. The
    /// candidate stepper must currently be marked available.
    async fn assign_stepper(&self, order_id: &OrderId, stepper_id: i64) -> Result<Order, OrderFlowError>;

    /// Records a rating for a completed order. At most one rating per order (unique constraint). When a stepper
    /// rating is supplied and the order has a stepper, the stepper's rolling average rating is recalculated over
    /// all stepper ratings ever recorded for them, in the same transaction.
    async fn record_rating(&self, rating: NewRating) -> Result<Order, OrderFlowError>;

    /// Resolves a user id to their stepper profile, if they have one.
    async fn stepper_by_user_id(&self, user_id: &str) -> Result<Option<StepperProfile>, OrderFlowError>;

    /// Creates a stepper profile and its zeroed wallet in one transaction. New steppers start available for
    /// deliveries.
    async fn register_stepper(&self, user_id: &str) -> Result<StepperProfile, OrderFlowError>;

    /// Marks the stepper as available for deliveries (or not).
    async fn set_stepper_availability(&self, stepper_id: i64, available: bool) -> Result<(), OrderFlowError>;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), OrderFlowError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Error)]
pub enum OrderFlowError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("Cannot insert order {0}, it already exists")]
    OrderAlreadyExists(OrderId),
    #[error("Order cannot move from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },
    #[error("Order {0} already has a stepper assigned")]
    AlreadyAssigned(OrderId),
    #[error("Stepper #{0} is not currently available for deliveries")]
    StepperUnavailable(i64),
    #[error("No stepper profile exists for user {0}")]
    StepperNotFound(String),
    #[error("Order cannot be cancelled once it is {0}")]
    CancellationBlocked(OrderStatus),
    #[error("Order {0} has already been rated")]
    AlreadyRated(OrderId),
    #[error("Orders can only be rated once they are Completed, not {0}")]
    RatingNotAllowed(OrderStatus),
    #[error("This operation requires the {0} role")]
    Forbidden(Role),
    #[error(transparent)]
    WalletError(#[from] WalletLedgerError),
}

impl From<sqlx::Error> for OrderFlowError {
    fn from(e: sqlx::Error) -> Self {
        OrderFlowError::DatabaseError(e.to_string())
    }
}
