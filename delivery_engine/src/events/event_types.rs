use crate::db_types::{Cedi, Order, OrderStatus, WithdrawalRequest};

/// Emitted after an order status transition has committed. Subscribers typically broadcast the new status on the
/// order's real-time channel and push `customer_message` to the customer's device.
#[derive(Debug, Clone)]
pub struct OrderStatusChangedEvent {
    pub order: Order,
    pub old_status: OrderStatus,
    /// The push-notification text for the customer, pre-rendered so sinks stay dumb.
    pub customer_message: String,
}

impl OrderStatusChangedEvent {
    pub fn new(order: Order, old_status: OrderStatus) -> Self {
        let customer_message = customer_notification(order.status);
        Self { order, old_status, customer_message }
    }
}

/// The per-status push notification copy. Statuses without tailored copy fall back to a generic message.
pub fn customer_notification(status: OrderStatus) -> String {
    use OrderStatus::*;
    match status {
        Accepted => "Your order has been accepted by the vendor".to_string(),
        Preparing => "Your order is being prepared".to_string(),
        Ready => "Your order is ready and waiting for a stepper".to_string(),
        OutForDelivery => "Your order is out for delivery".to_string(),
        Delivered => "Your order has been delivered. Enjoy!".to_string(),
        Cancelled => "Your order has been cancelled".to_string(),
        s => format!("Order status: {s}"),
    }
}

/// Emitted after a delivery commission has been credited to a stepper's wallet.
#[derive(Debug, Clone)]
pub struct CommissionCreditedEvent {
    pub order: Order,
    pub stepper_id: i64,
    pub amount: Cedi,
}

/// Emitted after a withdrawal request has been committed. The email sink subscribing here sends the 2FA code to
/// the stepper; delivery failures are its problem alone and never bubble back into the workflow.
#[derive(Debug, Clone)]
pub struct WithdrawalRequestedEvent {
    pub request: WithdrawalRequest,
}
