use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

pub use cde_common::Cedi;

/// The delivery fee assumed when an order was created without one. Orders placed before vendors set up their
/// location data have no fee on record, but the stepper still earns a commission on delivery.
pub const DEFAULT_DELIVERY_FEE: Cedi = Cedi::from_cedis(5);

/// The stepper's share of the delivery fee, as a percentage.
pub const COMMISSION_PCT: i64 = 80;

//--------------------------------------        Role          ---------------------------------------------------------
/// The actor roles in the marketplace. Every mutating API call carries a [`Caller`] whose role is checked against
/// the operation before anything touches the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Customer,
    Vendor,
    Stepper,
    Admin,
}

impl Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Customer => write!(f, "customer"),
            Role::Vendor => write!(f, "vendor"),
            Role::Stepper => write!(f, "stepper"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

#[derive(Debug, Clone, Error)]
#[error("Invalid role: {0}")]
pub struct RoleConversionError(String);

impl FromStr for Role {
    type Err = RoleConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customer" => Ok(Self::Customer),
            "vendor" => Ok(Self::Vendor),
            "stepper" => Ok(Self::Stepper),
            "admin" => Ok(Self::Admin),
            s => Err(RoleConversionError(s.to_string())),
        }
    }
}

//--------------------------------------       Caller         ---------------------------------------------------------
/// The authenticated identity making an API call. Authentication itself happens upstream (session layer); the
/// engine only sees the resolved user id and role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    pub user_id: String,
    pub role: Role,
}

impl Caller {
    pub fn new<S: Into<String>>(user_id: S, role: Role) -> Self {
        Self { user_id: user_id.into(), role }
    }

    pub fn customer<S: Into<String>>(user_id: S) -> Self {
        Self::new(user_id, Role::Customer)
    }

    pub fn vendor<S: Into<String>>(user_id: S) -> Self {
        Self::new(user_id, Role::Vendor)
    }

    pub fn stepper<S: Into<String>>(user_id: S) -> Self {
        Self::new(user_id, Role::Stepper)
    }

    pub fn admin<S: Into<String>>(user_id: S) -> Self {
        Self::new(user_id, Role::Admin)
    }
}

//--------------------------------------       OrderId        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct OrderId(pub String);

impl FromStr for OrderId {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl From<String> for OrderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for OrderId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl OrderId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

//--------------------------------------     OrderStatus      ---------------------------------------------------------
/// The order lifecycle.
///
/// ```text
/// Placed → Accepted → Preparing → Ready → OutForDelivery → Delivered → Completed
///    \         \
///     +---------+--→ Cancelled
/// ```
///
/// The legal edges are encoded in [`OrderStatus::can_transition_to`] and every status write goes through that
/// table. Cancellation is only reachable from `Placed` or `Accepted`; once food is being prepared the order runs
/// to completion. Cancelled orders are retained, never deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum OrderStatus {
    /// Checkout has created the order; no vendor has picked it up yet.
    Placed,
    /// The vendor (or a self-assigning stepper) has accepted the order.
    Accepted,
    /// The vendor is preparing the order.
    Preparing,
    /// The order is ready for pickup by a stepper.
    Ready,
    /// A stepper has collected the order and is en route.
    OutForDelivery,
    /// The stepper has handed the order to the customer. Commission is credited on this transition.
    Delivered,
    /// The vendor has confirmed delivery and closed out the order.
    Completed,
    /// The customer cancelled before preparation started. Terminal, but the record is retained.
    Cancelled,
}

impl OrderStatus {
    /// The explicit transition table. Anything not listed here is an illegal jump and is rejected with
    /// [`OrderFlowError::InvalidTransition`](crate::traits::OrderFlowError::InvalidTransition).
    pub fn can_transition_to(self, new_status: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, new_status),
            (Placed, Accepted) |
                (Placed, Cancelled) |
                (Accepted, Preparing) |
                (Accepted, Cancelled) |
                (Preparing, Ready) |
                (Ready, OutForDelivery) |
                (OutForDelivery, Delivered) |
                (Delivered, Completed)
        )
    }

    /// The role that is allowed to drive the given edge. `None` if the edge is not in the transition table.
    /// Admins may drive any legal edge regardless of this mapping.
    pub fn driving_role(self, new_status: OrderStatus) -> Option<Role> {
        use OrderStatus::*;
        if !self.can_transition_to(new_status) {
            return None;
        }
        let role = match (self, new_status) {
            (Placed, Accepted) | (Accepted, Preparing) | (Preparing, Ready) | (Delivered, Completed) => Role::Vendor,
            (Ready, OutForDelivery) | (OutForDelivery, Delivered) => Role::Stepper,
            (Placed, Cancelled) | (Accepted, Cancelled) => Role::Customer,
            _ => unreachable!("edge not covered by the transition table"),
        };
        Some(role)
    }

    /// True for statuses from which a customer may still cancel.
    pub fn is_cancellable(self) -> bool {
        self.can_transition_to(OrderStatus::Cancelled)
    }
}

impl Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatus::Placed => write!(f, "Placed"),
            OrderStatus::Accepted => write!(f, "Accepted"),
            OrderStatus::Preparing => write!(f, "Preparing"),
            OrderStatus::Ready => write!(f, "Ready"),
            OrderStatus::OutForDelivery => write!(f, "OutForDelivery"),
            OrderStatus::Delivered => write!(f, "Delivered"),
            OrderStatus::Completed => write!(f, "Completed"),
            OrderStatus::Cancelled => write!(f, "Cancelled"),
        }
    }
}

#[derive(Debug, Clone, Error)]
#[error("Invalid order status: {0}")]
pub struct StatusConversionError(String);

impl FromStr for OrderStatus {
    type Err = StatusConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Placed" => Ok(Self::Placed),
            "Accepted" => Ok(Self::Accepted),
            "Preparing" => Ok(Self::Preparing),
            "Ready" => Ok(Self::Ready),
            "OutForDelivery" => Ok(Self::OutForDelivery),
            "Delivered" => Ok(Self::Delivered),
            "Completed" => Ok(Self::Completed),
            "Cancelled" => Ok(Self::Cancelled),
            s => Err(StatusConversionError(s.to_string())),
        }
    }
}

//--------------------------------------        Order         ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub order_id: OrderId,
    pub customer_id: String,
    pub vendor_id: String,
    pub stepper_id: Option<i64>,
    pub status: OrderStatus,
    /// Sum of item price × quantity, snapshotted at checkout. Never recomputed from live catalog prices.
    pub total: Cedi,
    pub delivery_fee: Option<Cedi>,
    pub delivery_address: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// The commission a stepper earns for delivering this order: 80% of the delivery fee, with a GHC 5.00 fee
    /// assumed when none was recorded.
    pub fn commission(&self) -> Cedi {
        self.delivery_fee.unwrap_or(DEFAULT_DELIVERY_FEE).percent(COMMISSION_PCT)
    }
}

//--------------------------------------      NewOrder        ---------------------------------------------------------
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrder {
    pub order_id: OrderId,
    pub customer_id: String,
    pub vendor_id: String,
    pub delivery_fee: Option<Cedi>,
    pub delivery_address: Option<String>,
    pub items: Vec<NewOrderItem>,
}

impl NewOrder {
    pub fn new(order_id: OrderId, customer_id: String, vendor_id: String) -> Self {
        Self { order_id, customer_id, vendor_id, delivery_fee: None, delivery_address: None, items: Vec::new() }
    }

    pub fn with_delivery_fee(mut self, fee: Cedi) -> Self {
        self.delivery_fee = Some(fee);
        self
    }

    pub fn with_delivery_address<S: Into<String>>(mut self, address: S) -> Self {
        self.delivery_address = Some(address.into());
        self
    }

    pub fn with_item<S: Into<String>>(mut self, product_id: S, quantity: i64, price: Cedi) -> Self {
        self.items.push(NewOrderItem { product_id: product_id.into(), quantity, price });
        self
    }

    /// The order total: Σ item price × quantity. Computed once at insert time and stored on the order row.
    pub fn total(&self) -> Cedi {
        self.items.iter().map(|i| i.price * i.quantity).sum()
    }
}

//--------------------------------------     OrderItem        ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: i64,
    pub order_id: i64,
    pub product_id: String,
    pub quantity: i64,
    /// Price at the time the order was placed, not a live catalog reference.
    pub price: Cedi,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrderItem {
    pub product_id: String,
    pub quantity: i64,
    pub price: Cedi,
}

//--------------------------------------   StepperProfile     ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct StepperProfile {
    pub id: i64,
    pub user_id: String,
    pub is_available: bool,
    /// Rolling mean of all stepper ratings ever recorded for this stepper.
    pub rating: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------       Wallet         ---------------------------------------------------------
/// One wallet per stepper, created at registration with everything zeroed.
///
/// `balance` is spendable/withdrawable; `total_earned` is lifetime earnings and only ever grows;
/// `deposit_amount` tracks security-deposit principal separately from spendable funds.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Wallet {
    pub id: i64,
    pub stepper_id: i64,
    pub balance: Cedi,
    pub total_earned: Cedi,
    pub deposit_amount: Cedi,
    /// Set when the first gateway-confirmed deposit lands; marks the start of the interest-accrual period.
    pub investment_start_date: Option<DateTime<Utc>>,
    pub last_growth_update: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------  CommissionRecord    ---------------------------------------------------------
/// One row per delivered order. The `UNIQUE(order_id)` constraint on this table is the idempotency guard that
/// makes repeated Delivered transitions safe no-ops for crediting.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct CommissionRecord {
    pub id: i64,
    pub order_id: i64,
    pub stepper_id: i64,
    pub amount: Cedi,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------  WithdrawalStatus    ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum WithdrawalStatus {
    Pending,
    Approved,
    Rejected,
}

impl Display for WithdrawalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WithdrawalStatus::Pending => write!(f, "Pending"),
            WithdrawalStatus::Approved => write!(f, "Approved"),
            WithdrawalStatus::Rejected => write!(f, "Rejected"),
        }
    }
}

impl FromStr for WithdrawalStatus {
    type Err = StatusConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Approved" => Ok(Self::Approved),
            "Rejected" => Ok(Self::Rejected),
            s => Err(StatusConversionError(s.to_string())),
        }
    }
}

//-------------------------------------- WithdrawalRequest    ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct WithdrawalRequest {
    pub id: i64,
    pub stepper_id: i64,
    pub amount: Cedi,
    pub status: WithdrawalStatus,
    /// Generated once at request creation. Resending is a read of this stored code; it is never regenerated.
    pub two_factor_code: String,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

//--------------------------------------      NewRating       ---------------------------------------------------------
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRating {
    pub order_id: OrderId,
    pub stepper_rating: Option<i64>,
    pub vendor_rating: Option<i64>,
    pub comment: Option<String>,
}

impl NewRating {
    pub fn for_order(order_id: OrderId) -> Self {
        Self { order_id, stepper_rating: None, vendor_rating: None, comment: None }
    }

    pub fn with_stepper_rating(mut self, rating: i64) -> Self {
        self.stepper_rating = Some(rating);
        self
    }

    pub fn with_vendor_rating(mut self, rating: i64) -> Self {
        self.vendor_rating = Some(rating);
        self
    }

    pub fn with_comment<S: Into<String>>(mut self, comment: S) -> Self {
        self.comment = Some(comment.into());
        self
    }
}
