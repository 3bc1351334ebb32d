use std::fmt::Display;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db_types::{Order, OrderId, OrderStatus};

/// The result of a mutating order operation: the updated order plus a human-readable confirmation message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderChanged {
    pub order: Order,
    pub message: String,
}

impl OrderChanged {
    pub fn new<S: Into<String>>(order: Order, message: S) -> Self {
        Self { order, message: message.into() }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OrderQueryFilter {
    pub order_id: Option<OrderId>,
    pub customer_id: Option<String>,
    pub vendor_id: Option<String>,
    pub stepper_id: Option<i64>,
    pub since: Option<DateTime<Utc>>,
    pub status: Option<Vec<OrderStatus>>,
}

impl OrderQueryFilter {
    pub fn with_order_id(mut self, order_id: OrderId) -> Self {
        self.order_id = Some(order_id);
        self
    }

    pub fn with_customer_id<S: Into<String>>(mut self, customer_id: S) -> Self {
        self.customer_id = Some(customer_id.into());
        self
    }

    pub fn with_vendor_id<S: Into<String>>(mut self, vendor_id: S) -> Self {
        self.vendor_id = Some(vendor_id.into());
        self
    }

    pub fn with_stepper_id(mut self, stepper_id: i64) -> Self {
        self.stepper_id = Some(stepper_id);
        self
    }

    pub fn with_status(mut self, status: OrderStatus) -> Self {
        self.status.get_or_insert_with(Vec::new).push(status);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.order_id.is_none() &&
            self.customer_id.is_none() &&
            self.vendor_id.is_none() &&
            self.stepper_id.is_none() &&
            self.since.is_none() &&
            self.status.is_none()
    }
}

impl Display for OrderQueryFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            return write!(f, "No filters.");
        }
        if let Some(order_id) = &self.order_id {
            write!(f, "order_id: {order_id}. ")?;
        }
        if let Some(customer_id) = &self.customer_id {
            write!(f, "customer_id: {customer_id}. ")?;
        }
        if let Some(vendor_id) = &self.vendor_id {
            write!(f, "vendor_id: {vendor_id}. ")?;
        }
        if let Some(stepper_id) = &self.stepper_id {
            write!(f, "stepper_id: {stepper_id}. ")?;
        }
        if let Some(since) = &self.since {
            write!(f, "since {since}. ")?;
        }
        if let Some(statuses) = &self.status {
            let statuses = statuses.iter().map(|s| s.to_string()).collect::<Vec<String>>().join(",");
            write!(f, "statuses: [{statuses}]. ")?;
        }
        Ok(())
    }
}
