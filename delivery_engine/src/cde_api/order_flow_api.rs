use std::fmt::Debug;

use log::*;

use crate::{
    cde_api::{has_role, order_objects::OrderChanged},
    db_types::{Caller, Cedi, NewOrder, NewRating, Order, OrderId, OrderStatus, Role, StepperProfile},
    events::{CommissionCreditedEvent, EventProducers, OrderStatusChangedEvent},
    traits::{DeliveryDatabase, OrderFlowError},
};

/// `OrderFlowApi` is the primary API for driving orders through their lifecycle: placement, status transitions,
/// stepper assignment, cancellation and ratings. It owns the role and ownership gates; the storage backend owns
/// atomicity.
pub struct OrderFlowApi<B> {
    db: B,
    producers: EventProducers,
}

impl<B> Debug for OrderFlowApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderFlowApi")
    }
}

impl<B> OrderFlowApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers }
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

impl<B> OrderFlowApi<B>
where B: DeliveryDatabase
{
    /// Submit a brand-new order from checkout. The order id must be fresh; to move an existing order along the
    /// pipeline use [`Self::update_status`].
    pub async fn process_new_order(&self, order: NewOrder) -> Result<OrderChanged, OrderFlowError> {
        let order_id = order.order_id.clone();
        let order = self.db.insert_order(order).await?;
        debug!("🚚️📦️ Order {order_id} placed for {} by customer {}", order.total, order.customer_id);
        Ok(OrderChanged::new(order, "Order placed"))
    }

    /// Move an order to a new status on behalf of `caller`.
    ///
    /// The edge must be in the transition table, and the caller must hold the role that drives that edge (the
    /// vendor on the order for vendor edges, the assigned stepper for stepper edges, the owning customer for
    /// cancellation; admins may drive any legal edge). On the `Delivered` edge the stepper's commission is
    /// credited in the same transaction as the status write, and repeated deliveries never double-credit.
    ///
    /// Status-changed and commission-credited events fire only after the transaction has committed, so
    /// subscribers never observe a state that later rolled back.
    pub async fn update_status(
        &self,
        caller: &Caller,
        order_id: &OrderId,
        new_status: OrderStatus,
    ) -> Result<OrderChanged, OrderFlowError> {
        let order = self.fetch_order(order_id).await?;
        let old_status = order.status;
        let required = old_status
            .driving_role(new_status)
            .ok_or(OrderFlowError::InvalidTransition { from: old_status, to: new_status })?;
        self.ensure_actor(caller, required, &order).await?;
        let (order, commission) = self.db.transition_order(order_id, new_status).await?;
        debug!("🚚️📦️ Order {order_id} moved from {old_status} to {new_status}");
        self.call_status_changed_hook(&order, old_status).await;
        let message = match (commission, order.stepper_id) {
            (Some(amount), Some(stepper_id)) => {
                self.call_commission_hook(&order, stepper_id, amount).await;
                format!("Order status updated and {amount} commission credited to stepper")
            },
            _ => "Order status updated".to_string(),
        };
        Ok(OrderChanged::new(order, message))
    }

    /// Cancel an order on behalf of its customer. Only `Placed` and `Accepted` orders can be cancelled; once
    /// preparation has started the order runs to completion. The cancelled record is retained.
    pub async fn cancel_order(&self, caller: &Caller, order_id: &OrderId) -> Result<OrderChanged, OrderFlowError> {
        let order = self.fetch_order(order_id).await?;
        if !order.status.is_cancellable() {
            return Err(OrderFlowError::CancellationBlocked(order.status));
        }
        let old_status = order.status;
        self.ensure_actor(caller, Role::Customer, &order).await?;
        let (order, _) = self.db.transition_order(order_id, OrderStatus::Cancelled).await?;
        info!("🚚️📦️ Order {order_id} cancelled by {}", caller.user_id);
        self.call_status_changed_hook(&order, old_status).await;
        Ok(OrderChanged::new(order, format!("Order {order_id} cancelled")))
    }

    /// A stepper claims an unassigned order for themselves. Of several steppers racing for the same order,
    /// exactly one wins; the others get [`OrderFlowError::AlreadyAssigned`].
    pub async fn accept_order(&self, caller: &Caller, order_id: &OrderId) -> Result<OrderChanged, OrderFlowError> {
        if !has_role(caller, Role::Stepper) {
            return Err(OrderFlowError::Forbidden(Role::Stepper));
        }
        let profile = self
            .db
            .stepper_by_user_id(&caller.user_id)
            .await?
            .ok_or_else(|| OrderFlowError::StepperNotFound(caller.user_id.clone()))?;
        self.assign(order_id, profile.id).await
    }

    /// Dispatcher path: assign a specific stepper to an order. Admin only; steppers claim orders for themselves
    /// through [`Self::accept_order`].
    pub async fn assign_stepper(
        &self,
        caller: &Caller,
        order_id: &OrderId,
        stepper_id: i64,
    ) -> Result<OrderChanged, OrderFlowError> {
        if caller.role != Role::Admin {
            return Err(OrderFlowError::Forbidden(Role::Admin));
        }
        self.assign(order_id, stepper_id).await
    }

    async fn assign(&self, order_id: &OrderId, stepper_id: i64) -> Result<OrderChanged, OrderFlowError> {
        let old_status = self.fetch_order(order_id).await?.status;
        let order = self.db.assign_stepper(order_id, stepper_id).await?;
        info!("🚚️🏃️ Order {order_id} assigned to stepper #{stepper_id}");
        self.call_status_changed_hook(&order, old_status).await;
        Ok(OrderChanged::new(order, format!("Order {order_id} assigned to stepper #{stepper_id}")))
    }

    /// Record the customer's rating for a completed order. One rating per order.
    pub async fn rate_order(&self, caller: &Caller, rating: NewRating) -> Result<OrderChanged, OrderFlowError> {
        let order = self.fetch_order(&rating.order_id).await?;
        self.ensure_actor(caller, Role::Customer, &order).await?;
        let order_id = rating.order_id.clone();
        let order = self.db.record_rating(rating).await?;
        debug!("🚚️⭐️ Rating recorded for order {order_id}");
        Ok(OrderChanged::new(order, format!("Thanks for rating order {order_id}")))
    }

    /// Unassigned orders waiting for a stepper, oldest first.
    pub async fn available_orders(&self) -> Result<Vec<Order>, OrderFlowError> {
        self.db.available_orders().await
    }

    /// Create a stepper profile (and its zeroed wallet) for the given user.
    pub async fn register_stepper(&self, user_id: &str) -> Result<StepperProfile, OrderFlowError> {
        let profile = self.db.register_stepper(user_id).await?;
        info!("🚚️🏃️ Stepper #{} registered for user {user_id}", profile.id);
        Ok(profile)
    }

    /// Toggle the caller's availability for deliveries.
    pub async fn set_availability(&self, caller: &Caller, available: bool) -> Result<(), OrderFlowError> {
        if !has_role(caller, Role::Stepper) {
            return Err(OrderFlowError::Forbidden(Role::Stepper));
        }
        let profile = self
            .db
            .stepper_by_user_id(&caller.user_id)
            .await?
            .ok_or_else(|| OrderFlowError::StepperNotFound(caller.user_id.clone()))?;
        self.db.set_stepper_availability(profile.id, available).await?;
        debug!("🚚️🏃️ Stepper #{} is now {}", profile.id, if available { "available" } else { "unavailable" });
        Ok(())
    }

    async fn fetch_order(&self, order_id: &OrderId) -> Result<Order, OrderFlowError> {
        self.db.order_by_id(order_id).await?.ok_or_else(|| OrderFlowError::OrderNotFound(order_id.clone()))
    }

    /// Role and ownership gate for order mutations. Admins pass unconditionally; everyone else must hold the
    /// required role *and* be a party to the order (the vendor on it, its customer, or its assigned stepper).
    async fn ensure_actor(&self, caller: &Caller, required: Role, order: &Order) -> Result<(), OrderFlowError> {
        if caller.role == Role::Admin {
            return Ok(());
        }
        if caller.role != required {
            return Err(OrderFlowError::Forbidden(required));
        }
        let is_party = match required {
            Role::Vendor => caller.user_id == order.vendor_id,
            Role::Customer => caller.user_id == order.customer_id,
            Role::Stepper => {
                let profile = self
                    .db
                    .stepper_by_user_id(&caller.user_id)
                    .await?
                    .ok_or_else(|| OrderFlowError::StepperNotFound(caller.user_id.clone()))?;
                order.stepper_id == Some(profile.id)
            },
            Role::Admin => true,
        };
        if is_party {
            Ok(())
        } else {
            warn!("🚚️🔐️ {} {} is not a party to order {}", caller.role, caller.user_id, order.order_id);
            Err(OrderFlowError::Forbidden(required))
        }
    }

    async fn call_status_changed_hook(&self, order: &Order, old_status: OrderStatus) {
        for emitter in &self.producers.order_status_producer {
            trace!("🚚️📦️ Notifying order status hook subscribers");
            let event = OrderStatusChangedEvent::new(order.clone(), old_status);
            emitter.publish_event(event).await;
        }
    }

    async fn call_commission_hook(&self, order: &Order, stepper_id: i64, amount: Cedi) {
        for emitter in &self.producers.commission_producer {
            trace!("🚚️💰️ Notifying commission hook subscribers");
            let event = CommissionCreditedEvent { order: order.clone(), stepper_id, amount };
            emitter.publish_event(event).await;
        }
    }
}
