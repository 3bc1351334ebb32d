use crate::{
    db_types::{Order, OrderId, OrderItem},
    order_objects::OrderQueryFilter,
    traits::OrderFlowError,
};

/// Read-only queries over orders.
#[allow(async_fn_in_trait)]
pub trait OrderManagement: Clone {
    async fn order_by_id(&self, order_id: &OrderId) -> Result<Option<Order>, OrderFlowError>;

    /// Orders with no stepper assigned and status `Placed` or `Ready`, oldest first. The ordering is a fairness
    /// policy: first placed, first served.
    async fn available_orders(&self) -> Result<Vec<Order>, OrderFlowError>;

    /// Fetches orders matching the given filter, ordered by creation time ascending.
    async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, OrderFlowError>;

    /// The item snapshots belonging to an order.
    async fn order_items(&self, order_id: &OrderId) -> Result<Vec<OrderItem>, OrderFlowError>;
}
