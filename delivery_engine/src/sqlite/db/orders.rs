use log::{debug, trace};
use sqlx::{QueryBuilder, SqliteConnection};

use crate::{
    db_types::{NewOrder, NewRating, Order, OrderId, OrderItem, OrderStatus},
    order_objects::OrderQueryFilter,
    traits::OrderFlowError,
};

/// Inserts a new order and its item snapshots using the given connection. This is not atomic on its own; embed
/// the call inside a transaction and pass `&mut *tx` as the connection argument.
pub async fn insert_order(order: NewOrder, conn: &mut SqliteConnection) -> Result<Order, OrderFlowError> {
    let oid = order.order_id.clone();
    let total = order.total();
    let inserted: Order = sqlx::query_as(
        r#"
            INSERT INTO orders (
                order_id,
                customer_id,
                vendor_id,
                total,
                delivery_fee,
                delivery_address
            ) VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *;
        "#,
    )
    .bind(order.order_id)
    .bind(order.customer_id)
    .bind(order.vendor_id)
    .bind(total)
    .bind(order.delivery_fee)
    .bind(order.delivery_address)
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(err) if err.is_unique_violation() => OrderFlowError::OrderAlreadyExists(oid),
        _ => OrderFlowError::from(e),
    })?;
    for item in order.items {
        sqlx::query("INSERT INTO order_items (order_id, product_id, quantity, price) VALUES ($1, $2, $3, $4)")
            .bind(inserted.id)
            .bind(item.product_id)
            .bind(item.quantity)
            .bind(item.price)
            .execute(&mut *conn)
            .await?;
    }
    debug!("📝️ Order [{}] inserted with id {} and total {}", inserted.order_id, inserted.id, inserted.total);
    Ok(inserted)
}

pub async fn fetch_order_by_order_id(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, OrderFlowError> {
    let order = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE order_id = $1 LIMIT 1")
        .bind(order_id)
        .fetch_optional(conn)
        .await?;
    Ok(order)
}

pub async fn fetch_order_items(order_db_id: i64, conn: &mut SqliteConnection) -> Result<Vec<OrderItem>, OrderFlowError> {
    let items = sqlx::query_as::<_, OrderItem>("SELECT * FROM order_items WHERE order_id = $1 ORDER BY id")
        .bind(order_db_id)
        .fetch_all(conn)
        .await?;
    Ok(items)
}

/// Orders that steppers may self-assign: no stepper yet, status Placed or Ready. Oldest first, so the longest
/// waiting order is served first.
pub async fn fetch_available_orders(conn: &mut SqliteConnection) -> Result<Vec<Order>, OrderFlowError> {
    let orders = sqlx::query_as::<_, Order>(
        r#"
            SELECT * FROM orders
            WHERE stepper_id IS NULL AND status IN ('Placed', 'Ready')
            ORDER BY created_at ASC, id ASC
        "#,
    )
    .fetch_all(conn)
    .await?;
    Ok(orders)
}

/// Fetches orders according to criteria specified in the `OrderQueryFilter`.
///
/// Resulting orders are ordered by `created_at` in ascending order.
pub async fn search_orders(query: OrderQueryFilter, conn: &mut SqliteConnection) -> Result<Vec<Order>, OrderFlowError> {
    let mut builder = QueryBuilder::new("SELECT * FROM orders ");
    if !query.is_empty() {
        builder.push("WHERE ");
    }
    let mut where_clause = builder.separated(" AND ");
    if let Some(order_id) = query.order_id {
        where_clause.push("order_id = ");
        where_clause.push_bind_unseparated(order_id.0);
    }
    if let Some(customer_id) = query.customer_id {
        where_clause.push("customer_id = ");
        where_clause.push_bind_unseparated(customer_id);
    }
    if let Some(vendor_id) = query.vendor_id {
        where_clause.push("vendor_id = ");
        where_clause.push_bind_unseparated(vendor_id);
    }
    if let Some(stepper_id) = query.stepper_id {
        where_clause.push("stepper_id = ");
        where_clause.push_bind_unseparated(stepper_id);
    }
    if let Some(since) = query.since {
        where_clause.push("created_at >= ");
        where_clause.push_bind_unseparated(since);
    }
    if let Some(statuses) = query.status {
        let status_clause = statuses.iter().map(|s| format!("'{s}'")).collect::<Vec<String>>().join(",");
        where_clause.push(format!("status IN ({status_clause})"));
    }
    builder.push(" ORDER BY created_at ASC, id ASC");
    trace!("📝️ Executing query: {}", builder.sql());
    let orders = builder.build_query_as::<Order>().fetch_all(conn).await?;
    Ok(orders)
}

pub(crate) async fn update_order_status(
    order_db_id: i64,
    status: OrderStatus,
    conn: &mut SqliteConnection,
) -> Result<(), OrderFlowError> {
    let status = status.to_string();
    let _ = sqlx::query("UPDATE orders SET status = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2")
        .bind(status)
        .bind(order_db_id)
        .execute(conn)
        .await?;
    Ok(())
}

/// Claims the order for the stepper and forces the status to Accepted.
///
/// The `stepper_id IS NULL` guard is part of the UPDATE itself, so the row acts as the serialization point: of
/// two concurrent claims exactly one affects a row. Returns the number of rows affected.
pub(crate) async fn try_assign_stepper(
    order_db_id: i64,
    stepper_id: i64,
    conn: &mut SqliteConnection,
) -> Result<u64, OrderFlowError> {
    let result = sqlx::query(
        r#"
            UPDATE orders
            SET stepper_id = $1, status = 'Accepted', updated_at = CURRENT_TIMESTAMP
            WHERE id = $2 AND stepper_id IS NULL
        "#,
    )
    .bind(stepper_id)
    .bind(order_db_id)
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}

/// Inserts the rating row for an order. The unique constraint on `order_id` enforces one rating per order.
pub(crate) async fn insert_rating(
    order_db_id: i64,
    rating: &NewRating,
    conn: &mut SqliteConnection,
) -> Result<(), OrderFlowError> {
    sqlx::query("INSERT INTO ratings (order_id, stepper_rating, vendor_rating, comment) VALUES ($1, $2, $3, $4)")
        .bind(order_db_id)
        .bind(rating.stepper_rating)
        .bind(rating.vendor_rating)
        .bind(rating.comment.as_deref())
        .execute(conn)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(err) if err.is_unique_violation() => {
                OrderFlowError::AlreadyRated(rating.order_id.clone())
            },
            _ => OrderFlowError::from(e),
        })?;
    Ok(())
}
