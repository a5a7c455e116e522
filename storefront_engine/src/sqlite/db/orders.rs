use chrono::{DateTime, Utc};
use log::debug;
use sqlx::SqliteConnection;

use crate::{
    db_types::{NewOrder, NewOrderItem, Order, OrderItem, OrderNumber, OrderStatusType, Reference},
    traits::StoreError,
};

/// Inserts the order row. When the order carries a `payment_reference`, the insert is conditional on the unique
/// index over that column: a conflicting insert writes nothing and returns `None`, which is how overlapping
/// derivation triggers lose the race without creating a duplicate.
pub async fn insert_order(order: &NewOrder, conn: &mut SqliteConnection) -> Result<Option<Order>, StoreError> {
    let inserted: Option<Order> = sqlx::query_as(
        r#"
            INSERT INTO orders (
                order_number,
                order_type,
                payment_reference,
                customer_name,
                customer_email,
                customer_phone,
                shipping_address,
                subtotal,
                shipping,
                total,
                status,
                payment_status,
                paid_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            ON CONFLICT (payment_reference) WHERE payment_reference IS NOT NULL DO NOTHING
            RETURNING *;
        "#,
    )
    .bind(order.order_number.as_str())
    .bind(order.order_type.to_string())
    .bind(order.payment_reference.as_ref().map(|r| r.as_str().to_string()))
    .bind(order.customer_name.clone())
    .bind(order.customer_email.clone())
    .bind(order.customer_phone.clone())
    .bind(order.shipping_address.clone())
    .bind(order.subtotal)
    .bind(order.shipping)
    .bind(order.total)
    .bind(order.status.to_string())
    .bind(order.payment_status.to_string())
    .bind(order.paid_at)
    .fetch_optional(conn)
    .await?;
    if let Some(o) = &inserted {
        debug!("🗃️ Order [{}] inserted with id {}", o.order_number, o.id);
    }
    Ok(inserted)
}

pub async fn insert_items(
    order_id: i64,
    items: &[NewOrderItem],
    conn: &mut SqliteConnection,
) -> Result<(), StoreError> {
    for item in items {
        sqlx::query(
            "INSERT INTO order_items (order_id, product_id, name, unit_price, quantity, image) VALUES ($1, $2, $3, \
             $4, $5, $6)",
        )
        .bind(order_id)
        .bind(item.product_id)
        .bind(item.name.clone())
        .bind(item.unit_price)
        .bind(item.quantity)
        .bind(item.image.clone())
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

pub async fn fetch_order_by_number(
    order_number: &OrderNumber,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as("SELECT * FROM orders WHERE order_number = $1")
        .bind(order_number.as_str())
        .fetch_optional(conn)
        .await?;
    Ok(order)
}

pub async fn fetch_order_by_payment_reference(
    reference: &Reference,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as("SELECT * FROM orders WHERE payment_reference = $1")
        .bind(reference.as_str())
        .fetch_optional(conn)
        .await?;
    Ok(order)
}

pub async fn fetch_items(order_id: i64, conn: &mut SqliteConnection) -> Result<Vec<OrderItem>, sqlx::Error> {
    let items = sqlx::query_as("SELECT * FROM order_items WHERE order_id = $1 ORDER BY id ASC")
        .bind(order_id)
        .fetch_all(conn)
        .await?;
    Ok(items)
}

/// Flips the order to paid. A pending order moves to processing in the same statement; any other fulfillment state
/// is left where it is. `COALESCE` keeps the first recorded payment time on duplicate triggers.
pub async fn mark_paid(
    order_id: i64,
    paid_at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Order, StoreError> {
    let result: Option<Order> = sqlx::query_as(
        "UPDATE orders SET payment_status = 'Paid', status = CASE WHEN status = 'Pending' THEN 'Processing' ELSE \
         status END, paid_at = COALESCE(paid_at, $1), updated_at = CURRENT_TIMESTAMP WHERE id = $2 RETURNING *",
    )
    .bind(paid_at)
    .bind(order_id)
    .fetch_optional(conn)
    .await?;
    result.ok_or(StoreError::OrderIdNotFound(order_id))
}

pub async fn update_order_status(
    order_number: &OrderNumber,
    status: OrderStatusType,
    conn: &mut SqliteConnection,
) -> Result<Order, StoreError> {
    let result: Option<Order> = sqlx::query_as(
        "UPDATE orders SET status = $1, updated_at = CURRENT_TIMESTAMP WHERE order_number = $2 RETURNING *",
    )
    .bind(status.to_string())
    .bind(order_number.as_str())
    .fetch_optional(conn)
    .await?;
    result.ok_or_else(|| StoreError::OrderNotFound(order_number.clone()))
}
