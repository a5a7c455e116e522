use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::{
    db_types::{
        LinkStatus,
        NewOrder,
        NewPaymentLink,
        NewProduct,
        Order,
        OrderItem,
        OrderNumber,
        OrderStatusType,
        PaymentLink,
        Product,
        Reference,
    },
    traits::{InsertOrderResult, LinkQueryFilter},
};

/// The storage contract for the storefront payment engine.
///
/// Consistency rests on per-statement atomicity plus the transactions the implementation wraps around compound
/// operations; there are no cross-call transactions. The two operations with real invariants are
/// [`Self::insert_order`] (the conditional insert that makes order derivation idempotent, with its stock decrements
/// in the same transaction) and [`Self::cancel_order`] (guard, restock and status flip in one transaction).
#[allow(async_fn_in_trait)]
pub trait StoreDatabase: Clone {
    /// The URL of the database.
    fn url(&self) -> &str;

    //----------------------------------------- Payment links -----------------------------------------------------

    async fn insert_payment_link(&self, link: NewPaymentLink) -> Result<PaymentLink, StoreError>;

    async fn fetch_payment_link(&self, reference: &Reference) -> Result<Option<PaymentLink>, StoreError>;

    /// Links matching the filter, newest first.
    async fn fetch_payment_links(&self, filter: LinkQueryFilter) -> Result<Vec<PaymentLink>, StoreError>;

    /// Moves the link to `status`. When the status is `Completed`, `paid_at` and `verified_at` are stamped with
    /// `paid_at`, but only if they are not already set, so re-verification cannot shift the recorded payment time.
    async fn update_link_status(
        &self,
        reference: &Reference,
        status: LinkStatus,
        paid_at: Option<DateTime<Utc>>,
    ) -> Result<PaymentLink, StoreError>;

    /// Bumps the view counter and merges `ip` into the stored address set. Analytics only.
    async fn record_link_view(&self, reference: &Reference, ip: Option<String>) -> Result<PaymentLink, StoreError>;

    /// Bulk-marks every pending link whose expiry is behind `now` as expired, returning the affected links.
    async fn expire_payment_links(&self, now: DateTime<Utc>) -> Result<Vec<PaymentLink>, StoreError>;

    /// Pending links created before `cutoff`, i.e. the ones a sweep should re-verify against the gateway.
    async fn fetch_stale_pending_links(&self, cutoff: DateTime<Utc>) -> Result<Vec<PaymentLink>, StoreError>;

    //----------------------------------------- Orders -------------------------------------------------------------

    /// Inserts the order, its items, and applies the stock decrement for every product-backed item, in a single
    /// transaction.
    ///
    /// When the order carries a `payment_reference`, the insert is conditional on no order existing for that
    /// reference: this is one atomic statement against the unique index, not a lookup followed by an insert, so
    /// overlapping verification triggers cannot both create an order. The loser of the race gets
    /// [`InsertOrderResult::AlreadyExists`] with the surviving row and no stock is touched.
    async fn insert_order(&self, order: NewOrder) -> Result<InsertOrderResult, StoreError>;

    async fn fetch_order_by_number(&self, order_number: &OrderNumber) -> Result<Option<Order>, StoreError>;

    async fn fetch_order_by_payment_reference(&self, reference: &Reference) -> Result<Option<Order>, StoreError>;

    async fn fetch_order_items(&self, order_id: i64) -> Result<Vec<OrderItem>, StoreError>;

    /// Flips the order to paid/processing. Returns the updated order; a no-op if it was already paid.
    async fn mark_order_paid(&self, order_id: i64, paid_at: DateTime<Utc>) -> Result<Order, StoreError>;

    /// Sets the fulfillment status. Payment status is not touched; the two axes move independently.
    async fn update_order_status(&self, order_number: &OrderNumber, status: OrderStatusType) -> Result<Order, StoreError>;

    /// Cancels the order and restores stock for every product-backed item, in one transaction. Fails with
    /// [`StoreError::OrderNotCancellable`] when the order is already completed or cancelled.
    async fn cancel_order(&self, order_number: &OrderNumber) -> Result<(Order, Vec<OrderItem>), StoreError>;

    //----------------------------------------- Products -----------------------------------------------------------

    async fn insert_product(&self, product: NewProduct) -> Result<Product, StoreError>;

    async fn fetch_product(&self, id: i64) -> Result<Option<Product>, StoreError>;

    /// Adjusts stock by `delta` (negative to decrement) as a single in-place update. The update refuses to take the
    /// quantity below zero.
    async fn adjust_product_stock(&self, id: i64, delta: i64) -> Result<Product, StoreError>;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("Internal database error: {0}")]
    DatabaseError(String),
    #[error("No payment link exists for reference {0}")]
    LinkNotFound(Reference),
    #[error("The requested order {0} does not exist")]
    OrderNotFound(OrderNumber),
    #[error("The requested order (internal id {0}) does not exist")]
    OrderIdNotFound(i64),
    #[error("The requested product (id {0}) does not exist")]
    ProductNotFound(i64),
    #[error("Insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock { product_id: i64, requested: i64, available: i64 },
    #[error("Order {0} cannot be cancelled from status {1}")]
    OrderNotCancellable(OrderNumber, OrderStatusType),
    #[error("A payment link already exists for reference {0}")]
    LinkAlreadyExists(Reference),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::DatabaseError(e.to_string())
    }
}
