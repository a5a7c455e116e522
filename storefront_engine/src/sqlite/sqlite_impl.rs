//! `SqliteDatabase` is the concrete [`StoreDatabase`] backend.
//!
//! Compound operations (order insert with stock decrements, cancellation with restock) open one transaction and
//! compose the plain query functions from [`super::db`] under it.
use std::fmt::Debug;

use chrono::{DateTime, Utc};
use log::*;
use sqlx::SqlitePool;

use super::db::{links, new_pool, orders, products};
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
    traits::{InsertOrderResult, LinkQueryFilter, StoreDatabase, StoreError},
    transitions,
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = new_pool(url, max_connections).await?;
        Ok(Self { url: url.to_string(), pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./src/sqlite/migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::DatabaseError(e.to_string()))?;
        info!("🗃️ Database migrations complete");
        Ok(())
    }
}

impl StoreDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn insert_payment_link(&self, link: NewPaymentLink) -> Result<PaymentLink, StoreError> {
        let mut conn = self.pool.acquire().await?;
        links::insert_link(link, &mut conn).await
    }

    async fn fetch_payment_link(&self, reference: &Reference) -> Result<Option<PaymentLink>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        Ok(links::fetch_link_by_reference(reference, &mut conn).await?)
    }

    async fn fetch_payment_links(&self, filter: LinkQueryFilter) -> Result<Vec<PaymentLink>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        Ok(links::search_links(filter, &mut conn).await?)
    }

    async fn update_link_status(
        &self,
        reference: &Reference,
        status: LinkStatus,
        paid_at: Option<DateTime<Utc>>,
    ) -> Result<PaymentLink, StoreError> {
        let mut conn = self.pool.acquire().await?;
        links::update_link_status(reference, status, paid_at, &mut conn).await
    }

    async fn record_link_view(&self, reference: &Reference, ip: Option<String>) -> Result<PaymentLink, StoreError> {
        let mut conn = self.pool.acquire().await?;
        links::record_view(reference, ip, &mut conn).await
    }

    async fn expire_payment_links(&self, now: DateTime<Utc>) -> Result<Vec<PaymentLink>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        links::expire_links(now, &mut conn).await
    }

    async fn fetch_stale_pending_links(&self, cutoff: DateTime<Utc>) -> Result<Vec<PaymentLink>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        links::fetch_stale_pending(cutoff, &mut conn).await
    }

    async fn insert_order(&self, order: NewOrder) -> Result<InsertOrderResult, StoreError> {
        let mut tx = self.pool.begin().await?;
        let inserted = orders::insert_order(&order, &mut tx).await?;
        let result = match inserted {
            Some(o) => {
                orders::insert_items(o.id, &order.items, &mut tx).await?;
                for item in &order.items {
                    let Some(product_id) = item.product_id else {
                        continue;
                    };
                    let updated = products::adjust_stock(product_id, -item.quantity, &mut tx).await?;
                    if updated.is_none() {
                        // Dropping the transaction rolls back the order and any earlier decrements.
                        let product = products::fetch_product(product_id, &mut tx).await?;
                        return Err(match product {
                            Some(p) => StoreError::InsufficientStock {
                                product_id,
                                requested: item.quantity,
                                available: p.quantity,
                            },
                            None => StoreError::ProductNotFound(product_id),
                        });
                    }
                }
                InsertOrderResult::Inserted(o)
            },
            None => {
                let reference = order.payment_reference.clone().ok_or_else(|| {
                    StoreError::DatabaseError("Order insert wrote nothing, but had no conflict target".to_string())
                })?;
                let existing =
                    orders::fetch_order_by_payment_reference(&reference, &mut tx).await?.ok_or_else(|| {
                        StoreError::DatabaseError(format!(
                            "No order found for reference {reference} straight after an insert conflict"
                        ))
                    })?;
                debug!("🗃️ Order for reference {reference} already exists as [{}]", existing.order_number);
                InsertOrderResult::AlreadyExists(existing)
            },
        };
        tx.commit().await?;
        Ok(result)
    }

    async fn fetch_order_by_number(&self, order_number: &OrderNumber) -> Result<Option<Order>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::fetch_order_by_number(order_number, &mut conn).await?)
    }

    async fn fetch_order_by_payment_reference(&self, reference: &Reference) -> Result<Option<Order>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::fetch_order_by_payment_reference(reference, &mut conn).await?)
    }

    async fn fetch_order_items(&self, order_id: i64) -> Result<Vec<OrderItem>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::fetch_items(order_id, &mut conn).await?)
    }

    async fn mark_order_paid(&self, order_id: i64, paid_at: DateTime<Utc>) -> Result<Order, StoreError> {
        let mut conn = self.pool.acquire().await?;
        orders::mark_paid(order_id, paid_at, &mut conn).await
    }

    async fn update_order_status(
        &self,
        order_number: &OrderNumber,
        status: OrderStatusType,
    ) -> Result<Order, StoreError> {
        let mut conn = self.pool.acquire().await?;
        orders::update_order_status(order_number, status, &mut conn).await
    }

    async fn cancel_order(&self, order_number: &OrderNumber) -> Result<(Order, Vec<OrderItem>), StoreError> {
        let mut tx = self.pool.begin().await?;
        let order = orders::fetch_order_by_number(order_number, &mut tx)
            .await?
            .ok_or_else(|| StoreError::OrderNotFound(order_number.clone()))?;
        if !transitions::order_cancellable(order.status) {
            return Err(StoreError::OrderNotCancellable(order_number.clone(), order.status));
        }
        let items = orders::fetch_items(order.id, &mut tx).await?;
        for item in &items {
            let Some(product_id) = item.product_id else {
                continue;
            };
            if products::adjust_stock(product_id, item.quantity, &mut tx).await?.is_none() {
                return Err(StoreError::ProductNotFound(product_id));
            }
        }
        let cancelled = orders::update_order_status(order_number, OrderStatusType::Cancelled, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Order [{}] cancelled; stock restored for {} items", cancelled.order_number, items.len());
        Ok((cancelled, items))
    }

    async fn insert_product(&self, product: NewProduct) -> Result<Product, StoreError> {
        let mut conn = self.pool.acquire().await?;
        products::insert_product(product, &mut conn).await
    }

    async fn fetch_product(&self, id: i64) -> Result<Option<Product>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        Ok(products::fetch_product(id, &mut conn).await?)
    }

    async fn adjust_product_stock(&self, id: i64, delta: i64) -> Result<Product, StoreError> {
        let mut conn = self.pool.acquire().await?;
        match products::adjust_stock(id, delta, &mut conn).await? {
            Some(product) => Ok(product),
            None => {
                let product = products::fetch_product(id, &mut conn).await?;
                Err(match product {
                    Some(p) => {
                        StoreError::InsufficientStock { product_id: id, requested: -delta, available: p.quantity }
                    },
                    None => StoreError::ProductNotFound(id),
                })
            },
        }
    }

    async fn close(&mut self) -> Result<(), StoreError> {
        self.pool.close().await;
        Ok(())
    }
}
