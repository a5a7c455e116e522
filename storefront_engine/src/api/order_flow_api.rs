use std::fmt::Debug;

use log::*;
use spg_common::Money;

use crate::{
    api::{
        errors::OrderFlowError,
        objects::{CartLine, CustomerDetails},
    },
    db_types::{NewOrder, NewOrderItem, Order, OrderItem, OrderNumber, OrderStatusType, OrderType, PaymentStatus},
    events::{EventProducers, OrderConfirmedEvent, OrderStatusChangedEvent},
    helpers,
    traits::{InsertOrderResult, StoreDatabase, StoreError},
    transitions,
};

/// `OrderFlowApi` covers the store-checkout path: placing an order from a cart, cancelling one, and the admin
/// fulfillment status updates. Payment-link orders are derived by [`crate::LinkFlowApi`], not here.
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
}

impl<B> OrderFlowApi<B>
where B: StoreDatabase
{
    /// Places a store order from a cart.
    ///
    /// Every line is validated against the live catalog first — product exists, is in stock, and can cover the
    /// requested quantity — and any single failure aborts the whole order before anything is persisted or any stock
    /// is touched. The subtotal is recomputed from current catalog prices; client-submitted prices are never
    /// trusted. Stock decrements ride in the same transaction as the order insert.
    pub async fn place_store_order(
        &self,
        cart: Vec<CartLine>,
        customer: CustomerDetails,
        shipping_fee: Money,
    ) -> Result<Order, OrderFlowError> {
        if cart.is_empty() {
            return Err(OrderFlowError::EmptyCart);
        }
        let mut items = Vec::with_capacity(cart.len());
        for line in &cart {
            if line.quantity < 1 {
                return Err(OrderFlowError::InvalidQuantity(line.quantity));
            }
            let product = self
                .db
                .fetch_product(line.product_id)
                .await?
                .ok_or(OrderFlowError::ProductNotFound(line.product_id))?;
            if !product.in_stock() || line.quantity > product.quantity {
                return Err(OrderFlowError::OutOfStock {
                    name: product.name,
                    requested: line.quantity,
                    available: product.quantity,
                });
            }
            let name = match (&line.color, &line.size) {
                (None, None) => product.name,
                (color, size) => {
                    let variant =
                        [color.as_deref(), size.as_deref()].into_iter().flatten().collect::<Vec<_>>().join("/");
                    format!("{} ({variant})", product.name)
                },
            };
            items.push(NewOrderItem {
                product_id: Some(line.product_id),
                name,
                unit_price: product.price,
                quantity: line.quantity,
                image: product.image,
            });
        }
        let subtotal: Money = items.iter().map(NewOrderItem::line_total).sum();
        let total = subtotal + shipping_fee;
        let new_order = NewOrder {
            order_number: helpers::new_order_number(),
            order_type: OrderType::Store,
            payment_reference: None,
            customer_name: customer.name,
            customer_email: customer.email,
            customer_phone: customer.phone,
            shipping_address: customer.shipping_address,
            subtotal,
            shipping: shipping_fee,
            total,
            status: OrderStatusType::Pending,
            payment_status: PaymentStatus::Pending,
            paid_at: None,
            items,
        };
        let order = match self.db.insert_order(new_order).await? {
            InsertOrderResult::Inserted(order) => order,
            // Store orders carry no payment reference, so the conditional insert cannot lose a race.
            InsertOrderResult::AlreadyExists(order) => order,
        };
        info!("📦️ Store order [{}] placed for {}", order.order_number, order.total);
        let order_items = self.db.fetch_order_items(order.id).await?;
        self.call_order_confirmed_hook(&order, &order_items).await;
        Ok(order)
    }

    /// Cancels an order, restoring stock for every product-backed item. Allowed from any status except completed
    /// and cancelled. This is purely an internal compensating action; no gateway or refund interaction happens.
    pub async fn cancel_order(&self, order_number: &OrderNumber) -> Result<Order, OrderFlowError> {
        let old_status = self
            .db
            .fetch_order_by_number(order_number)
            .await?
            .ok_or_else(|| OrderFlowError::OrderNotFound(order_number.clone()))?
            .status;
        let (order, items) = match self.db.cancel_order(order_number).await {
            Ok(result) => result,
            Err(StoreError::OrderNotFound(n)) => return Err(OrderFlowError::OrderNotFound(n)),
            Err(StoreError::OrderNotCancellable(n, s)) => return Err(OrderFlowError::NotCancellable(n, s)),
            Err(e) => return Err(e.into()),
        };
        info!("📦️ Order [{}] cancelled; {} items restocked", order.order_number, items.len());
        self.call_status_changed_hook(&order, old_status).await;
        Ok(order)
    }

    /// Admin fulfillment transition. Cancellation goes through [`Self::cancel_order`] so that stock compensation
    /// cannot be skipped.
    pub async fn set_order_status(
        &self,
        order_number: &OrderNumber,
        new_status: OrderStatusType,
    ) -> Result<Order, OrderFlowError> {
        if new_status == OrderStatusType::Cancelled {
            return Err(OrderFlowError::CancelViaStatusUpdate);
        }
        let order = self
            .db
            .fetch_order_by_number(order_number)
            .await?
            .ok_or_else(|| OrderFlowError::OrderNotFound(order_number.clone()))?;
        if order.status == new_status {
            return Ok(order);
        }
        // A cancelled order has had its stock compensated; it never comes back.
        if !transitions::order_cancellable(order.status) && order.status != OrderStatusType::Completed {
            return Err(OrderFlowError::StatusLocked(order_number.clone(), order.status));
        }
        let old_status = order.status;
        let updated = self.db.update_order_status(order_number, new_status).await?;
        info!("📦️ Order [{}] moved {} -> {}", updated.order_number, old_status, updated.status);
        self.call_status_changed_hook(&updated, old_status).await;
        Ok(updated)
    }

    pub async fn fetch_order(&self, order_number: &OrderNumber) -> Result<Option<Order>, OrderFlowError> {
        Ok(self.db.fetch_order_by_number(order_number).await?)
    }

    pub async fn fetch_order_items(&self, order_id: i64) -> Result<Vec<OrderItem>, OrderFlowError> {
        Ok(self.db.fetch_order_items(order_id).await?)
    }

    async fn call_order_confirmed_hook(&self, order: &Order, items: &[OrderItem]) {
        for emitter in &self.producers.order_confirmed_producer {
            debug!("📦️ Notifying order-confirmed hook subscribers");
            let event = OrderConfirmedEvent::new(order.clone(), items.to_vec());
            emitter.publish_event(event).await;
        }
    }

    async fn call_status_changed_hook(&self, order: &Order, old_status: OrderStatusType) {
        for emitter in &self.producers.status_changed_producer {
            debug!("📦️ Notifying status-changed hook subscribers");
            let event = OrderStatusChangedEvent::new(order.clone(), old_status);
            emitter.publish_event(event).await;
        }
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}
