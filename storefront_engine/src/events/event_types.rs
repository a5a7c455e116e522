use crate::db_types::{Order, OrderItem, OrderStatusType};

/// A new order was persisted — either a store checkout or a freshly derived payment-link order. Listeners typically
/// send the order-confirmation mail.
#[derive(Debug, Clone)]
pub struct OrderConfirmedEvent {
    pub order: Order,
    pub items: Vec<OrderItem>,
}

impl OrderConfirmedEvent {
    pub fn new(order: Order, items: Vec<OrderItem>) -> Self {
        Self { order, items }
    }
}

/// An existing order's payment came through (a pending order flipped to paid).
#[derive(Debug, Clone)]
pub struct PaymentConfirmedEvent {
    pub order: Order,
}

impl PaymentConfirmedEvent {
    pub fn new(order: Order) -> Self {
        Self { order }
    }
}

/// An order's fulfillment status changed (including cancellation).
#[derive(Debug, Clone)]
pub struct OrderStatusChangedEvent {
    pub order: Order,
    pub old_status: OrderStatusType,
    pub new_status: OrderStatusType,
}

impl OrderStatusChangedEvent {
    pub fn new(order: Order, old_status: OrderStatusType) -> Self {
        let new_status = order.status;
        Self { order, old_status, new_status }
    }
}
