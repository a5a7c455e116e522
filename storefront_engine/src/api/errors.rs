use thiserror::Error;

use crate::{
    db_types::{OrderNumber, OrderStatusType, Reference},
    traits::{GatewayError, StoreError},
};

#[derive(Debug, Clone, Error)]
pub enum LinkFlowError {
    #[error("{0}")]
    StoreError(#[from] StoreError),
    /// The gateway call itself failed. Nothing was persisted and no payment outcome may be inferred.
    #[error("{0}")]
    GatewayError(#[from] GatewayError),
    #[error("Cannot create a payment link: {0}")]
    InvalidAmount(String),
    #[error("Quantity must be at least 1, got {0}")]
    InvalidQuantity(i64),
    #[error("The requested product (id {0}) does not exist")]
    ProductNotFound(i64),
    #[error("No payment link exists for reference {0}")]
    LinkNotFound(Reference),
    #[error("'{0}' is not a valid payment reference")]
    MalformedReference(String),
}

impl LinkFlowError {
    /// Validation failures are client errors; everything else is the backend's problem.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            LinkFlowError::InvalidAmount(_)
                | LinkFlowError::InvalidQuantity(_)
                | LinkFlowError::ProductNotFound(_)
                | LinkFlowError::MalformedReference(_)
        )
    }
}

#[derive(Debug, Clone, Error)]
pub enum OrderFlowError {
    #[error("{0}")]
    StoreError(#[from] StoreError),
    #[error("The cart is empty")]
    EmptyCart,
    #[error("Quantity must be at least 1, got {0}")]
    InvalidQuantity(i64),
    #[error("The requested product (id {0}) does not exist")]
    ProductNotFound(i64),
    #[error("'{name}' is out of stock or short: requested {requested}, available {available}")]
    OutOfStock { name: String, requested: i64, available: i64 },
    #[error("The requested order {0} does not exist")]
    OrderNotFound(OrderNumber),
    #[error("Order {0} cannot be cancelled from status {1}")]
    NotCancellable(OrderNumber, OrderStatusType),
    #[error("Order {0} cannot change status from {1}")]
    StatusLocked(OrderNumber, OrderStatusType),
    #[error("Cancelling an order goes through the cancellation flow, not a status update")]
    CancelViaStatusUpdate,
}
