use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use storefront_engine::{traits::GatewayError, LinkFlowError, OrderFlowError, StoreError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Payload deserialization error")]
    CouldNotDeserializePayload,
    #[error("Could not read request path: {0}")]
    InvalidRequestPath(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("{0}")]
    ValidationError(String),
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    #[error("{0}")]
    OrderStateConflict(String),
    #[error("The payment gateway could not be reached. {0}")]
    GatewayUnavailable(String),
    #[error("The payment gateway rejected the request. {0}")]
    GatewayRejected(String),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::CouldNotDeserializePayload => StatusCode::BAD_REQUEST,
            Self::InvalidRequestPath(_) => StatusCode::BAD_REQUEST,
            Self::ValidationError(_) => StatusCode::BAD_REQUEST,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::OrderStateConflict(_) => StatusCode::CONFLICT,
            // A gateway we cannot reach is not a client error, and crucially not a payment outcome either.
            Self::GatewayUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::GatewayRejected(_) => StatusCode::BAD_GATEWAY,
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": self.to_string() }).to_string())
    }
}

impl From<LinkFlowError> for ServerError {
    fn from(e: LinkFlowError) -> Self {
        match e {
            LinkFlowError::LinkNotFound(r) => Self::NoRecordFound(format!("No payment link for reference {r}")),
            LinkFlowError::GatewayError(g) => g.into(),
            LinkFlowError::StoreError(s) => s.into(),
            e if e.is_validation() => Self::ValidationError(e.to_string()),
            e => Self::BackendError(e.to_string()),
        }
    }
}

impl From<OrderFlowError> for ServerError {
    fn from(e: OrderFlowError) -> Self {
        match e {
            OrderFlowError::OrderNotFound(n) => Self::NoRecordFound(format!("No order {n}")),
            OrderFlowError::NotCancellable(..) | OrderFlowError::StatusLocked(..) | OrderFlowError::CancelViaStatusUpdate => {
                Self::OrderStateConflict(e.to_string())
            },
            OrderFlowError::EmptyCart
            | OrderFlowError::InvalidQuantity(_)
            | OrderFlowError::ProductNotFound(_)
            | OrderFlowError::OutOfStock { .. } => Self::ValidationError(e.to_string()),
            OrderFlowError::StoreError(s) => s.into(),
        }
    }
}

impl From<StoreError> for ServerError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::OrderNotFound(_) | StoreError::OrderIdNotFound(_) | StoreError::LinkNotFound(_) => {
                Self::NoRecordFound(e.to_string())
            },
            StoreError::ProductNotFound(_) | StoreError::InsufficientStock { .. } => Self::ValidationError(e.to_string()),
            StoreError::OrderNotCancellable(..) => Self::OrderStateConflict(e.to_string()),
            e => Self::BackendError(e.to_string()),
        }
    }
}

impl From<GatewayError> for ServerError {
    fn from(e: GatewayError) -> Self {
        match e {
            GatewayError::Unavailable(_) => Self::GatewayUnavailable(e.to_string()),
            GatewayError::NotFound => Self::NoRecordFound(e.to_string()),
            GatewayError::InvalidParameters(_) => Self::ValidationError(e.to_string()),
            e => Self::GatewayRejected(e.to_string()),
        }
    }
}
