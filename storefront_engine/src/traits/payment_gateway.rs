use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use spg_common::Money;
use thiserror::Error;

use crate::db_types::Reference;

/// The slice of the payment gateway the reconciliation engine needs: open a session, ask about a session.
///
/// Implementations translate to and from the gateway's wire format; in particular, amounts cross the gateway wire in
/// minor currency units while this trait speaks [`Money`], so the conversion happens exactly once, inside the
/// implementation. The engine never constructs a gateway client itself; one is injected at the composition root,
/// which is also what lets the test suite swap in a scripted fake.
#[allow(async_fn_in_trait)]
pub trait PaymentGateway: Clone {
    /// Opens a payment session. On success the gateway echoes the reference back along with the hosted checkout URL.
    /// Must not persist anything; a gateway failure here leaves no trace in the system.
    async fn initialize_payment(&self, init: PaymentInit) -> Result<InitiatedPayment, GatewayError>;

    /// Asks for the gateway's current view of the transaction. Side-effect free; the caller decides what to persist.
    /// A transport failure is an *unknown* outcome and must surface as an error, never as a payment result.
    async fn verify_payment(&self, reference: &Reference) -> Result<PaymentVerification, GatewayError>;
}

#[derive(Debug, Clone)]
pub struct PaymentInit {
    pub email: String,
    pub amount: Money,
    pub reference: Reference,
    pub callback_url: Option<String>,
    pub metadata: Option<Value>,
}

#[derive(Debug, Clone)]
pub struct InitiatedPayment {
    pub reference: Reference,
    pub authorization_url: String,
    pub access_code: String,
}

/// The gateway's answer collapsed onto the three outcomes the state machine distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentOutcome {
    Success,
    Failed,
    Pending,
}

#[derive(Debug, Clone)]
pub struct PaymentVerification {
    pub reference: Reference,
    pub outcome: PaymentOutcome,
    pub amount: Money,
    pub paid_at: Option<DateTime<Utc>>,
    pub customer_email: Option<String>,
    pub customer_name: Option<String>,
}

/// Gateway failures, as the engine sees them. None of these are payment outcomes: when a call errors, the caller
/// must leave link and order state untouched, because nothing is known about what the gateway did.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("The gateway rejected the request parameters. {0}")]
    InvalidParameters(String),
    #[error("The gateway rejected our credentials.")]
    Unauthorized,
    #[error("The gateway refused the request. {0}")]
    Forbidden(String),
    #[error("The gateway has no record of this transaction.")]
    NotFound,
    #[error("The gateway could not be reached, or did not answer in time. {0}")]
    Unavailable(String),
    #[error("The gateway response could not be interpreted. {0}")]
    ResponseError(String),
}

impl GatewayError {
    /// Whether retrying later could reasonably produce a different answer.
    pub fn is_retryable(&self) -> bool {
        matches!(self, GatewayError::Unavailable(_))
    }
}
