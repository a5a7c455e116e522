use std::fmt::Display;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use storefront_engine::{
    api::objects::{CartLine, CustomerDetails},
    db_types::{Order, OrderItem, OrderStatusType, PaymentLink},
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { success: true, message: message.to_string() }
    }

    pub fn failure<S: Display>(message: S) -> Self {
        Self { success: false, message: message.to_string() }
    }
}

/// A store checkout request. Prices are conspicuously absent: the server resolves them from the catalog.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreOrderRequest {
    pub items: Vec<CartLine>,
    pub customer: CustomerDetails,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrderStatusUpdateRequest {
    pub status: OrderStatusType,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderWithItems {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

/// The public payload for a payment-link page. Exposes the checkout URL and display fields, but none of the
/// analytics or customer details an admin sees.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentLinkView {
    pub reference: String,
    /// Major-unit amount string, e.g. "12500.00".
    pub amount: String,
    pub description: Option<String>,
    pub status: String,
    pub authorization_url: String,
    pub expires_at: chrono::DateTime<Utc>,
    /// Seconds until the session closes; zero once expired. Derived from `expires_at` at render time.
    pub seconds_remaining: i64,
}

impl PaymentLinkView {
    pub fn from_link(link: &PaymentLink) -> Self {
        let now = Utc::now();
        Self {
            reference: link.reference.as_str().to_string(),
            amount: link.amount.to_major_string(),
            description: link.description.clone(),
            status: link.status.to_string(),
            authorization_url: link.authorization_url.clone(),
            expires_at: link.expires_at,
            seconds_remaining: link.time_remaining(now).num_seconds(),
        }
    }
}
