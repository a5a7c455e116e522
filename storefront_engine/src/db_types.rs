use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Duration, Utc};
use log::error;
use serde::{Deserialize, Serialize};
use spg_common::Money;
use sqlx::{FromRow, Type};
use thiserror::Error;

/// The badge rendered for a product whose stock has run out. Never stored; always derived from the quantity.
pub const SOLD_OUT_BADGE: &str = "SOLD OUT";

/// Line-item name used when a payment link is not backed by a catalog product.
pub const CUSTOM_PAYMENT_ITEM: &str = "Custom payment";

/// Fallbacks for link-derived orders where neither the link nor the gateway supplied customer details.
pub const PLACEHOLDER_CUSTOMER_NAME: &str = "Payment Link Customer";
pub const PLACEHOLDER_CUSTOMER_EMAIL: &str = "customer@unknown.invalid";

#[derive(Debug, Clone, Error)]
#[error("Invalid value: {0}")]
pub struct ConversionError(String);

//--------------------------------------      Reference        -------------------------------------------------------
/// The gateway-assigned transaction reference. This is the single correlation key between a gateway transaction, a
/// stored payment link, and (once derived) an order. Immutable once issued.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct Reference(pub String);

impl FromStr for Reference {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl From<String> for Reference {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Display for Reference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Reference {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

//--------------------------------------     LinkStatus        -------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum LinkStatus {
    /// The gateway session is open and no terminal report has been received.
    Pending,
    /// The gateway confirmed payment. Terminal; a completed link is never downgraded.
    Completed,
    /// The gateway reported the charge as failed or abandoned.
    Failed,
    /// The session outlived its expiry window and was closed by a sweep, not by the gateway.
    Expired,
}

impl Display for LinkStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LinkStatus::Pending => write!(f, "Pending"),
            LinkStatus::Completed => write!(f, "Completed"),
            LinkStatus::Failed => write!(f, "Failed"),
            LinkStatus::Expired => write!(f, "Expired"),
        }
    }
}

impl FromStr for LinkStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Completed" => Ok(Self::Completed),
            "Failed" => Ok(Self::Failed),
            "Expired" => Ok(Self::Expired),
            s => Err(ConversionError(format!("Invalid link status: {s}"))),
        }
    }
}

impl From<String> for LinkStatus {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid link status: {value}. But this conversion cannot fail. Defaulting to Pending");
            LinkStatus::Pending
        })
    }
}

//--------------------------------------     PaymentLink       -------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PaymentLink {
    pub id: i64,
    pub reference: Reference,
    /// The full amount the customer is asked to pay. For product-backed links this was resolved from the catalog
    /// price at creation time and stays frozen afterwards.
    pub amount: Money,
    pub quantity: i64,
    pub product_id: Option<i64>,
    pub description: Option<String>,
    pub customer_email: Option<String>,
    pub customer_name: Option<String>,
    pub authorization_url: String,
    pub access_code: String,
    pub status: LinkStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
    pub verified_at: Option<DateTime<Utc>>,
    pub view_count: i64,
    pub last_viewed_at: Option<DateTime<Utc>>,
    /// JSON-encoded set of IP addresses that opened the link. Analytics only.
    pub ip_addresses: String,
}

impl PaymentLink {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.status == LinkStatus::Pending && self.expires_at < now
    }

    /// Time left before the session closes. Zero once expired; never negative.
    pub fn time_remaining(&self, now: DateTime<Utc>) -> Duration {
        (self.expires_at - now).max(Duration::zero())
    }

    pub fn viewer_ips(&self) -> Vec<String> {
        serde_json::from_str(&self.ip_addresses).unwrap_or_default()
    }
}

#[derive(Debug, Clone)]
pub struct NewPaymentLink {
    pub reference: Reference,
    pub amount: Money,
    pub quantity: i64,
    pub product_id: Option<i64>,
    pub description: Option<String>,
    pub customer_email: Option<String>,
    pub customer_name: Option<String>,
    pub authorization_url: String,
    pub access_code: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

//--------------------------------------     OrderNumber       -------------------------------------------------------
/// The human-facing order identity, distinct from the storage row id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct OrderNumber(pub String);

impl FromStr for OrderNumber {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl From<String> for OrderNumber {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Display for OrderNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl OrderNumber {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

//--------------------------------------      OrderType        -------------------------------------------------------
/// Provenance tag: placed through the store checkout, or derived from a completed payment link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    Store,
    PaymentLink,
}

impl Display for OrderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderType::Store => write!(f, "Store"),
            OrderType::PaymentLink => write!(f, "PaymentLink"),
        }
    }
}

impl FromStr for OrderType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Store" => Ok(Self::Store),
            "PaymentLink" => Ok(Self::PaymentLink),
            s => Err(ConversionError(format!("Invalid order type: {s}"))),
        }
    }
}

//--------------------------------------   OrderStatusType     -------------------------------------------------------
/// Fulfillment state. Independent of [`PaymentStatus`]: an order can be awaiting fulfillment while already paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatusType {
    Pending,
    Processing,
    Completed,
    Cancelled,
}

impl Display for OrderStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatusType::Pending => write!(f, "Pending"),
            OrderStatusType::Processing => write!(f, "Processing"),
            OrderStatusType::Completed => write!(f, "Completed"),
            OrderStatusType::Cancelled => write!(f, "Cancelled"),
        }
    }
}

impl FromStr for OrderStatusType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Processing" => Ok(Self::Processing),
            "Completed" => Ok(Self::Completed),
            "Cancelled" => Ok(Self::Cancelled),
            s => Err(ConversionError(format!("Invalid order status: {s}"))),
        }
    }
}

impl From<String> for OrderStatusType {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid order status: {value}. But this conversion cannot fail. Defaulting to Pending");
            OrderStatusType::Pending
        })
    }
}

//--------------------------------------    PaymentStatus      -------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
}

impl Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentStatus::Pending => write!(f, "Pending"),
            PaymentStatus::Paid => write!(f, "Paid"),
            PaymentStatus::Failed => write!(f, "Failed"),
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Paid" => Ok(Self::Paid),
            "Failed" => Ok(Self::Failed),
            s => Err(ConversionError(format!("Invalid payment status: {s}"))),
        }
    }
}

//--------------------------------------        Order          -------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Order {
    pub id: i64,
    pub order_number: OrderNumber,
    pub order_type: OrderType,
    /// Set on link-derived orders only. Carries a unique index, which is the idempotency guard that keeps
    /// Derive-Order to exactly one order per gateway payment.
    pub payment_reference: Option<Reference>,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: Option<String>,
    pub shipping_address: Option<String>,
    pub subtotal: Money,
    pub shipping: Money,
    pub total: Money,
    pub status: OrderStatusType,
    pub payment_status: PaymentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
}

//--------------------------------------      OrderItem        -------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct OrderItem {
    pub id: i64,
    pub order_id: i64,
    /// Absent for the synthetic custom-payment line.
    pub product_id: Option<i64>,
    pub name: String,
    /// Price captured at order creation. Live catalog prices never retroactively change an order.
    pub unit_price: Money,
    pub quantity: i64,
    pub image: Option<String>,
}

impl OrderItem {
    pub fn line_total(&self) -> Money {
        self.unit_price * self.quantity
    }
}

//--------------------------------------       NewOrder        -------------------------------------------------------
#[derive(Debug, Clone)]
pub struct NewOrderItem {
    pub product_id: Option<i64>,
    pub name: String,
    pub unit_price: Money,
    pub quantity: i64,
    pub image: Option<String>,
}

impl NewOrderItem {
    pub fn line_total(&self) -> Money {
        self.unit_price * self.quantity
    }
}

#[derive(Debug, Clone)]
pub struct NewOrder {
    pub order_number: OrderNumber,
    pub order_type: OrderType,
    pub payment_reference: Option<Reference>,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: Option<String>,
    pub shipping_address: Option<String>,
    pub subtotal: Money,
    pub shipping: Money,
    pub total: Money,
    pub status: OrderStatusType,
    pub payment_status: PaymentStatus,
    pub paid_at: Option<DateTime<Utc>>,
    pub items: Vec<NewOrderItem>,
}

//--------------------------------------       Product         -------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub price: Money,
    /// Stock on hand. The only stock field that is ever persisted; availability and the sold-out badge are derived
    /// from it so they cannot drift.
    pub quantity: i64,
    /// Admin-assigned display tag ("NEW", "SALE", ...). Overridden by the sold-out badge while stock is zero.
    pub badge: Option<String>,
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn in_stock(&self) -> bool {
        self.quantity > 0
    }

    pub fn effective_badge(&self) -> Option<&str> {
        if self.quantity == 0 {
            Some(SOLD_OUT_BADGE)
        } else {
            self.badge.as_deref()
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub price: Money,
    pub quantity: i64,
    pub badge: Option<String>,
    pub image: Option<String>,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn availability_and_badge_are_derived_from_quantity() {
        let mut product = Product {
            id: 1,
            name: "Velvet throw".to_string(),
            price: Money::from_naira(5000),
            quantity: 2,
            badge: Some("NEW".to_string()),
            image: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert!(product.in_stock());
        assert_eq!(product.effective_badge(), Some("NEW"));
        product.quantity = 0;
        assert!(!product.in_stock());
        assert_eq!(product.effective_badge(), Some(SOLD_OUT_BADGE));
        product.quantity = 5;
        assert_eq!(product.effective_badge(), Some("NEW"));
    }

    #[test]
    fn link_expiry_is_computed_against_the_clock() {
        let now = Utc::now();
        let link = PaymentLink {
            id: 1,
            reference: Reference("PAY-1-ABCDEF".into()),
            amount: Money::from_naira(100),
            quantity: 1,
            product_id: None,
            description: None,
            customer_email: None,
            customer_name: None,
            authorization_url: "https://checkout.test/x".into(),
            access_code: "ac_1".into(),
            status: LinkStatus::Pending,
            created_at: now - Duration::minutes(10),
            updated_at: now - Duration::minutes(10),
            expires_at: now + Duration::minutes(30),
            paid_at: None,
            verified_at: None,
            view_count: 0,
            last_viewed_at: None,
            ip_addresses: "[]".into(),
        };
        assert!(!link.is_expired(now));
        assert_eq!(link.time_remaining(now), Duration::minutes(30));
        assert!(link.is_expired(now + Duration::minutes(31)));
        assert_eq!(link.time_remaining(now + Duration::minutes(31)), Duration::zero());
    }

    #[test]
    fn status_round_trips() {
        for s in [LinkStatus::Pending, LinkStatus::Completed, LinkStatus::Failed, LinkStatus::Expired] {
            assert_eq!(s.to_string().parse::<LinkStatus>().unwrap(), s);
        }
        for s in
            [OrderStatusType::Pending, OrderStatusType::Processing, OrderStatusType::Completed, OrderStatusType::Cancelled]
        {
            assert_eq!(s.to_string().parse::<OrderStatusType>().unwrap(), s);
        }
        assert!("Shipped".parse::<OrderStatusType>().is_err());
    }
}
