use chrono::Duration;
use serde::{Deserialize, Serialize};
use spg_common::Money;

use crate::{
    db_types::{Order, PaymentLink},
    traits::PaymentOutcome,
};

/// Tunables for the payment-link lifecycle, injected into [`crate::LinkFlowApi`] at construction.
#[derive(Clone, Debug)]
pub struct LinkSettings {
    /// How long a gateway session stays open before a sweep may expire the link.
    pub session_timeout: Duration,
    /// How old a pending link must be before a sweep re-verifies it against the gateway.
    pub staleness: Duration,
    /// Where the gateway sends the customer after checkout.
    pub callback_url: Option<String>,
}

pub const DEFAULT_SESSION_TIMEOUT_MINUTES: i64 = 1440;
pub const DEFAULT_STALENESS_MINUTES: i64 = 10;

impl Default for LinkSettings {
    fn default() -> Self {
        Self {
            session_timeout: Duration::minutes(DEFAULT_SESSION_TIMEOUT_MINUTES),
            staleness: Duration::minutes(DEFAULT_STALENESS_MINUTES),
            callback_url: None,
        }
    }
}

/// An admin's request for a new payment link. Either a catalog product (amount resolves to price × quantity) or an
/// explicit custom amount must be given.
#[derive(Clone, Debug, Deserialize)]
pub struct PaymentLinkRequest {
    pub product_id: Option<i64>,
    #[serde(default = "default_quantity")]
    pub quantity: i64,
    /// Major-unit decimal string, e.g. "12500.00". Only used when no product is given.
    pub custom_amount: Option<String>,
    pub description: Option<String>,
    pub customer_email: Option<String>,
    pub customer_name: Option<String>,
}

fn default_quantity() -> i64 {
    1
}

impl Default for PaymentLinkRequest {
    fn default() -> Self {
        Self {
            product_id: None,
            quantity: default_quantity(),
            custom_amount: None,
            description: None,
            customer_email: None,
            customer_name: None,
        }
    }
}

/// A store-checkout cart line. Prices are *not* accepted from the client; they are resolved server-side.
#[derive(Clone, Debug, Deserialize)]
pub struct CartLine {
    pub product_id: i64,
    pub quantity: i64,
    pub color: Option<String>,
    pub size: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct CustomerDetails {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub shipping_address: Option<String>,
}

/// What a verification trigger produced.
#[derive(Clone, Debug, Serialize)]
pub struct VerifyOutcome {
    /// The gateway's view of the transaction.
    pub outcome: PaymentOutcome,
    /// The link after any transition was applied.
    pub link: PaymentLink,
    /// The derived (or re-affirmed) order, present only when the gateway reported success.
    pub order: Option<Order>,
}

/// Tally of one sweep pass over the pending links.
#[derive(Clone, Debug, Default, Serialize)]
pub struct SweepResult {
    /// Links the sweep moved to `Expired`.
    pub expired: Vec<PaymentLink>,
    /// How many stale pending links were re-verified against the gateway.
    pub checked: usize,
    /// How many of those completed (and derived an order) during this sweep.
    pub completed: usize,
    /// Individual verification failures. The sweep tolerates these; the next pass retries naturally.
    pub failures: usize,
}

impl SweepResult {
    pub fn expired_count(&self) -> usize {
        self.expired.len()
    }

    pub fn total_touched(&self) -> usize {
        self.expired.len() + self.checked
    }
}

/// The amount a link request resolves to, used by link creation. Kept as a separate type so the resolution rules
/// are testable on their own.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResolvedAmount {
    /// Product price × quantity, frozen at creation time.
    FromProduct { amount: Money, unit_price: Money },
    /// The admin-supplied custom amount.
    Custom(Money),
}

impl ResolvedAmount {
    pub fn amount(&self) -> Money {
        match self {
            ResolvedAmount::FromProduct { amount, .. } => *amount,
            ResolvedAmount::Custom(amount) => *amount,
        }
    }
}
