use std::fmt::Debug;

use chrono::Utc;
use log::*;
use serde_json::json;
use spg_common::Money;

use crate::{
    api::{
        errors::LinkFlowError,
        objects::{LinkSettings, PaymentLinkRequest, ResolvedAmount, SweepResult, VerifyOutcome},
    },
    db_types::{
        LinkStatus,
        NewOrder,
        NewOrderItem,
        NewPaymentLink,
        Order,
        OrderItem,
        OrderStatusType,
        OrderType,
        PaymentLink,
        PaymentStatus,
        Reference,
        CUSTOM_PAYMENT_ITEM,
        PLACEHOLDER_CUSTOMER_EMAIL,
        PLACEHOLDER_CUSTOMER_NAME,
    },
    events::{EventProducers, OrderConfirmedEvent, PaymentConfirmedEvent},
    helpers,
    traits::{InsertOrderResult, LinkQueryFilter, PaymentGateway, PaymentInit, PaymentOutcome, PaymentVerification, StoreDatabase},
    transitions,
    transitions::{LinkEffect, LinkEvent},
};

/// `LinkFlowApi` drives the payment-link lifecycle: creating a link against the gateway, verifying its payment
/// status on demand (public call, webhook, or sweep), transitioning link status, deriving an order from a completed
/// link exactly once, and adjusting product stock.
///
/// The gateway client and event producers are injected; the API owns no global state.
pub struct LinkFlowApi<B, G> {
    db: B,
    gateway: G,
    producers: EventProducers,
    settings: LinkSettings,
}

impl<B, G> Debug for LinkFlowApi<B, G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "LinkFlowApi")
    }
}

impl<B, G> LinkFlowApi<B, G> {
    pub fn new(db: B, gateway: G, producers: EventProducers, settings: LinkSettings) -> Self {
        Self { db, gateway, producers, settings }
    }

    pub fn settings(&self) -> &LinkSettings {
        &self.settings
    }
}

impl<B, G> LinkFlowApi<B, G>
where
    B: StoreDatabase,
    G: PaymentGateway,
{
    /// Creates a new payment link.
    ///
    /// The amount resolves from the catalog price × quantity when a product is given, and from the explicit custom
    /// amount otherwise; a request that resolves to nothing positive is rejected before the gateway is involved.
    /// On gateway failure nothing is persisted and the failure surfaces verbatim. On success the link is stored as
    /// `Pending` with the gateway-issued reference and checkout URL, expiring after the configured session timeout.
    pub async fn create_payment_link(&self, req: PaymentLinkRequest) -> Result<PaymentLink, LinkFlowError> {
        if req.quantity < 1 {
            return Err(LinkFlowError::InvalidQuantity(req.quantity));
        }
        let resolved = self.resolve_amount(&req).await?;
        let amount = resolved.amount();
        if !amount.is_positive() {
            return Err(LinkFlowError::InvalidAmount(format!("resolved amount {amount} is not positive")));
        }
        let reference = helpers::new_payment_reference();
        let email = req.customer_email.clone().unwrap_or_else(|| PLACEHOLDER_CUSTOMER_EMAIL.to_string());
        let metadata = json!({ "product_id": req.product_id, "quantity": req.quantity });
        let init = PaymentInit {
            email,
            amount,
            reference: reference.clone(),
            callback_url: self.settings.callback_url.clone(),
            metadata: Some(metadata),
        };
        let initiated = self.gateway.initialize_payment(init).await?;
        let now = Utc::now();
        let link = NewPaymentLink {
            reference: initiated.reference,
            amount,
            quantity: req.quantity,
            product_id: req.product_id,
            description: req.description,
            customer_email: req.customer_email,
            customer_name: req.customer_name,
            authorization_url: initiated.authorization_url,
            access_code: initiated.access_code,
            created_at: now,
            expires_at: now + self.settings.session_timeout,
        };
        let link = self.db.insert_payment_link(link).await?;
        info!("🔗 Payment link [{}] created for {}", link.reference, link.amount);
        Ok(link)
    }

    async fn resolve_amount(&self, req: &PaymentLinkRequest) -> Result<ResolvedAmount, LinkFlowError> {
        match req.product_id {
            Some(product_id) => {
                let product = self
                    .db
                    .fetch_product(product_id)
                    .await?
                    .ok_or(LinkFlowError::ProductNotFound(product_id))?;
                Ok(ResolvedAmount::FromProduct { amount: product.price * req.quantity, unit_price: product.price })
            },
            None => {
                let raw = req.custom_amount.as_deref().ok_or_else(|| {
                    LinkFlowError::InvalidAmount("neither a product nor a custom amount was given".to_string())
                })?;
                let amount = Money::from_major_str(raw).map_err(|e| LinkFlowError::InvalidAmount(e.to_string()))?;
                Ok(ResolvedAmount::Custom(amount))
            },
        }
    }

    /// Re-verifies the link against the gateway and applies whatever transition the report calls for.
    ///
    /// Used by the public verify endpoint, the success webhook, and the sweep — all three funnel through here, so
    /// the state machine sees one consistent view of the world. Gateway errors propagate without mutating anything:
    /// a failed *call* is not a failed *payment*.
    pub async fn verify_payment_link(&self, reference: &Reference) -> Result<VerifyOutcome, LinkFlowError> {
        if !helpers::valid_reference(reference.as_str()) {
            return Err(LinkFlowError::MalformedReference(reference.as_str().to_string()));
        }
        let link =
            self.db.fetch_payment_link(reference).await?.ok_or_else(|| LinkFlowError::LinkNotFound(reference.clone()))?;
        let verification = self.gateway.verify_payment(reference).await?;
        if verification.reference != link.reference {
            warn!(
                "🔗 Gateway answered for reference [{}] when asked about [{}]. Ignoring the report.",
                verification.reference, link.reference
            );
            return Ok(VerifyOutcome { outcome: verification.outcome, link, order: None });
        }
        let event = match verification.outcome {
            PaymentOutcome::Success => LinkEvent::GatewaySucceeded,
            PaymentOutcome::Failed => LinkEvent::GatewayFailed,
            PaymentOutcome::Pending => LinkEvent::GatewayPending,
        };
        self.apply_link_event(link, event, &verification).await
    }

    /// Applies the failure transition directly, without a gateway round-trip. Used by the charge-failed webhook,
    /// where the gateway has just told us the outcome itself.
    pub async fn handle_gateway_failure(&self, reference: &Reference) -> Result<PaymentLink, LinkFlowError> {
        let link =
            self.db.fetch_payment_link(reference).await?.ok_or_else(|| LinkFlowError::LinkNotFound(reference.clone()))?;
        let transition = transitions::apply(link.status, LinkEvent::GatewayFailed);
        if transition.next == link.status {
            debug!("🔗 Failure report for [{}] is a no-op from status {}", link.reference, link.status);
            return Ok(link);
        }
        let updated = self.db.update_link_status(reference, transition.next, None).await?;
        info!("🔗 Link [{}] marked {} on gateway failure report", updated.reference, updated.status);
        Ok(updated)
    }

    async fn apply_link_event(
        &self,
        link: PaymentLink,
        event: LinkEvent,
        verification: &PaymentVerification,
    ) -> Result<VerifyOutcome, LinkFlowError> {
        let transition = transitions::apply(link.status, event);
        let mut updated = link.clone();
        if transition.effects.contains(&LinkEffect::MarkPaid) {
            let paid_at = verification.paid_at.unwrap_or_else(Utc::now);
            updated = self.db.update_link_status(&link.reference, LinkStatus::Completed, Some(paid_at)).await?;
            info!("🔗 Link [{}] completed; paid at {paid_at}", updated.reference);
        } else if transition.next != link.status {
            updated = self.db.update_link_status(&link.reference, transition.next, None).await?;
            info!("🔗 Link [{}] moved {} -> {}", updated.reference, link.status, updated.status);
        }
        let order = if transition.effects.contains(&LinkEffect::DeriveOrder) {
            Some(self.derive_order(&updated, verification).await?)
        } else {
            None
        };
        Ok(VerifyOutcome { outcome: verification.outcome, link: updated, order })
    }

    /// Turns a completed link into a persisted order, exactly once per reference.
    ///
    /// The conditional insert (and its stock decrement) happen in one storage transaction; when another trigger got
    /// there first, this call degrades to "make sure the existing order is marked paid". Notification dispatch is
    /// best-effort and happens after the write has committed.
    async fn derive_order(
        &self,
        link: &PaymentLink,
        verification: &PaymentVerification,
    ) -> Result<Order, LinkFlowError> {
        let items = self.build_link_items(link).await?;
        let customer_email = verification
            .customer_email
            .clone()
            .or_else(|| link.customer_email.clone())
            .unwrap_or_else(|| PLACEHOLDER_CUSTOMER_EMAIL.to_string());
        let customer_name = verification
            .customer_name
            .clone()
            .or_else(|| link.customer_name.clone())
            .unwrap_or_else(|| PLACEHOLDER_CUSTOMER_NAME.to_string());
        let paid_at = verification.paid_at.unwrap_or_else(Utc::now);
        let new_order = NewOrder {
            order_number: helpers::new_order_number(),
            order_type: OrderType::PaymentLink,
            payment_reference: Some(link.reference.clone()),
            customer_name,
            customer_email,
            customer_phone: None,
            shipping_address: None,
            subtotal: link.amount,
            shipping: Money::from(0),
            total: link.amount,
            status: OrderStatusType::Processing,
            payment_status: PaymentStatus::Paid,
            paid_at: Some(paid_at),
            items,
        };
        match self.db.insert_order(new_order).await? {
            InsertOrderResult::Inserted(order) => {
                info!("🔗 Order [{}] derived from link [{}]", order.order_number, link.reference);
                let items = self.db.fetch_order_items(order.id).await?;
                self.call_order_confirmed_hook(&order, &items).await;
                Ok(order)
            },
            InsertOrderResult::AlreadyExists(order) => {
                if order.payment_status == PaymentStatus::Paid {
                    debug!(
                        "🔗 Order [{}] already exists and is paid. Nothing to do for link [{}]",
                        order.order_number, link.reference
                    );
                    return Ok(order);
                }
                let was_pending = order.payment_status == PaymentStatus::Pending;
                let updated = self.db.mark_order_paid(order.id, paid_at).await?;
                info!("🔗 Existing order [{}] marked paid for link [{}]", updated.order_number, link.reference);
                if was_pending {
                    self.call_payment_confirmed_hook(&updated).await;
                }
                Ok(updated)
            },
        }
    }

    /// The line items for a link-derived order. The link amount is authoritative — it is what the customer actually
    /// paid — so the captured unit price is derived from it, never from the live catalog price.
    async fn build_link_items(&self, link: &PaymentLink) -> Result<Vec<NewOrderItem>, LinkFlowError> {
        if let Some(product_id) = link.product_id {
            let product = self.db.fetch_product(product_id).await?;
            // An exact per-unit split always exists for product links (the amount was built as price × quantity).
            // If the product vanished from the catalog since, fall back to a custom line rather than failing the
            // derivation: the payment is already made.
            if let Some(product) = product {
                if link.quantity >= 1 && link.amount.value() % link.quantity == 0 {
                    return Ok(vec![NewOrderItem {
                        product_id: Some(product.id),
                        name: product.name,
                        unit_price: Money::from(link.amount.value() / link.quantity),
                        quantity: link.quantity,
                        image: product.image,
                    }]);
                }
            } else {
                warn!("🔗 Product #{product_id} on link [{}] no longer exists. Deriving a custom line.", link.reference);
            }
        }
        let name = link.description.clone().unwrap_or_else(|| CUSTOM_PAYMENT_ITEM.to_string());
        Ok(vec![NewOrderItem { product_id: None, name, unit_price: link.amount, quantity: 1, image: None }])
    }

    /// One sweep pass: close out pending links whose session expired, then re-verify the remaining pending links
    /// that have gone stale. Individual verification failures are tolerated — the next sweep retries them — so one
    /// flaky gateway call cannot abort the batch.
    pub async fn sweep(&self) -> Result<SweepResult, LinkFlowError> {
        let now = Utc::now();
        let expired = self.db.expire_payment_links(now).await?;
        if !expired.is_empty() {
            info!("🧹 {} payment links expired", expired.len());
        }
        let cutoff = now - self.settings.staleness;
        let stale = self.db.fetch_stale_pending_links(cutoff).await?;
        let mut result = SweepResult { expired, ..Default::default() };
        for link in stale {
            result.checked += 1;
            match self.verify_payment_link(&link.reference).await {
                Ok(outcome) => {
                    if outcome.order.is_some() {
                        result.completed += 1;
                    }
                },
                Err(e) => {
                    warn!("🧹 Could not re-verify link [{}]: {e}", link.reference);
                    result.failures += 1;
                },
            }
        }
        debug!(
            "🧹 Sweep complete. {} expired, {} checked, {} completed, {} failures",
            result.expired_count(),
            result.checked,
            result.completed,
            result.failures
        );
        Ok(result)
    }

    /// Bumps the view analytics for a link. No invariant impact.
    pub async fn record_view(&self, reference: &Reference, ip: Option<String>) -> Result<PaymentLink, LinkFlowError> {
        let link = self.db.record_link_view(reference, ip).await?;
        trace!("🔗 Link [{}] viewed {} times", link.reference, link.view_count);
        Ok(link)
    }

    pub async fn fetch_link(&self, reference: &Reference) -> Result<Option<PaymentLink>, LinkFlowError> {
        Ok(self.db.fetch_payment_link(reference).await?)
    }

    pub async fn list_links(&self, filter: LinkQueryFilter) -> Result<Vec<PaymentLink>, LinkFlowError> {
        Ok(self.db.fetch_payment_links(filter).await?)
    }

    async fn call_order_confirmed_hook(&self, order: &Order, items: &[OrderItem]) {
        for emitter in &self.producers.order_confirmed_producer {
            debug!("🔗 Notifying order-confirmed hook subscribers");
            let event = OrderConfirmedEvent::new(order.clone(), items.to_vec());
            emitter.publish_event(event).await;
        }
    }

    async fn call_payment_confirmed_hook(&self, order: &Order) {
        for emitter in &self.producers.payment_confirmed_producer {
            debug!("🔗 Notifying payment-confirmed hook subscribers");
            let event = PaymentConfirmedEvent::new(order.clone());
            emitter.publish_event(event).await;
        }
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}
