//! Outbound customer notifications over SMTP.
//!
//! Every send here is best-effort: a failure is logged and reported as `false`, and nothing upstream ever awaits a
//! mail for correctness. The mailer is wired into the engine's event hooks at the composition root, so the flows
//! that trigger mail (order confirmed, payment confirmed, status changed) have already committed by the time a
//! message is built.

use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport,
    AsyncTransport,
    Message,
    Tokio1Executor,
};
use log::*;
use storefront_engine::db_types::{Order, OrderItem, OrderStatusType};

use crate::config::SmtpConfig;

#[derive(Clone)]
pub struct Mailer {
    transport: Option<AsyncSmtpTransport<Tokio1Executor>>,
    from: Option<Mailbox>,
}

impl Mailer {
    /// Builds the mailer from config. A disabled or misconfigured SMTP section produces an inert mailer rather than
    /// a startup failure — notifications are not worth refusing to serve traffic over.
    pub fn new(config: &SmtpConfig) -> Self {
        if !config.enabled {
            return Self { transport: None, from: None };
        }
        let from = format!("{} <{}>", config.from_name, config.from_email).parse::<Mailbox>();
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host).map(|builder| {
            builder
                .port(config.port)
                .credentials(Credentials::new(config.username.clone(), config.password.reveal().clone()))
                .build()
        });
        match (transport, from) {
            (Ok(transport), Ok(from)) => Self { transport: Some(transport), from: Some(from) },
            (Err(e), _) => {
                warn!("✉️ Could not create the SMTP transport: {e}. Notifications are disabled.");
                Self { transport: None, from: None }
            },
            (_, Err(e)) => {
                warn!("✉️ Invalid SMTP from address: {e}. Notifications are disabled.");
                Self { transport: None, from: None }
            },
        }
    }

    pub async fn send_order_confirmation(&self, order: &Order, items: &[OrderItem]) -> bool {
        let lines = items
            .iter()
            .map(|i| format!("  {} x{} @ {}", i.name, i.quantity, i.unit_price))
            .collect::<Vec<_>>()
            .join("\n");
        let body = format!(
            "Hi {},\n\nThank you for your order {}.\n\n{lines}\n\nSubtotal: {}\nShipping: {}\nTotal: {}\n\nWe will \
             be in touch when your order ships.\n",
            order.customer_name, order.order_number, order.subtotal, order.shipping, order.total
        );
        let subject = format!("Order confirmation {}", order.order_number);
        self.send(&order.customer_email, &subject, body).await
    }

    pub async fn send_payment_confirmed(&self, order: &Order) -> bool {
        let body = format!(
            "Hi {},\n\nWe have received your payment of {} for order {}. It is now being processed.\n",
            order.customer_name, order.total, order.order_number
        );
        let subject = format!("Payment received for {}", order.order_number);
        self.send(&order.customer_email, &subject, body).await
    }

    pub async fn send_status_update(
        &self,
        order: &Order,
        old_status: OrderStatusType,
        new_status: OrderStatusType,
    ) -> bool {
        let body = format!(
            "Hi {},\n\nYour order {} has moved from {old_status} to {new_status}.\n",
            order.customer_name, order.order_number
        );
        let subject = format!("Order {} update: {new_status}", order.order_number);
        self.send(&order.customer_email, &subject, body).await
    }

    async fn send(&self, to: &str, subject: &str, body: String) -> bool {
        let (Some(transport), Some(from)) = (&self.transport, &self.from) else {
            debug!("✉️ Mailer is disabled; dropping '{subject}' to {to}");
            return false;
        };
        let to_mailbox = match to.parse::<Mailbox>() {
            Ok(mb) => mb,
            Err(e) => {
                warn!("✉️ Invalid recipient address '{to}': {e}. Dropping '{subject}'");
                return false;
            },
        };
        let message = Message::builder()
            .from(from.clone())
            .to(to_mailbox)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body);
        let message = match message {
            Ok(m) => m,
            Err(e) => {
                warn!("✉️ Could not build message '{subject}': {e}");
                return false;
            },
        };
        match transport.send(message).await {
            Ok(_) => {
                info!("✉️ Sent '{subject}' to {to}");
                true
            },
            Err(e) => {
                warn!("✉️ Could not send '{subject}' to {to}: {e}");
                false
            },
        }
    }
}
