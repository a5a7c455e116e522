//! Bridges the engine's [`PaymentGateway`] contract onto the Paystack client.
//!
//! The engine speaks [`Money`] and its own error taxonomy; the wire speaks kobo integers and HTTP statuses. Both
//! conversions live here and nowhere else.

use log::trace;
use paystack_tools::{PaystackApi, PaystackApiError, PaystackConfig, TransactionData};
use spg_common::Money;
use storefront_engine::{
    db_types::Reference,
    traits::{GatewayError, InitiatedPayment, PaymentGateway, PaymentInit, PaymentOutcome, PaymentVerification},
};

use crate::errors::ServerError;

#[derive(Clone)]
pub struct PaystackGateway {
    api: PaystackApi,
}

impl PaystackGateway {
    pub fn new(config: PaystackConfig) -> Result<Self, ServerError> {
        let api = PaystackApi::new(config).map_err(|e| ServerError::InitializeError(e.to_string()))?;
        Ok(Self { api })
    }
}

impl PaymentGateway for PaystackGateway {
    async fn initialize_payment(&self, init: PaymentInit) -> Result<InitiatedPayment, GatewayError> {
        trace!("💳️ Initializing gateway transaction {}", init.reference);
        let tx = self
            .api
            .initialize_transaction(
                &init.email,
                init.amount.value(),
                init.reference.as_str(),
                init.callback_url,
                init.metadata,
            )
            .await
            .map_err(map_gateway_error)?;
        Ok(InitiatedPayment {
            reference: Reference(tx.reference),
            authorization_url: tx.authorization_url,
            access_code: tx.access_code,
        })
    }

    async fn verify_payment(&self, reference: &Reference) -> Result<PaymentVerification, GatewayError> {
        trace!("💳️ Verifying gateway transaction {reference}");
        let tx = self.api.verify_transaction(reference.as_str()).await.map_err(map_gateway_error)?;
        Ok(verification_from_transaction(tx))
    }
}

pub fn map_gateway_error(e: PaystackApiError) -> GatewayError {
    match e {
        PaystackApiError::InvalidRequest(m) => GatewayError::InvalidParameters(m),
        PaystackApiError::Unauthorized => GatewayError::Unauthorized,
        PaystackApiError::Forbidden(m) => GatewayError::Forbidden(m),
        PaystackApiError::NotFound => GatewayError::NotFound,
        PaystackApiError::Unavailable(m) | PaystackApiError::Initialization(m) => GatewayError::Unavailable(m),
        PaystackApiError::JsonError(m) | PaystackApiError::QueryError(m) => GatewayError::ResponseError(m),
    }
}

pub fn verification_from_transaction(tx: TransactionData) -> PaymentVerification {
    let outcome = if tx.status.is_success() {
        PaymentOutcome::Success
    } else if tx.status.is_failure() {
        PaymentOutcome::Failed
    } else {
        PaymentOutcome::Pending
    };
    let customer_name = match (&tx.customer.first_name, &tx.customer.last_name) {
        (None, None) => None,
        (first, last) => {
            Some([first.as_deref(), last.as_deref()].into_iter().flatten().collect::<Vec<_>>().join(" "))
        },
    };
    let customer_email = if tx.customer.email.is_empty() { None } else { Some(tx.customer.email.clone()) };
    PaymentVerification {
        reference: Reference(tx.reference),
        outcome,
        // The wire carries kobo; Money is kobo-denominated, so this is a unit-preserving move, not a conversion.
        amount: Money::from(tx.amount),
        paid_at: tx.paid_at,
        customer_email,
        customer_name,
    }
}

#[cfg(test)]
mod test {
    use paystack_tools::{ChargeStatus, Customer};

    use super::*;

    fn tx(status: ChargeStatus) -> TransactionData {
        serde_json::from_value(serde_json::json!({
            "id": 1,
            "status": "pending",
            "reference": "PAY-1-ABC123",
            "amount": 1_000_000,
        }))
        .map(|mut t: TransactionData| {
            t.status = status;
            t
        })
        .unwrap()
    }

    #[test]
    fn charge_statuses_collapse_onto_the_three_outcomes() {
        assert_eq!(verification_from_transaction(tx(ChargeStatus::Success)).outcome, PaymentOutcome::Success);
        assert_eq!(verification_from_transaction(tx(ChargeStatus::Failed)).outcome, PaymentOutcome::Failed);
        assert_eq!(verification_from_transaction(tx(ChargeStatus::Abandoned)).outcome, PaymentOutcome::Failed);
        assert_eq!(verification_from_transaction(tx(ChargeStatus::Pending)).outcome, PaymentOutcome::Pending);
        assert_eq!(verification_from_transaction(tx(ChargeStatus::Queued)).outcome, PaymentOutcome::Pending);
        assert_eq!(verification_from_transaction(tx(ChargeStatus::Unknown)).outcome, PaymentOutcome::Pending);
    }

    #[test]
    fn kobo_amounts_cross_the_boundary_unchanged() {
        let v = verification_from_transaction(tx(ChargeStatus::Success));
        assert_eq!(v.amount, Money::from(1_000_000));
        assert_eq!(v.amount.to_major_string(), "10000.00");
    }

    #[test]
    fn customer_names_join_cleanly() {
        let mut t = tx(ChargeStatus::Success);
        t.customer = Customer {
            id: 5,
            email: "ada@example.com".to_string(),
            first_name: Some("Ada".to_string()),
            last_name: Some("Obi".to_string()),
            phone: None,
        };
        let v = verification_from_transaction(t);
        assert_eq!(v.customer_name.as_deref(), Some("Ada Obi"));
        assert_eq!(v.customer_email.as_deref(), Some("ada@example.com"));

        let mut t = tx(ChargeStatus::Success);
        t.customer.first_name = Some("Ada".to_string());
        let v = verification_from_transaction(t);
        assert_eq!(v.customer_name.as_deref(), Some("Ada"));
        assert_eq!(v.customer_email, None);
    }

    #[test]
    fn error_taxonomy_mapping() {
        assert!(matches!(
            map_gateway_error(PaystackApiError::Unavailable("timeout".into())),
            GatewayError::Unavailable(_)
        ));
        assert!(matches!(map_gateway_error(PaystackApiError::Unauthorized), GatewayError::Unauthorized));
        assert!(matches!(map_gateway_error(PaystackApiError::NotFound), GatewayError::NotFound));
        assert!(matches!(
            map_gateway_error(PaystackApiError::InvalidRequest("bad email".into())),
            GatewayError::InvalidParameters(_)
        ));
    }
}
