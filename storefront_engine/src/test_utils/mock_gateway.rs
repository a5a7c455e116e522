//! A scriptable in-memory [`PaymentGateway`] for exercising the reconciliation flows without any network I/O.
//!
//! Tests script the answer for a reference up front (`script_success`, `script_failure`, ...) and can flip it
//! between verifications to walk a link through its lifecycle. Unscripted references verify as `NotFound`, which is
//! also what the real gateway reports for a reference it has never seen.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use chrono::Utc;
use spg_common::Money;

use crate::{
    db_types::Reference,
    traits::{GatewayError, InitiatedPayment, PaymentGateway, PaymentInit, PaymentOutcome, PaymentVerification},
};

#[derive(Clone, Default)]
pub struct MockGateway {
    state: Arc<Mutex<MockGatewayState>>,
}

#[derive(Default)]
struct MockGatewayState {
    verifications: HashMap<String, Result<PaymentVerification, GatewayError>>,
    init_error: Option<GatewayError>,
    init_calls: Vec<PaymentInit>,
    verify_calls: Vec<String>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts a success report for `reference`.
    pub fn script_success(&self, reference: &Reference, amount: Money) {
        self.script(reference, Ok(PaymentVerification {
            reference: reference.clone(),
            outcome: PaymentOutcome::Success,
            amount,
            paid_at: Some(Utc::now()),
            customer_email: None,
            customer_name: None,
        }));
    }

    pub fn script_failure(&self, reference: &Reference, amount: Money) {
        self.script(reference, Ok(PaymentVerification {
            reference: reference.clone(),
            outcome: PaymentOutcome::Failed,
            amount,
            paid_at: None,
            customer_email: None,
            customer_name: None,
        }));
    }

    pub fn script_pending(&self, reference: &Reference, amount: Money) {
        self.script(reference, Ok(PaymentVerification {
            reference: reference.clone(),
            outcome: PaymentOutcome::Pending,
            amount,
            paid_at: None,
            customer_email: None,
            customer_name: None,
        }));
    }

    pub fn script_error(&self, reference: &Reference, error: GatewayError) {
        self.script(reference, Err(error));
    }

    pub fn script(&self, reference: &Reference, result: Result<PaymentVerification, GatewayError>) {
        let mut state = self.state.lock().unwrap();
        state.verifications.insert(reference.as_str().to_string(), result);
    }

    /// Makes the next `initialize_payment` call fail. Used to check that nothing is persisted on gateway failure.
    pub fn fail_initialization(&self, error: GatewayError) {
        self.state.lock().unwrap().init_error = Some(error);
    }

    pub fn init_call_count(&self) -> usize {
        self.state.lock().unwrap().init_calls.len()
    }

    pub fn verify_call_count(&self) -> usize {
        self.state.lock().unwrap().verify_calls.len()
    }

    pub fn last_init(&self) -> Option<PaymentInit> {
        self.state.lock().unwrap().init_calls.last().cloned()
    }
}

impl PaymentGateway for MockGateway {
    async fn initialize_payment(&self, init: PaymentInit) -> Result<InitiatedPayment, GatewayError> {
        let mut state = self.state.lock().unwrap();
        if let Some(e) = state.init_error.take() {
            return Err(e);
        }
        let reference = init.reference.clone();
        state.init_calls.push(init);
        Ok(InitiatedPayment {
            reference: reference.clone(),
            authorization_url: format!("https://checkout.mock/{reference}"),
            access_code: format!("ac_{}", state.init_calls.len()),
        })
    }

    async fn verify_payment(&self, reference: &Reference) -> Result<PaymentVerification, GatewayError> {
        let mut state = self.state.lock().unwrap();
        state.verify_calls.push(reference.as_str().to_string());
        state.verifications.get(reference.as_str()).cloned().unwrap_or(Err(GatewayError::NotFound))
    }
}
