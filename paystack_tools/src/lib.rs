//! A thin client for the Paystack REST API.
//!
//! Only the slice of the API that the storefront needs is covered: initializing a transaction for a payment link,
//! verifying a transaction by reference, and fetching/listing transactions for reconciliation. Amounts cross this
//! boundary in kobo (the minor currency unit) as the gateway requires; see [`spg_common::Money`] for the conversion
//! rules used everywhere else in the system.

mod api;
mod config;
pub mod data_objects;
mod error;

pub use api::PaystackApi;
pub use config::PaystackConfig;
pub use data_objects::{
    ChargeStatus,
    Customer,
    InitializedTransaction,
    TransactionData,
    TransactionFilter,
    WebhookEvent,
    CHARGE_FAILED_EVENT,
    CHARGE_SUCCESS_EVENT,
};
pub use error::PaystackApiError;
