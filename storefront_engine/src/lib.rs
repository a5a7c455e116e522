//! Storefront payment engine
//!
//! The engine owns the payment-link lifecycle and its reconciliation with orders and product stock. It is split into:
//! 1. Database types and control ([`db_types`], [`mod@sqlite`]). SQLite is the supported backend. Callers should not
//!    touch the database directly; the data types are public, the queries are not.
//! 2. The reconciliation API ([`api`]). [`LinkFlowApi`] drives the payment-link state machine (create, verify, sweep,
//!    derive-order); [`OrderFlowApi`] covers store checkout and cancellation. Backends implement the [`traits`] to
//!    plug in, and the payment gateway itself is abstracted behind [`traits::PaymentGateway`] so that the flows can be
//!    exercised against a scripted fake.
//! 3. A small pub/sub hook system ([`events`]) used to dispatch best-effort notifications. Event delivery never
//!    affects the transactional outcome of the flow that emitted it.
//!
//! The legal status transitions for a payment link live in one pure module, [`transitions`], which the APIs execute
//! effects from. Nothing outside that module decides what a gateway report means for a stored link.

pub mod api;
pub mod db_types;
pub mod events;
pub mod helpers;
pub mod traits;
pub mod transitions;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
pub use api::{
    errors::{LinkFlowError, OrderFlowError},
    link_flow_api::LinkFlowApi,
    objects,
    order_flow_api::OrderFlowApi,
};
pub use traits::{InsertOrderResult, PaymentGateway, StoreDatabase, StoreError};
