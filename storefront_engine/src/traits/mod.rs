mod data_objects;
mod payment_gateway;
mod store_database;

pub use data_objects::{InsertOrderResult, LinkQueryFilter};
pub use payment_gateway::{GatewayError, InitiatedPayment, PaymentGateway, PaymentInit, PaymentOutcome, PaymentVerification};
pub use store_database::{StoreDatabase, StoreError};
