mod identifiers;

pub use identifiers::{new_order_number, new_payment_reference, valid_reference};
