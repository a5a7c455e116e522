mod money;

pub mod op;
mod secret;

pub use money::{Money, MoneyConversionError, NAIRA_CURRENCY_CODE, NAIRA_CURRENCY_CODE_LOWER};
pub use secret::Secret;

mod helpers;
pub use helpers::parse_boolean_flag;
