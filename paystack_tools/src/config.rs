use std::env;

use log::*;
use spg_common::Secret;

pub const DEFAULT_PAYSTACK_API_URL: &str = "https://api.paystack.co";

#[derive(Clone, Debug, Default)]
pub struct PaystackConfig {
    /// The base URL of the Paystack API. Only overridden in tests and sandboxes.
    pub api_url: String,
    /// The secret key for the Paystack integration ("sk_..."). Also the HMAC signing key for webhook payloads.
    pub secret_key: Secret<String>,
}

impl PaystackConfig {
    pub fn new(api_url: &str, secret_key: Secret<String>) -> Self {
        Self { api_url: api_url.to_string(), secret_key }
    }

    pub fn new_from_env_or_default() -> Self {
        let api_url = env::var("SPS_PAYSTACK_API_URL").ok().unwrap_or_else(|| DEFAULT_PAYSTACK_API_URL.into());
        let secret_key = env::var("SPS_PAYSTACK_SECRET_KEY").ok().unwrap_or_else(|| {
            error!("🪛️ SPS_PAYSTACK_SECRET_KEY is not set. Calls against the live gateway will be rejected.");
            String::default()
        });
        Self { api_url, secret_key: Secret::new(secret_key) }
    }
}
