use std::env;

use chrono::Duration;
use log::*;
use paystack_tools::PaystackConfig;
use spg_common::{parse_boolean_flag, Money, Secret};

const DEFAULT_SPS_HOST: &str = "127.0.0.1";
const DEFAULT_SPS_PORT: u16 = 8370;
const DEFAULT_SESSION_TIMEOUT: Duration = Duration::minutes(1440);
const DEFAULT_LINK_STALENESS: Duration = Duration::minutes(10);
/// The header the gateway signs its webhook payloads into.
pub const DEFAULT_SIGNATURE_HEADER: &str = "x-paystack-signature";

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// If true, the X-Forwarded-For header will be used to determine the client's IP address, rather than the
    /// connection's remote address.
    pub use_x_forwarded_for: bool,
    /// If true, the Forwarded header will be used to determine the client's IP address.
    pub use_forwarded: bool,
    /// How long a payment-link session stays open before the sweep may expire it.
    pub session_timeout: Duration,
    /// How old a pending link must be before the sweep re-verifies it against the gateway.
    pub link_staleness: Duration,
    /// Where the gateway sends the customer after checkout.
    pub callback_url: Option<String>,
    /// Flat shipping fee applied to store orders. Comes from site settings, never from the client.
    pub shipping_fee: Money,
    /// Header carrying the webhook HMAC signature.
    pub signature_header: String,
    /// When false, webhook signatures are not checked. Only ever disable this against a local gateway stub.
    pub hmac_checks: bool,
    pub paystack: PaystackConfig,
    pub smtp: SmtpConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_SPS_HOST.to_string(),
            port: DEFAULT_SPS_PORT,
            database_url: String::default(),
            use_x_forwarded_for: false,
            use_forwarded: false,
            session_timeout: DEFAULT_SESSION_TIMEOUT,
            link_staleness: DEFAULT_LINK_STALENESS,
            callback_url: None,
            shipping_fee: Money::from(0),
            signature_header: DEFAULT_SIGNATURE_HEADER.to_string(),
            hmac_checks: true,
            paystack: PaystackConfig::default(),
            smtp: SmtpConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("SPS_HOST").ok().unwrap_or_else(|| DEFAULT_SPS_HOST.into());
        let port = env::var("SPS_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for SPS_PORT. {e} Using the default, {DEFAULT_SPS_PORT}, instead."
                    );
                    DEFAULT_SPS_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_SPS_PORT);
        let database_url = env::var("SPS_DATABASE_URL").ok().unwrap_or_else(|| {
            error!("🪛️ SPS_DATABASE_URL is not set. Please set it to the URL for the storefront database.");
            String::default()
        });
        let use_x_forwarded_for = parse_boolean_flag(env::var("SPS_USE_X_FORWARDED_FOR").ok(), false);
        let use_forwarded = parse_boolean_flag(env::var("SPS_USE_FORWARDED").ok(), false);
        let session_timeout = duration_minutes_from_env("SPS_SESSION_TIMEOUT_MINUTES", DEFAULT_SESSION_TIMEOUT);
        let link_staleness = duration_minutes_from_env("SPS_LINK_STALENESS_MINUTES", DEFAULT_LINK_STALENESS);
        let callback_url = env::var("SPS_CALLBACK_URL").ok();
        let shipping_fee = env::var("SPS_SHIPPING_FEE")
            .ok()
            .and_then(|s| {
                Money::from_major_str(&s)
                    .map_err(|e| warn!("🪛️ Ignoring invalid SPS_SHIPPING_FEE. {e}"))
                    .ok()
            })
            .unwrap_or(Money::from(0));
        let signature_header =
            env::var("SPS_SIGNATURE_HEADER").ok().unwrap_or_else(|| DEFAULT_SIGNATURE_HEADER.to_string());
        let hmac_checks = parse_boolean_flag(env::var("SPS_HMAC_CHECKS").ok(), true);
        if !hmac_checks {
            warn!("🚨️ Webhook HMAC checks are DISABLED. Never run like this against the live gateway.");
        }
        let paystack = PaystackConfig::new_from_env_or_default();
        let smtp = SmtpConfig::from_env_or_default();
        Self {
            host,
            port,
            database_url,
            use_x_forwarded_for,
            use_forwarded,
            session_timeout,
            link_staleness,
            callback_url,
            shipping_fee,
            signature_header,
            hmac_checks,
            paystack,
            smtp,
        }
    }
}

fn duration_minutes_from_env(var: &str, default: Duration) -> Duration {
    env::var(var)
        .map_err(|_| info!("🪛️ {var} is not set. Using the default value of {} minutes.", default.num_minutes()))
        .and_then(|s| {
            s.parse::<i64>()
                .map(Duration::minutes)
                .map_err(|e| warn!("🪛️ Invalid configuration value for {var}. {e}"))
        })
        .ok()
        .unwrap_or(default)
}

//-------------------------------------------------  SmtpConfig  ------------------------------------------------------
#[derive(Clone, Debug, Default)]
pub struct SmtpConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: Secret<String>,
    pub from_name: String,
    pub from_email: String,
}

impl SmtpConfig {
    pub fn from_env_or_default() -> Self {
        let enabled = parse_boolean_flag(env::var("SPS_SMTP_ENABLED").ok(), false);
        if !enabled {
            info!("🪛️ SMTP notifications are disabled. Set SPS_SMTP_ENABLED=1 to turn them on.");
            return Self::default();
        }
        let host = env::var("SPS_SMTP_HOST").ok().unwrap_or_else(|| {
            error!("🪛️ SPS_SMTP_HOST is not set, but SMTP notifications are enabled.");
            String::default()
        });
        let port = env::var("SPS_SMTP_PORT").ok().and_then(|s| s.parse::<u16>().ok()).unwrap_or(587);
        let username = env::var("SPS_SMTP_USERNAME").ok().unwrap_or_default();
        let password = Secret::new(env::var("SPS_SMTP_PASSWORD").ok().unwrap_or_default());
        let from_name = env::var("SPS_SMTP_FROM_NAME").ok().unwrap_or_else(|| "Storefront".to_string());
        let from_email = env::var("SPS_SMTP_FROM_EMAIL").ok().unwrap_or_else(|| {
            error!("🪛️ SPS_SMTP_FROM_EMAIL is not set, but SMTP notifications are enabled.");
            String::default()
        });
        Self { enabled, host, port, username, password, from_name, from_email }
    }
}

//-------------------------------------------------  ServerOptions  ---------------------------------------------------
/// A subset of the server configuration that handlers need at request time. Kept small, and excludes secrets so that
/// no sensitive information is passed around the system.
#[derive(Clone, Copy, Debug)]
pub struct ServerOptions {
    pub use_x_forwarded_for: bool,
    pub use_forwarded: bool,
    pub shipping_fee: Money,
}

impl ServerOptions {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            use_x_forwarded_for: config.use_x_forwarded_for,
            use_forwarded: config.use_forwarded,
            shipping_fee: config.shipping_fee,
        }
    }
}
