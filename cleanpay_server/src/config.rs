use std::env;

use chrono::Duration;
use cleanpay_common::{parse_boolean_flag, Secret};
use log::*;

const DEFAULT_CPS_HOST: &str = "127.0.0.1";
const DEFAULT_CPS_PORT: u16 = 8360;
const DEFAULT_RECOVERY_INTERVAL_SECS: u64 = 300;
const DEFAULT_STALE_PAYMENT_HOURS: i64 = 24;
const DEFAULT_COMMISSION_PCT: i64 = 15;
const DEFAULT_MESSAGE_TIMEOUT_SECS: u64 = 10;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// Gateway signature configuration for incoming payment notifications.
    pub gateway: GatewayConfig,
    /// Bearer token that guards the operator endpoints under `/api`.
    pub operator_token: Secret<String>,
    /// How often the recovery worker sweeps for interrupted fulfillments.
    pub recovery_interval_secs: u64,
    /// How long a completed payment may sit without a confirmation send before the recovery
    /// worker picks it up.
    pub stale_payment_after: Duration,
    /// Platform commission, as a percentage of the booking amount.
    pub commission_pct: i64,
    /// Outbound messaging service configuration.
    pub messaging: MessagingConfig,
}

#[derive(Clone, Debug, Default)]
pub struct GatewayConfig {
    /// The passphrase shared with the payment gateway, appended to the canonical string before
    /// hashing.
    pub passphrase: Secret<String>,
    /// When false, incoming notifications are accepted without a signature check. Only ever
    /// disable this in development.
    pub signature_checks: bool,
}

#[derive(Clone, Debug, Default)]
pub struct MessagingConfig {
    /// Base URL of the messaging service, e.g. "https://messages.example.com".
    pub base_url: String,
    pub api_key: Secret<String>,
    pub timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_CPS_HOST.to_string(),
            port: DEFAULT_CPS_PORT,
            database_url: String::default(),
            gateway: GatewayConfig { passphrase: Secret::default(), signature_checks: true },
            operator_token: Secret::default(),
            recovery_interval_secs: DEFAULT_RECOVERY_INTERVAL_SECS,
            stale_payment_after: Duration::hours(DEFAULT_STALE_PAYMENT_HOURS),
            commission_pct: DEFAULT_COMMISSION_PCT,
            messaging: MessagingConfig { timeout_secs: DEFAULT_MESSAGE_TIMEOUT_SECS, ..Default::default() },
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("CPS_HOST").ok().unwrap_or_else(|| DEFAULT_CPS_HOST.into());
        let port = env::var("CPS_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for CPS_PORT. {e} Using the default, {DEFAULT_CPS_PORT}, instead."
                    );
                    DEFAULT_CPS_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_CPS_PORT);
        let database_url = cleanpay_engine::db_url();
        let gateway = GatewayConfig::from_env_or_default();
        let operator_token = env::var("CPS_OPERATOR_TOKEN").map(Secret::new).unwrap_or_else(|_| {
            warn!("🪛️ CPS_OPERATOR_TOKEN is not set. Operator endpoints will reject every request.");
            Secret::default()
        });
        let recovery_interval_secs = env_u64("CPS_RECOVERY_INTERVAL_SECS", DEFAULT_RECOVERY_INTERVAL_SECS);
        let stale_payment_after =
            Duration::hours(env_u64("CPS_STALE_PAYMENT_HOURS", DEFAULT_STALE_PAYMENT_HOURS as u64) as i64);
        let commission_pct = env_u64("CPS_COMMISSION_PCT", DEFAULT_COMMISSION_PCT as u64) as i64;
        let messaging = MessagingConfig::from_env_or_default();
        Self {
            host,
            port,
            database_url,
            gateway,
            operator_token,
            recovery_interval_secs,
            stale_payment_after,
            commission_pct,
            messaging,
        }
    }
}

impl GatewayConfig {
    pub fn from_env_or_default() -> Self {
        let passphrase = env::var("CPS_GATEWAY_PASSPHRASE").map(Secret::new).unwrap_or_else(|_| {
            warn!("🪛️ CPS_GATEWAY_PASSPHRASE is not set. Notifications will be verified without a passphrase.");
            Secret::default()
        });
        let signature_checks = parse_boolean_flag(env::var("CPS_GATEWAY_SIGNATURE_CHECKS").ok(), true);
        if !signature_checks {
            warn!("🪛️ Gateway signature checks are DISABLED. Do not run like this in production.");
        }
        Self { passphrase, signature_checks }
    }
}

impl MessagingConfig {
    pub fn from_env_or_default() -> Self {
        let base_url = env::var("CPS_MESSAGE_URL").ok().unwrap_or_else(|| {
            warn!("🪛️ CPS_MESSAGE_URL is not set. Outbound messages will fail until it is configured.");
            String::default()
        });
        let api_key = env::var("CPS_MESSAGE_API_KEY").map(Secret::new).unwrap_or_default();
        let timeout_secs = env_u64("CPS_MESSAGE_TIMEOUT_SECS", DEFAULT_MESSAGE_TIMEOUT_SECS);
        Self { base_url, api_key, timeout_secs }
    }
}

fn env_u64(var: &str, default: u64) -> u64 {
    env::var(var)
        .map(|s| {
            s.parse::<u64>().unwrap_or_else(|e| {
                error!("🪛️ {s} is not a valid value for {var}. {e} Using the default, {default}, instead.");
                default
            })
        })
        .ok()
        .unwrap_or(default)
}
