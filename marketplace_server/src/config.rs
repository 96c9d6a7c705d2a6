use std::env;

use chrono::Duration;
use log::*;
use marketplace_engine::EscalationPolicy;
use mkt_common::{
    helpers::{parse_boolean_flag, parse_positive_int},
    Secret,
};

const DEFAULT_MKT_HOST: &str = "127.0.0.1";
const DEFAULT_MKT_PORT: u16 = 8370;
const DEFAULT_SWEEP_INTERVAL: std::time::Duration = std::time::Duration::from_secs(60);

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// Timeouts and batch size for the escalation scheduler
    pub escalation: EscalationPolicy,
    /// The time between two runs of the escalation scheduler
    pub sweep_interval: std::time::Duration,
    pub webhook: WebhookConfig,
}

/// How payment gateway callbacks are authenticated.
#[derive(Clone, Debug, Default)]
pub struct WebhookConfig {
    /// The shared token the gateway sends in the `x-callback-token` header
    pub token: Secret<String>,
    /// If true, callbacks are accepted without a token. **DANGER**
    pub disable_token_check: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_MKT_HOST.to_string(),
            port: DEFAULT_MKT_PORT,
            database_url: String::default(),
            escalation: EscalationPolicy::default(),
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            webhook: WebhookConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("MKT_HOST").ok().unwrap_or_else(|| DEFAULT_MKT_HOST.into());
        let port = env::var("MKT_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for MKT_PORT. {e} Using the default, {DEFAULT_MKT_PORT}, instead."
                    );
                    DEFAULT_MKT_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_MKT_PORT);
        let database_url = env::var("MKT_DATABASE_URL").ok().unwrap_or_else(|| {
            error!("🪛️ MKT_DATABASE_URL is not set. Please set it to the URL for the marketplace database.");
            String::default()
        });
        let escalation = configure_escalation_policy();
        let sweep_interval = parse_positive_int(env::var("MKT_SWEEP_INTERVAL_SECS").ok())
            .map(|secs| std::time::Duration::from_secs(secs as u64))
            .unwrap_or_else(|| {
                info!("🪛️ MKT_SWEEP_INTERVAL_SECS is not set or invalid. Sweeping every {DEFAULT_SWEEP_INTERVAL:?}.");
                DEFAULT_SWEEP_INTERVAL
            });
        let webhook = WebhookConfig::from_env();
        Self { host, port, database_url, escalation, sweep_interval, webhook }
    }
}

impl WebhookConfig {
    pub fn new<S: Into<String>>(token: S) -> Self {
        Self { token: Secret::new(token.into()), disable_token_check: false }
    }

    pub fn from_env() -> Self {
        let disable_token_check = parse_boolean_flag(env::var("MKT_DISABLE_WEBHOOK_TOKEN_CHECK").ok(), false);
        let token = env::var("MKT_WEBHOOK_TOKEN").ok().unwrap_or_default();
        if disable_token_check {
            warn!(
                "🚨️🚨️🚨️ Payment webhook token checks are DISABLED. Anyone can mark payments as paid. Do not run \
                 production like this. 🚨️🚨️🚨️"
            );
        } else if token.is_empty() {
            error!(
                "🪛️ MKT_WEBHOOK_TOKEN is not set. Every payment callback will be rejected until it is configured."
            );
        }
        Self { token: Secret::new(token), disable_token_check }
    }

    /// True if a request carrying `candidate` may use the webhook.
    pub fn authorizes(&self, candidate: Option<&str>) -> bool {
        if self.disable_token_check {
            return true;
        }
        match candidate {
            Some(c) => !self.token.reveal().is_empty() && self.token.matches(&c.to_string()),
            None => false,
        }
    }
}

fn hours_from_env(name: &str, default: Duration) -> Duration {
    match env::var(name) {
        Err(_) => {
            info!("🪛️ {name} is not set. Using the default value of {} hrs.", default.num_hours());
            default
        },
        Ok(s) => parse_positive_int(Some(s.clone())).map(Duration::hours).unwrap_or_else(|| {
            warn!("🪛️ Invalid configuration value for {name}: {s}. Using {} hrs.", default.num_hours());
            default
        }),
    }
}

fn configure_escalation_policy() -> EscalationPolicy {
    let defaults = EscalationPolicy::default();
    let batch_size = parse_positive_int(env::var("MKT_SWEEP_BATCH_SIZE").ok())
        .map(|n| n as usize)
        .unwrap_or(defaults.batch_size);
    EscalationPolicy {
        waited_timeout: hours_from_env("MKT_WAITED_TIMEOUT_HOURS", defaults.waited_timeout),
        processed_timeout: hours_from_env("MKT_PROCESSED_TIMEOUT_HOURS", defaults.processed_timeout),
        delivered_timeout: hours_from_env("MKT_DELIVERED_TIMEOUT_HOURS", defaults.delivered_timeout),
        seller_window: hours_from_env("MKT_REFUND_SELLER_WINDOW_HOURS", defaults.seller_window),
        buyer_window: hours_from_env("MKT_REFUND_BUYER_WINDOW_HOURS", defaults.buyer_window),
        batch_size,
    }
}
