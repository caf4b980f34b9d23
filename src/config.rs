use std::time::Duration;
use thiserror::Error;

use crate::upload::{MEGABYTE, UploadConstraints};
use crate::workflow::{EvidenceSettings, OfferSettings};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
}

/// Supabase Storage credentials. Without them uploads go to process memory.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub url: String,
    pub service_key: String,
    pub bucket: String,
}

#[derive(Debug, Clone)]
pub struct PaymentConfig {
    pub url: String,
    pub api_key: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt_secret: String,
    pub port: u16,
    pub run_migrations: bool,
    pub send_fee_cents: i64,
    pub offer_ttl: Duration,
    pub expiry_sweep_interval: Duration,
    pub attachment_max_bytes: u64,
    pub evidence_max_bytes: u64,
    pub max_request_bytes: usize,
    pub storage: Option<StorageConfig>,
    pub payments: Option<PaymentConfig>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let storage = match (optional("SUPABASE_URL"), optional("SUPABASE_SERVICE_KEY")) {
            (Some(url), Some(service_key)) => Some(StorageConfig {
                url,
                service_key,
                bucket: optional("STORAGE_BUCKET").unwrap_or_else(|| "deliverables".to_string()),
            }),
            _ => None,
        };
        let payments = match (optional("PAYMENT_GATEWAY_URL"), optional("PAYMENT_GATEWAY_KEY")) {
            (Some(url), Some(api_key)) => Some(PaymentConfig { url, api_key }),
            _ => None,
        };

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            jwt_secret: required("JWT_SECRET")?,
            port: parse_or("PORT", 8080),
            run_migrations: parse_or("RUN_MIGRATIONS", false),
            send_fee_cents: parse_or("OFFER_SEND_FEE_CENTS", 100),
            offer_ttl: Duration::from_secs(parse_or::<u64>("OFFER_TTL_HOURS", 168) * 3600),
            expiry_sweep_interval: parse_duration_secs("OFFER_EXPIRY_SWEEP_SECS", 300),
            attachment_max_bytes: parse_or::<u64>("OFFER_ATTACHMENT_MAX_MB", 10) * MEGABYTE,
            evidence_max_bytes: parse_or::<u64>("EVIDENCE_MAX_MB", 200) * MEGABYTE,
            max_request_bytes: parse_or::<usize>("MAX_REQUEST_MB", 256) * MEGABYTE as usize,
            storage,
            payments,
        })
    }

    pub fn offer_settings(&self) -> OfferSettings {
        OfferSettings {
            send_fee_cents: self.send_fee_cents,
            ttl: chrono::Duration::from_std(self.offer_ttl)
                .unwrap_or_else(|_| chrono::Duration::hours(168)),
            attachment_constraints: UploadConstraints::new(self.attachment_max_bytes),
        }
    }

    pub fn evidence_settings(&self) -> EvidenceSettings {
        EvidenceSettings {
            constraints: UploadConstraints::new(self.evidence_max_bytes),
        }
    }
}

fn required(env_var: &'static str) -> Result<String, ConfigError> {
    optional(env_var).ok_or(ConfigError::Missing(env_var))
}

fn optional(env_var: &str) -> Option<String> {
    std::env::var(env_var).ok().filter(|v| !v.trim().is_empty())
}

fn parse_or<T: std::str::FromStr>(env_var: &str, default: T) -> T {
    std::env::var(env_var)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn parse_duration_secs(env_var: &str, default: u64) -> Duration {
    std::env::var(env_var)
        .ok()
        .and_then(|v| v.parse().ok())
        .map(Duration::from_secs)
        .unwrap_or_else(|| Duration::from_secs(default))
}
