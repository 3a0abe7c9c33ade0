use anyhow::{bail, Context, Result};
use dotenvy::dotenv;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::domains::distribution::{CycleSettings, Destination, RetryPolicy};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub channel_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WhatsAppConfig {
    pub account_sid: String,
    pub auth_token: String,
    /// Twilio WhatsApp sender
    pub from: String,
    /// Group or recipient number
    pub to: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FacebookConfig {
    pub access_token: String,
    pub group_id: String,
}

/// One year
const MAX_LOOKBACK_HOURS: i64 = 24 * 365;
/// Ten years
const MAX_RETENTION_DAYS: i64 = 3650;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub polling_interval_seconds: u64,
    pub lookback_hours: i64,
    pub job_site_url: Option<String>,
    pub media_base_url: Option<String>,
    pub telegram: Option<TelegramConfig>,
    pub whatsapp: Option<WhatsAppConfig>,
    pub facebook: Option<FacebookConfig>,
    pub request_timeout_seconds: u64,
    /// Upper bound on each database call made by a cycle
    pub store_timeout_seconds: u64,
    pub publish_max_attempts: u32,
    pub publish_backoff_ms: u64,
    pub max_delivery_failures: u32,
    pub delivery_retention_days: i64,
    pub scheduler_enabled: bool,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Self::from_vars(|key| env::var(key).ok())
    }

    /// Build from any key lookup. Blank values count as unset.
    pub fn from_vars<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let config = Self {
            database_url: var("DATABASE_URL").context("DATABASE_URL must be set")?,
            port: parse_or(&var, "PORT", 8000)?,
            polling_interval_seconds: parse_or(&var, "POLLING_INTERVAL_SECONDS", 60)?,
            lookback_hours: parse_or(&var, "LOOKBACK_HOURS", 24)?,
            job_site_url: var("JOB_SITE_URL"),
            media_base_url: var("MEDIA_BASE_URL"),
            telegram: credential_group(&var, &["TELEGRAM_BOT_TOKEN", "TELEGRAM_CHANNEL_ID"])?.map(
                |v| TelegramConfig {
                    bot_token: v[0].clone(),
                    channel_id: v[1].clone(),
                },
            ),
            whatsapp: credential_group(
                &var,
                &[
                    "TWILIO_ACCOUNT_SID",
                    "TWILIO_AUTH_TOKEN",
                    "TWILIO_WHATSAPP_FROM",
                    "WHATSAPP_GROUP_NUMBER",
                ],
            )?
            .map(|v| WhatsAppConfig {
                account_sid: v[0].clone(),
                auth_token: v[1].clone(),
                from: v[2].clone(),
                to: v[3].clone(),
            }),
            facebook: credential_group(&var, &["FACEBOOK_ACCESS_TOKEN", "FACEBOOK_GROUP_ID"])?
                .map(|v| FacebookConfig {
                    access_token: v[0].clone(),
                    group_id: v[1].clone(),
                }),
            request_timeout_seconds: parse_or(&var, "REQUEST_TIMEOUT_SECONDS", 8)?,
            store_timeout_seconds: parse_or(&var, "STORE_TIMEOUT_SECONDS", 10)?,
            publish_max_attempts: parse_or(&var, "PUBLISH_MAX_ATTEMPTS", 3)?,
            publish_backoff_ms: parse_or(&var, "PUBLISH_BACKOFF_MS", 500)?,
            max_delivery_failures: parse_or(&var, "MAX_DELIVERY_FAILURES", 3)?,
            delivery_retention_days: parse_or(&var, "DELIVERY_RETENTION_DAYS", 30)?,
            scheduler_enabled: parse_bool_or(&var, "SCHEDULER_ENABLED", true)?,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.polling_interval_seconds == 0 {
            bail!("POLLING_INTERVAL_SECONDS must be greater than zero");
        }
        if !(1..=MAX_LOOKBACK_HOURS).contains(&self.lookback_hours) {
            bail!(
                "LOOKBACK_HOURS must be between 1 and {}, got {}",
                MAX_LOOKBACK_HOURS,
                self.lookback_hours
            );
        }
        if !(1..=MAX_RETENTION_DAYS).contains(&self.delivery_retention_days) {
            bail!(
                "DELIVERY_RETENTION_DAYS must be between 1 and {}, got {}",
                MAX_RETENTION_DAYS,
                self.delivery_retention_days
            );
        }
        if self.request_timeout_seconds == 0 {
            bail!("REQUEST_TIMEOUT_SECONDS must be greater than zero");
        }
        if self.store_timeout_seconds == 0 {
            bail!("STORE_TIMEOUT_SECONDS must be greater than zero");
        }
        if self.publish_max_attempts == 0 {
            bail!("PUBLISH_MAX_ATTEMPTS must be at least 1");
        }
        if self.max_delivery_failures == 0 {
            bail!("MAX_DELIVERY_FAILURES must be at least 1");
        }
        // Pruning inside the lookback window would let jobs be published twice
        let retention_hours = self.delivery_retention_days.checked_mul(24);
        if retention_hours.map_or(true, |hours| hours <= self.lookback_hours) {
            bail!(
                "DELIVERY_RETENTION_DAYS ({} days) must exceed LOOKBACK_HOURS ({} hours)",
                self.delivery_retention_days,
                self.lookback_hours
            );
        }
        Ok(())
    }

    pub fn configured_destinations(&self) -> Vec<Destination> {
        let mut destinations = Vec::new();
        if self.telegram.is_some() {
            destinations.push(Destination::Telegram);
        }
        if self.whatsapp.is_some() {
            destinations.push(Destination::WhatsApp);
        }
        if self.facebook.is_some() {
            destinations.push(Destination::Facebook);
        }
        destinations
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_secs(self.store_timeout_seconds)
    }

    pub fn polling_interval(&self) -> Duration {
        Duration::from_secs(self.polling_interval_seconds)
    }

    pub fn cycle_settings(&self) -> CycleSettings {
        CycleSettings {
            lookback: chrono::Duration::hours(self.lookback_hours),
            max_delivery_failures: self.max_delivery_failures,
            retry: RetryPolicy {
                request_timeout: self.request_timeout(),
                max_attempts: self.publish_max_attempts,
                initial_backoff: Duration::from_millis(self.publish_backoff_ms),
            },
            store_timeout: self.store_timeout(),
        }
    }
}

fn parse_or<T, F>(var: &F, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    match var(key) {
        Some(raw) => raw
            .parse()
            .with_context(|| format!("{} must be a valid number, got `{}`", key, raw)),
        None => Ok(default),
    }
}

fn parse_bool_or<F>(var: &F, key: &str, default: bool) -> Result<bool>
where
    F: Fn(&str) -> Option<String>,
{
    match var(key).map(|v| v.to_ascii_lowercase()).as_deref() {
        None => Ok(default),
        Some("1" | "true" | "yes" | "on") => Ok(true),
        Some("0" | "false" | "no" | "off") => Ok(false),
        Some(other) => bail!("{} must be a boolean, got `{}`", key, other),
    }
}

/// All keys set enables the group, none set disables it, anything else is an error.
fn credential_group<F>(var: &F, keys: &[&str]) -> Result<Option<Vec<String>>>
where
    F: Fn(&str) -> Option<String>,
{
    let values: Vec<Option<String>> = keys.iter().map(|k| var(*k)).collect();
    if values.iter().all(Option::is_none) {
        return Ok(None);
    }
    let missing: Vec<&str> = keys
        .iter()
        .zip(&values)
        .filter(|(_, v)| v.is_none())
        .map(|(k, _)| *k)
        .collect();
    if !missing.is_empty() {
        bail!(
            "incomplete destination credentials: {} must be set together (missing {})",
            keys.join(", "),
            missing.join(", ")
        );
    }
    Ok(Some(values.into_iter().flatten().collect()))
}
