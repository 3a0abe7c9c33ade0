//! Relay dependencies (using traits for testability)
//!
//! This module provides the dependency container used by the distribution cycle.
//! All external services use trait abstractions to enable testing.

use anyhow::{Context, Result};
use sqlx::PgPool;
use std::sync::Arc;
use telegram::TelegramClient;
use twilio::{TwilioOptions, TwilioService};

use crate::config::Config;
use crate::domains::distribution::{Destination, MessageFormatter};
use crate::kernel::facebook_client::FacebookClient;
use crate::kernel::publishers::{FacebookPublisher, TelegramPublisher, WhatsAppPublisher};
use crate::kernel::stores::{PgCursorStore, PgDeliveryLedger, PgJobSource};
use crate::kernel::{BaseCursorStore, BaseDeliveryLedger, BaseJobSource, BasePublisher};

// =============================================================================
// RelayDeps
// =============================================================================

#[derive(Clone)]
pub struct RelayDeps {
    pub source: Arc<dyn BaseJobSource>,
    pub ledger: Arc<dyn BaseDeliveryLedger>,
    pub cursor: Arc<dyn BaseCursorStore>,
    /// One per configured destination, in `Destination::ALL` order
    pub publishers: Vec<Arc<dyn BasePublisher>>,
    pub formatter: MessageFormatter,
}

impl RelayDeps {
    pub fn new(
        source: Arc<dyn BaseJobSource>,
        ledger: Arc<dyn BaseDeliveryLedger>,
        cursor: Arc<dyn BaseCursorStore>,
        publishers: Vec<Arc<dyn BasePublisher>>,
        formatter: MessageFormatter,
    ) -> Self {
        Self {
            source,
            ledger,
            cursor,
            publishers,
            formatter,
        }
    }

    /// Postgres-backed stores plus a publisher for every configured destination
    pub fn from_config(config: &Config, pool: PgPool) -> Result<Self> {
        Ok(Self::new(
            Arc::new(PgJobSource::new(pool.clone())),
            Arc::new(PgDeliveryLedger::new(pool.clone())),
            Arc::new(PgCursorStore::new(pool)),
            build_publishers(config)?,
            MessageFormatter::new(config.job_site_url.clone(), config.media_base_url.clone()),
        ))
    }

    pub fn destinations(&self) -> Vec<Destination> {
        self.publishers.iter().map(|p| p.destination()).collect()
    }
}

/// Build publishers for each destination whose credentials are present.
pub fn build_publishers(config: &Config) -> Result<Vec<Arc<dyn BasePublisher>>> {
    let timeout = config.request_timeout();
    let mut publishers: Vec<Arc<dyn BasePublisher>> = Vec::new();

    if let Some(telegram) = &config.telegram {
        let client = TelegramClient::with_timeout(telegram.bot_token.clone(), timeout)
            .context("Failed to build Telegram client")?;
        publishers.push(Arc::new(TelegramPublisher::new(
            Arc::new(client),
            telegram.channel_id.clone(),
        )));
    }

    if let Some(whatsapp) = &config.whatsapp {
        let twilio = TwilioService::with_timeout(
            TwilioOptions {
                account_sid: whatsapp.account_sid.clone(),
                auth_token: whatsapp.auth_token.clone(),
            },
            timeout,
        );
        publishers.push(Arc::new(WhatsAppPublisher::new(
            Arc::new(twilio),
            &whatsapp.from,
            &whatsapp.to,
        )));
    }

    if let Some(facebook) = &config.facebook {
        let client = FacebookClient::with_timeout(facebook.access_token.clone(), timeout)
            .context("Failed to build Facebook client")?;
        publishers.push(Arc::new(FacebookPublisher::new(
            Arc::new(client),
            facebook.group_id.clone(),
        )));
    }

    Ok(publishers)
}
