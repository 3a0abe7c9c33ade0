//! Bounded retry around a single publisher call.

use std::time::Duration;

use crate::kernel::{BasePublisher, DeliveryReceipt, OutboundMessage, PublishError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Budget for one attempt
    pub request_timeout: Duration,
    /// Total attempts including the first
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles after each further failure
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(8),
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    fn backoff_for(&self, failed_attempts: u32) -> Duration {
        let factor = 2u32.saturating_pow(failed_attempts.saturating_sub(1));
        self.initial_backoff.saturating_mul(factor)
    }
}

/// Publish with per-attempt timeout and exponential backoff on transient errors.
///
/// Permanent errors return immediately. A timeout is returned without retrying
/// because the destination may have accepted the message.
pub async fn publish_with_retry(
    publisher: &dyn BasePublisher,
    message: &OutboundMessage,
    policy: &RetryPolicy,
) -> Result<DeliveryReceipt, PublishError> {
    let destination = publisher.destination();
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        let result = tokio::time::timeout(policy.request_timeout, publisher.publish(message))
            .await
            .unwrap_or(Err(PublishError::Timeout(policy.request_timeout)));

        match result {
            Ok(receipt) => {
                if attempt > 1 {
                    tracing::info!(%destination, attempt, "Publish succeeded after retry");
                }
                return Ok(receipt);
            }
            Err(e) if e.is_transient() && attempt < max_attempts => {
                let delay = policy.backoff_for(attempt);
                tracing::warn!(
                    %destination,
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Transient publish failure, backing off"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                tracing::warn!(%destination, attempt, error = %e, "Publish failed");
                return Err(e);
            }
        }
    }
}
