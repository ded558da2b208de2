//! # Event Source Adapter
//!
//! Turns the provider's log queries into a push stream of `RawEvent`s.
//!
//! The poller walks the chain in bounded block ranges:
//!
//! ```text
//! next ──▶ [next, min(latest, next + max_block_range - 1)] ──▶ next = to + 1
//! ```
//!
//! - The cursor only advances after a range was fetched, so a failed fetch
//!   is retried and delivery is at-least-once
//! - Events leave in chain order (block, then log index)
//! - Undecodable or removed logs are skipped with a log line
//! - After `max_poll_failures` consecutive failed polls the poller gives up
//!   and closes the stream; the consumer treats that as a lost provider

use crate::error::SourceError;
use crate::provider::{CapabilityProvider, LogFilter};
use sensorwatch_core::primitives::DATA_RECORDED_EVENT;
use sensorwatch_core::{
    BlockNumber, ContractAddress, RawEvent, data_recorded_topic, decode_data_recorded,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

// =============================================================================
// SETTINGS
// =============================================================================

/// Polling parameters for one contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSettings {
    pub address: ContractAddress,
    pub poll_interval: Duration,
    /// First block to scan; `None` starts at the latest block.
    pub start_block: Option<BlockNumber>,
    pub max_block_range: u64,
    pub channel_capacity: usize,
    /// Consecutive failed polls before the provider is considered gone.
    pub max_poll_failures: u32,
}

// =============================================================================
// SUBSCRIPTION
// =============================================================================

/// A live subscription: the event stream plus the handle that stops it.
#[derive(Debug)]
pub struct Subscription {
    pub events: mpsc::Receiver<RawEvent>,
    pub guard: SubscriptionGuard,
}

/// Owns the polling task. Dropping the guard stops polling.
#[derive(Debug)]
pub struct SubscriptionGuard {
    task: Option<JoinHandle<()>>,
    start: BlockNumber,
}

impl SubscriptionGuard {
    /// Block the subscription started scanning from.
    #[must_use]
    pub fn start_block(&self) -> BlockNumber {
        self.start
    }
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

// =============================================================================
// EVENT SOURCE
// =============================================================================

/// Polling event source over a `CapabilityProvider`.
#[derive(Debug)]
pub struct EventSource<P> {
    provider: Arc<P>,
    settings: SourceSettings,
}

impl<P: CapabilityProvider> EventSource<P> {
    #[must_use]
    pub fn new(provider: Arc<P>, settings: SourceSettings) -> Self {
        Self { provider, settings }
    }

    #[must_use]
    pub fn provider(&self) -> &Arc<P> {
        &self.provider
    }

    /// Start delivering `event_name` events.
    ///
    /// Only `DataRecorded` is supported.
    pub async fn subscribe(&self, event_name: &str) -> Result<Subscription, SourceError> {
        if event_name != DATA_RECORDED_EVENT {
            return Err(SourceError::UnsupportedEvent(event_name.to_string()));
        }

        let start = match self.settings.start_block {
            Some(block) => block,
            None => self.provider.latest_block().await?,
        };

        let (tx, rx) = mpsc::channel(self.settings.channel_capacity.max(1));
        let task = tokio::spawn(run_poller(
            Arc::clone(&self.provider),
            self.settings.clone(),
            start,
            tx,
        ));

        tracing::info!(
            start_block = %start,
            address = %self.settings.address,
            "Subscribed to {}",
            DATA_RECORDED_EVENT
        );

        Ok(Subscription {
            events: rx,
            guard: SubscriptionGuard {
                task: Some(task),
                start,
            },
        })
    }

    /// Stop the subscription.
    ///
    /// Returns once the polling task has ended; no event is sent afterwards.
    pub async fn unsubscribe(&self, mut guard: SubscriptionGuard) {
        if let Some(task) = guard.task.take() {
            task.abort();
            // Cancellation is the expected outcome.
            let _ = task.await;
        }
        tracing::debug!("Unsubscribed from {}", DATA_RECORDED_EVENT);
    }
}

// =============================================================================
// POLLER
// =============================================================================

async fn run_poller<P: CapabilityProvider>(
    provider: Arc<P>,
    settings: SourceSettings,
    mut next: BlockNumber,
    tx: mpsc::Sender<RawEvent>,
) {
    let mut interval = tokio::time::interval(settings.poll_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut failures: u32 = 0;

    loop {
        interval.tick().await;
        match poll_once(provider.as_ref(), &settings, next, &tx).await {
            Ok(cursor) => {
                next = cursor;
                failures = 0;
            }
            Err(SourceError::ChannelClosed) => {
                tracing::debug!("Event consumer gone, stopping poller");
                return;
            }
            Err(e) => {
                failures = failures.saturating_add(1);
                if failures >= settings.max_poll_failures.max(1) {
                    tracing::error!(
                        from_block = %next,
                        failures,
                        error = %e,
                        "Provider unreachable, closing subscription"
                    );
                    return;
                }
                tracing::warn!(from_block = %next, failures, error = %e, "Log fetch failed, retrying");
            }
        }
    }
}

/// Fetch and forward one block range. Returns the next cursor.
async fn poll_once<P: CapabilityProvider>(
    provider: &P,
    settings: &SourceSettings,
    next: BlockNumber,
    tx: &mpsc::Sender<RawEvent>,
) -> Result<BlockNumber, SourceError> {
    let latest = provider.latest_block().await?;
    if latest < next {
        return Ok(next);
    }

    let span = settings.max_block_range.max(1) - 1;
    let to = BlockNumber(latest.value().min(next.value().saturating_add(span)));
    let filter = LogFilter {
        address: settings.address.clone(),
        topic: data_recorded_topic(),
        from_block: next,
        to_block: to,
    };

    let mut logs = provider.get_logs(&filter).await?;
    logs.sort_by_key(|log| (log.block_number, log.log_index));

    for log in logs {
        if log.removed {
            tracing::debug!(block = %log.block_number, log_index = log.log_index, "Skipping removed log");
            continue;
        }
        if !settings.address.matches(&log.address) {
            tracing::debug!(address = ?log.address, "Skipping log from another contract");
            continue;
        }
        let raw = match decode_data_recorded(&log) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(
                    block = %log.block_number,
                    log_index = log.log_index,
                    error = %e,
                    "Skipping undecodable log"
                );
                continue;
            }
        };
        tx.send(raw).await.map_err(|_| SourceError::ChannelClosed)?;
    }

    Ok(to.next())
}
