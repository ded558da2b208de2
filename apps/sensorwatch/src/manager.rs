//! # Lifecycle Manager
//!
//! Drives the core `Lifecycle` from async code.
//!
//! ```text
//!  EventSource ──RawEvent──▶ pump ──get_block (≤ N in flight)──▶ ordered ──▶ Lifecycle::deliver
//!                                                                                 │
//!                                        renderers ◀── watch::Receiver ◀── SeriesSnapshot
//! ```
//!
//! ## Ordering
//!
//! Block lookups for consecutive events run concurrently, but completions are
//! applied strictly in the order the events were delivered. A slow lookup
//! holds back later appends; it never lets them overtake. A failed lookup
//! drops its event and frees the slot.
//!
//! ## Cancellation
//!
//! Tearing a session down aborts the pump task, which drops every in-flight
//! lookup. Anything that still reaches `deliver` with the old ticket is
//! discarded by the core.
//!
//! ## Provider Loss
//!
//! When the source gives up on an unreachable provider it closes the event
//! stream. The pump applies the lookups still in flight, then ends the
//! session itself: the lifecycle returns to `Idle` and the context is
//! cleared, exactly as after `disconnect`.

use crate::error::{ConnectionError, ProviderError};
use crate::provider::{CapabilityProvider, SessionContext};
use crate::source::{EventSource, SourceSettings, SubscriptionGuard};
use futures_util::StreamExt;
use sensorwatch_core::primitives::DATA_RECORDED_EVENT;
use sensorwatch_core::{
    BlockMeta, Delivery, DeliveryStats, Lifecycle, LifecycleState, RawEvent, SeriesSnapshot,
    Ticket,
};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;

// =============================================================================
// SHARED STATE
// =============================================================================

/// State shared between the manager and its pump task.
///
/// Guarded by a synchronous mutex that is never held across an await.
#[derive(Debug)]
struct Shared {
    lifecycle: Lifecycle,
    context: Option<SessionContext>,
    states: watch::Sender<LifecycleState>,
}

impl Shared {
    /// Publish the lifecycle state after a transition.
    fn publish_state(&self) {
        self.states.send_replace(self.lifecycle.state());
    }

    /// Take the live session down to `Idle` and forget its context.
    ///
    /// Returns false when there was no session left to end.
    fn end_session(&mut self) -> bool {
        let Some(ticket) = self.lifecycle.tear_down() else {
            return false;
        };
        self.publish_state();
        self.context = None;
        if let Err(e) = self.lifecycle.finish_teardown(ticket) {
            tracing::warn!(session = %ticket.session(), error = %e, "Teardown out of order");
        }
        self.publish_state();
        true
    }
}

/// Handles owned by the live session.
#[derive(Debug)]
struct ActiveSession {
    ticket: Ticket,
    guard: SubscriptionGuard,
    pump: JoinHandle<()>,
}

/// Point-in-time view of the manager for status surfaces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManagerStatus {
    pub state: LifecycleState,
    pub context: Option<SessionContext>,
    pub series_length: usize,
    pub revision: u64,
    pub stats: DeliveryStats,
}

// =============================================================================
// MANAGER
// =============================================================================

/// Owns the session lifecycle and publishes series snapshots.
#[derive(Debug)]
pub struct LifecycleManager<P> {
    source: EventSource<P>,
    shared: Arc<Mutex<Shared>>,
    snapshots: Arc<watch::Sender<SeriesSnapshot>>,
    /// Serialises connect and disconnect.
    active: tokio::sync::Mutex<Option<ActiveSession>>,
    lookup_concurrency: usize,
}

impl<P: CapabilityProvider> LifecycleManager<P> {
    /// Create an idle manager.
    #[must_use]
    pub fn new(
        provider: Arc<P>,
        source: SourceSettings,
        lifecycle: Lifecycle,
        lookup_concurrency: usize,
    ) -> Self {
        let (snapshots, _) = watch::channel(lifecycle.snapshot());
        let (states, _) = watch::channel(lifecycle.state());
        Self {
            source: EventSource::new(provider, source),
            shared: Arc::new(Mutex::new(Shared {
                lifecycle,
                context: None,
                states,
            })),
            snapshots: Arc::new(snapshots),
            active: tokio::sync::Mutex::new(None),
            lookup_concurrency: lookup_concurrency.max(1),
        }
    }

    /// Receiver for published snapshots. Starts at the current one.
    #[must_use]
    pub fn subscribe_snapshots(&self) -> watch::Receiver<SeriesSnapshot> {
        self.snapshots.subscribe()
    }

    /// Receiver for lifecycle state changes, including a session ending on
    /// its own when the provider is lost.
    #[must_use]
    pub fn subscribe_state(&self) -> watch::Receiver<LifecycleState> {
        lock(&self.shared).states.subscribe()
    }

    /// Latest published snapshot.
    #[must_use]
    pub fn snapshot(&self) -> SeriesSnapshot {
        self.snapshots.borrow().clone()
    }

    #[must_use]
    pub fn state(&self) -> LifecycleState {
        lock(&self.shared).lifecycle.state()
    }

    #[must_use]
    pub fn status(&self) -> ManagerStatus {
        let shared = lock(&self.shared);
        let snapshot = shared.lifecycle.snapshot();
        ManagerStatus {
            state: shared.lifecycle.state(),
            context: shared.context.clone(),
            series_length: snapshot.len(),
            revision: snapshot.revision(),
            stats: shared.lifecycle.stats(),
        }
    }

    /// Establish a session with the provider's current account.
    ///
    /// Any existing session is torn down first, so at most one subscription
    /// ever feeds the series. On failure the manager is left idle.
    pub async fn connect(&self) -> Result<SessionContext, ConnectionError> {
        let mut active = self.active.lock().await;
        if let Some(previous) = active.take() {
            tracing::info!(session = %previous.ticket.session(), "Replacing session");
            self.tear_down(previous).await;
        }

        let provider = self.source.provider();
        let accounts = provider
            .request_accounts()
            .await
            .map_err(ConnectionError::Accounts)?;
        let account = accounts
            .into_iter()
            .next()
            .ok_or(ConnectionError::Accounts(ProviderError::NoAccounts))?;
        let signer = provider
            .get_signer(&account)
            .await
            .map_err(ConnectionError::Signer)?;
        let context = SessionContext::new(account, signer);

        let ticket = {
            let mut shared = lock(&self.shared);
            let (ticket, empty) = shared.lifecycle.begin()?;
            shared.context = Some(context.clone());
            shared.publish_state();
            self.snapshots.send_replace(empty);
            ticket
        };

        let subscription = match self.source.subscribe(DATA_RECORDED_EVENT).await {
            Ok(subscription) => subscription,
            Err(e) => {
                lock(&self.shared).end_session();
                return Err(ConnectionError::Subscribe(e));
            }
        };

        {
            let mut shared = lock(&self.shared);
            shared.lifecycle.activate(ticket)?;
            shared.publish_state();
        }

        let pump = tokio::spawn(run_pump(
            Arc::clone(provider),
            Arc::clone(&self.shared),
            Arc::clone(&self.snapshots),
            ticket,
            subscription.events,
            self.lookup_concurrency,
        ));

        tracing::info!(
            session = %ticket.session(),
            account = %context.account(),
            chain_id = context.chain_id(),
            start_block = %subscription.guard.start_block(),
            "Session active"
        );

        *active = Some(ActiveSession {
            ticket,
            guard: subscription.guard,
            pump,
        });
        Ok(context)
    }

    /// Tear down the live session, if any. Returns whether one was live.
    ///
    /// A session that already ended because the provider was lost counts as
    /// not live. The series stays published until the next `connect`.
    pub async fn disconnect(&self) -> bool {
        let mut active = self.active.lock().await;
        match active.take() {
            Some(session) => self.tear_down(session).await,
            None => false,
        }
    }

    /// Stop the pump and the subscription, then return to `Idle`.
    async fn tear_down(&self, session: ActiveSession) -> bool {
        // Deliveries with this ticket are stale from here on.
        let live = {
            let mut shared = lock(&self.shared);
            let live = shared.lifecycle.tear_down().is_some();
            shared.publish_state();
            live
        };

        session.pump.abort();
        let _ = session.pump.await;
        self.source.unsubscribe(session.guard).await;

        lock(&self.shared).end_session();
        tracing::info!(session = %session.ticket.session(), "Session closed");
        live
    }
}

// =============================================================================
// PUMP
// =============================================================================

/// Resolve block metadata for each event and apply completions in order.
async fn run_pump<P: CapabilityProvider>(
    provider: Arc<P>,
    shared: Arc<Mutex<Shared>>,
    snapshots: Arc<watch::Sender<SeriesSnapshot>>,
    ticket: Ticket,
    events: mpsc::Receiver<RawEvent>,
    concurrency: usize,
) {
    let lookups = ReceiverStream::new(events)
        .map(|raw| {
            let provider = Arc::clone(&provider);
            async move {
                let block = provider.get_block(raw.block_number).await;
                (raw, block)
            }
        })
        .buffered(concurrency);
    let mut lookups = std::pin::pin!(lookups);

    while let Some((raw, block)) = lookups.next().await {
        let mut guard = lock(&shared);
        apply_completion(&mut guard.lifecycle, &snapshots, ticket, &raw, block);
    }

    let mut guard = lock(&shared);
    if guard.lifecycle.is_current(ticket) && guard.end_session() {
        tracing::warn!(session = %ticket.session(), "Event stream ended, session lost");
    } else {
        tracing::debug!(session = %ticket.session(), "Event stream ended");
    }
}

/// Apply one finished lookup to the lifecycle and publish the result.
fn apply_completion(
    lifecycle: &mut Lifecycle,
    snapshots: &watch::Sender<SeriesSnapshot>,
    ticket: Ticket,
    raw: &RawEvent,
    block: Result<BlockMeta, ProviderError>,
) {
    let block = match block {
        Ok(block) => block,
        Err(e) => {
            if lifecycle.record_dropped_lookup(ticket) {
                tracing::warn!(
                    session = %ticket.session(),
                    block = %raw.block_number,
                    log_index = raw.log_index,
                    error = %e,
                    "Block lookup failed, event dropped"
                );
            }
            return;
        }
    };

    match lifecycle.deliver(ticket, raw, &block) {
        Delivery::Appended(snapshot) => {
            tracing::debug!(
                session = %ticket.session(),
                block = %raw.block_number,
                log_index = raw.log_index,
                length = snapshot.len(),
                "Reading appended"
            );
            snapshots.send_replace(snapshot);
        }
        Delivery::Duplicate => {
            tracing::debug!(block = %raw.block_number, log_index = raw.log_index, "Duplicate event");
        }
        Delivery::Filtered => {
            tracing::trace!(device = %raw.device_id, "Event for another device");
        }
        Delivery::Rejected(rejection) => {
            tracing::warn!(
                session = %ticket.session(),
                block = %raw.block_number,
                log_index = raw.log_index,
                device = %raw.device_id,
                reason = %rejection,
                "Event rejected"
            );
        }
        Delivery::Stale => {
            tracing::debug!(session = %ticket.session(), "Stale completion discarded");
        }
    }
}

fn lock(shared: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
    shared.lock().unwrap_or_else(|e| e.into_inner())
}

// =============================================================================
// TESTS
// =============================================================================
