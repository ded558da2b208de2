//! # Lifecycle Module
//!
//! The subscription lifecycle state machine and the single Series mutation path.
//!
//! ```text
//!          begin()             activate(t)
//!   Idle ───────────▶ Subscribing ───────────▶ Active
//!    ▲                    │                      │
//!    │                    │ tear_down()          │ tear_down()
//!    │ finish_teardown(t) ▼                      ▼
//!    └──────────────── TearingDown ◀─────────────┘
//!                         │
//!                         └── begin() (new handle supersedes the old one)
//! ```
//!
//! Every session gets a fresh `Ticket`. `deliver` applies an event only when
//! the ticket belongs to the `Active` session, so completions that arrive
//! after teardown are discarded instead of landing in a newer series.

use crate::normalizer::Normalizer;
use crate::series::{AppendOutcome, SeriesAccumulator, SeriesSnapshot};
use crate::{BlockMeta, RawEvent, Rejection, SensorError, SessionId};
use serde::Serialize;
use std::fmt;

// =============================================================================
// STATE
// =============================================================================

/// Where the lifecycle currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "session", rename_all = "snake_case")]
pub enum LifecycleState {
    /// No capability handle.
    Idle,
    /// Handle acquired, subscription being established.
    Subscribing(SessionId),
    /// Subscription live, events flowing.
    Active(SessionId),
    /// Handle revoked or replaced, subscription being removed.
    TearingDown(SessionId),
}

impl LifecycleState {
    /// Short lowercase name of the state.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Subscribing(_) => "subscribing",
            Self::Active(_) => "active",
            Self::TearingDown(_) => "tearing_down",
        }
    }

    /// Session the state refers to, if any.
    #[must_use]
    pub fn session(&self) -> Option<SessionId> {
        match self {
            Self::Idle => None,
            Self::Subscribing(s) | Self::Active(s) | Self::TearingDown(s) => Some(*s),
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.session() {
            Some(session) => write!(f, "{} (session {})", self.name(), session),
            None => f.write_str(self.name()),
        }
    }
}

/// Validity token for one session's subscription.
///
/// Only `Lifecycle::begin` creates tickets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ticket {
    session: SessionId,
}

impl Ticket {
    #[must_use]
    pub fn session(&self) -> SessionId {
        self.session
    }
}

// =============================================================================
// DELIVERY
// =============================================================================

/// What happened to one delivered event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// Appended; carries the snapshot to publish.
    Appended(SeriesSnapshot),
    /// Matched a recent entry; series unchanged.
    Duplicate,
    /// Belongs to another device; series unchanged.
    Filtered,
    /// Rejected by the normalizer; series unchanged.
    Rejected(Rejection),
    /// Ticket is not the active session; nothing was evaluated.
    Stale,
}

/// Per-session delivery counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct DeliveryStats {
    pub appended: u64,
    pub duplicates: u64,
    pub filtered: u64,
    pub rejected: u64,
    pub stale: u64,
    pub dropped_lookups: u64,
}

// =============================================================================
// LIFECYCLE
// =============================================================================

/// Owns the series and decides which deliveries may touch it.
#[derive(Debug, Clone)]
pub struct Lifecycle {
    state: LifecycleState,
    next_session: u64,
    normalizer: Normalizer,
    series: SeriesAccumulator,
    stats: DeliveryStats,
}

impl Lifecycle {
    /// Create an idle lifecycle.
    #[must_use]
    pub fn new(normalizer: Normalizer, dedup_window: usize) -> Self {
        Self {
            state: LifecycleState::Idle,
            next_session: 1,
            normalizer,
            series: SeriesAccumulator::with_window(dedup_window),
            stats: DeliveryStats::default(),
        }
    }

    #[must_use]
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    #[must_use]
    pub fn stats(&self) -> DeliveryStats {
        self.stats
    }

    /// Current series snapshot.
    #[must_use]
    pub fn snapshot(&self) -> SeriesSnapshot {
        self.series.snapshot()
    }

    /// True when `ticket` belongs to the active subscription.
    #[must_use]
    pub fn is_current(&self, ticket: Ticket) -> bool {
        self.state == LifecycleState::Active(ticket.session)
    }

    // =========================================================================
    // TRANSITIONS
    // =========================================================================

    /// Start a new session: `Idle`/`TearingDown` → `Subscribing`.
    ///
    /// Resets the series and the delivery counters. Returns the new ticket
    /// and the empty snapshot to publish.
    pub fn begin(&mut self) -> Result<(Ticket, SeriesSnapshot), SensorError> {
        match self.state {
            LifecycleState::Idle | LifecycleState::TearingDown(_) => {}
            _ => return Err(self.invalid("begin")),
        }

        let session = SessionId(self.next_session);
        self.next_session = self.next_session.saturating_add(1);
        self.state = LifecycleState::Subscribing(session);
        self.stats = DeliveryStats::default();
        let snapshot = self.series.reset(session);

        Ok((Ticket { session }, snapshot))
    }

    /// Subscription established: `Subscribing` → `Active`.
    pub fn activate(&mut self, ticket: Ticket) -> Result<(), SensorError> {
        if self.state != LifecycleState::Subscribing(ticket.session) {
            return Err(self.invalid("activate"));
        }
        self.state = LifecycleState::Active(ticket.session);
        Ok(())
    }

    /// Handle revoked or replaced: `Subscribing`/`Active` → `TearingDown`.
    ///
    /// Returns the ticket being torn down, or `None` when idle. Calling it
    /// again while already tearing down returns the same ticket.
    pub fn tear_down(&mut self) -> Option<Ticket> {
        match self.state {
            LifecycleState::Idle => None,
            LifecycleState::Subscribing(session)
            | LifecycleState::Active(session)
            | LifecycleState::TearingDown(session) => {
                self.state = LifecycleState::TearingDown(session);
                Some(Ticket { session })
            }
        }
    }

    /// Unsubscribe completed: `TearingDown` → `Idle`.
    ///
    /// The series is kept for display until the next `begin`.
    pub fn finish_teardown(&mut self, ticket: Ticket) -> Result<(), SensorError> {
        if self.state != LifecycleState::TearingDown(ticket.session) {
            return Err(self.invalid("finish_teardown"));
        }
        self.state = LifecycleState::Idle;
        Ok(())
    }

    // =========================================================================
    // DELIVERY
    // =========================================================================

    /// Apply one event with its block metadata.
    ///
    /// This is the only path that mutates the series.
    pub fn deliver(&mut self, ticket: Ticket, raw: &RawEvent, block: &BlockMeta) -> Delivery {
        if !self.is_current(ticket) {
            self.stats.stale = self.stats.stale.saturating_add(1);
            return Delivery::Stale;
        }

        let reading = match self.normalizer.normalize(raw, block) {
            Ok(reading) => reading,
            Err(rejection) if rejection.is_filter() => {
                self.stats.filtered = self.stats.filtered.saturating_add(1);
                return Delivery::Filtered;
            }
            Err(rejection) => {
                self.stats.rejected = self.stats.rejected.saturating_add(1);
                return Delivery::Rejected(rejection);
            }
        };

        match self.series.append(reading) {
            AppendOutcome::Appended(snapshot) => {
                self.stats.appended = self.stats.appended.saturating_add(1);
                Delivery::Appended(snapshot)
            }
            AppendOutcome::Duplicate => {
                self.stats.duplicates = self.stats.duplicates.saturating_add(1);
                Delivery::Duplicate
            }
        }
    }

    /// Count a block lookup that failed for `ticket`'s session.
    ///
    /// Returns false (and counts nothing) for a stale ticket.
    pub fn record_dropped_lookup(&mut self, ticket: Ticket) -> bool {
        if !self.is_current(ticket) {
            return false;
        }
        self.stats.dropped_lookups = self.stats.dropped_lookups.saturating_add(1);
        true
    }

    fn invalid(&self, action: &'static str) -> SensorError {
        SensorError::InvalidTransition {
            action,
            state: self.state.name(),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::{BlockNumber, DeviceId, DisplayClock};

    fn make_lifecycle() -> Lifecycle {
        let normalizer =
            Normalizer::new(DeviceId::new("device-01").expect("id"), DisplayClock::utc());
        Lifecycle::new(normalizer, 16)
    }

    fn event(device: &str, block: u64, temperature: i64) -> (RawEvent, BlockMeta) {
        (
            RawEvent::new(device, temperature.to_string(), "6012", BlockNumber(block), 0),
            BlockMeta::new(BlockNumber(block), 1_700_000_000),
        )
    }

    fn activate(lifecycle: &mut Lifecycle) -> Ticket {
        let (ticket, _) = lifecycle.begin().expect("begin");
        lifecycle.activate(ticket).expect("activate");
        ticket
    }

    #[test]
    fn full_cycle() {
        let mut lifecycle = make_lifecycle();
        assert_eq!(lifecycle.state(), LifecycleState::Idle);

        let (ticket, snapshot) = lifecycle.begin().expect("begin");
        assert!(snapshot.is_empty());
        assert_eq!(lifecycle.state(), LifecycleState::Subscribing(ticket.session()));

        lifecycle.activate(ticket).expect("activate");
        assert!(lifecycle.is_current(ticket));

        assert_eq!(lifecycle.tear_down(), Some(ticket));
        assert!(!lifecycle.is_current(ticket));

        lifecycle.finish_teardown(ticket).expect("finish");
        assert_eq!(lifecycle.state(), LifecycleState::Idle);
    }

    #[test]
    fn begin_while_active_is_rejected() {
        let mut lifecycle = make_lifecycle();
        activate(&mut lifecycle);
        assert!(matches!(
            lifecycle.begin(),
            Err(SensorError::InvalidTransition { action: "begin", state: "active" })
        ));
    }

    #[test]
    fn begin_from_tearing_down_supersedes() {
        let mut lifecycle = make_lifecycle();
        let old = activate(&mut lifecycle);
        lifecycle.tear_down();

        let (new, _) = lifecycle.begin().expect("begin");
        assert_ne!(old, new);
        assert!(lifecycle.finish_teardown(old).is_err());
    }

    #[test]
    fn activate_requires_matching_ticket() {
        let mut lifecycle = make_lifecycle();
        let (ticket, _) = lifecycle.begin().expect("begin");
        lifecycle.tear_down();
        assert!(lifecycle.activate(ticket).is_err());
    }

    #[test]
    fn tear_down_when_idle_is_none() {
        let mut lifecycle = make_lifecycle();
        assert_eq!(lifecycle.tear_down(), None);
    }

    #[test]
    fn deliver_appends_for_active_ticket() {
        let mut lifecycle = make_lifecycle();
        let ticket = activate(&mut lifecycle);
        let (raw, block) = event("device-01", 5, 2550);

        match lifecycle.deliver(ticket, &raw, &block) {
            Delivery::Appended(snapshot) => assert_eq!(snapshot.len(), 1),
            other => panic!("expected append, got {:?}", other),
        }
        assert_eq!(lifecycle.stats().appended, 1);
    }

    #[test]
    fn deliver_before_activation_is_stale() {
        let mut lifecycle = make_lifecycle();
        let (ticket, _) = lifecycle.begin().expect("begin");
        let (raw, block) = event("device-01", 5, 2550);

        assert_eq!(lifecycle.deliver(ticket, &raw, &block), Delivery::Stale);
        assert!(lifecycle.snapshot().is_empty());
    }

    #[test]
    fn stale_ticket_never_touches_new_series() {
        let mut lifecycle = make_lifecycle();
        let old = activate(&mut lifecycle);
        lifecycle.tear_down();
        lifecycle.finish_teardown(old).expect("finish");
        let _new = activate(&mut lifecycle);

        let (raw, block) = event("device-01", 5, 2550);
        assert_eq!(lifecycle.deliver(old, &raw, &block), Delivery::Stale);
        assert!(lifecycle.snapshot().is_empty());
        assert_eq!(lifecycle.stats().stale, 1);
    }

    #[test]
    fn duplicate_and_filter_outcomes() {
        let mut lifecycle = make_lifecycle();
        let ticket = activate(&mut lifecycle);
        let (raw, block) = event("device-01", 5, 2550);
        let (foreign, foreign_block) = event("device-02", 5, 2550);

        lifecycle.deliver(ticket, &raw, &block);
        assert_eq!(lifecycle.deliver(ticket, &raw, &block), Delivery::Duplicate);
        assert_eq!(
            lifecycle.deliver(ticket, &foreign, &foreign_block),
            Delivery::Filtered
        );

        let stats = lifecycle.stats();
        assert_eq!(stats.appended, 1);
        assert_eq!(stats.duplicates, 1);
        assert_eq!(stats.filtered, 1);
        assert_eq!(lifecycle.snapshot().len(), 1);
    }

    #[test]
    fn rejection_is_isolated() {
        let mut lifecycle = make_lifecycle();
        let ticket = activate(&mut lifecycle);
        let bad = RawEvent::new("device-01", "NaN", "6012", BlockNumber(5), 0);
        let block = BlockMeta::new(BlockNumber(5), 1_700_000_000);

        assert!(matches!(
            lifecycle.deliver(ticket, &bad, &block),
            Delivery::Rejected(Rejection::MalformedField { .. })
        ));

        let (raw, block) = event("device-01", 6, 2550);
        assert!(matches!(
            lifecycle.deliver(ticket, &raw, &block),
            Delivery::Appended(_)
        ));
        assert_eq!(lifecycle.stats().rejected, 1);
    }

    #[test]
    fn begin_resets_series_and_stats() {
        let mut lifecycle = make_lifecycle();
        let ticket = activate(&mut lifecycle);
        let (raw, block) = event("device-01", 5, 2550);
        lifecycle.deliver(ticket, &raw, &block);

        lifecycle.tear_down();
        lifecycle.finish_teardown(ticket).expect("finish");
        // Kept for display while idle.
        assert_eq!(lifecycle.snapshot().len(), 1);

        let (_, snapshot) = lifecycle.begin().expect("begin");
        assert!(snapshot.is_empty());
        assert_eq!(lifecycle.stats(), DeliveryStats::default());
    }

    #[test]
    fn dropped_lookup_counts_only_current() {
        let mut lifecycle = make_lifecycle();
        let ticket = activate(&mut lifecycle);
        assert!(lifecycle.record_dropped_lookup(ticket));
        lifecycle.tear_down();
        assert!(!lifecycle.record_dropped_lookup(ticket));
        assert_eq!(lifecycle.stats().dropped_lookups, 1);
    }

    #[test]
    fn state_display() {
        assert_eq!(LifecycleState::Idle.to_string(), "idle");
        assert_eq!(
            LifecycleState::Active(SessionId(3)).to_string(),
            "active (session 3)"
        );
    }
}
