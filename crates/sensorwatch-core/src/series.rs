//! # Series Module
//!
//! The ordered, de-duplicated accumulation of readings for one session.
//!
//! - Appends go strictly after the current last element
//! - Consumers only ever see immutable `SeriesSnapshot`s
//! - A bounded window of recent `DedupKey`s absorbs re-delivered events
//! - `reset` is the only way to shrink the series
//!
//! ## Storage
//!
//! Readings live in fixed-size chunks. A full chunk is sealed into an
//! `Arc<[Reading]>` and never touched again, so snapshots share every sealed
//! chunk with the accumulator. Publishing after an append copies at most one
//! open chunk plus the list of chunk pointers, never the whole series.

use crate::primitives::{DEFAULT_DEDUP_WINDOW, MAX_DEDUP_WINDOW};
use crate::{DedupKey, Reading, SessionId};
use std::collections::VecDeque;
use std::sync::Arc;

/// Readings per sealed chunk.
const CHUNK_LEN: usize = 64;

// =============================================================================
// CHUNKED STORAGE
// =============================================================================

#[derive(Debug, Clone, Default)]
struct Chunks {
    sealed: Arc<Vec<Arc<[Reading]>>>,
    open: Arc<Vec<Reading>>,
}

impl Chunks {
    fn len(&self) -> usize {
        self.sealed.len() * CHUNK_LEN + self.open.len()
    }

    fn push(&mut self, reading: Reading) {
        let open = Arc::make_mut(&mut self.open);
        open.push(reading);
        if open.len() == CHUNK_LEN {
            let full = std::mem::take(open);
            Arc::make_mut(&mut self.sealed).push(Arc::from(full));
        }
    }

    fn get(&self, index: usize) -> Option<&Reading> {
        let chunk = index / CHUNK_LEN;
        let offset = index % CHUNK_LEN;
        match self.sealed.get(chunk) {
            Some(sealed) => sealed.get(offset),
            None if chunk == self.sealed.len() => self.open.get(offset),
            None => None,
        }
    }

    fn last(&self) -> Option<&Reading> {
        self.open
            .last()
            .or_else(|| self.sealed.last().and_then(|chunk| chunk.last()))
    }

    fn iter(&self) -> impl DoubleEndedIterator<Item = &Reading> + '_ {
        self.sealed
            .iter()
            .flat_map(|chunk| chunk.iter())
            .chain(self.open.iter())
    }
}

// =============================================================================
// SNAPSHOT
// =============================================================================

/// Immutable view of the series at one point in time.
///
/// Cloning is cheap (shared chunks). The accumulator never writes into a
/// chunk a snapshot can see, so a snapshot never changes after it has been
/// handed out.
#[derive(Debug, Clone, Default)]
pub struct SeriesSnapshot {
    session: Option<SessionId>,
    revision: u64,
    readings: Chunks,
}

impl SeriesSnapshot {
    /// Session the readings belong to (`None` before the first connection).
    #[must_use]
    pub fn session(&self) -> Option<SessionId> {
        self.session
    }

    /// Number of accepted appends since the last reset.
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Reading at `index` in insertion (display) order.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Reading> {
        self.readings.get(index)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.readings.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn last(&self) -> Option<&Reading> {
        self.readings.last()
    }

    /// Readings in insertion (display) order.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Reading> + '_ {
        self.readings.iter()
    }
}

impl PartialEq for SeriesSnapshot {
    fn eq(&self, other: &Self) -> bool {
        self.session == other.session
            && self.revision == other.revision
            && self.len() == other.len()
            && self.iter().eq(other.iter())
    }
}

impl Eq for SeriesSnapshot {}

// =============================================================================
// ACCUMULATOR
// =============================================================================

/// Result of offering a reading to the accumulator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppendOutcome {
    /// The reading was appended; carries the new snapshot.
    Appended(SeriesSnapshot),
    /// The reading matched a recent entry and was dropped.
    Duplicate,
}

/// Owner of the series for the current session.
#[derive(Debug, Clone)]
pub struct SeriesAccumulator {
    session: Option<SessionId>,
    revision: u64,
    readings: Chunks,
    recent: VecDeque<DedupKey>,
    window: usize,
}

impl SeriesAccumulator {
    /// Create an empty accumulator with the default de-duplication window.
    #[must_use]
    pub fn new() -> Self {
        Self::with_window(DEFAULT_DEDUP_WINDOW)
    }

    /// Create an empty accumulator checking the last `window` appends.
    ///
    /// The window is clamped to `1..=MAX_DEDUP_WINDOW`.
    #[must_use]
    pub fn with_window(window: usize) -> Self {
        let window = window.clamp(1, MAX_DEDUP_WINDOW);
        Self {
            session: None,
            revision: 0,
            readings: Chunks::default(),
            recent: VecDeque::with_capacity(window),
            window,
        }
    }

    /// Size of the de-duplication window.
    #[must_use]
    pub fn window(&self) -> usize {
        self.window
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.readings.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append `reading` unless it duplicates a recent entry.
    pub fn append(&mut self, reading: Reading) -> AppendOutcome {
        let key = reading.dedup_key();
        if self.recent.contains(&key) {
            return AppendOutcome::Duplicate;
        }

        if self.recent.len() == self.window {
            self.recent.pop_front();
        }
        self.recent.push_back(key);

        self.readings.push(reading);
        self.revision = self.revision.saturating_add(1);

        AppendOutcome::Appended(self.snapshot())
    }

    /// Discard everything and start an empty series for `session`.
    pub fn reset(&mut self, session: SessionId) -> SeriesSnapshot {
        self.session = Some(session);
        self.revision = 0;
        self.readings = Chunks::default();
        self.recent.clear();
        self.snapshot()
    }

    /// Current state as an immutable snapshot.
    #[must_use]
    pub fn snapshot(&self) -> SeriesSnapshot {
        SeriesSnapshot {
            session: self.session,
            revision: self.revision,
            readings: self.readings.clone(),
        }
    }
}

impl Default for SeriesAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// TESTS
// =============================================================================
