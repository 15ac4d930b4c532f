//! Incremental projection runner.
//!
//! Read models are **disposable**; events are the source of truth.
//! The runner owns one materialized state and advances it one committed event
//! at a time, remembering every store position it has applied so redelivered
//! events are skipped instead of applied twice.
//!
//! Positions are not required to arrive in order. Events on different
//! resources may be delivered in any interleaving, and a store may make a lower
//! position visible after a higher one. Projections run here must therefore
//! depend only on the relative order of events within one resource.

use std::collections::BTreeSet;

use crate::{Projection, RecordedEvent};

/// Tracks how far a projection has been advanced.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ProjectionCursor {
    last_position: u64,
    applied: u64,
}

impl ProjectionCursor {
    /// Highest position applied so far. Lower positions may still be pending.
    pub fn last_position(&self) -> u64 {
        self.last_position
    }

    /// Number of events applied (handled or not).
    pub fn applied(&self) -> u64 {
        self.applied
    }
}

/// What happened when an event was offered to the runner.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Advance {
    Applied,
    /// An event at this position was applied before.
    AlreadySeen,
}

/// Runs events through a projection and tracks progress.
pub struct ProjectionRunner<P>
where
    P: Projection,
{
    state: P::State,
    cursor: Option<ProjectionCursor>,
    seen: BTreeSet<u64>,
}

impl<P> Default for ProjectionRunner<P>
where
    P: Projection,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<P> ProjectionRunner<P>
where
    P: Projection,
{
    pub fn new() -> Self {
        Self {
            state: P::State::default(),
            cursor: None,
            seen: BTreeSet::new(),
        }
    }

    pub fn state(&self) -> &P::State {
        &self.state
    }

    pub fn into_state(self) -> P::State {
        self.state
    }

    /// Current cursor (if any events were applied).
    pub fn cursor(&self) -> Option<ProjectionCursor> {
        self.cursor
    }

    /// Whether the event at `position` has been applied.
    pub fn has_applied(&self, position: u64) -> bool {
        self.seen.contains(&position)
    }

    /// Apply a single event unless its position was already applied.
    pub fn apply(&mut self, event: &RecordedEvent) -> Advance {
        if !self.seen.insert(event.position) {
            return Advance::AlreadySeen;
        }

        P::advance(&mut self.state, event);
        let (last_position, applied) = match self.cursor {
            Some(c) => (c.last_position.max(event.position), c.applied + 1),
            None => (event.position, 1),
        };
        self.cursor = Some(ProjectionCursor {
            last_position,
            applied,
        });
        Advance::Applied
    }

    /// Apply many events in order.
    pub fn run<'a>(&mut self, events: impl IntoIterator<Item = &'a RecordedEvent>) {
        for event in events {
            self.apply(event);
        }
    }

    /// Rebuild from scratch by replaying the full event history.
    pub fn rebuild_from_scratch<'a>(events: impl IntoIterator<Item = &'a RecordedEvent>) -> Self {
        let mut runner = Self::new();
        runner.run(events);
        runner
    }
}
