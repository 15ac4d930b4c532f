use crate::{DomainEvent, RecordedEvent};

/// A read model derived by folding events.
///
/// A projection declares the events it cares about (`handles`), an empty
/// state (`Default`) and a reducer. The same reducer serves both folding modes:
///
/// - **Full replay** (`replay`): fold a complete ordered sequence from scratch.
/// - **Incremental** (`advance`): apply one new event to an existing state.
///
/// Folding incrementally one event at a time must produce the same state as
/// replaying the whole sequence at once. Reducers therefore depend only on
/// the state and the event; no clocks, no lookups.
///
/// Events the projection does not handle are skipped, never an error. Read
/// models are disposable and can always be rebuilt from the log.
pub trait Projection {
    type State: Default;

    fn handles(event: &DomainEvent) -> bool;

    fn reduce(state: &mut Self::State, event: &RecordedEvent);

    /// Apply a single event if the projection handles it.
    fn advance(state: &mut Self::State, event: &RecordedEvent) {
        if Self::handles(&event.event) {
            Self::reduce(state, event);
        }
    }

    /// Build a fresh state from an ordered event sequence.
    fn replay<'a>(events: impl IntoIterator<Item = &'a RecordedEvent>) -> Self::State {
        let mut state = Self::State::default();
        for event in events {
            Self::advance(&mut state, event);
        }
        state
    }
}
