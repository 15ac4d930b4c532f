//! Command execution pipeline.
//!
//! ```text
//! raw input
//!   ↓  Command::decode              (validation failure → DispatchError::Validation)
//! command
//!   ↓  EventStore::get_resource_events(command.resource())
//! history + version
//!   ↓  Command::process              (None → Outcome::NoNewEvent)
//! event
//!   ↓  EventStore::commit_event(resource, version)
//! Outcome::Committed
//! ```
//!
//! `apply_to_resource` does not check authorization; callers run
//! `Command::is_authorized` first, or use [`CommandDispatcher::apply_authorized`]
//! which does both. Conflicts are returned as-is. The only retry strategy is
//! the re-read/re-decide/re-commit loop in [`CommandDispatcher::apply_with_retry`].

use std::time::Duration;

use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use workshop_core::{Actor, DomainError, ValidationError};
use workshop_events::{Command, RecordedEvent, UncommittedEvent, payloads};

use crate::config::InfraConfig;
use crate::event_store::{EventStore, EventStoreError};

/// Successful result of applying a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The decision function found nothing to record. Not an error.
    NoNewEvent,
    Committed(RecordedEvent),
}

impl Outcome {
    pub fn is_no_op(&self) -> bool {
        matches!(self, Outcome::NoNewEvent)
    }

    pub fn committed(&self) -> Option<&RecordedEvent> {
        match self {
            Outcome::Committed(e) => Some(e),
            Outcome::NoNewEvent => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum DispatchError {
    /// Input failed to decode. Never committed.
    #[error("validation failed: {0}")]
    Validation(ValidationError),

    /// The actor may not run this command.
    #[error("unauthorized")]
    Unauthorized,

    /// The resource changed since it was read.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Persisted data could not be decoded.
    #[error("corrupt event data: {0}")]
    Corrupt(String),

    /// Any other store failure.
    #[error("event store failure: {0}")]
    Store(EventStoreError),
}

impl DispatchError {
    /// Whether re-reading and re-deciding may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            DispatchError::Conflict(_) => true,
            DispatchError::Store(e) => e.is_retryable(),
            _ => false,
        }
    }
}

impl From<EventStoreError> for DispatchError {
    fn from(value: EventStoreError) -> Self {
        match value {
            EventStoreError::Conflict { .. } => DispatchError::Conflict(value.to_string()),
            EventStoreError::Corrupt(msg) => DispatchError::Corrupt(msg),
            other => DispatchError::Store(other),
        }
    }
}

impl From<ValidationError> for DispatchError {
    fn from(value: ValidationError) -> Self {
        DispatchError::Validation(value)
    }
}

impl From<DomainError> for DispatchError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(v) => DispatchError::Validation(v),
            DomainError::InvalidId(msg) => DispatchError::Validation(ValidationError::single("id", msg)),
            DomainError::Conflict(msg) => DispatchError::Conflict(msg),
            DomainError::Unauthorized => DispatchError::Unauthorized,
        }
    }
}

/// Load the command's resource, decide, and commit at most one event.
///
/// Authorization is the caller's responsibility.
#[instrument(
    skip(store, command, actor),
    fields(command = C::NAME, resource = %command.resource()),
    err
)]
pub async fn apply_to_resource<S, C>(
    store: &S,
    command: &C,
    actor: &Actor,
) -> Result<Outcome, DispatchError>
where
    S: EventStore + ?Sized,
    C: Command,
{
    let resource = command.resource();
    let loaded = store.get_resource_events(&resource).await?;
    let history = loaded.payloads();

    let Some(event) = command.process(actor, &history) else {
        debug!(version = %loaded.version, "no new event raised");
        return Ok(Outcome::NoNewEvent);
    };

    let recorded = store
        .commit_event(&resource, loaded.version, UncommittedEvent::new(actor.clone(), event))
        .await?;

    info!(
        event_type = recorded.event.event_type().as_str(),
        version = recorded.version,
        "event committed"
    );
    Ok(Outcome::Committed(recorded))
}

/// Reusable command engine bound to one store.
#[derive(Debug, Clone)]
pub struct CommandDispatcher<S> {
    store: S,
    max_attempts: u32,
    backoff: Duration,
}

impl<S> CommandDispatcher<S> {
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
    pub const DEFAULT_BACKOFF: Duration = Duration::from_millis(50);

    pub fn new(store: S) -> Self {
        Self {
            store,
            max_attempts: Self::DEFAULT_MAX_ATTEMPTS,
            backoff: Self::DEFAULT_BACKOFF,
        }
    }

    pub fn from_config(store: S, config: &InfraConfig) -> Self {
        Self::new(store).with_max_attempts(config.max_commit_attempts)
    }

    /// Attempts are clamped to at least one.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Base delay before retrying an unavailable store; grows linearly per attempt.
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn into_inner(self) -> S {
        self.store
    }
}

impl<S> CommandDispatcher<S>
where
    S: EventStore,
{
    /// See [`apply_to_resource`].
    pub async fn apply_to_resource<C: Command>(
        &self,
        command: &C,
        actor: &Actor,
    ) -> Result<Outcome, DispatchError> {
        apply_to_resource(&self.store, command, actor).await
    }

    /// Decode untrusted input, then apply. Authorization is still the caller's.
    pub async fn decode_and_apply<C: Command>(
        &self,
        input: &JsonValue,
        actor: &Actor,
    ) -> Result<Outcome, DispatchError> {
        let command = C::decode(input)?;
        self.apply_to_resource(&command, actor).await
    }

    /// Check `is_authorized` against the full log before applying.
    #[instrument(skip(self, command, actor), fields(command = C::NAME), err)]
    pub async fn apply_authorized<C: Command>(
        &self,
        command: &C,
        actor: &Actor,
    ) -> Result<Outcome, DispatchError> {
        let all = self.store.get_all_events().await?;
        if !command.is_authorized(actor, &payloads(&all)) {
            warn!(?actor, "actor not authorized");
            return Err(DispatchError::Unauthorized);
        }
        self.apply_to_resource(command, actor).await
    }

    /// Apply, re-reading and re-deciding after conflicts or store outages.
    ///
    /// Conflicts retry immediately; an unavailable store waits `backoff * attempt`
    /// first. Anything else, or the last attempt's failure, is returned.
    #[instrument(skip(self, command, actor), fields(command = C::NAME), err)]
    pub async fn apply_with_retry<C: Command>(
        &self,
        command: &C,
        actor: &Actor,
    ) -> Result<Outcome, DispatchError> {
        let mut attempt = 1;
        loop {
            match self.apply_to_resource(command, actor).await {
                Err(err) if err.is_retryable() && attempt < self.max_attempts => {
                    warn!(attempt, error = %err, "retrying command");
                    if !matches!(err, DispatchError::Conflict(_)) {
                        tokio::time::sleep(self.backoff * attempt).await;
                    }
                    attempt += 1;
                }
                result => return result,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use serde_json::json;

    use workshop_commands::{AddOwner, CreateArea, DeclareSuperUser, RemoveOwner};
    use workshop_core::{AreaId, EmailAddress, MemberNumber, Resource, ResourceVersion};
    use workshop_events::{DomainEvent, SuperUserDeclared};

    use crate::event_store::{InMemoryEventStore, ResourceEvents};

    fn member(n: u64) -> MemberNumber {
        MemberNumber::new(n)
    }

    fn user(n: u64) -> Actor {
        Actor::user(member(n), EmailAddress::parse(&format!("m{n}@example.com")).unwrap())
    }

    #[tokio::test]
    async fn creating_the_same_area_twice_is_a_no_op() {
        let dispatcher = CommandDispatcher::new(InMemoryEventStore::new());
        let cmd = CreateArea {
            id: AreaId::new(),
            name: "Metal shop".into(),
        };

        let first = dispatcher.apply_to_resource(&cmd, &Actor::admin_token()).await.unwrap();
        let second = dispatcher.apply_to_resource(&cmd, &Actor::admin_token()).await.unwrap();

        assert!(matches!(first, Outcome::Committed(_)));
        assert_eq!(second, Outcome::NoNewEvent);
        assert_eq!(dispatcher.store().len(), 1);
    }

    #[tokio::test]
    async fn owner_can_be_re_added_after_removal() {
        let dispatcher = CommandDispatcher::new(InMemoryEventStore::new());
        let admin = Actor::admin_token();
        let area_id = AreaId::new();
        let add = AddOwner {
            area_id,
            member_number: member(5),
        };
        let remove = RemoveOwner {
            area_id,
            member_number: member(5),
        };

        dispatcher
            .apply_to_resource(&CreateArea { id: area_id, name: "Textiles".into() }, &admin)
            .await
            .unwrap();
        assert!(!dispatcher.apply_to_resource(&add, &admin).await.unwrap().is_no_op());
        assert!(!dispatcher.apply_to_resource(&remove, &admin).await.unwrap().is_no_op());

        let readded = dispatcher.apply_to_resource(&add, &admin).await.unwrap();
        let recorded = readded.committed().unwrap();
        assert_eq!(recorded.version, 4);
        assert!(matches!(recorded.event, DomainEvent::OwnerAdded(_)));

        assert!(dispatcher.apply_to_resource(&add, &admin).await.unwrap().is_no_op());
    }

    #[tokio::test]
    async fn commits_against_the_same_snapshot_yield_one_conflict() {
        let store = InMemoryEventStore::new();
        let resource = Resource::super_user(member(3));
        let snapshot = store.get_resource_events(&resource).await.unwrap();
        let event = || {
            UncommittedEvent::new(
                Actor::admin_token(),
                DomainEvent::SuperUserDeclared(SuperUserDeclared { member_number: member(3) }),
            )
        };

        let (a, b) = tokio::join!(
            store.commit_event(&resource, snapshot.version, event()),
            store.commit_event(&resource, snapshot.version, event()),
        );

        let results = [a, b];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert_eq!(
            results
                .iter()
                .filter(|r| matches!(r, Err(EventStoreError::Conflict { .. })))
                .count(),
            1
        );
        let loaded = store.get_resource_events(&resource).await.unwrap();
        assert_eq!(loaded.version, ResourceVersion::Committed(1));
    }

    #[tokio::test]
    async fn invalid_input_reports_fields_and_writes_nothing() {
        let dispatcher = CommandDispatcher::new(InMemoryEventStore::new());
        let err = dispatcher
            .decode_and_apply::<CreateArea>(&json!({ "id": "not-a-uuid" }), &Actor::admin_token())
            .await
            .unwrap_err();

        match err {
            DispatchError::Validation(v) => assert_eq!(v.field_names(), vec!["id", "name"]),
            other => panic!("expected validation failure, got {other:?}"),
        }
        assert!(dispatcher.store().is_empty());
    }

    #[tokio::test]
    async fn decoded_input_is_applied() {
        let dispatcher = CommandDispatcher::new(InMemoryEventStore::new());
        let outcome = dispatcher
            .decode_and_apply::<DeclareSuperUser>(&json!({ "memberNumber": 12 }), &Actor::admin_token())
            .await
            .unwrap();
        assert!(outcome.committed().is_some());
    }

    #[tokio::test]
    async fn authorized_variant_rejects_before_committing() {
        let dispatcher = CommandDispatcher::new(InMemoryEventStore::new());
        let cmd = DeclareSuperUser { member_number: member(2) };

        let err = dispatcher.apply_authorized(&cmd, &user(1)).await.unwrap_err();
        assert!(matches!(err, DispatchError::Unauthorized));
        assert!(dispatcher.store().is_empty());

        dispatcher
            .apply_authorized(&DeclareSuperUser { member_number: member(1) }, &Actor::admin_token())
            .await
            .unwrap();
        let outcome = dispatcher.apply_authorized(&cmd, &user(1)).await.unwrap();
        assert!(outcome.committed().is_some());
    }

    enum Fault {
        Unavailable,
        Corrupt,
        StaleVersion,
        /// Commit this event first, so the caller's commit races and loses.
        Interleave(UncommittedEvent),
    }

    #[derive(Default)]
    struct ScriptedStore {
        inner: InMemoryEventStore,
        script: Mutex<VecDeque<Fault>>,
        commits: AtomicUsize,
    }

    impl ScriptedStore {
        fn with_faults(faults: impl IntoIterator<Item = Fault>) -> Self {
            Self {
                script: Mutex::new(faults.into_iter().collect()),
                ..Self::default()
            }
        }
    }

    #[async_trait]
    impl EventStore for ScriptedStore {
        async fn get_resource_events(&self, resource: &Resource) -> Result<ResourceEvents, EventStoreError> {
            self.inner.get_resource_events(resource).await
        }

        async fn commit_event(
            &self,
            resource: &Resource,
            expected: ResourceVersion,
            event: UncommittedEvent,
        ) -> Result<RecordedEvent, EventStoreError> {
            self.commits.fetch_add(1, Ordering::SeqCst);
            let fault = self.script.lock().unwrap().pop_front();
            match fault {
                None => self.inner.commit_event(resource, expected, event).await,
                Some(Fault::Unavailable) => Err(EventStoreError::Unavailable("connection reset".into())),
                Some(Fault::Corrupt) => Err(EventStoreError::Corrupt("bad row".into())),
                Some(Fault::StaleVersion) => Err(EventStoreError::Conflict {
                    resource: resource.clone(),
                    expected,
                    actual: ResourceVersion::from_event_count(expected.next()),
                }),
                Some(Fault::Interleave(competing)) => {
                    self.inner.commit_event(resource, expected, competing).await?;
                    self.inner.commit_event(resource, expected, event).await
                }
            }
        }

        async fn get_all_events(&self) -> Result<Vec<RecordedEvent>, EventStoreError> {
            self.inner.get_all_events().await
        }
    }

    #[tokio::test]
    async fn retry_re_decides_after_losing_a_race() {
        let competing = UncommittedEvent::new(
            Actor::System,
            DomainEvent::SuperUserDeclared(SuperUserDeclared { member_number: member(8) }),
        );
        let dispatcher = CommandDispatcher::new(ScriptedStore::with_faults([Fault::Interleave(competing)]));
        let cmd = DeclareSuperUser { member_number: member(8) };

        let err = dispatcher.apply_to_resource(&cmd, &Actor::admin_token()).await;
        assert!(matches!(err, Err(DispatchError::Conflict(_))));

        // The winner already declared member 8; a second pass sees that and stops.
        let dispatcher = CommandDispatcher::new(ScriptedStore::with_faults([Fault::Interleave(
            UncommittedEvent::new(
                Actor::System,
                DomainEvent::SuperUserDeclared(SuperUserDeclared { member_number: member(8) }),
            ),
        )]));
        let outcome = dispatcher.apply_with_retry(&cmd, &Actor::admin_token()).await.unwrap();
        assert_eq!(outcome, Outcome::NoNewEvent);
        assert_eq!(dispatcher.store().commits.load(Ordering::SeqCst), 1);
        assert_eq!(dispatcher.store().inner.len(), 1);
    }

    #[tokio::test]
    async fn retry_gives_up_after_max_attempts() {
        workshop_observability::init_for_tests();
        let store = ScriptedStore::with_faults([Fault::StaleVersion, Fault::StaleVersion, Fault::StaleVersion]);
        let dispatcher = CommandDispatcher::new(store).with_max_attempts(3);
        let cmd = DeclareSuperUser { member_number: member(4) };

        let err = dispatcher.apply_with_retry(&cmd, &Actor::admin_token()).await.unwrap_err();
        assert!(matches!(err, DispatchError::Conflict(_)));
        assert_eq!(dispatcher.store().commits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn unavailable_store_is_retried_after_backoff() {
        workshop_observability::init_for_tests();
        let store = ScriptedStore::with_faults([Fault::Unavailable]);
        let dispatcher = CommandDispatcher::new(store).with_backoff(Duration::from_millis(1));
        let cmd = DeclareSuperUser { member_number: member(4) };

        let outcome = dispatcher.apply_with_retry(&cmd, &Actor::admin_token()).await.unwrap();
        assert!(outcome.committed().is_some());
        assert_eq!(dispatcher.store().commits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn corrupt_data_is_not_retried() {
        let store = ScriptedStore::with_faults([Fault::Corrupt]);
        let dispatcher = CommandDispatcher::new(store);
        let cmd = DeclareSuperUser { member_number: member(4) };

        let err = dispatcher.apply_with_retry(&cmd, &Actor::admin_token()).await.unwrap_err();
        assert!(matches!(err, DispatchError::Corrupt(_)));
        assert!(!err.is_retryable());
        assert_eq!(dispatcher.store().commits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn max_attempts_is_at_least_one() {
        let dispatcher = CommandDispatcher::new(InMemoryEventStore::new()).with_max_attempts(0);
        assert_eq!(dispatcher.max_attempts(), 1);
    }
}
