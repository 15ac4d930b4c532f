//! Infrastructure layer: event storage, the command engine, read models,
//! ingestion and configuration.

pub mod command_dispatcher;
pub mod config;
pub mod event_store;
pub mod ingest;
pub mod projections;

pub use command_dispatcher::{CommandDispatcher, DispatchError, Outcome, apply_to_resource};
pub use config::InfraConfig;
pub use event_store::{EventStore, EventStoreError, InMemoryEventStore, PostgresEventStore, ResourceEvents};
pub use ingest::{QuizRow, SyncReport, SyncState, sync_quiz_results};
pub use projections::SharedState;
