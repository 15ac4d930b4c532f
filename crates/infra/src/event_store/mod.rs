//! Append-only event store boundary.
//!
//! One abstraction with two backends: an in-memory log for tests and
//! development, and Postgres for anything durable.

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use in_memory::InMemoryEventStore;
pub use postgres::PostgresEventStore;
pub use r#trait::{EventStore, EventStoreError, ResourceEvents};
