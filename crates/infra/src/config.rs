//! Infrastructure configuration loaded from environment variables.
//!
//! | variable | default |
//! |---|---|
//! | `WORKSHOP_DATABASE_URL` | unset: in-memory store |
//! | `WORKSHOP_MAX_COMMIT_ATTEMPTS` | `3` |
//! | `WORKSHOP_DB_MAX_CONNECTIONS` | `5` |

use std::sync::Arc;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::event_store::{EventStore, InMemoryEventStore, PostgresEventStore};

pub const DATABASE_URL: &str = "WORKSHOP_DATABASE_URL";
pub const MAX_COMMIT_ATTEMPTS: &str = "WORKSHOP_MAX_COMMIT_ATTEMPTS";
pub const DB_MAX_CONNECTIONS: &str = "WORKSHOP_DB_MAX_CONNECTIONS";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfraConfig {
    /// Postgres connection URL. `None` selects the in-memory store.
    pub database_url: Option<String>,
    /// Upper bound on re-read/re-decide/re-commit attempts per command.
    pub max_commit_attempts: u32,
    pub db_max_connections: u32,
}

impl Default for InfraConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            max_commit_attempts: 3,
            db_max_connections: 5,
        }
    }
}

impl InfraConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let max_commit_attempts = match get(MAX_COMMIT_ATTEMPTS) {
            Some(raw) => parse_positive(&raw).with_context(|| format!("invalid {MAX_COMMIT_ATTEMPTS}"))?,
            None => defaults.max_commit_attempts,
        };
        let db_max_connections = match get(DB_MAX_CONNECTIONS) {
            Some(raw) => parse_positive(&raw).with_context(|| format!("invalid {DB_MAX_CONNECTIONS}"))?,
            None => defaults.db_max_connections,
        };

        Ok(Self {
            database_url: get(DATABASE_URL),
            max_commit_attempts,
            db_max_connections,
        })
    }

    /// Open the configured backend. Postgres schemas are migrated on connect.
    pub async fn connect_store(&self) -> anyhow::Result<Arc<dyn EventStore>> {
        match &self.database_url {
            Some(url) => {
                let store = PostgresEventStore::connect(url, self.db_max_connections)
                    .await
                    .context("connecting to the event database")?;
                store.migrate().await.context("migrating the event database")?;
                info!(max_connections = self.db_max_connections, "using postgres event store");
                Ok(Arc::new(store))
            }
            None => {
                info!("using in-memory event store");
                Ok(Arc::new(InMemoryEventStore::new()))
            }
        }
    }
}

fn parse_positive(raw: &str) -> anyhow::Result<u32> {
    let value: u32 = raw.parse().with_context(|| format!("'{raw}' is not a number"))?;
    anyhow::ensure!(value > 0, "must be at least 1");
    Ok(value)
}
