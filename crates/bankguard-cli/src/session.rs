//! Wiring shared by every evaluating command.

use std::sync::Arc;

use anyhow::{Context, Result};
use bankguard_abac::{Authorizer, Clock, PolicyTable, SystemClock};
use bankguard_config::BankguardConfig;
use bankguard_store::InMemoryStore;
use tracing::debug;

/// A seeded store plus an authorizer configured from `BankguardConfig`.
pub struct Session {
    pub store: InMemoryStore,
    pub authorizer: Authorizer,
}

impl Session {
    pub fn open(config: &BankguardConfig) -> Result<Self> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        let store = match &config.store.seed_file {
            Some(path) => InMemoryStore::from_json_file(path)
                .with_context(|| format!("Failed to load seed file {}", path.display()))?,
            None => {
                debug!("No seed file configured; using demo fixtures");
                InMemoryStore::with_fixtures(clock.now())
            }
        };

        let table = PolicyTable::standard(config.policy.clone());
        let mut authorizer = Authorizer::new(table, clock);
        if !config.logging.audit {
            authorizer = authorizer.without_audit();
        }

        Ok(Self { store, authorizer })
    }
}
