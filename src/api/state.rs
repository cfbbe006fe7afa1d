//! Application state for the meal benefit engine API.

use std::sync::Arc;

use crate::config::{ConfigLoader, RunConfig};
use crate::oracle::{CalendarResolver, ClassificationOracle};
use crate::pipeline::SnapshotStore;

/// Shared application state.
///
/// Holds the loaded run configuration, the oracle capabilities handed to
/// every run, and the store that receives stage snapshots. Each request gets
/// its own [`RunContext`](crate::pipeline::RunContext), so caches never leak
/// between runs.
#[derive(Clone)]
pub struct AppState {
    config: Arc<RunConfig>,
    oracle: Arc<dyn ClassificationOracle>,
    resolver: Arc<dyn CalendarResolver>,
    store: Arc<dyn SnapshotStore>,
}

impl AppState {
    /// Creates a new application state.
    pub fn new(
        config: ConfigLoader,
        oracle: Arc<dyn ClassificationOracle>,
        resolver: Arc<dyn CalendarResolver>,
        store: Arc<dyn SnapshotStore>,
    ) -> Self {
        Self {
            config: Arc::new(config.into_config()),
            oracle,
            resolver,
            store,
        }
    }

    /// Returns the shared run configuration.
    pub fn config(&self) -> Arc<RunConfig> {
        Arc::clone(&self.config)
    }

    /// Returns the classification oracle.
    pub fn oracle(&self) -> Arc<dyn ClassificationOracle> {
        Arc::clone(&self.oracle)
    }

    /// Returns the calendar resolver.
    pub fn resolver(&self) -> Arc<dyn CalendarResolver> {
        Arc::clone(&self.resolver)
    }

    /// Returns the snapshot store.
    pub fn store(&self) -> &dyn SnapshotStore {
        self.store.as_ref()
    }
}
