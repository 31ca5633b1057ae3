//! Service container for dependency injection
//!
//! Wires up all services with their dependencies.

use std::sync::Arc;

use crate::application::services::{LedgerService, ReportService};
use crate::config::Settings;
use crate::infrastructure::traits::{JsonFileStore, LedgerStore};

/// Container holding all application services.
pub struct ServiceContainer {
    /// Application settings
    pub settings: Arc<Settings>,

    /// Ledger persistence
    pub store: Arc<dyn LedgerStore>,

    pub ledger: LedgerService,
    pub report: ReportService,
}

impl ServiceContainer {
    /// Create a new service container storing the ledger at `settings.data_file`.
    pub fn new(settings: Settings) -> Self {
        let store = Arc::new(JsonFileStore::new(settings.data_file.clone()));
        Self::with_store(settings, store)
    }

    /// Create a service container with a custom store (for testing).
    pub fn with_store(settings: Settings, store: Arc<dyn LedgerStore>) -> Self {
        let settings = Arc::new(settings);
        let ledger = LedgerService::new(Arc::clone(&store))
            .with_allocation_slack(settings.interest.allocation_slack);
        let report = ReportService::new(settings.layout.clone())
            .with_leaf_epsilon(settings.interest.leaf_epsilon);

        Self {
            settings,
            store,
            ledger,
            report,
        }
    }
}
