use std::path::Path;
use std::sync::Arc;

use storage::progress_store::{FileProgressStore, InMemoryProgressStore, ProgressStore};
use storage::repository::Storage;

use crate::Clock;
use crate::catalog_service::CatalogService;
use crate::config::SessionConfig;
use crate::error::AppServicesError;
use crate::identity::IdentityService;
use crate::progress_service::ProgressService;
use crate::sessions::TestSessionService;

/// Assembles app-facing services over one storage backend and progress store.
#[derive(Clone)]
pub struct AppServices {
    sessions: Arc<TestSessionService>,
    progress: Arc<ProgressService>,
    catalog: Arc<CatalogService>,
    identity: IdentityService,
}

impl AppServices {
    #[must_use]
    pub fn new(
        storage: &Storage,
        progress_store: Arc<dyn ProgressStore>,
        clock: Clock,
        config: SessionConfig,
    ) -> Self {
        let sessions = Arc::new(
            TestSessionService::new(
                clock,
                Arc::clone(&storage.catalog),
                Arc::clone(&storage.attempts),
                Arc::clone(&progress_store),
            )
            .with_config(config),
        );
        let progress = Arc::new(ProgressService::new(
            Arc::clone(&storage.catalog),
            Arc::clone(&storage.attempts),
            Arc::clone(&storage.profiles),
            progress_store,
        ));
        let catalog = Arc::new(CatalogService::new(Arc::clone(&storage.catalog)));
        let identity = IdentityService::new(Arc::clone(&storage.profiles));

        Self {
            sessions,
            progress,
            catalog,
            identity,
        }
    }

    /// Build services backed by `SQLite` storage and a directory of saved progress.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if the database or progress directory
    /// cannot be opened.
    pub async fn new_sqlite(
        db_url: &str,
        progress_dir: &Path,
        clock: Clock,
        config: SessionConfig,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        let store = FileProgressStore::open(progress_dir).await?;
        Ok(Self::new(&storage, Arc::new(store), clock, config))
    }

    /// Fully in-memory wiring for tests and demos.
    #[must_use]
    pub fn in_memory(clock: Clock, config: SessionConfig) -> Self {
        Self::new(
            &Storage::in_memory(),
            Arc::new(InMemoryProgressStore::new()),
            clock,
            config,
        )
    }

    #[must_use]
    pub fn sessions(&self) -> Arc<TestSessionService> {
        Arc::clone(&self.sessions)
    }

    #[must_use]
    pub fn progress(&self) -> Arc<ProgressService> {
        Arc::clone(&self.progress)
    }

    #[must_use]
    pub fn catalog(&self) -> Arc<CatalogService> {
        Arc::clone(&self.catalog)
    }

    #[must_use]
    pub fn identity(&self) -> &IdentityService {
        &self.identity
    }
}
