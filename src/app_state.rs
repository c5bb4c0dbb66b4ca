use std::sync::Arc;

use crate::{
    config::Config,
    error::AppResult,
    infrastructure::{
        middleware::HasIdentityProvider, IdentityProvider, ThreadDatabase, TrustedHeaderIdentity,
    },
    services::ThreadService,
};

#[derive(Clone)]
pub struct AppState {
    pub service: ThreadService,
    pub database: Arc<ThreadDatabase>,
    pub identity: Arc<dyn IdentityProvider>,
    pub config: Config,
}

impl AppState {
    pub async fn new(config: Config) -> AppResult<Self> {
        let database =
            ThreadDatabase::new(&config.database.url, config.database.max_connections).await?;
        database.init().await?;
        Ok(Self::from_database(Arc::new(database), config))
    }

    /// Fresh in-memory database with default limits and header-based identity.
    pub async fn in_memory() -> AppResult<Self> {
        let database = ThreadDatabase::new_in_memory().await?;
        Ok(Self::from_database(Arc::new(database), Config::in_memory()))
    }

    pub fn from_database(database: Arc<ThreadDatabase>, config: Config) -> Self {
        Self {
            service: ThreadService::new(database.clone(), &config),
            database,
            identity: Arc::new(TrustedHeaderIdentity),
            config,
        }
    }

    pub fn with_identity(mut self, identity: Arc<dyn IdentityProvider>) -> Self {
        self.identity = identity;
        self
    }
}

impl HasIdentityProvider for AppState {
    fn identity_provider(&self) -> &Arc<dyn IdentityProvider> {
        &self.identity
    }
}
