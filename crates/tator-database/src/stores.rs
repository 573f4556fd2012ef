//! The set of stores a process runs against, chosen by configuration.

use std::sync::Arc;

use tracing::info;

use tator_core::config::DatabaseConfig;
use tator_core::error::AppError;
use tator_core::result::AppResult;

use crate::connection::DatabasePool;
use crate::memory::{MemoryAlgorithmStore, MemoryJobStore, MemoryMembershipStore};
use crate::migration::run_migrations;
use crate::repositories::{PgAlgorithmRepository, PgJobRepository, PgMembershipRepository};
use crate::store::{AlgorithmStore, JobStore, MembershipStore};

/// Job, algorithm, and membership stores sharing one backend.
#[derive(Debug, Clone)]
pub struct Stores {
    /// Pool behind the PostgreSQL stores; `None` for in-memory stores.
    pub pool: Option<DatabasePool>,
    /// Job queue table.
    pub jobs: Arc<dyn JobStore>,
    /// Registered algorithms.
    pub algorithms: Arc<dyn AlgorithmStore>,
    /// Project memberships.
    pub memberships: Arc<dyn MembershipStore>,
}

impl Stores {
    /// Connect the backend named by `config.provider`. With
    /// `run_pending_migrations` the PostgreSQL schema is brought up to date
    /// first.
    pub async fn from_config(
        config: &DatabaseConfig,
        run_pending_migrations: bool,
    ) -> AppResult<Self> {
        match config.provider.as_str() {
            "postgres" => {
                let pool = DatabasePool::connect(config).await?;
                if run_pending_migrations {
                    run_migrations(pool.pool()).await?;
                }
                Ok(Self::postgres(pool))
            }
            "memory" => {
                info!("Using in-memory stores");
                Ok(Self::in_memory())
            }
            other => Err(AppError::configuration(format!(
                "Unknown database provider: '{other}'. Supported: postgres, memory"
            ))),
        }
    }

    /// PostgreSQL-backed stores on `pool`.
    pub fn postgres(pool: DatabasePool) -> Self {
        let pg = pool.pool().clone();
        Self {
            jobs: Arc::new(PgJobRepository::new(pg.clone())),
            algorithms: Arc::new(PgAlgorithmRepository::new(pg.clone())),
            memberships: Arc::new(PgMembershipRepository::new(pg)),
            pool: Some(pool),
        }
    }

    /// Fresh, empty in-memory stores.
    pub fn in_memory() -> Self {
        Self {
            pool: None,
            jobs: Arc::new(MemoryJobStore::new()),
            algorithms: Arc::new(MemoryAlgorithmStore::new()),
            memberships: Arc::new(MemoryMembershipStore::new()),
        }
    }
}
