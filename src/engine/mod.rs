//! The wagering engine: event administration, placement, settlement and
//! profit review, sharing one pool and one configuration.

pub mod approval;
pub mod events;
pub mod placement;
pub mod settlement;

pub use approval::Approvals;
pub use events::EventAdmin;
pub use placement::Placement;
pub use settlement::Settlement;

use crate::config::Config;
use crate::error::Result;
use crate::ledger::Ledger;
use crate::store::{create_pool, run_migrations, DbPool};

/// All engine services wired onto one database.
#[derive(Clone)]
pub struct Engine {
    pub ledger: Ledger,
    pub events: EventAdmin,
    pub placement: Placement,
    pub settlement: Settlement,
    pub approvals: Approvals,
}

impl Engine {
    /// Open (or create) the database at `database_url`, run migrations,
    /// and wire up every service.
    pub fn open(database_url: &str, config: &Config) -> Result<Self> {
        config.validate()?;
        let pool = create_pool(database_url, &config.storage)?;
        run_migrations(&pool)?;
        Ok(Self::with_pool(pool, config))
    }

    /// Wire the services onto an existing pool. The pool is expected to be
    /// migrated already.
    #[must_use]
    pub fn with_pool(pool: DbPool, config: &Config) -> Self {
        let storage = config.storage.clone();
        Self {
            ledger: Ledger::new(pool.clone(), storage.clone()),
            events: EventAdmin::new(pool.clone(), storage.clone()),
            placement: Placement::new(pool.clone(), storage.clone(), config.betting.clone()),
            settlement: Settlement::new(pool.clone(), storage.clone()),
            approvals: Approvals::new(pool, storage),
        }
    }
}
