//! SQLite persistence via Diesel: connection pooling, schema, row models,
//! and the isolated-unit-of-work helper all services build on.

pub mod connection;
pub mod model;
pub mod schema;
pub mod tx;

pub use connection::{create_pool, run_migrations, DbPool};
pub use tx::with_immediate_tx;
