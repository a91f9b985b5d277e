//! Stockage PostGIS : pool, provisioning, transaction et bulk load

pub mod loader;
pub mod pool;
pub mod schema;
pub mod transaction;

pub use loader::load;
pub use pool::{connect, create_pool, test_connection, DatabaseConfig, SslMode};
pub use schema::{provision, row_count, DEFAULT_TABLE};
pub use transaction::LoadTransaction;
