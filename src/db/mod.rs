//! Database layer
//!
//! SQLite (default, single-file deployment) or MySQL, selected by
//! configuration. Holds the relational `news` table and the `documents`
//! table behind the SQL document store.
//!
//! ```ignore
//! use kode_news::db::{create_pool, migrations};
//!
//! let pool = create_pool(&config.database).await?;
//! migrations::run_migrations(&pool).await?;
//! ```

pub mod migrations;
pub mod pool;
pub mod repositories;

pub use pool::{
    create_pool, create_test_pool, DatabasePool, DynDatabasePool, MysqlDatabase, SqliteDatabase,
};
