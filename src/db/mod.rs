//! Database layer
//!
//! Storage for staff accounts, sessions, gallery events and blog posts.
//! It supports:
//! - SQLite (default, for single-binary deployment)
//! - MySQL (for hosted deployments)
//!
//! The database driver is selected based on configuration.
//!
//! # Usage
//!
//! ```ignore
//! use kaizen_admin::config::DatabaseConfig;
//! use kaizen_admin::db::{create_pool, migrations};
//!
//! let pool = create_pool(&DatabaseConfig::default()).await?;
//! migrations::run_migrations(&pool).await?;
//! pool.ping().await?;
//! ```

pub mod migrations;
pub mod pool;
pub mod repositories;

pub use pool::{
    create_pool, create_test_pool, Backend, DatabasePool, DynDatabasePool, MysqlDatabase,
    SqliteDatabase,
};
