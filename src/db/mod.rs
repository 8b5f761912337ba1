//! Database layer
//!
//! SQLite (default, single-file deployment) and MySQL behind the
//! `DatabasePool` trait, code-based migrations, and one repository per
//! aggregate in [`repositories`].

pub mod migrations;
pub mod pool;
pub mod repositories;

pub use pool::{
    create_pool, create_test_pool, is_unique_violation, Backend, DatabasePool, DynDatabasePool,
    MysqlDatabase, SqliteDatabase,
};
