//! Data layer module
//!
//! Handles all data persistence:
//! - SQLite database operations
//! - User model and its status/type codes

mod database;
mod models;

pub use database::Database;
pub use models::*;

#[cfg(test)]
mod database_test;
