//! Repository implementations for SQLite storage

pub mod account;

pub use account::{SqliteAccountRepository, SqliteAccountTransaction};
