//! sqlchat storage crate - SQLite conversation log and dataset executor.
//!
//! Provides connection management over a single SQLite file, versioned
//! migrations for the conversation tables, the append-only
//! [`ConversationStore`], and the read-only [`QueryExecutor`] that runs
//! validated statements against the dataset tables.

pub mod conversation;
pub mod db;
pub mod executor;
pub mod migrations;

pub use conversation::ConversationStore;
pub use db::Database;
pub use executor::QueryExecutor;
