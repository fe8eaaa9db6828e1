pub mod config;
pub mod error;
pub mod safety;
pub mod types;

pub use config::SqlchatConfig;
pub use error::{Result, SqlchatError};
pub use safety::{validate, SafeSql, UnsafeQuery};
pub use types::*;
