//! sqlchat API crate - axum HTTP server and route handlers.
//!
//! Exposes the query pipeline over `POST /query`, a health check, and
//! read-only views of the conversation log.

pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::{create_router, start_server};
pub use state::AppState;
