//! HTTP API over the explorer.
//!
//! - [`api`]: Application state, router and route handlers
//! - [`params`]: Query string parsing shared by the handlers
//! - [`error`]: Mapping of failures onto HTTP responses

pub mod api;
pub mod error;
pub mod params;

pub use api::{build_router, AppState};
pub use error::ApiError;
