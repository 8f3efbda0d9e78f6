//! HTTP API for the robot attribute registry.
//!
//! A thin Axum adapter over [`robotlog_store::Registry`]: handlers decode
//! requests, call one registry operation, and encode the result or an
//! [`ApiError`]. No domain logic lives here.

pub mod error;
pub mod handlers;
pub mod router;
pub mod server;
pub mod state;

pub use error::ApiError;
pub use router::build_router;
pub use server::{ServerError, start_server};
pub use state::AppState;
