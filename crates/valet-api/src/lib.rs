//! Valet API crate - axum HTTP server and route handlers.
//!
//! Exposes the action engine over REST: plan submission, approval and
//! rejection, undo, autonomy settings, and the in-app notification feed.
//! Callers are internal services; they authenticate with a bearer token
//! and name the acting user in an `X-User-Id` header.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::{create_router, start_server};
pub use state::AppState;
