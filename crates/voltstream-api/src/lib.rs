//! # voltstream-api
//!
//! The axum surface: REST handlers for the session lifecycle and a
//! WebSocket endpoint that maps subscribe/unsubscribe frames onto the
//! real-time broadcaster.

pub mod error;
pub mod handlers;
pub mod router;
pub mod state;

pub use router::build_router;
pub use state::AppState;
