//! Charging session entity and lifecycle types.

pub mod model;
pub mod status;
pub mod summary;

pub use model::{round_2dp, ProgressUpdate, Session};
pub use status::{SessionStatus, StopReason};
pub use summary::SessionSummary;
