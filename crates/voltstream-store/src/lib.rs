//! # voltstream-store
//!
//! In-memory reference implementations of the durable-store traits and
//! the payment/notification collaborators. The production relational
//! store lives behind the same traits outside this workspace; these
//! back the binary's default wiring and the test suite.

pub mod collaborators;
pub mod memory;

pub use collaborators::{LoggingNotifier, LoggingPaymentProvider};
pub use memory::{InMemoryConnectorStore, InMemorySessionStore};
