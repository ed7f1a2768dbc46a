//! Interfaces to external collaborators.
//!
//! The core consumes storage, payment, and notification through these
//! narrow traits and has no compile-time knowledge of the technology
//! behind them. Entity-specific store traits are defined next to their
//! consumers; this module holds the collaborator interfaces that only
//! need primitive types.

pub mod notifier;
pub mod payment;

pub use notifier::Notifier;
pub use payment::PaymentProvider;
