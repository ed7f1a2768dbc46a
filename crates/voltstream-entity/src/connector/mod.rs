//! Connector entity.

pub mod model;

pub use model::{Connector, ConnectorStatus};
