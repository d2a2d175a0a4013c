//! Shared types and boundary traits used across all clatter crates.

pub mod types;

pub use types::{Connector, InboundMessage, PluginRetVal};
