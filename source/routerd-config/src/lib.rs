//! YAML routing configuration for the endpoint router daemon.
//!
//! A configuration document describes a set of named ports, each pairing a
//! publisher and a subscriber endpoint, plus the forwarding rules that decide
//! which ports a message read on one port is copied to. [`loader::load`]
//! parses a document and resolves every rule's destination port name into a
//! [`model::PortId`] before handing the graph to the daemon; no partially
//! resolved configuration ever escapes this crate.

pub mod error;
pub mod loader;
pub mod model;
pub mod print;

pub use error::ConfigError;
pub use loader::{load, load_str};
pub use model::{Filter, FilterAction, ForwardingRule, Port, PortId, RouterConfig};
