//! A single-threaded message router between endpoint pub/sub pairs.
//!
//! The daemon loads a YAML description of named ports and forwarding rules
//! (see [`routerd_config`]), binds a publisher and a subscriber endpoint per
//! port, compiles the rules of each port into a read-only dispatch cache
//! keyed by a minimal perfect hash over message prefixes, then moves bytes
//! until a signal stops it. Everything runs cooperatively on one
//! current-thread tokio runtime; a publisher that will not accept a write
//! drops the message and the dropped bytes are counted, so a slow consumer
//! can never stall the producing port.

pub mod app_context;
pub mod cli;
pub mod dispatch;
pub mod endpoint;
pub mod framing;
pub mod metrics;
pub mod mph;
pub mod router;
pub mod rules;
