//! Endpoint seams the router dispatches through.
//!
//! The router itself never talks to a socket. It sends through
//! [`Publisher`]s, receives batches from [`Subscriber`]s and obtains both
//! from a [`Binder`], so tests substitute recording doubles and the daemon
//! plugs in the [`ipc`] implementation.

pub mod ipc;

use std::io;
use std::rc::Rc;

use bytes::Bytes;
use miette::Diagnostic;
use thiserror::Error;
use tokio::sync::mpsc;

use routerd_config::Port;

/// Invoked with the number of bytes a publisher had to drop because the
/// transport would not accept them. Installed once per publisher at bind
/// time; never installed on subscribers.
pub type DropHook = Rc<dyn Fn(usize)>;

/// Outbound side of a port.
///
/// `send` is non-blocking: back-pressure from the transport is a drop, which
/// the implementation reports through its [`DropHook`]; it is never an error
/// and never stalls the caller.
pub trait Publisher {
    fn send(&self, data: &[u8]);
    fn identity(&self) -> &str;
}

/// Inbound side of a port: a sequence of read batches in arrival order.
pub struct Subscriber {
    rx: mpsc::Receiver<Bytes>,
}

impl Subscriber {
    /// Channel-backed subscriber; the sender half is what an endpoint
    /// implementation (or a test) feeds read batches into.
    pub fn channel(capacity: usize) -> (mpsc::Sender<Bytes>, Subscriber) {
        let (tx, rx) = mpsc::channel(capacity);
        (tx, Subscriber { rx })
    }

    pub async fn recv(&mut self) -> Option<Bytes> {
        self.rx.recv().await
    }

    /// Drain a batch that is already queued, without waiting.
    pub fn try_recv(&mut self) -> Option<Bytes> {
        self.rx.try_recv().ok()
    }
}

pub struct BoundPort {
    pub publisher: Rc<dyn Publisher>,
    pub subscriber: Subscriber,
}

/// Creates the endpoint pair for one configured port.
///
/// The production implementation binds sockets; tests bind recording
/// doubles. Either way the router calls this once per port, in config
/// order, and aborts startup on the first failure.
pub trait Binder {
    fn bind(&mut self, port: &Port) -> Result<BoundPort, BindError>;
}

#[derive(Debug, Error, Diagnostic)]
pub enum BindError {
    #[error("unsupported endpoint address '{addr}'")]
    #[diagnostic(help("only ipc://<path> addresses are supported"))]
    UnsupportedScheme { addr: String },

    #[error("failed to bind {role} endpoint at '{addr}'")]
    Bind {
        role: &'static str,
        addr: String,
        #[source]
        source: io::Error,
    },
}
