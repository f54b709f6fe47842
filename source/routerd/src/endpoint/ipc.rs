//! `ipc://` endpoint servers over Unix domain sockets.
//!
//! A port's publisher is a listening socket that fans every `send` out to
//! all connected clients with `try_write`; a client that will not take the
//! bytes right now has them dropped and counted. The subscriber side is a
//! listening socket whose client reads are forwarded, in arrival order, as
//! batches into the port's [`Subscriber`] channel.
//!
//! All accept and read tasks are `spawn_local`, so binding must happen
//! inside the daemon's `LocalSet`.

use std::cell::RefCell;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use bytes::Bytes;
use tokio::io::AsyncReadExt;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::mpsc;

use routerd_config::Port;

use super::{BindError, Binder, BoundPort, DropHook, Publisher, Subscriber};

const READ_BUFFER_SIZE: usize = 4096;
const SUBSCRIBER_QUEUE: usize = 64;

pub struct IpcBinder {
    drop_hook: DropHook,
}

impl IpcBinder {
    pub fn new(drop_hook: DropHook) -> Self {
        Self { drop_hook }
    }
}

impl Binder for IpcBinder {
    fn bind(&mut self, port: &Port) -> Result<BoundPort, BindError> {
        let publisher = IpcPublisher::bind(
            &port.pub_addr,
            format!("router/{}/pub_server", port.metric),
            self.drop_hook.clone(),
        )?;
        let subscriber =
            bind_subscriber(&port.sub_addr, format!("router/{}/sub_server", port.metric))?;

        Ok(BoundPort {
            publisher: Rc::new(publisher),
            subscriber,
        })
    }
}

fn ipc_path(addr: &str) -> Result<PathBuf, BindError> {
    addr.strip_prefix("ipc://")
        .map(PathBuf::from)
        .ok_or_else(|| BindError::UnsupportedScheme {
            addr: addr.to_owned(),
        })
}

fn listen(path: &Path, role: &'static str, addr: &str) -> Result<UnixListener, BindError> {
    // A previous instance may have left its socket file behind.
    if path.exists() {
        let _ = std::fs::remove_file(path);
    }

    UnixListener::bind(path).map_err(|source| BindError::Bind {
        role,
        addr: addr.to_owned(),
        source,
    })
}

pub struct IpcPublisher {
    identity: String,
    clients: Rc<RefCell<Vec<UnixStream>>>,
    drop_hook: DropHook,
}

impl IpcPublisher {
    pub fn bind(addr: &str, identity: String, drop_hook: DropHook) -> Result<Self, BindError> {
        let listener = listen(&ipc_path(addr)?, "pub", addr)?;

        let clients: Rc<RefCell<Vec<UnixStream>>> = Rc::new(RefCell::new(Vec::new()));
        let accept_clients = clients.clone();
        let accept_identity = identity.clone();

        tokio::task::spawn_local(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, _)) => {
                        tracing::debug!(endpoint = %accept_identity, "publisher client connected");
                        accept_clients.borrow_mut().push(stream);
                    }
                    Err(e) => {
                        tracing::warn!(endpoint = %accept_identity, error = %e, "accept failed");
                    }
                }
            }
        });

        Ok(Self {
            identity,
            clients,
            drop_hook,
        })
    }

    #[cfg(test)]
    fn client_count(&self) -> usize {
        self.clients.borrow().len()
    }
}

impl Publisher for IpcPublisher {
    fn send(&self, data: &[u8]) {
        let mut clients = self.clients.borrow_mut();

        clients.retain(|stream| match stream.try_write(data) {
            Ok(n) if n < data.len() => {
                (self.drop_hook)(data.len() - n);
                true
            }
            Ok(_) => true,
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                (self.drop_hook)(data.len());
                true
            }
            Err(e) => {
                tracing::warn!(
                    endpoint = %self.identity,
                    error = %e,
                    "disconnecting publisher client"
                );
                false
            }
        });
    }

    fn identity(&self) -> &str {
        &self.identity
    }
}

pub fn bind_subscriber(addr: &str, identity: String) -> Result<Subscriber, BindError> {
    let listener = listen(&ipc_path(addr)?, "sub", addr)?;
    let (tx, subscriber) = Subscriber::channel(SUBSCRIBER_QUEUE);

    tokio::task::spawn_local(async move {
        loop {
            match listener.accept().await {
                Ok((stream, _)) => {
                    tracing::debug!(endpoint = %identity, "subscriber client connected");
                    let tx = tx.clone();
                    let identity = identity.clone();
                    tokio::task::spawn_local(read_client(stream, tx, identity));
                }
                Err(e) => {
                    tracing::warn!(endpoint = %identity, error = %e, "accept failed");
                }
            }
        }
    });

    Ok(subscriber)
}

async fn read_client(mut stream: UnixStream, tx: mpsc::Sender<Bytes>, identity: String) {
    let mut buf = [0u8; READ_BUFFER_SIZE];

    loop {
        match stream.read(&mut buf).await {
            Ok(0) => {
                tracing::debug!(endpoint = %identity, "subscriber client disconnected");
                break;
            }
            Ok(n) => {
                if tx.send(Bytes::copy_from_slice(&buf[..n])).await.is_err() {
                    break;
                }
            }
            Err(e) => {
                // A failed read loses this connection, never the router.
                tracing::warn!(endpoint = %identity, error = %e, "read error");
                break;
            }
        }
    }
}
