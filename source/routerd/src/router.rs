//! Assembling the running router from a resolved configuration.
//!
//! Startup is strictly ordered: validate every port's prefixes, bind every
//! port's endpoints, build every dispatch cache, then attach reader tasks.
//! A failure anywhere aborts the whole startup and unwinds whatever was
//! already created; in particular a config with broken prefixes is rejected
//! before a single endpoint exists.

use std::rc::Rc;

use miette::Diagnostic;
use thiserror::Error;

use routerd_config::RouterConfig;

use crate::endpoint::{BindError, Binder, Subscriber};
use crate::framing::FramerRegistry;
use crate::metrics::RouterMetrics;
use crate::rules::{build_rule_cache, extract_prefix_table, CacheError, RuleCache};

#[derive(Debug, Error, Diagnostic)]
pub enum RouterError {
    #[error("port '{port}': failed to bind endpoints")]
    Bind {
        port: String,
        #[source]
        source: BindError,
    },

    #[error("port '{port}': failed to build dispatch cache")]
    Cache {
        port: String,
        #[source]
        source: CacheError,
    },

    #[error("unknown framer '{name}'")]
    #[diagnostic(help("registered framers: {known}"))]
    UnknownFramer { name: String, known: String },
}

pub struct Router {
    pub name: String,
    ports: Vec<RouterPort>,
    /// Rules tagged skip_framer across the whole config.
    pub skip_framer_ports: u64,
    /// Rules ending on an ACCEPT filter across the whole config.
    pub accept_last_ports: u64,
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router").field("name", &self.name).finish()
    }
}

struct RouterPort {
    name: String,
    cache: Rc<RuleCache>,
    subscriber: Subscriber,
}

impl Router {
    pub fn create(
        config: &RouterConfig,
        binder: &mut dyn Binder,
        framers: &FramerRegistry,
        sbp_framing: bool,
    ) -> Result<Router, RouterError> {
        // Prefix validation comes first so a broken rule set never leaves
        // endpoints behind.
        let mut tables = Vec::with_capacity(config.ports.len());
        for port in &config.ports {
            let table = extract_prefix_table(port).map_err(|source| RouterError::Cache {
                port: port.name.clone(),
                source,
            })?;
            tables.push(table);
        }

        let mut publishers = Vec::with_capacity(config.ports.len());
        let mut subscribers = Vec::with_capacity(config.ports.len());
        for port in &config.ports {
            let bound = binder.bind(port).map_err(|source| RouterError::Bind {
                port: port.name.clone(),
                source,
            })?;
            publishers.push(bound.publisher);
            subscribers.push(bound.subscriber);
        }

        let mut ports = Vec::with_capacity(config.ports.len());
        let mut skip_framer_ports = 0u64;
        let mut accept_last_ports = 0u64;

        for ((port, table), subscriber) in config.ports.iter().zip(tables).zip(subscribers) {
            let framer = if sbp_framing {
                let framer = framers.create("sbp").ok_or_else(|| RouterError::UnknownFramer {
                    name: "sbp".to_owned(),
                    known: framers.names().join(", "),
                })?;
                Some(framer)
            } else {
                None
            };

            let cache = build_rule_cache(port, table, &publishers, framer).map_err(|source| {
                RouterError::Cache {
                    port: port.name.clone(),
                    source,
                }
            })?;

            skip_framer_ports += cache.skip_framer.len() as u64;
            accept_last_ports += cache.default_accept.len() as u64;

            ports.push(RouterPort {
                name: port.name.clone(),
                cache: Rc::new(cache),
                subscriber,
            });
        }

        Ok(Router {
            name: config.name.clone(),
            ports,
            skip_framer_ports,
            accept_last_ports,
        })
    }

    pub fn port_count(&self) -> usize {
        self.ports.len()
    }

    pub fn port_cache(&self, index: usize) -> Rc<RuleCache> {
        self.ports[index].cache.clone()
    }

    /// Spawn one reader task per port on the current `LocalSet`, in config
    /// order. Once attached a port only ever transitions out of the running
    /// state when the loop shuts down.
    pub fn attach(self, metrics: &Rc<RouterMetrics>) {
        for port in self.ports {
            // TODO: move each port onto its own runtime once publishers are Send
            tracing::debug!(port = %port.name, "attaching subscriber reader");
            tokio::task::spawn_local(port_reader(
                port.cache,
                port.subscriber,
                metrics.clone(),
            ));
        }
    }
}

async fn port_reader(cache: Rc<RuleCache>, mut subscriber: Subscriber, metrics: Rc<RouterMetrics>) {
    while let Some(batch) = subscriber.recv().await {
        metrics.pre_receive();
        cache.process_batch(&batch, &metrics);

        // Drain whatever else arrived during this wakeup.
        while let Some(batch) = subscriber.try_recv() {
            cache.process_batch(&batch, &metrics);
        }

        metrics.post_receive();
    }
}
