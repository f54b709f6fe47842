use std::io;
use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("failed to read configuration file {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse configuration")]
    #[diagnostic(help(
        "the document must be a mapping with 'name' and 'ports' keys; \
         see the shipped sbp_router.yml for the schema"
    ))]
    Parse {
        #[source]
        source: serde_yaml::Error,
    },

    #[error("port '{port}': metric name must be non-empty and not entirely whitespace")]
    InvalidMetric { port: String },

    #[error("port '{port}': forwarding rule references unknown dst_port '{dst}'")]
    #[diagnostic(help("known ports: {known}"))]
    UnknownDstPort {
        port: String,
        dst: String,
        known: String,
    },
}
