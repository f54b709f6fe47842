//! Loading and resolving routing configurations.
//!
//! Loading is two passes. The first pass is a plain serde parse into the
//! model types, which leaves every rule holding only its destination port
//! *name*. The second pass walks every rule and replaces the name with a
//! [`PortId`] into the port list, matching case-insensitively. A name that
//! resolves to nothing fails the whole load; callers never see a config with
//! dangling references.

use std::fs;
use std::path::Path;

use crate::error::ConfigError;
use crate::model::RouterConfig;

pub fn load(path: impl AsRef<Path>) -> Result<RouterConfig, ConfigError> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_owned(),
        source,
    })?;
    load_str(&text)
}

pub fn load_str(text: &str) -> Result<RouterConfig, ConfigError> {
    let mut config: RouterConfig =
        serde_yaml::from_str(text).map_err(|source| ConfigError::Parse { source })?;

    for port in &config.ports {
        if port.metric.trim().is_empty() {
            return Err(ConfigError::InvalidMetric {
                port: port.name.clone(),
            });
        }
    }

    resolve_destinations(&mut config)?;

    tracing::debug!(
        router = %config.name,
        ports = config.ports.len(),
        "configuration loaded"
    );

    Ok(config)
}

fn resolve_destinations(config: &mut RouterConfig) -> Result<(), ConfigError> {
    let names: Vec<String> = config.ports.iter().map(|p| p.name.clone()).collect();

    for port in &mut config.ports {
        for rule in &mut port.forwarding_rules {
            let id = names
                .iter()
                .position(|name| name.eq_ignore_ascii_case(&rule.dst_port_name));

            match id {
                Some(id) => rule.dst_port = Some(crate::model::PortId(id)),
                None => {
                    return Err(ConfigError::UnknownDstPort {
                        port: port.name.clone(),
                        dst: rule.dst_port_name.clone(),
                        known: names.join(", "),
                    })
                }
            }
        }
    }

    Ok(())
}
