//! Rendering a resolved configuration back to text for `--print`.

use std::fmt;

use crate::model::{FilterAction, RouterConfig};

pub fn render(config: &RouterConfig) -> String {
    Printer(config).to_string()
}

struct Printer<'a>(&'a RouterConfig);

impl fmt::Display for Printer<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let config = self.0;

        writeln!(f, "name: {}", config.name)?;
        writeln!(f, "ports:")?;

        for port in &config.ports {
            writeln!(f, "  - name: {}", port.name)?;
            writeln!(f, "    metric: {}", port.metric)?;
            writeln!(f, "    pub_addr: {}", port.pub_addr)?;
            writeln!(f, "    sub_addr: {}", port.sub_addr)?;

            if port.forwarding_rules.is_empty() {
                writeln!(f, "    forwarding_rules: []")?;
                continue;
            }

            writeln!(f, "    forwarding_rules:")?;
            for rule in &port.forwarding_rules {
                writeln!(f, "      - dst_port: {}", rule.dst_port_name)?;
                if rule.skip_framer {
                    writeln!(f, "        skip_framer: true")?;
                }
                writeln!(f, "        filters:")?;
                for filter in &rule.filters {
                    let action = match filter.action {
                        FilterAction::Accept => "ACCEPT",
                        FilterAction::Reject => "REJECT",
                    };
                    let prefix = filter
                        .prefix
                        .iter()
                        .map(|b| format!("0x{b:02x}"))
                        .collect::<Vec<_>>()
                        .join(", ");
                    writeln!(f, "          - action: {action}")?;
                    writeln!(f, "            prefix: [{prefix}]")?;
                }
            }
        }

        Ok(())
    }
}
