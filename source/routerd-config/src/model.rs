use std::fmt;

use serde::de::{self, Deserializer, SeqAccess, Visitor};
use serde::Deserialize;

/// Index of a port within [`RouterConfig::ports`].
///
/// Destination references are stored as indices rather than names once the
/// loader has resolved them, so lookups on the dispatch path never touch a
/// string again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PortId(pub usize);

impl PortId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterAction {
    Accept,
    Reject,
}

impl<'de> Deserialize<'de> for FilterAction {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let keyword = String::deserialize(deserializer)?;
        if keyword.eq_ignore_ascii_case("accept") {
            Ok(FilterAction::Accept)
        } else if keyword.eq_ignore_ascii_case("reject") {
            Ok(FilterAction::Reject)
        } else {
            Err(de::Error::custom(format!(
                "invalid filter action '{keyword}', expected ACCEPT or REJECT"
            )))
        }
    }
}

/// A single prefix predicate inside a forwarding rule.
///
/// An empty prefix matches every message. Filters are evaluated in document
/// order and the first match terminates evaluation of the rule.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Filter {
    pub action: FilterAction,
    #[serde(default, deserialize_with = "hex_prefix")]
    pub prefix: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ForwardingRule {
    /// Destination port name as written in the document.
    #[serde(rename = "dst_port")]
    pub dst_port_name: String,

    /// Resolved destination, filled in by the loader after the full document
    /// has parsed. `None` only ever exists inside the loader.
    #[serde(skip)]
    pub dst_port: Option<PortId>,

    /// Deliver the raw subscriber read to this destination without running
    /// it through the port's framer.
    #[serde(default)]
    pub skip_framer: bool,

    #[serde(default)]
    pub filters: Vec<Filter>,
}

impl ForwardingRule {
    /// A rule is "default accept" when its last filter accepts, meaning the
    /// destination receives everything that no earlier filter rejected.
    pub fn is_default_accept(&self) -> bool {
        matches!(
            self.filters.last(),
            Some(Filter {
                action: FilterAction::Accept,
                ..
            })
        )
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Port {
    pub name: String,
    /// Metrics identity for this port's endpoints; must contain at least one
    /// non-whitespace character.
    pub metric: String,
    pub pub_addr: String,
    pub sub_addr: String,
    #[serde(default)]
    pub forwarding_rules: Vec<ForwardingRule>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RouterConfig {
    pub name: String,
    pub ports: Vec<Port>,
}

impl RouterConfig {
    /// Case-insensitive port lookup, the same matching the loader applies to
    /// `dst_port` references.
    pub fn port_id(&self, name: &str) -> Option<PortId> {
        self.ports
            .iter()
            .position(|p| p.name.eq_ignore_ascii_case(name))
            .map(PortId)
    }

    pub fn port(&self, id: PortId) -> &Port {
        &self.ports[id.index()]
    }
}

/// Prefix bytes are hexadecimal whatever their spelling: `55`, `0x55` and
/// `"55"` all mean 0x55. Decimal never enters the picture, so the elements
/// are deserialized from their raw scalar text rather than as YAML integers.
fn hex_prefix<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    struct PrefixVisitor;

    impl<'de> Visitor<'de> for PrefixVisitor {
        type Value = Vec<u8>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a sequence of hex bytes")
        }

        fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
        where
            A: SeqAccess<'de>,
        {
            let mut bytes = Vec::with_capacity(seq.size_hint().unwrap_or(0));
            while let Some(HexByte(b)) = seq.next_element()? {
                bytes.push(b);
            }
            Ok(bytes)
        }
    }

    deserializer.deserialize_seq(PrefixVisitor)
}

struct HexByte(u8);

impl<'de> Deserialize<'de> for HexByte {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct HexByteVisitor;

        impl Visitor<'_> for HexByteVisitor {
            type Value = HexByte;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a hex byte such as 0x55")
            }

            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                let digits = value
                    .strip_prefix("0x")
                    .or_else(|| value.strip_prefix("0X"))
                    .unwrap_or(value);
                u8::from_str_radix(digits, 16)
                    .map(HexByte)
                    .map_err(|_| E::custom(format!("invalid hex byte '{value}'")))
            }
        }

        deserializer.deserialize_str(HexByteVisitor)
    }
}
