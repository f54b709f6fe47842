//! Compiling a port's forwarding rules into its read-only dispatch cache.
//!
//! The cache is built once at startup, after endpoints are bound, and never
//! mutated again: a prefix table (every non-empty filter prefix, one fixed
//! length per port, sorted and deduped), a minimal perfect hash over that
//! table, and per-slot destination lists produced by replaying the rules
//! against each slot's prefix. Alongside those live the default-accept
//! destinations (rules whose last filter accepts) and the skip-framer
//! destinations (rules that take the raw read instead of framed messages).

use std::cell::RefCell;
use std::rc::Rc;

use miette::Diagnostic;
use thiserror::Error;

use routerd_config::{Filter, FilterAction, ForwardingRule, Port};

use crate::endpoint::Publisher;
use crate::framing::Framer;
use crate::mph::Mph;

pub const MAX_PREFIX_LEN: usize = 8;

#[derive(Debug, Error, Diagnostic)]
pub enum CacheError {
    #[error(
        "all forwarding rule prefixes for a port must be the same length ({expected} vs {found})"
    )]
    PrefixLenMismatch { expected: usize, found: usize },

    #[error("forwarding rule prefix length ({len}) exceeds the maximum ({max})")]
    PrefixTooLong { len: usize, max: usize },

    #[error("failed to construct a minimal perfect hash over {count} prefixes")]
    HashConstruction { count: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefixTable {
    /// Shared length of every prefix in the table; 0 when the table is empty.
    pub len: usize,
    pub prefixes: Vec<Vec<u8>>,
}

impl PrefixTable {
    pub fn count(&self) -> usize {
        self.prefixes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty()
    }
}

/// Walk every filter of every rule and collect the non-empty prefixes,
/// sorted and deduped. All of them must share one length, capped at
/// [`MAX_PREFIX_LEN`].
pub fn extract_prefix_table(port: &Port) -> Result<PrefixTable, CacheError> {
    let mut len: Option<usize> = None;
    let mut prefixes: Vec<Vec<u8>> = Vec::new();

    for rule in &port.forwarding_rules {
        for filter in &rule.filters {
            if filter.prefix.is_empty() {
                continue;
            }

            match len {
                None => len = Some(filter.prefix.len()),
                Some(expected) if expected != filter.prefix.len() => {
                    return Err(CacheError::PrefixLenMismatch {
                        expected,
                        found: filter.prefix.len(),
                    });
                }
                Some(_) => {}
            }

            if filter.prefix.len() > MAX_PREFIX_LEN {
                return Err(CacheError::PrefixTooLong {
                    len: filter.prefix.len(),
                    max: MAX_PREFIX_LEN,
                });
            }

            prefixes.push(filter.prefix.clone());
        }
    }

    prefixes.sort_unstable();
    prefixes.dedup();

    Ok(PrefixTable {
        len: len.unwrap_or(0),
        prefixes,
    })
}

/// First filter in the rule that matches `data`: an empty prefix matches
/// everything, otherwise the filter's prefix must be a prefix of `data`.
/// `None` means the rule does not apply at all (notably a rule with no
/// filters never matches).
pub fn matching_filter<'r>(rule: &'r ForwardingRule, data: &[u8]) -> Option<&'r Filter> {
    rule.filters
        .iter()
        .find(|filter| filter.prefix.is_empty() || data.starts_with(&filter.prefix))
}

pub struct CachedSlot {
    pub prefix: Vec<u8>,
    pub destinations: Vec<Rc<dyn Publisher>>,
}

pub struct RuleCache {
    pub rule_count: usize,
    pub prefixes: PrefixTable,
    pub mph: Option<Mph>,
    /// Indexed by MPH output; `slots[mph.lookup(p)].prefix == p` for every
    /// prefix in the table.
    pub slots: Vec<CachedSlot>,
    pub default_accept: Vec<Rc<dyn Publisher>>,
    pub skip_framer: Vec<Rc<dyn Publisher>>,
    pub framer: Option<RefCell<Box<dyn Framer>>>,
}

pub fn build_rule_cache(
    port: &Port,
    table: PrefixTable,
    publishers: &[Rc<dyn Publisher>],
    framer: Option<Box<dyn Framer>>,
) -> Result<RuleCache, CacheError> {
    let mut default_accept: Vec<Rc<dyn Publisher>> = Vec::new();
    let mut skip_framer: Vec<Rc<dyn Publisher>> = Vec::new();

    for rule in &port.forwarding_rules {
        let dst = dst_publisher(rule, publishers);

        if rule.skip_framer {
            tracing::debug!(
                src = %port.name,
                dst = %rule.dst_port_name,
                "skip-framer destination"
            );
            skip_framer.push(dst.clone());
        }

        if rule.is_default_accept() {
            default_accept.push(dst.clone());
        }
    }

    let (mph, slots) = if table.is_empty() {
        // Nothing to hash; every message falls through to default-accept.
        (None, Vec::new())
    } else {
        let mph = Mph::build(&table.prefixes).ok_or(CacheError::HashConstruction {
            count: table.count(),
        })?;

        let mut slots: Vec<CachedSlot> = (0..table.count())
            .map(|_| CachedSlot {
                prefix: Vec::new(),
                destinations: Vec::new(),
            })
            .collect();

        for prefix in &table.prefixes {
            let slot = &mut slots[mph.lookup(prefix)];
            slot.prefix = prefix.clone();

            for rule in &port.forwarding_rules {
                if let Some(filter) = matching_filter(rule, prefix) {
                    if filter.action == FilterAction::Accept {
                        slot.destinations.push(dst_publisher(rule, publishers).clone());
                    }
                }
            }
        }

        (Some(mph), slots)
    };

    Ok(RuleCache {
        rule_count: port.forwarding_rules.len(),
        prefixes: table,
        mph,
        slots,
        default_accept,
        skip_framer,
        framer: framer.map(RefCell::new),
    })
}

fn dst_publisher<'p>(
    rule: &ForwardingRule,
    publishers: &'p [Rc<dyn Publisher>],
) -> &'p Rc<dyn Publisher> {
    let id = rule
        .dst_port
        .expect("destination ports are resolved at load time");
    &publishers[id.index()]
}
