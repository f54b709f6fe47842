//! Pluggable de-framers for subscriber byte streams.
//!
//! A framer turns an arbitrary sequence of reads back into whole protocol
//! messages, holding partial frames internally so that a message split
//! across reads comes out intact. Framers are obtained by name from the
//! [`FramerRegistry`]; `sbp`, `rtcm3` and `none` are built in.

pub mod none;
pub mod rtcm3;
pub mod sbp;

use std::collections::HashMap;

pub trait Framer {
    /// Consume bytes from `data` and return how many were absorbed plus at
    /// most one complete frame.
    ///
    /// Callers feed the unconsumed tail back in until no frame is returned;
    /// whatever the framer absorbed without emitting is retained for the
    /// next read.
    fn process<'a>(&'a mut self, data: &'a [u8]) -> (usize, Option<&'a [u8]>);
}

type FramerFactory = Box<dyn Fn() -> Box<dyn Framer>>;

/// Name-keyed framer factories.
///
/// This is the seam a protocol plug-in loader would feed; the daemon only
/// registers the built-ins.
pub struct FramerRegistry {
    factories: HashMap<String, FramerFactory>,
}

impl FramerRegistry {
    pub fn with_builtins() -> Self {
        let mut registry = Self {
            factories: HashMap::new(),
        };
        registry.register("sbp", || Box::new(sbp::SbpFramer::new()));
        registry.register("rtcm3", || Box::new(rtcm3::Rtcm3Framer::new()));
        registry.register("none", || Box::new(none::NoneFramer));
        registry
    }

    pub fn register(
        &mut self,
        name: impl Into<String>,
        factory: impl Fn() -> Box<dyn Framer> + 'static,
    ) {
        let name = name.into();
        if self
            .factories
            .insert(name.clone(), Box::new(factory))
            .is_some()
        {
            tracing::warn!("framer factory '{name}' was overwritten");
        }
    }

    pub fn create(&self, name: &str) -> Option<Box<dyn Framer>> {
        self.factories.get(name).map(|factory| factory())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
