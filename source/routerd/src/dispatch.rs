//! The per-message and per-wakeup forwarding paths.
//!
//! `forward` is the hot path: hash the message's leading bytes, verify the
//! slot's stored prefix, and copy the message to the slot's destinations,
//! or to the default-accept set when the message is shorter than the prefix
//! width or its prefix is not in the table. The hash result is never
//! trusted on its own; the stored-prefix compare is what decides.

use crate::framing::Framer;
use crate::metrics::RouterMetrics;
use crate::rules::RuleCache;

impl RuleCache {
    /// Deliver one message to its computed destination set, in rule
    /// declaration order.
    pub fn forward(&self, data: &[u8]) {
        let Some(mph) = &self.mph else {
            self.send_default_accept(data);
            return;
        };

        let prefix_len = self.prefixes.len;
        if data.len() < prefix_len {
            self.send_default_accept(data);
            return;
        }

        let slot = &self.slots[mph.lookup(&data[..prefix_len])];
        if slot.prefix == data[..prefix_len] {
            for dst in &slot.destinations {
                dst.send(data);
            }
        } else {
            // Out-of-keyset probe; indistinguishable from a short message
            // downstream.
            self.send_default_accept(data);
        }
    }

    fn send_default_accept(&self, data: &[u8]) {
        for dst in &self.default_accept {
            dst.send(data);
        }
    }

    /// One subscriber read batch: account for it, then either de-frame it
    /// or forward it whole.
    pub fn process_batch(&self, data: &[u8], metrics: &RouterMetrics) {
        metrics.record_message(data.len());

        match &self.framer {
            Some(framer) => {
                let mut framer = framer.borrow_mut();
                self.process_batch_framed(&mut framer, data, metrics);
            }
            None => self.forward(data),
        }
    }

    fn process_batch_framed(
        &self,
        framer: &mut Box<dyn Framer>,
        data: &[u8],
        metrics: &RouterMetrics,
    ) {
        if !self.skip_framer.is_empty() {
            metrics.record_skip_framer();
            for dst in &self.skip_framer {
                dst.send(data);
            }
        }

        if self.rule_count == self.skip_framer.len() {
            // Every rule takes the raw bytes; nothing left to de-frame.
            metrics.record_skip_framer_bypass();
            return;
        }

        let mut index = 0;
        let mut frames: u64 = 0;

        while index < data.len() {
            let (consumed, frame) = framer.process(&data[index..]);
            index += consumed;

            let Some(frame) = frame else { break };
            self.forward(frame);
            frames += 1;
        }

        metrics.record_frames(frames, (data.len() - index) as u64);
    }
}
