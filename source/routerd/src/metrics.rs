//! Per-second routing aggregates.
//!
//! Counters live in `Cell`s behind one `Rc` because everything that touches
//! them (dispatch, publisher drop hooks, the flush timer) runs on the one
//! loop thread. A 1 Hz task computes the derived averages, writes the
//! snapshot out through `tracing` (target `routerd::metrics`) and resets
//! the per-second counters; the averages and their inputs reset together so
//! `latency = latency_total / count` stays meaningful over every interval.

use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

pub struct RouterMetrics {
    instance: String,

    count: Cell<u64>,
    size_total: Cell<u64>,

    wake_ups: Cell<u64>,
    wake_ups_max: Cell<u64>,
    wakeup_messages: Cell<u64>,
    wakeup_begin: Cell<Option<Instant>>,

    latency_max: Cell<Duration>,
    latency_total: Cell<Duration>,

    frame_count: Cell<u64>,
    frame_leftover: Cell<u64>,

    skip_framer_count: Cell<u64>,
    skip_framer_bypass: Cell<u64>,

    bytes_dropped: Cell<u64>,

    // static counts captured once after startup
    ports_skip_framer: Cell<u64>,
    ports_accept_last: Cell<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub count: u64,
    pub size_total: u64,
    pub size_avg: u64,
    pub wake_ups: u64,
    pub wake_ups_max: u64,
    pub latency_max: Duration,
    pub latency_total: Duration,
    pub latency_avg: Duration,
    pub frame_count: u64,
    pub frame_leftover: u64,
    pub skip_framer_count: u64,
    pub skip_framer_bypass: u64,
    pub bytes_dropped: u64,
    pub ports_skip_framer: u64,
    pub ports_accept_last: u64,
}

impl RouterMetrics {
    pub fn new(instance: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
            count: Cell::new(0),
            size_total: Cell::new(0),
            wake_ups: Cell::new(0),
            wake_ups_max: Cell::new(0),
            wakeup_messages: Cell::new(0),
            wakeup_begin: Cell::new(None),
            latency_max: Cell::new(Duration::ZERO),
            latency_total: Cell::new(Duration::ZERO),
            frame_count: Cell::new(0),
            frame_leftover: Cell::new(0),
            skip_framer_count: Cell::new(0),
            skip_framer_bypass: Cell::new(0),
            bytes_dropped: Cell::new(0),
            ports_skip_framer: Cell::new(0),
            ports_accept_last: Cell::new(0),
        }
    }

    /// Marks the start of a wakeup: the per-wakeup message counter restarts
    /// and the latency clock begins.
    pub fn pre_receive(&self) {
        self.wake_ups.set(self.wake_ups.get() + 1);
        self.wakeup_messages.set(0);
        self.wakeup_begin.set(Some(Instant::now()));
    }

    /// Marks the end of a wakeup: folds the per-wakeup message count into
    /// the max and the elapsed time into the latency aggregates.
    pub fn post_receive(&self) {
        let messages = self.wakeup_messages.get();
        if messages > self.wake_ups_max.get() {
            self.wake_ups_max.set(messages);
        }

        if let Some(begin) = self.wakeup_begin.take() {
            let latency = begin.elapsed();
            if latency > self.latency_max.get() {
                self.latency_max.set(latency);
            }
            self.latency_total.set(self.latency_total.get() + latency);
        }
    }

    pub fn record_message(&self, len: usize) {
        self.count.set(self.count.get() + 1);
        self.wakeup_messages.set(self.wakeup_messages.get() + 1);
        self.size_total.set(self.size_total.get() + len as u64);
    }

    pub fn record_frames(&self, frames: u64, leftover: u64) {
        self.frame_count.set(self.frame_count.get() + frames);
        self.frame_leftover.set(self.frame_leftover.get() + leftover);
    }

    pub fn record_skip_framer(&self) {
        self.skip_framer_count.set(self.skip_framer_count.get() + 1);
    }

    pub fn record_skip_framer_bypass(&self) {
        self.skip_framer_bypass.set(self.skip_framer_bypass.get() + 1);
    }

    pub fn record_dropped(&self, bytes: usize) {
        self.bytes_dropped.set(self.bytes_dropped.get() + bytes as u64);
    }

    pub fn set_port_counts(&self, skip_framer: u64, accept_last: u64) {
        self.ports_skip_framer.set(skip_framer);
        self.ports_accept_last.set(accept_last);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let count = self.count.get();
        let size_avg = if count > 0 {
            self.size_total.get() / count
        } else {
            0
        };
        let latency_avg = if count > 0 {
            self.latency_total.get() / count as u32
        } else {
            Duration::ZERO
        };

        MetricsSnapshot {
            count,
            size_total: self.size_total.get(),
            size_avg,
            wake_ups: self.wake_ups.get(),
            wake_ups_max: self.wake_ups_max.get(),
            latency_max: self.latency_max.get(),
            latency_total: self.latency_total.get(),
            latency_avg,
            frame_count: self.frame_count.get(),
            frame_leftover: self.frame_leftover.get(),
            skip_framer_count: self.skip_framer_count.get(),
            skip_framer_bypass: self.skip_framer_bypass.get(),
            bytes_dropped: self.bytes_dropped.get(),
            ports_skip_framer: self.ports_skip_framer.get(),
            ports_accept_last: self.ports_accept_last.get(),
        }
    }

    /// Write the current interval out and reset it. The static port counts
    /// survive the reset.
    pub fn flush(&self) {
        let s = self.snapshot();

        tracing::debug!(
            target: "routerd::metrics",
            instance = %self.instance,
            message_count = s.count,
            message_size_total = s.size_total,
            message_size_avg = s.size_avg,
            wake_ups = s.wake_ups,
            wake_ups_max = s.wake_ups_max,
            latency_max_us = s.latency_max.as_micros() as u64,
            latency_avg_us = s.latency_avg.as_micros() as u64,
            frame_count = s.frame_count,
            frame_leftover = s.frame_leftover,
            skip_framer_count = s.skip_framer_count,
            skip_framer_bypass = s.skip_framer_bypass,
            bytes_dropped = s.bytes_dropped,
            ports_skip_framer = s.ports_skip_framer,
            ports_accept_last = s.ports_accept_last,
            "metrics"
        );

        self.count.set(0);
        self.size_total.set(0);
        self.wake_ups.set(0);
        self.wake_ups_max.set(0);
        self.latency_max.set(Duration::ZERO);
        self.latency_total.set(Duration::ZERO);
        self.frame_count.set(0);
        self.frame_leftover.set(0);
        self.skip_framer_count.set(0);
        self.skip_framer_bypass.set(0);
        self.bytes_dropped.set(0);
    }
}

/// 1 Hz flush task; runs until the loop shuts down.
pub async fn flush_loop(metrics: Rc<RouterMetrics>) {
    let mut tick = tokio::time::interval(Duration::from_secs(1));
    tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    // the first tick completes immediately
    tick.tick().await;

    loop {
        tick.tick().await;
        metrics.flush();
    }
}
