use std::time::Duration;

use crate::{
    constants::{DEFAULT_BURST, DEFAULT_INTERVAL, DEFAULT_RATE},
    AdmissionMode,
};

/// Options shared by every group of a hierarchy and by their release tasks.
#[derive(Debug, Clone)]
pub struct ShaperOptions {
    /// The accounting interval. Budgets are computed per interval, and the release task runs
    /// once per interval.
    interval: Duration,
    /// Rate of groups created without a parent, in bytes per second.
    default_rate: u32,
    /// Burst of groups created without a parent, in bytes.
    default_burst: u32,
    /// The maximum number of packets a group may hold in its delayed queue. If this is `None`,
    /// the queue is bounded only by memory.
    queue_limit: Option<usize>,
    /// The admission algorithm.
    admission: AdmissionMode,
}

impl Default for ShaperOptions {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            default_rate: DEFAULT_RATE,
            default_burst: DEFAULT_BURST,
            queue_limit: None,
            admission: AdmissionMode::Windowed,
        }
    }
}

impl ShaperOptions {
    /// Sets the accounting and release interval. Must be non-zero for groups to go online.
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Sets the rate of root groups, in bytes per second.
    pub fn default_rate(mut self, rate: u32) -> Self {
        self.default_rate = rate;
        self
    }

    /// Sets the burst of root groups, in bytes.
    pub fn default_burst(mut self, burst: u32) -> Self {
        self.default_burst = burst;
        self
    }

    /// Bounds the number of packets held per group. Packets that would exceed the bound are
    /// dropped and counted in `dropped_packets`.
    pub fn queue_limit(mut self, limit: usize) -> Self {
        self.queue_limit = Some(limit);
        self
    }

    /// Sets the admission algorithm.
    pub fn admission(mut self, admission: AdmissionMode) -> Self {
        self.admission = admission;
        self
    }

    #[inline]
    pub fn get_interval(&self) -> Duration {
        self.interval
    }

    #[inline]
    pub fn get_default_rate(&self) -> u32 {
        self.default_rate
    }

    #[inline]
    pub fn get_default_burst(&self) -> u32 {
        self.default_burst
    }

    #[inline]
    pub fn get_queue_limit(&self) -> Option<usize> {
        self.queue_limit
    }

    #[inline]
    pub fn get_admission(&self) -> AdmissionMode {
        self.admission
    }
}
