use std::{
    fmt,
    sync::atomic::{AtomicU64, Ordering},
};

use crate::Direction;

/// Counters of a group. These are shared between the checkpoints, the release task and the
/// statistics readers.
///
/// Each counter is individually consistent, but reading several of them is not an atomic
/// snapshot.
#[derive(Debug, Default)]
pub struct ShaperStats {
    /// Total bytes observed on egress
    bytes_tx: AtomicU64,
    /// Total bytes observed on ingress
    bytes_rx: AtomicU64,
    /// Packets that could not be queued
    dropped_packets: AtomicU64,
    /// Packets currently held in the delayed queue
    delayed_packets: AtomicU64,
    /// Packets handed back to the network path by the release task
    released_packets: AtomicU64,
    /// Released packets discarded because re-injection failed
    reinject_failures: AtomicU64,
}

impl ShaperStats {
    /// Charges `bytes` to the direction's counter and returns the new cumulative value.
    #[inline]
    pub(crate) fn add_bytes(&self, direction: Direction, bytes: u64) -> u64 {
        let counter = match direction {
            Direction::Ingress => &self.bytes_rx,
            Direction::Egress => &self.bytes_tx,
        };

        counter.fetch_add(bytes, Ordering::Relaxed).wrapping_add(bytes)
    }

    #[inline]
    pub(crate) fn increment_dropped(&self) {
        self.dropped_packets.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn increment_delayed(&self) {
        self.delayed_packets.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn decrement_delayed(&self, n: u64) {
        self.delayed_packets.fetch_sub(n, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn increment_released(&self) {
        self.released_packets.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn increment_reinject_failures(&self) {
        self.reinject_failures.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn bytes_tx(&self) -> u64 {
        self.bytes_tx.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn bytes_rx(&self) -> u64 {
        self.bytes_rx.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn dropped_packets(&self) -> u64 {
        self.dropped_packets.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn delayed_packets(&self) -> u64 {
        self.delayed_packets.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn released_packets(&self) -> u64 {
        self.released_packets.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn reinject_failures(&self) -> u64 {
        self.reinject_failures.load(Ordering::Relaxed)
    }
}

/// A point-in-time copy of a group's counters and configuration.
///
/// The [`Display`](fmt::Display) implementation renders the statistics report read by
/// configuration tooling.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub bytes_tx: u64,
    pub bytes_rx: u64,
    pub dropped_packets: u64,
    pub delayed_packets: u64,
    pub released_packets: u64,
    pub reinject_failures: u64,
    pub rate: u32,
    pub burst: u32,
}

impl StatsSnapshot {
    pub(crate) fn new(stats: &ShaperStats, rate: u32, burst: u32) -> Self {
        Self {
            bytes_tx: stats.bytes_tx(),
            bytes_rx: stats.bytes_rx(),
            dropped_packets: stats.dropped_packets(),
            delayed_packets: stats.delayed_packets(),
            released_packets: stats.released_packets(),
            reinject_failures: stats.reinject_failures(),
            rate,
            burst,
        }
    }
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "bytes_tx: {}", self.bytes_tx)?;
        writeln!(f, "bytes_rx: {}", self.bytes_rx)?;
        writeln!(f, "dropped_packets: {}", self.dropped_packets)?;
        writeln!(f, "delayed_packets: {}", self.delayed_packets)?;
        writeln!(f, "rate: {} bytes/s", self.rate)?;
        writeln!(f, "burst: {} bytes", self.burst)
    }
}
