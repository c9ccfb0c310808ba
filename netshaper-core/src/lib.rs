#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

//! The netshaper shaping engine.
//!
//! Every packet that crosses an ingress or egress checkpoint of a workload group is handed to
//! [`GroupShaper::decide`], which accounts its bytes and returns a [`Verdict`]: forward it now,
//! hold it in the group's delayed queue, or drop it. While the group is online, a release task
//! wakes up once per [`ShaperOptions::interval`] and drains the queue in FIFO order up to a fresh
//! per-tick budget, handing each packet back to the network path through its [`Reinject`]
//! continuation.
//!
//! The host environment (group hierarchy, packet interception, control files) lives outside of
//! this crate and talks to it only through [`GroupShaper`], [`Packet`] and [`Reinject`].

mod admission;
pub use admission::{window_budget, AdmissionMode, MIN_BUDGET};

mod error;
pub use error::{ReinjectError, ShaperError};

mod group;
pub use group::GroupShaper;

mod options;
pub use options::ShaperOptions;

mod packet;
pub use packet::{Interface, Packet, Reinject};

mod queue;

mod release;
pub use release::DrainReport;

mod stats;
pub use stats::{ShaperStats, StatsSnapshot};

/// The checkpoint a packet was observed at. Selects which byte counter is charged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Packet entering the host, charged to `bytes_rx`.
    Ingress,
    /// Packet leaving the host, charged to `bytes_tx`.
    Egress,
}

/// The admission outcome for an observed packet.
///
/// Ownership of the packet follows the verdict: it is handed back on [`Verdict::Accept`] (forward
/// it) and [`Verdict::Drop`] (discard it), and kept by the group's delayed queue on
/// [`Verdict::Queued`].
#[derive(Debug)]
#[must_use = "the packet must be forwarded or discarded according to the verdict"]
pub enum Verdict {
    /// The packet fits the current window and may continue immediately.
    Accept(Packet),
    /// The packet is now owned by the delayed queue and will be re-injected later.
    Queued,
    /// The packet could not be queued. The caller must discard it.
    Drop(Packet),
}

impl Verdict {
    #[inline]
    pub fn is_accept(&self) -> bool {
        matches!(self, Self::Accept(_))
    }

    #[inline]
    pub fn is_queued(&self) -> bool {
        matches!(self, Self::Queued)
    }

    #[inline]
    pub fn is_drop(&self) -> bool {
        matches!(self, Self::Drop(_))
    }
}

#[allow(non_upper_case_globals)]
pub mod constants {
    use std::time::Duration;

    pub const KiB: u32 = 1024;
    pub const MiB: u32 = 1024 * KiB;

    /// Rate of a root group, in bytes per second.
    pub const DEFAULT_RATE: u32 = MiB;
    /// Burst of a root group, in bytes.
    pub const DEFAULT_BURST: u32 = 128 * KiB;
    /// Period of the release task.
    pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(100);
}
