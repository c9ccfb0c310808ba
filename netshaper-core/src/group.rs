use std::{
    panic::{self, AssertUnwindSafe},
    sync::{
        atomic::{AtomicU32, Ordering},
        Arc,
    },
};

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn, Instrument};

use crate::{
    admission::{self, TokenBucket},
    queue::{DelayedQueue, Pop},
    release::{ReleaseDriver, ReleaseHandle},
    window_budget, AdmissionMode, Direction, DrainReport, Packet, ShaperError, ShaperOptions,
    ShaperStats, StatsSnapshot, Verdict,
};

/// Per-group state shared between the [`GroupShaper`] handle and its release task.
#[derive(Debug)]
pub(crate) struct ShaperState {
    /// Options shared by the hierarchy.
    pub(crate) options: Arc<ShaperOptions>,
    /// Bytes per second.
    rate: AtomicU32,
    /// Bytes allowed above the rate within one interval.
    burst: AtomicU32,
    pub(crate) stats: ShaperStats,
    pub(crate) queue: DelayedQueue,
    /// Only used with [`AdmissionMode::TokenBucket`].
    bucket: TokenBucket,
}

impl ShaperState {
    fn new(options: Arc<ShaperOptions>, rate: u32, burst: u32) -> Self {
        Self {
            options,
            rate: AtomicU32::new(rate),
            burst: AtomicU32::new(burst),
            stats: ShaperStats::default(),
            queue: DelayedQueue::default(),
            bucket: TokenBucket::new(),
        }
    }

    #[inline]
    fn rate(&self) -> u32 {
        self.rate.load(Ordering::Relaxed)
    }

    #[inline]
    fn burst(&self) -> u32 {
        self.burst.load(Ordering::Relaxed)
    }

    #[inline]
    fn budget(&self) -> u64 {
        window_budget(self.rate(), self.burst(), self.options.get_interval())
    }

    /// Releases queued packets from the head while they fit a fresh budget. Handles at most as
    /// many packets as were queued when the pass started.
    pub(crate) fn drain(&self) -> DrainReport {
        let mut report = DrainReport { budget: self.budget(), ..Default::default() };
        let mut remaining = report.budget;
        let mut pending = self.queue.len();

        while pending > 0 {
            let entry = match self.queue.pop_within(remaining, &self.stats) {
                Pop::Ready(entry) => entry,
                Pop::Blocked { head_len } => {
                    report.blocked_on = Some(head_len);
                    break;
                }
                Pop::Empty => break,
            };

            pending -= 1;
            let len = entry.len() as u64;
            remaining -= len;
            report.released_bytes += len;

            let waited = entry.enqueued_at().elapsed();
            // The queue lock is not held here. A panicking continuation only loses its own
            // packet, the pass and the release task carry on.
            match panic::catch_unwind(AssertUnwindSafe(|| entry.release())) {
                Ok(Ok(())) => {
                    trace!(len, ?waited, "Re-injected packet");
                    self.stats.increment_released();
                    report.released += 1;
                }
                Ok(Err(e)) => {
                    warn!(err = %e, len, "Failed to re-inject packet, discarding");
                    self.stats.increment_reinject_failures();
                    report.discarded += 1;
                }
                Err(_) => {
                    warn!(len, "Re-injection panicked, discarding packet");
                    self.stats.increment_reinject_failures();
                    report.discarded += 1;
                }
            }
        }

        report
    }
}

/// The shaping state of a single workload group.
///
/// A group is created with [`GroupShaper::root`] or [`GroupShaper::child_of`], starts its release
/// task with [`GroupShaper::online`] and must be taken [`offline`](GroupShaper::offline) before
/// it is dropped. Packets are admitted with [`GroupShaper::decide`], which can be called
/// concurrently from any number of threads and never waits on the release task.
#[derive(Debug)]
pub struct GroupShaper {
    state: Arc<ShaperState>,
    /// The release task, present while the group is online.
    release: Mutex<Option<ReleaseHandle>>,
}

impl GroupShaper {
    /// Creates a group without a parent, configured with the default rate and burst.
    pub fn root(options: Arc<ShaperOptions>) -> Self {
        let (rate, burst) = (options.get_default_rate(), options.get_default_burst());
        Self::with_limits(options, rate, burst)
    }

    /// Creates a group that inherits its rate, burst and options from `parent`.
    pub fn child_of(parent: &GroupShaper) -> Self {
        Self::with_limits(Arc::clone(&parent.state.options), parent.rate(), parent.burst())
    }

    fn with_limits(options: Arc<ShaperOptions>, rate: u32, burst: u32) -> Self {
        Self { state: Arc::new(ShaperState::new(options, rate, burst)), release: Mutex::new(None) }
    }

    #[inline]
    pub fn rate(&self) -> u32 {
        self.state.rate()
    }

    /// Sets the rate in bytes per second. Takes effect for the next decision or release pass.
    /// A rate of zero is accepted, in which case the budget is the burst alone.
    pub fn set_rate(&self, rate: u32) {
        self.state.rate.store(rate, Ordering::Relaxed);
    }

    #[inline]
    pub fn burst(&self) -> u32 {
        self.state.burst()
    }

    /// Sets the burst in bytes. Takes effect for the next decision or release pass.
    pub fn set_burst(&self, burst: u32) {
        self.state.burst.store(burst, Ordering::Relaxed);
    }

    /// The number of bytes this group may pass per interval with the current configuration.
    #[inline]
    pub fn budget(&self) -> u64 {
        self.state.budget()
    }

    #[inline]
    pub fn options(&self) -> &ShaperOptions {
        &self.state.options
    }

    #[inline]
    pub fn stats(&self) -> &ShaperStats {
        &self.state.stats
    }

    /// Copies the counters and configuration. Counters are read one by one.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot::new(&self.state.stats, self.rate(), self.burst())
    }

    /// The number of packets currently held in the delayed queue.
    pub fn queued(&self) -> usize {
        self.state.queue.len()
    }

    /// Admits a packet observed at a checkpoint.
    ///
    /// The packet's bytes are charged to the direction's counter whatever the outcome. Packets
    /// that do not fit the current window are moved to the delayed queue.
    pub fn decide(&self, packet: Packet, direction: Direction) -> Verdict {
        let state = &self.state;
        let len = packet.len() as u64;

        let cumulative = state.stats.add_bytes(direction, len);
        let budget = state.budget();

        let fits = match state.options.get_admission() {
            AdmissionMode::Windowed => !admission::over_window(cumulative, len, budget),
            AdmissionMode::TokenBucket => state.bucket.try_take(len, state.rate(), budget),
        };

        if fits {
            trace!(?direction, len, cumulative, budget, "Accepted packet");
            return Verdict::Accept(packet);
        }

        trace!(?direction, len, cumulative, budget, "Packet over budget, queueing");
        self.queue_packet(packet)
    }

    /// Moves a packet into the delayed queue without an admission check.
    ///
    /// Returns [`Verdict::Drop`] with the packet if the group has been taken offline, or if the
    /// queue is at its limit or cannot grow. Dropped packets are counted in `dropped_packets`.
    pub fn queue_packet(&self, packet: Packet) -> Verdict {
        let state = &self.state;

        match state.queue.push(packet, state.options.get_queue_limit(), &state.stats) {
            Ok(()) => Verdict::Queued,
            Err(packet) => {
                state.stats.increment_dropped();
                debug!(
                    len = packet.len(),
                    offline = state.queue.is_closed(),
                    "Failed to queue packet, dropping"
                );
                Verdict::Drop(packet)
            }
        }
    }

    /// Runs a single release pass. This is what the release task does once per interval.
    pub fn drain(&self) -> DrainReport {
        self.state.drain()
    }

    /// Returns `true` if the release task is running.
    pub fn is_online(&self) -> bool {
        self.release.lock().is_some()
    }

    /// Starts the release task on the current Tokio runtime.
    ///
    /// Fails if the group is online already, the interval is zero or there is no runtime to
    /// schedule the task on.
    pub fn online(&self) -> Result<(), ShaperError> {
        let mut release = self.release.lock();
        if release.is_some() {
            return Err(ShaperError::AlreadyOnline);
        }

        let period = self.state.options.get_interval();
        if period.is_zero() {
            return Err(ShaperError::InvalidInterval);
        }

        let handle = Handle::try_current().map_err(|_| ShaperError::NoRuntime)?;

        self.state.queue.reopen();

        let token = CancellationToken::new();
        let driver = ReleaseDriver::new(Arc::clone(&self.state), period, token.clone());
        let span = tracing::debug_span!("release", ?period);
        let task = handle.spawn(driver.instrument(span));

        *release = Some(ReleaseHandle::new(token, task));
        debug!(?period, rate = self.rate(), burst = self.burst(), "Group online");

        Ok(())
    }

    /// Stops the release task, waiting for an in-flight release pass to finish, then discards
    /// every packet left in the queue without re-injecting it.
    ///
    /// From then on, until the group goes [`online`](GroupShaper::online) again, packets that
    /// would be queued are dropped instead. Admission and accounting keep working.
    ///
    /// Returns the number of discarded packets. Calling this on a group that is not online only
    /// discards and closes the queue.
    pub async fn offline(&self) -> Result<usize, ShaperError> {
        let release = self.release.lock().take();

        let result = match release {
            Some(release) => release.shutdown().await,
            None => Ok(()),
        };

        // Must only run once the release task is gone.
        let discarded = self.state.queue.close(&self.state.stats).len();
        debug!(discarded, "Group offline");

        result?;
        Ok(discarded)
    }
}

impl Drop for GroupShaper {
    fn drop(&mut self) {
        if let Some(release) = self.release.get_mut().take() {
            warn!("Group dropped while online, cancelling release task");
            release.cancel();
        }
    }
}
