use std::{
    future::Future,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
    time::Duration,
};

use futures::FutureExt;
use tokio::{
    task::{JoinError, JoinHandle},
    time::{interval_at, Instant, Interval, MissedTickBehavior},
};
use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};
use tracing::{debug, trace};

use crate::group::ShaperState;

/// Outcome of a single release pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// The budget computed for this pass.
    pub budget: u64,
    /// Packets handed back to the network path.
    pub released: usize,
    /// Bytes removed from the queue, including discarded packets.
    pub released_bytes: u64,
    /// Packets removed from the queue but discarded because re-injection failed.
    pub discarded: usize,
    /// Length of the head packet that did not fit the remaining budget, if any.
    pub blocked_on: Option<usize>,
}

/// The periodic release task of an online group.
///
/// Drains the group's delayed queue once per interval until cancelled. A drain pass runs to
/// completion inside a single poll, so cancellation is only observed between passes.
pub(crate) struct ReleaseDriver {
    /// The group state, shared with the [`GroupShaper`](crate::GroupShaper) handle.
    state: Arc<ShaperState>,
    /// Ticks once per interval. Missed ticks are delayed, not bursted.
    interval: Interval,
    /// Resolves when the group goes offline.
    cancelled: Pin<Box<WaitForCancellationFutureOwned>>,
}

impl ReleaseDriver {
    pub(crate) fn new(state: Arc<ShaperState>, period: Duration, token: CancellationToken) -> Self {
        // The first pass runs one period after going online.
        let mut interval = interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        Self { state, interval, cancelled: Box::pin(token.cancelled_owned()) }
    }
}

impl Future for ReleaseDriver {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        loop {
            if this.cancelled.poll_unpin(cx).is_ready() {
                debug!("Release task cancelled");
                return Poll::Ready(());
            }

            if this.interval.poll_tick(cx).is_ready() {
                let report = this.state.drain();
                if report.released > 0 || report.discarded > 0 || report.blocked_on.is_some() {
                    debug!(?report, queued = this.state.queue.len(), "Release pass");
                } else {
                    trace!(budget = report.budget, "Release pass, nothing to do");
                }

                continue;
            }

            return Poll::Pending;
        }
    }
}

/// Handle to a running [`ReleaseDriver`], owned by the group while it is online.
#[derive(Debug)]
pub(crate) struct ReleaseHandle {
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl ReleaseHandle {
    pub(crate) fn new(token: CancellationToken, task: JoinHandle<()>) -> Self {
        Self { token, task }
    }

    /// Cancels the release task and waits for it to finish. Once this returns, no release pass
    /// is running or will ever run again.
    pub(crate) async fn shutdown(self) -> Result<(), JoinError> {
        self.token.cancel();
        self.task.await
    }

    /// Cancels the release task without waiting for it.
    pub(crate) fn cancel(&self) {
        self.token.cancel();
    }
}
