use std::collections::VecDeque;

use parking_lot::Mutex;

use crate::{packet::QueuedPacket, Packet, ShaperStats};

/// Result of inspecting the head of a [`DelayedQueue`].
#[derive(Debug)]
pub(crate) enum Pop {
    /// The head fit the budget and was removed.
    Ready(QueuedPacket),
    /// The head is larger than the remaining budget. Nothing was removed.
    Blocked { head_len: usize },
    /// The queue is empty.
    Empty,
}

/// A FIFO of packets awaiting release.
///
/// The `delayed_packets` counter is updated in the same critical section as every insertion and
/// removal, so it always equals the queue length.
#[derive(Debug, Default)]
pub(crate) struct DelayedQueue {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    entries: VecDeque<QueuedPacket>,
    /// Set while the group is offline. A closed queue refuses every push.
    closed: bool,
}

impl DelayedQueue {
    /// Appends a packet to the tail of the queue. Gives the packet back if the queue is closed,
    /// holds `limit` packets already or its storage cannot grow.
    pub(crate) fn push(
        &self,
        packet: Packet,
        limit: Option<usize>,
        stats: &ShaperStats,
    ) -> Result<(), Packet> {
        let mut inner = self.inner.lock();
        if inner.closed {
            return Err(packet);
        }

        let entries = &mut inner.entries;
        if limit.is_some_and(|limit| entries.len() >= limit) {
            return Err(packet);
        }

        if entries.try_reserve(1).is_err() {
            return Err(packet);
        }

        entries.push_back(QueuedPacket::new(packet));
        stats.increment_delayed();

        Ok(())
    }

    /// Removes the head of the queue if its length is at most `budget`. Never skips ahead of a
    /// head that does not fit.
    pub(crate) fn pop_within(&self, budget: u64, stats: &ShaperStats) -> Pop {
        let mut inner = self.inner.lock();
        let entries = &mut inner.entries;

        let Some(head) = entries.front() else {
            return Pop::Empty;
        };

        if head.len() as u64 > budget {
            return Pop::Blocked { head_len: head.len() };
        }

        let Some(head) = entries.pop_front() else {
            return Pop::Empty;
        };
        stats.decrement_delayed(1);

        Pop::Ready(head)
    }

    /// Closes the queue, then empties it and returns its former contents in FIFO order. Both
    /// happen in one critical section, so nothing can be queued behind the returned packets.
    pub(crate) fn close(&self, stats: &ShaperStats) -> VecDeque<QueuedPacket> {
        let mut inner = self.inner.lock();
        inner.closed = true;

        let taken = std::mem::take(&mut inner.entries);
        stats.decrement_delayed(taken.len() as u64);

        taken
    }

    /// Accepts pushes again after [`DelayedQueue::close`].
    pub(crate) fn reopen(&self) {
        self.inner.lock().closed = false;
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    pub(crate) fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }
}
