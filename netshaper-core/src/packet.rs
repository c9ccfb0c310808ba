use std::{fmt, sync::Arc};

use bytes::Bytes;
use tokio::time::Instant;

use crate::ReinjectError;

/// A network interface a packet arrived on or leaves through.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Interface {
    index: u32,
    name: Arc<str>,
}

impl Interface {
    pub fn new(index: u32, name: impl Into<Arc<str>>) -> Self {
        Self { index, name: name.into() }
    }

    #[inline]
    pub fn index(&self) -> u32 {
        self.index
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for Interface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.name, self.index)
    }
}

/// Continuation that hands a released packet back to the network path.
///
/// Called by the release task with the group's queue lock released, so implementations may be
/// slow or call back into the shaper.
pub trait Reinject: Send + Sync + 'static {
    fn reinject(&self, interface: &Interface, payload: Bytes) -> Result<(), ReinjectError>;
}

impl<F> Reinject for F
where
    F: Fn(&Interface, Bytes) -> Result<(), ReinjectError> + Send + Sync + 'static,
{
    fn reinject(&self, interface: &Interface, payload: Bytes) -> Result<(), ReinjectError> {
        self(interface, payload)
    }
}

/// A packet observed at a checkpoint.
///
/// A `Packet` is never shared: it moves into [`GroupShaper::decide`](crate::GroupShaper::decide)
/// and either comes back with the verdict or stays in the delayed queue until it is re-injected
/// or discarded.
pub struct Packet {
    payload: Bytes,
    /// The interface to re-inject on.
    interface: Option<Interface>,
    /// How to re-inject the packet if it gets queued.
    reinject: Option<Arc<dyn Reinject>>,
}

impl Packet {
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Self { payload: payload.into(), interface: None, reinject: None }
    }

    /// Sets the interface the packet is re-injected on after being delayed.
    pub fn with_interface(mut self, interface: Interface) -> Self {
        self.interface = Some(interface);
        self
    }

    /// Sets the continuation used to re-inject the packet after being delayed.
    pub fn with_reinject(mut self, reinject: Arc<dyn Reinject>) -> Self {
        self.reinject = Some(reinject);
        self
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    #[inline]
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    #[inline]
    pub fn interface(&self) -> Option<&Interface> {
        self.interface.as_ref()
    }

    #[inline]
    pub fn into_payload(self) -> Bytes {
        self.payload
    }
}

impl fmt::Debug for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Packet")
            .field("len", &self.payload.len())
            .field("interface", &self.interface)
            .field("reinject", &self.reinject.is_some())
            .finish()
    }
}

/// A packet owned by a delayed queue.
#[derive(Debug)]
pub(crate) struct QueuedPacket {
    packet: Packet,
    /// Length captured at enqueue time. Release accounting always uses this value.
    len: usize,
    /// Informational only, queue residency is not bounded.
    enqueued_at: Instant,
}

impl QueuedPacket {
    pub(crate) fn new(packet: Packet) -> Self {
        let len = packet.len();
        Self { packet, len, enqueued_at: Instant::now() }
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub(crate) fn enqueued_at(&self) -> Instant {
        self.enqueued_at
    }

    /// Hands the packet back to the network path. If the packet has no target or the
    /// continuation fails, the payload is dropped.
    pub(crate) fn release(self) -> Result<(), ReinjectError> {
        let Packet { payload, interface, reinject } = self.packet;

        match (interface, reinject) {
            (Some(interface), Some(reinject)) => reinject.reinject(&interface, payload),
            _ => Err(ReinjectError::MissingTarget),
        }
    }
}
