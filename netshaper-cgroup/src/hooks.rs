//! Ingress and egress checkpoints.
//!
//! [`Hooks`] sit where the host intercepts packets. They resolve each packet to the group that
//! owns its socket, run the group's admission decision and translate the verdict into what the
//! network path understands: continue, stolen (the shaper re-injects it later) or drop.

use std::{net::SocketAddr, sync::Arc};

use bytes::Bytes;
use tracing::trace;

use netshaper_core::{Direction, GroupShaper, Interface, Packet, Reinject, Verdict};

use crate::{Hierarchy, SocketId};

/// A packet as seen by a checkpoint.
#[derive(Debug, Clone)]
pub struct Skb {
    pub payload: Bytes,
    /// The socket the packet is already associated with. Always set for locally generated
    /// traffic, usually unset on ingress.
    pub socket: Option<SocketId>,
    /// The local destination, used to find the owning socket of ingress packets.
    pub dst: Option<SocketAddr>,
}

impl Skb {
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Self { payload: payload.into(), socket: None, dst: None }
    }

    pub fn with_socket(mut self, socket: SocketId) -> Self {
        self.socket = Some(socket);
        self
    }

    pub fn with_dst(mut self, dst: SocketAddr) -> Self {
        self.dst = Some(dst);
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
}

/// Per-invocation checkpoint state: the device the packet came in on or goes out through, and
/// how to continue its traversal later.
#[derive(Clone)]
pub struct HookState {
    pub interface: Interface,
    pub okfn: Arc<dyn Reinject>,
}

impl HookState {
    pub fn new(interface: Interface, okfn: Arc<dyn Reinject>) -> Self {
        Self { interface, okfn }
    }
}

/// What the network path should do with a packet after a checkpoint.
#[derive(Debug)]
#[must_use]
pub enum HookVerdict {
    /// Continue traversal with the packet.
    Accept(Skb),
    /// The packet was taken over and will be re-injected through the [`HookState::okfn`].
    Stolen,
    /// Discard the packet.
    Drop,
}

/// The checkpoints of a [`Hierarchy`].
#[derive(Debug, Clone)]
pub struct Hooks {
    hierarchy: Arc<Hierarchy>,
}

impl Hooks {
    pub fn new(hierarchy: Arc<Hierarchy>) -> Self {
        Self { hierarchy }
    }

    pub fn hierarchy(&self) -> &Arc<Hierarchy> {
        &self.hierarchy
    }

    /// Outbound checkpoint. Packets without an owning socket or group are accepted.
    pub fn egress(&self, skb: Skb, state: &HookState) -> HookVerdict {
        let Some(socket) = skb.socket.and_then(|id| self.hierarchy.socket(id)) else {
            return HookVerdict::Accept(skb);
        };

        let Some(shaper) = self.hierarchy.owner_of(&socket) else {
            return HookVerdict::Accept(skb);
        };

        trace!(socket = %socket.id, group = %socket.group, len = skb.len(), "Egress");
        admit(&shaper, skb, state, Direction::Egress)
    }

    /// Inbound checkpoint. Packets that are not associated with a socket yet are matched by
    /// destination. Packets without an owning socket or group are accepted.
    ///
    /// The socket and group references taken for the lookup are released when this returns,
    /// whatever the verdict.
    pub fn ingress(&self, skb: Skb, state: &HookState) -> HookVerdict {
        let socket = match skb.socket {
            Some(id) => self.hierarchy.socket(id),
            None => skb.dst.and_then(|dst| self.hierarchy.lookup_socket(dst)),
        };

        let Some(socket) = socket else {
            return HookVerdict::Accept(skb);
        };

        let Some(shaper) = self.hierarchy.owner_of(&socket) else {
            return HookVerdict::Accept(skb);
        };

        trace!(socket = %socket.id, group = %socket.group, len = skb.len(), "Ingress");
        admit(&shaper, skb, state, Direction::Ingress)
    }
}

fn admit(
    shaper: &GroupShaper,
    skb: Skb,
    state: &HookState,
    direction: Direction,
) -> HookVerdict {
    let Skb { payload, socket, dst } = skb;

    let packet = Packet::new(payload)
        .with_interface(state.interface.clone())
        .with_reinject(Arc::clone(&state.okfn));

    match shaper.decide(packet, direction) {
        Verdict::Accept(packet) => {
            HookVerdict::Accept(Skb { payload: packet.into_payload(), socket, dst })
        }
        Verdict::Queued => HookVerdict::Stolen,
        Verdict::Drop(_) => HookVerdict::Drop,
    }
}

impl std::fmt::Debug for HookState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookState").field("interface", &self.interface).finish_non_exhaustive()
    }
}
