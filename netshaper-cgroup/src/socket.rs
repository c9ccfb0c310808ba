use std::{net::SocketAddr, sync::Arc};

use rustc_hash::FxHashMap;

use crate::{Error, GroupId, Result, SocketId};

/// A socket owned by a workload group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Socket {
    pub id: SocketId,
    /// The local address the socket is bound to. Ingress packets are matched against it.
    pub local: SocketAddr,
    pub group: GroupId,
}

/// Sockets indexed by id and by local address.
#[derive(Debug, Default)]
pub(crate) struct SocketTable {
    by_id: FxHashMap<SocketId, Arc<Socket>>,
    by_addr: FxHashMap<SocketAddr, SocketId>,
}

impl SocketTable {
    pub(crate) fn insert(&mut self, socket: Socket) -> Result<()> {
        if self.by_addr.get(&socket.local).is_some_and(|owner| *owner != socket.id) {
            return Err(Error::AddressInUse(socket.local));
        }

        // Re-attaching a socket moves it.
        self.remove(socket.id);

        self.by_addr.insert(socket.local, socket.id);
        self.by_id.insert(socket.id, Arc::new(socket));

        Ok(())
    }

    pub(crate) fn remove(&mut self, id: SocketId) -> Option<Arc<Socket>> {
        let socket = self.by_id.remove(&id)?;
        self.by_addr.remove(&socket.local);
        Some(socket)
    }

    /// Removes every socket owned by `group`.
    pub(crate) fn remove_group(&mut self, group: GroupId) -> usize {
        let ids: Vec<SocketId> =
            self.by_id.values().filter(|socket| socket.group == group).map(|s| s.id).collect();

        for id in &ids {
            self.remove(*id);
        }

        ids.len()
    }

    pub(crate) fn get(&self, id: SocketId) -> Option<Arc<Socket>> {
        self.by_id.get(&id).cloned()
    }

    /// Resolves the socket bound to `local`. The returned reference must be dropped once the
    /// caller is done with it.
    pub(crate) fn lookup(&self, local: SocketAddr) -> Option<Arc<Socket>> {
        self.by_addr.get(&local).and_then(|id| self.get(*id))
    }
}
