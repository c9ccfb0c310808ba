use std::{
    net::SocketAddr,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tracing::{debug, info};

use netshaper_core::{GroupShaper, ShaperOptions};

use crate::{
    socket::{Socket, SocketTable},
    Error, GroupId, Result, SocketId,
};

#[derive(Debug)]
struct GroupEntry {
    parent: Option<GroupId>,
    shaper: Arc<GroupShaper>,
}

/// A tree of workload groups, each with its own [`GroupShaper`], plus the sockets they own.
///
/// Group ids are never reused.
#[derive(Debug)]
pub struct Hierarchy {
    /// Options shared by every group, including the defaults of root groups.
    options: Arc<ShaperOptions>,
    groups: RwLock<FxHashMap<GroupId, GroupEntry>>,
    sockets: RwLock<SocketTable>,
    next_id: AtomicU64,
}

impl Default for Hierarchy {
    fn default() -> Self {
        Self::new(ShaperOptions::default())
    }
}

impl Hierarchy {
    pub fn new(options: ShaperOptions) -> Self {
        Self {
            options: Arc::new(options),
            groups: RwLock::new(FxHashMap::default()),
            sockets: RwLock::new(SocketTable::default()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn options(&self) -> &ShaperOptions {
        &self.options
    }

    /// Creates a group. Without a parent, the group starts with the default rate and burst,
    /// otherwise it copies the parent's current limits.
    pub fn create_group(&self, parent: Option<GroupId>) -> Result<GroupId> {
        let mut groups = self.groups.write();

        let shaper = match parent {
            Some(parent_id) => {
                let parent = groups.get(&parent_id).ok_or(Error::UnknownGroup(parent_id))?;
                GroupShaper::child_of(&parent.shaper)
            }
            None => GroupShaper::root(Arc::clone(&self.options)),
        };

        let id = GroupId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        debug!(%id, ?parent, rate = shaper.rate(), burst = shaper.burst(), "Created group");
        groups.insert(id, GroupEntry { parent, shaper: Arc::new(shaper) });

        Ok(id)
    }

    /// Starts the group's release task. Must be called from within a Tokio runtime.
    pub fn online(&self, id: GroupId) -> Result<()> {
        self.shaper(id)?.online()?;
        info!(%id, "Group online");
        Ok(())
    }

    /// Stops the group's release task and discards its queued packets. Returns the number of
    /// discarded packets.
    pub async fn offline(&self, id: GroupId) -> Result<usize> {
        let shaper = self.shaper(id)?;
        let discarded = shaper.offline().await?;
        info!(%id, discarded, "Group offline");

        Ok(discarded)
    }

    /// Frees a group. The group must be offline and have no children. Its sockets are detached.
    pub fn destroy(&self, id: GroupId) -> Result<()> {
        let mut groups = self.groups.write();

        let entry = groups.get(&id).ok_or(Error::UnknownGroup(id))?;
        if entry.shaper.is_online() {
            return Err(Error::StillOnline(id));
        }

        if groups.values().any(|entry| entry.parent == Some(id)) {
            return Err(Error::HasChildren(id));
        }

        groups.remove(&id);
        drop(groups);

        let detached = self.sockets.write().remove_group(id);
        debug!(%id, detached, "Destroyed group");

        Ok(())
    }

    /// Returns the shaper of a group.
    pub fn shaper(&self, id: GroupId) -> Result<Arc<GroupShaper>> {
        self.groups
            .read()
            .get(&id)
            .map(|entry| Arc::clone(&entry.shaper))
            .ok_or(Error::UnknownGroup(id))
    }

    pub fn parent(&self, id: GroupId) -> Result<Option<GroupId>> {
        self.groups.read().get(&id).map(|entry| entry.parent).ok_or(Error::UnknownGroup(id))
    }

    pub fn children(&self, id: GroupId) -> Vec<GroupId> {
        let mut children: Vec<GroupId> = self
            .groups
            .read()
            .iter()
            .filter(|(_, entry)| entry.parent == Some(id))
            .map(|(child, _)| *child)
            .collect();
        children.sort();
        children
    }

    /// The number of live groups.
    pub fn len(&self) -> usize {
        self.groups.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.read().is_empty()
    }

    /// Attaches a socket bound to `local` to a group. A socket that is attached already moves to
    /// the new group.
    pub fn attach_socket(
        &self,
        socket: SocketId,
        local: SocketAddr,
        group: GroupId,
    ) -> Result<()> {
        if !self.groups.read().contains_key(&group) {
            return Err(Error::UnknownGroup(group));
        }

        self.sockets.write().insert(Socket { id: socket, local, group })?;
        debug!(%socket, %local, %group, "Attached socket");

        Ok(())
    }

    pub fn detach_socket(&self, socket: SocketId) -> Result<()> {
        self.sockets.write().remove(socket).map(|_| ()).ok_or(Error::UnknownSocket(socket))
    }

    /// Returns a reference to an attached socket.
    pub fn socket(&self, id: SocketId) -> Option<Arc<Socket>> {
        self.sockets.read().get(id)
    }

    /// Resolves the socket bound to `local`.
    pub fn lookup_socket(&self, local: SocketAddr) -> Option<Arc<Socket>> {
        self.sockets.read().lookup(local)
    }

    /// Resolves the group owning a socket, if both still exist.
    pub fn owner_of(&self, socket: &Socket) -> Option<Arc<GroupShaper>> {
        self.shaper(socket.group).ok()
    }
}
