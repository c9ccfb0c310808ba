#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

//! An in-memory host environment for [`netshaper_core`].
//!
//! It provides what the shaping engine expects from its surroundings: a hierarchy of workload
//! groups that inherit their limits from their parent ([`Hierarchy`]), sockets attached to those
//! groups so packets can be resolved to an owner, the ingress and egress checkpoints that run the
//! admission decision and honour its verdict ([`Hooks`]), and the control files used to read and
//! write limits and statistics.

use std::{fmt, net::SocketAddr};

use thiserror::Error;

use netshaper_core::ShaperError;

mod files;
pub use files::{ControlFile, BURST_FILE, RATE_FILE, STATS_FILE};

mod hierarchy;
pub use hierarchy::Hierarchy;

mod hooks;
pub use hooks::{HookState, HookVerdict, Hooks, Skb};

mod socket;
pub use socket::Socket;

/// Identifies a workload group within a [`Hierarchy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupId(u64);

impl GroupId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "group-{}", self.0)
    }
}

/// Identifies a socket attached to a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SocketId(u64);

impl SocketId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SocketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "socket-{}", self.0)
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("Unknown group: {0}")]
    UnknownGroup(GroupId),
    #[error("Group {0} is still online")]
    StillOnline(GroupId),
    #[error("Group {0} still has children")]
    HasChildren(GroupId),
    #[error("Unknown socket: {0}")]
    UnknownSocket(SocketId),
    #[error("Address already in use: {0}")]
    AddressInUse(SocketAddr),
    #[error("Unknown control file: {0}")]
    UnknownFile(String),
    #[error("Control file {0} is read-only")]
    ReadOnly(&'static str),
    #[error("Invalid value for {file}: {value:?}")]
    InvalidValue { file: &'static str, value: String },
    #[error("Shaper error: {0}")]
    Shaper(#[from] ShaperError),
}

pub type Result<T> = std::result::Result<T, Error>;
