use std::io;

use thiserror::Error;

/// Lifecycle errors of a [`GroupShaper`](crate::GroupShaper). Admission never fails with an
/// error, it only ever produces a [`Verdict`](crate::Verdict).
#[derive(Debug, Error)]
pub enum ShaperError {
    #[error("Release task is already running")]
    AlreadyOnline,
    #[error("No async runtime available to schedule the release task")]
    NoRuntime,
    #[error("Release interval must be non-zero")]
    InvalidInterval,
    #[error("Release task failed: {0}")]
    ReleaseTask(#[from] tokio::task::JoinError),
}

/// Failure to hand a released packet back to the network path. The packet is discarded.
#[derive(Debug, Error)]
pub enum ReinjectError {
    #[error("IO error: {0:?}")]
    Io(#[from] io::Error),
    #[error("Packet has no re-injection target")]
    MissingTarget,
    #[error("Interface {0} is down")]
    InterfaceDown(String),
    #[error("Re-injection rejected: {0}")]
    Rejected(String),
}
