use std::{net::SocketAddr, sync::Arc};

use bytes::Bytes;
use parking_lot::Mutex;

use netshaper_cgroup::{HookState, Hooks};
use netshaper_core::{Interface, ReinjectError};

mod files;
mod hooks;
mod lifecycle;

type Released = Arc<Mutex<Vec<Bytes>>>;

/// A checkpoint state whose continuation records every re-injected payload.
fn recording_state() -> (HookState, Released) {
    let released = Released::default();
    let sink = Arc::clone(&released);
    let okfn = move |_: &Interface, payload: Bytes| -> Result<(), ReinjectError> {
        sink.lock().push(payload);
        Ok(())
    };

    (HookState::new(Interface::new(2, "eth0"), Arc::new(okfn)), released)
}

fn addr(port: u16) -> SocketAddr {
    SocketAddr::from(([192, 168, 1, 10], port))
}

fn tags(released: &Released) -> Vec<u8> {
    released.lock().iter().map(|payload| payload[0]).collect()
}

fn hooks_for(hierarchy: &Arc<netshaper_cgroup::Hierarchy>) -> Hooks {
    Hooks::new(Arc::clone(hierarchy))
}
