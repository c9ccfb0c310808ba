#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

//! Per-group network bandwidth shaping.
//!
//! ```
//! use std::sync::Arc;
//!
//! use bytes::Bytes;
//! use netshaper::{
//!     Hierarchy, HookState, HookVerdict, Hooks, Interface, ReinjectError, ShaperOptions, Skb,
//!     SocketId, RATE_FILE,
//! };
//!
//! let hierarchy = Arc::new(Hierarchy::new(ShaperOptions::default()));
//! let group = hierarchy.create_group(None).unwrap();
//! hierarchy.write_file(group, RATE_FILE, "2000000").unwrap();
//!
//! let local = "10.0.0.2:8080".parse().unwrap();
//! hierarchy.attach_socket(SocketId::new(1), local, group).unwrap();
//!
//! let okfn = |_: &Interface, _: Bytes| -> Result<(), ReinjectError> { Ok(()) };
//! let state = HookState::new(Interface::new(2, "eth0"), Arc::new(okfn));
//!
//! let hooks = Hooks::new(Arc::clone(&hierarchy));
//! let verdict = hooks.ingress(Skb::new(vec![0u8; 1500]).with_dst(local), &state);
//! assert!(matches!(verdict, HookVerdict::Accept(_)));
//! ```

pub use netshaper_cgroup::*;
pub use netshaper_core::*;
