use std::{sync::Arc, thread};

use rand::Rng;

use netshaper_cgroup::{Hierarchy, HookVerdict, Skb, SocketId};
use netshaper_core::ShaperOptions;

use crate::{addr, hooks_for, recording_state};

#[test]
fn accounting_is_exact_under_contention() {
    let hierarchy = Arc::new(Hierarchy::new(ShaperOptions::default().default_rate(u32::MAX)));
    let group = hierarchy.create_group(None).unwrap();
    hierarchy.attach_socket(SocketId::new(1), addr(443), group).unwrap();

    let hooks = hooks_for(&hierarchy);

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let hooks = hooks.clone();
            thread::spawn(move || {
                let (state, _) = recording_state();
                let mut rng = rand::thread_rng();
                let mut sent = 0u64;

                for _ in 0..500 {
                    let len = rng.gen_range(1..1500);
                    sent += len as u64;

                    let skb = Skb::new(vec![0u8; len]).with_dst(addr(443));
                    let _ = hooks.ingress(skb, &state);
                }

                sent
            })
        })
        .collect();

    let sent: u64 = handles.into_iter().map(|handle| handle.join().unwrap()).sum();

    let snapshot = hierarchy.shaper(group).unwrap().snapshot();
    assert_eq!(snapshot.bytes_rx, sent);
    assert_eq!(snapshot.bytes_tx, 0);
}

#[test]
fn egress_with_unknown_socket_passes() {
    let hierarchy = Arc::new(Hierarchy::default());
    let hooks = hooks_for(&hierarchy);
    let (state, _) = recording_state();

    let skb = Skb::new(vec![7u8; 64]).with_socket(SocketId::new(404));
    match hooks.egress(skb, &state) {
        HookVerdict::Accept(skb) => assert_eq!(&skb.payload[..], &[7u8; 64][..]),
        other => panic!("expected accept, got {other:?}"),
    }
}

#[test]
fn ingress_matches_destination_port() {
    let hierarchy = Arc::new(Hierarchy::new(
        ShaperOptions::default().default_rate(0).default_burst(100),
    ));
    let group = hierarchy.create_group(None).unwrap();
    hierarchy.attach_socket(SocketId::new(1), addr(53), group).unwrap();

    let hooks = hooks_for(&hierarchy);
    let (state, _) = recording_state();

    // Other ports on the same host are not shaped.
    let verdict = hooks.ingress(Skb::new(vec![0u8; 500]).with_dst(addr(54)), &state);
    assert!(matches!(verdict, HookVerdict::Accept(_)));

    let verdict = hooks.ingress(Skb::new(vec![0u8; 500]).with_dst(addr(53)), &state);
    assert!(matches!(verdict, HookVerdict::Stolen));
}
