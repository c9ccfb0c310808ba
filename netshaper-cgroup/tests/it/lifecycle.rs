use std::{sync::Arc, time::Duration};

use netshaper_cgroup::{Error, Hierarchy, HookVerdict, Skb, SocketId};
use netshaper_core::ShaperOptions;

use crate::{addr, hooks_for, recording_state, tags};

#[tokio::test(start_paused = true)]
async fn queued_ingress_is_released_after_an_interval() {
    let _ = tracing_subscriber::fmt::try_init();

    // 1000 bytes per window.
    let hierarchy = Arc::new(Hierarchy::new(ShaperOptions::default().default_rate(10_000)));
    let group = hierarchy.create_group(None).unwrap();
    hierarchy.write_file(group, netshaper_cgroup::BURST_FILE, "0").unwrap();
    hierarchy.attach_socket(SocketId::new(1), addr(8080), group).unwrap();
    hierarchy.online(group).unwrap();

    let hooks = hooks_for(&hierarchy);
    let (state, released) = recording_state();

    let mut stolen = 0;
    for tag in 0..10u8 {
        let skb = Skb::new(vec![tag; 300]).with_dst(addr(8080));
        match hooks.ingress(skb, &state) {
            HookVerdict::Accept(_) => {}
            HookVerdict::Stolen => stolen += 1,
            HookVerdict::Drop => panic!("unexpected drop"),
        }
    }

    assert!(stolen > 0);
    let shaper = hierarchy.shaper(group).unwrap();
    assert_eq!(shaper.snapshot().delayed_packets, stolen);

    // Three 300 byte packets fit each window.
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(released.lock().len(), stolen.min(3) as usize);

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(released.lock().len(), stolen as usize);
    assert_eq!(shaper.snapshot().delayed_packets, 0);
    assert_eq!(shaper.snapshot().released_packets, stolen);

    // Released packets keep their arrival order.
    let order = tags(&released);
    let mut sorted = order.clone();
    sorted.sort();
    assert_eq!(order, sorted);

    hierarchy.offline(group).await.unwrap();
    hierarchy.destroy(group).unwrap();
}

#[tokio::test(start_paused = true)]
async fn offline_discards_and_destroy_detaches() {
    let hierarchy = Arc::new(Hierarchy::new(
        ShaperOptions::default().default_rate(0).default_burst(500),
    ));
    let group = hierarchy.create_group(None).unwrap();
    hierarchy.attach_socket(SocketId::new(9), addr(9000), group).unwrap();
    hierarchy.online(group).unwrap();

    let hooks = hooks_for(&hierarchy);
    let (state, released) = recording_state();

    for tag in 0..4u8 {
        let skb = Skb::new(vec![tag; 400]).with_socket(SocketId::new(9));
        let _ = hooks.egress(skb, &state);
    }

    let queued = hierarchy.shaper(group).unwrap().queued();
    assert!(queued > 0);

    assert!(matches!(hierarchy.destroy(group), Err(Error::StillOnline(_))));
    assert_eq!(hierarchy.offline(group).await.unwrap(), queued);

    // An offline group never queues: over-budget packets are dropped and counted.
    let skb = Skb::new(vec![0u8; 400]).with_socket(SocketId::new(9));
    assert!(matches!(hooks.egress(skb, &state), HookVerdict::Accept(_)));
    let skb = Skb::new(vec![0u8; 400]).with_socket(SocketId::new(9));
    assert!(matches!(hooks.egress(skb, &state), HookVerdict::Drop));

    let shaper = hierarchy.shaper(group).unwrap();
    assert_eq!(shaper.queued(), 0);
    assert_eq!(shaper.snapshot().dropped_packets, 1);
    drop(shaper);

    hierarchy.destroy(group).unwrap();

    // Nothing left to release, and the socket no longer belongs to a group.
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(released.lock().is_empty());

    let skb = Skb::new(vec![0u8; 400]).with_socket(SocketId::new(9));
    assert!(matches!(hooks.egress(skb, &state), HookVerdict::Accept(_)));
}

#[test]
fn groups_are_independent() {
    let hierarchy = Arc::new(Hierarchy::new(
        ShaperOptions::default().default_rate(0).default_burst(1_000),
    ));
    let root = hierarchy.create_group(None).unwrap();
    let child = hierarchy.create_group(Some(root)).unwrap();

    hierarchy.attach_socket(SocketId::new(1), addr(1), root).unwrap();
    hierarchy.attach_socket(SocketId::new(2), addr(2), child).unwrap();

    let hooks = hooks_for(&hierarchy);
    let (state, _) = recording_state();

    for _ in 0..3 {
        let _ = hooks.egress(Skb::new(vec![0u8; 400]).with_socket(SocketId::new(1)), &state);
    }

    let verdict = hooks.egress(Skb::new(vec![0u8; 400]).with_socket(SocketId::new(2)), &state);
    assert!(matches!(verdict, HookVerdict::Accept(_)));

    assert_eq!(hierarchy.shaper(root).unwrap().snapshot().bytes_tx, 1_200);
    assert_eq!(hierarchy.shaper(child).unwrap().snapshot().bytes_tx, 400);
}

#[test]
fn online_requires_runtime() {
    let hierarchy = Hierarchy::default();
    let group = hierarchy.create_group(None).unwrap();

    assert!(matches!(hierarchy.online(group), Err(Error::Shaper(_))));
    assert!(!hierarchy.shaper(group).unwrap().is_online());
}
