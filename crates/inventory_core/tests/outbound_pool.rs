mod support;

use inventory_core::{Item, MutationKind, SyncConfig};
use std::sync::Arc;
use std::time::Duration;
use support::{eventually, start_scripted, ScriptedMirror};
use tokio::time::{sleep, timeout};
use uuid::Uuid;

fn config(outbound_workers: usize, outbound_queue_capacity: usize) -> SyncConfig {
    SyncConfig {
        outbound_workers,
        outbound_queue_capacity,
        resubscribe_backoff_ms: 10,
        ..SyncConfig::default()
    }
}

// Lane routing is `id % outbound_workers`, so sequential ids spread evenly.
fn item(n: u128) -> Item {
    Item::with_id(Uuid::from_u128(n), format!("item-{n}"), 1, 1.0, 0)
}

#[tokio::test]
async fn remote_writes_in_flight_never_exceed_worker_count() {
    let mirror = Arc::new(ScriptedMirror::gated());
    let (engine, _clock) = start_scripted(mirror.clone(), config(2, 16)).await;

    for n in 1..=8 {
        engine.update_item(&item(n)).await.unwrap();
    }
    eventually(|| mirror.in_flight() == 2).await;
    sleep(Duration::from_millis(30)).await;
    assert_eq!(mirror.in_flight(), 2);

    mirror.release(64);
    eventually(|| mirror.log().len() == 8).await;
    assert_eq!(mirror.max_in_flight(), 2);
    engine.shutdown().await;
}

#[tokio::test]
async fn full_lane_holds_the_caller_after_the_local_commit() {
    let mirror = Arc::new(ScriptedMirror::gated());
    let (engine, _clock) = start_scripted(mirror.clone(), config(1, 1)).await;

    engine.update_item(&item(1)).await.unwrap();
    eventually(|| mirror.in_flight() == 1).await;
    engine.update_item(&item(2)).await.unwrap();

    let third = item(3);
    let blocked = engine.update_item(&third);
    tokio::pin!(blocked);
    assert!(timeout(Duration::from_millis(50), &mut blocked).await.is_err());
    assert!(engine.get_item(third.id).unwrap().is_some());

    mirror.release(8);
    let written = timeout(Duration::from_secs(5), blocked)
        .await
        .expect("caller still blocked after the lane drained")
        .unwrap();
    assert_eq!(written.id, third.id);

    eventually(|| mirror.log().len() == 3).await;
    engine.shutdown().await;
}

#[tokio::test]
async fn mutations_of_one_item_reach_the_remote_in_order() {
    let mirror = Arc::new(ScriptedMirror::open());
    let (engine, _clock) = start_scripted(mirror.clone(), config(4, 16)).await;

    let items: Vec<_> = (1..=6).map(item).collect();
    for item in &items {
        engine.update_item(item).await.unwrap();
        engine.delete_item(item).await.unwrap();
        engine.update_item(item).await.unwrap();
    }
    eventually(|| mirror.log().len() == items.len() * 3).await;

    let log = mirror.log();
    for item in &items {
        let kinds: Vec<_> = log
            .iter()
            .filter(|(_, id)| *id == item.id)
            .map(|(kind, _)| *kind)
            .collect();
        assert_eq!(
            kinds,
            vec![MutationKind::Put, MutationKind::Delete, MutationKind::Put],
            "item {}",
            item.id
        );
    }
    engine.shutdown().await;
}
