use inventory_core::{
    ingest_snapshot, ingest_snapshot_with_pending, Item, LocalStore, PendingDeletes, RemoteDocument,
};
use proptest::prelude::*;
use serde_json::json;
use uuid::Uuid;

fn document(item: &Item) -> RemoteDocument {
    RemoteDocument::new(item.id.to_string(), serde_json::to_value(item).unwrap())
}

#[test]
fn applying_same_snapshot_twice_is_idempotent() {
    let store = LocalStore::open_in_memory().unwrap();
    let local = Item::new("Mouse", 3, 20.0, 1_000);
    store.upsert(&local).unwrap();

    let mut remote_mouse = local.clone();
    remote_mouse.quantity = 8;
    remote_mouse.updated_at = 2_000;
    let remote_cable = Item::new("Cable", 1, 4.0, 500);
    let snapshot = vec![document(&remote_mouse), document(&remote_cable)];

    let first = ingest_snapshot(&store, &snapshot).unwrap();
    let after_first = store.list_all().unwrap();
    let second = ingest_snapshot(&store, &snapshot).unwrap();

    assert_eq!(first.applied, 2);
    assert_eq!(second.applied, 0);
    assert_eq!(second.discarded, 2);
    assert_eq!(store.list_all().unwrap(), after_first);
}

#[test]
fn absence_from_snapshot_does_not_delete() {
    let store = LocalStore::open_in_memory().unwrap();
    let a = Item::new("A", 1, 1.0, 1_000);
    let b = Item::new("B", 1, 1.0, 1_000);
    store.upsert(&a).unwrap();
    store.upsert(&b).unwrap();

    let mut remote_a = a.clone();
    remote_a.quantity = 2;
    remote_a.updated_at = 1_001;
    ingest_snapshot(&store, &[document(&remote_a)]).unwrap();
    ingest_snapshot(&store, &[]).unwrap();

    assert_eq!(store.list_all().unwrap(), vec![remote_a, b]);
}

#[test]
fn malformed_documents_are_skipped_and_the_rest_applied() {
    let store = LocalStore::open_in_memory().unwrap();
    let good = Item::new("Cable", 1, 4.0, 500);
    let missing_field = RemoteDocument::new(
        Uuid::new_v4().to_string(),
        json!({ "name": "Broken", "quantity": 1, "updatedAt": 1 }),
    );
    let empty_name = RemoteDocument::new(
        Uuid::new_v4().to_string(),
        json!({ "name": "", "quantity": 1, "unitPrice": 1.0, "updatedAt": 1 }),
    );

    let report = ingest_snapshot(
        &store,
        &[missing_field.clone(), document(&good), empty_name.clone()],
    )
    .unwrap();

    assert_eq!(report.documents, 3);
    assert_eq!(report.applied, 1);
    let skipped: Vec<_> = report
        .malformed
        .iter()
        .map(|record| record.document_id.clone())
        .collect();
    assert_eq!(skipped, vec![missing_field.id, empty_name.id]);
    assert_eq!(store.list_all().unwrap(), vec![good]);
}

#[test]
fn legacy_price_field_is_ingested() {
    let store = LocalStore::open_in_memory().unwrap();
    let id = Uuid::new_v4();
    let legacy = RemoteDocument::new(
        id.to_string(),
        json!({ "id": id.to_string(), "name": "Lamp", "quantity": 2, "price": 12.5, "updatedAt": 3 }),
    );

    ingest_snapshot(&store, &[legacy]).unwrap();
    let stored = store.get(id).unwrap().unwrap();
    assert_eq!(stored.unit_price, 12.5);
}

#[test]
fn pending_delete_holds_back_stale_versions_until_settled() {
    let store = LocalStore::open_in_memory().unwrap();
    let pending = PendingDeletes::new();
    let deleted = Item::new("Mouse", 3, 20.0, 1_000);
    pending.record(deleted.id, 1_000);

    let report = ingest_snapshot_with_pending(&store, &[document(&deleted)], &pending).unwrap();
    assert_eq!(report.held_back, 1);
    assert!(store.get(deleted.id).unwrap().is_none());

    pending.acknowledge(deleted.id);
    ingest_snapshot_with_pending(&store, &[], &pending).unwrap();
    assert!(pending.is_empty());
}

proptest! {
    #[test]
    fn remote_wins_iff_strictly_newer(
        local_stamp in 0_i64..10_000,
        remote_stamp in 0_i64..10_000,
        local_quantity in 0_i64..100,
        remote_quantity in 0_i64..100,
    ) {
        let store = LocalStore::open_in_memory().unwrap();
        let local = Item::new("Mouse", local_quantity, 20.0, local_stamp);
        store.upsert(&local).unwrap();

        let mut remote = local.clone();
        remote.quantity = remote_quantity;
        remote.unit_price = 21.0;
        remote.updated_at = remote_stamp;
        ingest_snapshot(&store, &[document(&remote)]).unwrap();

        let stored = store.get(local.id).unwrap().unwrap();
        if remote_stamp > local_stamp {
            prop_assert_eq!(stored, remote);
        } else {
            prop_assert_eq!(stored, local);
        }
    }

    #[test]
    fn repeated_ingestion_matches_single_ingestion(
        stamps in proptest::collection::vec(0_i64..1_000, 1..12),
    ) {
        let once = LocalStore::open_in_memory().unwrap();
        let twice = LocalStore::open_in_memory().unwrap();
        let ids: Vec<_> = (0..stamps.len()).map(|n| Uuid::from_u128(n as u128 + 1)).collect();

        for (id, stamp) in ids.iter().zip(&stamps) {
            let seeded = Item::with_id(*id, "seed", 1, 1.0, 500);
            if stamp % 2 == 0 {
                once.upsert(&seeded).unwrap();
                twice.upsert(&seeded).unwrap();
            }
        }

        let snapshot: Vec<_> = ids
            .iter()
            .zip(&stamps)
            .map(|(id, stamp)| document(&Item::with_id(*id, "remote", 2, 3.0, *stamp)))
            .collect();

        ingest_snapshot(&once, &snapshot).unwrap();
        ingest_snapshot(&twice, &snapshot).unwrap();
        ingest_snapshot(&twice, &snapshot).unwrap();

        prop_assert_eq!(once.list_all().unwrap(), twice.list_all().unwrap());
    }
}
