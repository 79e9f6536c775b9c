use std::sync::Arc;
use std::thread;

use super::create_test_store;

use pilot_mem_core::{PayloadKind, QueuePayload};

fn payload(n: u32) -> String {
    serde_json::to_string(&QueuePayload::new(
        PayloadKind::Observation,
        serde_json::json!({"n": n}),
    ))
    .unwrap()
}

#[test]
fn enqueue_then_claim_preserves_fifo_order() {
    let (store, _dir) = create_test_store();
    let session = store.create_session("content-1", "pilot", None, 1_000).unwrap();

    for n in 0..5 {
        store.enqueue(session, &payload(n), 1_000 + i64::from(n)).unwrap();
    }

    for n in 0..5 {
        let row = store.claim_and_delete(session).unwrap().unwrap();
        let msg = row.to_pending_message().unwrap();
        assert_eq!(msg.payload.body["n"], n);
    }
    assert!(store.claim_and_delete(session).unwrap().is_none());
}

#[test]
fn claim_batch_is_bounded_and_ordered() {
    let (store, _dir) = create_test_store();
    let session = store.create_session("content-1", "pilot", None, 1_000).unwrap();
    for n in 0..5 {
        store.enqueue(session, &payload(n), 1_000).unwrap();
    }

    let batch1 = store.claim_and_delete_batch(session, 2).unwrap();
    let batch2 = store.claim_and_delete_batch(session, 2).unwrap();
    let batch3 = store.claim_and_delete_batch(session, 2).unwrap();
    let batch4 = store.claim_and_delete_batch(session, 2).unwrap();

    assert_eq!(batch1.len(), 2);
    assert_eq!(batch2.len(), 2);
    assert_eq!(batch3.len(), 1);
    assert!(batch4.is_empty());
    let ids: Vec<i64> = [batch1, batch2, batch3].concat().iter().map(|r| r.id).collect();
    let mut sorted = ids.clone();
    sorted.sort_unstable();
    assert_eq!(ids, sorted);
}

#[test]
fn claims_are_scoped_per_session() {
    let (store, _dir) = create_test_store();
    let s1 = store.create_session("content-1", "pilot", None, 1_000).unwrap();
    let s2 = store.create_session("content-2", "pilot", None, 1_000).unwrap();
    store.enqueue(s1, &payload(1), 1_000).unwrap();
    store.enqueue(s2, &payload(2), 1_000).unwrap();

    let row = store.claim_and_delete(s1).unwrap().unwrap();
    assert_eq!(row.session_db_id, s1);
    assert_eq!(store.pending_count_for_session(s2).unwrap(), 1);
}

#[test]
fn concurrent_claims_never_observe_the_same_row() {
    let (store, _dir) = create_test_store();
    let session = store.create_session("content-1", "pilot", None, 1_000).unwrap();
    for n in 0..20 {
        store.enqueue(session, &payload(n), 1_000).unwrap();
    }

    let store = Arc::new(store);
    let mut handles = Vec::new();
    for _ in 0..4 {
        let store = Arc::clone(&store);
        handles.push(thread::spawn(move || {
            let mut seen = Vec::new();
            while let Some(row) = store.claim_and_delete(session).unwrap() {
                seen.push(row.id);
            }
            seen
        }));
    }

    let mut all: Vec<i64> = handles.into_iter().flat_map(|h| h.join().unwrap()).collect();
    assert_eq!(all.len(), 20);
    all.sort_unstable();
    all.dedup();
    assert_eq!(all.len(), 20, "a row was claimed twice");
}

#[test]
fn malformed_payload_surfaces_as_corruption() {
    let (store, _dir) = create_test_store();
    let session = store.create_session("content-1", "pilot", None, 1_000).unwrap();
    store.enqueue(session, "{broken", 1_000).unwrap();

    let row = store.claim_and_delete(session).unwrap().unwrap();
    let err = row.to_pending_message().unwrap_err();
    assert!(matches!(err, pilot_mem_core::WorkerError::Corruption(_)));
}

#[test]
fn queue_depth_counts_all_sessions() {
    let (store, _dir) = create_test_store();
    let s1 = store.create_session("content-1", "pilot", None, 1_000).unwrap();
    let s2 = store.create_session("content-2", "pilot", None, 1_000).unwrap();
    store.enqueue(s1, &payload(1), 1_000).unwrap();
    store.enqueue(s2, &payload(2), 1_000).unwrap();
    store.enqueue(s2, &payload(3), 1_000).unwrap();

    assert_eq!(store.pending_total().unwrap(), 3);
    assert_eq!(store.pending_count_for_session(s2).unwrap(), 2);
}
