use super::{create_test_store, test_observation, test_summary};

use pilot_mem_core::{PlanStatus, SessionStatus};

#[test]
fn create_session_is_idempotent_on_content_id() {
    let (store, _dir) = create_test_store();

    let first = store.create_session("content-1", "pilot", Some("build it"), 1_000).unwrap();
    let second = store.create_session("content-1", "pilot", None, 2_000).unwrap();

    assert_eq!(first, second);
    let session = store.get_session(first).unwrap().unwrap();
    assert_eq!(session.started_at_epoch, 1_000);
    assert_eq!(session.memory_session_id, "content-1");
    assert_eq!(session.status, SessionStatus::Active);
}

#[test]
fn initial_prompt_recorded_once() {
    let (store, _dir) = create_test_store();

    store.create_session("content-1", "pilot", Some("first ask"), 1_000).unwrap();
    store.create_session("content-1", "pilot", Some("replayed ask"), 2_000).unwrap();

    let page = store.get_prompts_paginated(0, 10, None).unwrap();
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].prompt_text, "first ask");
    assert_eq!(page.items[0].prompt_number, 1);
}

#[test]
fn memory_id_remap_rekeys_existing_rows() {
    let (store, _dir) = create_test_store();

    let id = store.create_session("content-1", "pilot", None, 1_000).unwrap();
    store.insert_observation(&test_observation("content-1", "pilot", "obs")).unwrap();
    store.insert_summary(&test_summary("content-1", "pilot")).unwrap();

    store.update_memory_session_id(id, "mem-new").unwrap();

    let session = store.get_session(id).unwrap().unwrap();
    assert_eq!(session.memory_session_id, "mem-new");
    let obs = store.query_observations("pilot", &[], &[], 10).unwrap();
    assert_eq!(obs.len(), 1);
    assert_eq!(obs[0].memory_session_id, "mem-new");
    let summaries = store.get_recent_summaries("pilot", 10).unwrap();
    assert_eq!(summaries[0].memory_session_id, "mem-new");
}

#[test]
fn dashboard_lists_only_active_sessions_newest_first() {
    let (store, _dir) = create_test_store();

    let a = store.create_session("content-a", "pilot", None, 1_000).unwrap();
    let b = store.create_session("content-b", "pilot", None, 2_000).unwrap();
    let c = store.create_session("content-c", "other", None, 3_000).unwrap();
    store.set_session_status(b, SessionStatus::Completed).unwrap();
    store.upsert_plan_association(a, "docs/plans/a.md", PlanStatus::Pending, 1_500).unwrap();

    let rows = store.get_dashboard_sessions().unwrap();

    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].session_db_id, c);
    assert!(rows[0].plan_path.is_none());
    assert_eq!(rows[1].session_db_id, a);
    assert_eq!(rows[1].plan_path.as_deref(), Some("docs/plans/a.md"));
    assert_eq!(rows[1].plan_status, Some(PlanStatus::Pending));
}

#[test]
fn delete_session_cascades_to_plan_association() {
    let (store, _dir) = create_test_store();

    let id = store.create_session("content-1", "pilot", None, 1_000).unwrap();
    store.upsert_plan_association(id, "docs/plans/a.md", PlanStatus::Pending, 1_000).unwrap();
    store.insert_observation(&test_observation("content-1", "pilot", "obs")).unwrap();
    store.enqueue(id, "{}", 1_000).unwrap();

    assert!(store.delete_session(id).unwrap());

    assert!(store.get_plan_for_session(id).unwrap().is_none());
    assert!(store.get_session(id).unwrap().is_none());
    assert!(store.query_observations("pilot", &[], &[], 10).unwrap().is_empty());
    assert_eq!(store.pending_total().unwrap(), 0);
}

#[test]
fn delete_missing_session_returns_false() {
    let (store, _dir) = create_test_store();
    assert!(!store.delete_session(999).unwrap());
}

#[test]
fn pagination_probe_reports_has_more() {
    let (store, _dir) = create_test_store();

    for i in 0..7 {
        let mut obs = test_observation("mem-1", "pilot", &format!("obs {i}"));
        obs.created_at_epoch = 1_000 + i;
        store.insert_observation(&obs).unwrap();
    }

    let page1 = store.get_observations_paginated(0, 5, Some("pilot")).unwrap();
    assert_eq!(page1.items.len(), 5);
    assert!(page1.has_more);

    let page2 = store.get_observations_paginated(5, 5, Some("pilot")).unwrap();
    assert_eq!(page2.items.len(), 2);
    assert!(!page2.has_more);
}

#[test]
fn file_paths_are_sanitized_on_read() {
    let (store, _dir) = create_test_store();

    let mut obs = test_observation("mem-1", "pilot", "obs");
    obs.files_read = vec!["/home/u/code/pilot/src/main.rs".to_owned()];
    store.insert_observation(&obs).unwrap();

    let rows = store.query_observations("pilot", &[], &[], 10).unwrap();
    assert_eq!(rows[0].files_read, vec!["src/main.rs"]);
}
