use super::{create_test_store, test_observation, test_summary};

use pilot_mem_core::ObservationType;

use crate::RetentionPolicy;

const DAY_MS: i64 = 86_400_000;

#[test]
fn disabled_policy_is_a_no_op() {
    let (store, _dir) = create_test_store();
    let mut obs = test_observation("mem-1", "pilot", "old");
    obs.created_at_epoch = 0;
    store.insert_observation(&obs).unwrap();

    let policy = RetentionPolicy { enabled: false, ..RetentionPolicy::default() };
    let stats = store.prune(&policy, 365 * DAY_MS).unwrap();

    assert_eq!(stats.observations, 0);
    assert_eq!(store.query_observations("pilot", &[], &[], 10).unwrap().len(), 1);
}

#[test]
fn age_bound_prunes_old_rows_only() {
    let (store, _dir) = create_test_store();
    let mut old = test_observation("mem-1", "pilot", "old");
    old.created_at_epoch = 0;
    let mut fresh = test_observation("mem-1", "pilot", "fresh");
    fresh.created_at_epoch = 200 * DAY_MS;
    store.insert_observation(&old).unwrap();
    store.insert_observation(&fresh).unwrap();
    let mut old_summary = test_summary("mem-1", "pilot");
    old_summary.created_at_epoch = 0;
    store.insert_summary(&old_summary).unwrap();

    let policy = RetentionPolicy { max_age_days: 90, ..RetentionPolicy::default() };
    let stats = store.prune(&policy, 200 * DAY_MS).unwrap();

    assert_eq!(stats.observations, 1);
    assert_eq!(stats.summaries, 1);
    let remaining = store.query_observations("pilot", &[], &[], 10).unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].title, "fresh");
}

#[test]
fn excluded_types_survive_age_pruning() {
    let (store, _dir) = create_test_store();
    let mut decision = test_observation("mem-1", "pilot", "decision");
    decision.observation_type = ObservationType::Decision;
    decision.created_at_epoch = 0;
    store.insert_observation(&decision).unwrap();

    let policy = RetentionPolicy {
        exclude_types: vec![ObservationType::Decision],
        ..RetentionPolicy::default()
    };
    store.prune(&policy, 365 * DAY_MS).unwrap();

    assert_eq!(store.query_observations("pilot", &[], &[], 10).unwrap().len(), 1);
}

#[test]
fn count_bound_keeps_newest_per_project() {
    let (store, _dir) = create_test_store();
    for i in 0..10 {
        let mut obs = test_observation("mem-1", "pilot", &format!("obs {i}"));
        obs.created_at_epoch = i64::from(i) * 1_000;
        store.insert_observation(&obs).unwrap();
    }

    let policy = RetentionPolicy { max_count: 4, max_age_days: 10_000, ..RetentionPolicy::default() };
    let stats = store.prune(&policy, 10_000).unwrap();

    assert_eq!(stats.observations, 6);
    let remaining = store.query_observations("pilot", &[], &[], 50).unwrap();
    assert_eq!(remaining.len(), 4);
    assert_eq!(remaining[0].title, "obs 9");
}

#[test]
fn soft_delete_hides_rows_without_removing_them() {
    let (store, _dir) = create_test_store();
    let mut obs = test_observation("mem-1", "pilot", "old");
    obs.created_at_epoch = 0;
    store.insert_observation(&obs).unwrap();

    let policy = RetentionPolicy { soft_delete: true, ..RetentionPolicy::default() };
    let stats = store.prune(&policy, 365 * DAY_MS).unwrap();

    assert_eq!(stats.observations, 1);
    assert!(store.query_observations("pilot", &[], &[], 10).unwrap().is_empty());
    // A second run finds nothing left to prune.
    let stats = store.prune(&policy, 365 * DAY_MS).unwrap();
    assert_eq!(stats.observations, 0);
}
