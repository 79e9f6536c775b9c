mod queue_tests;
mod retention_tests;
mod session_tests;

use tempfile::TempDir;

use pilot_mem_core::{Observation, ObservationType, SessionSummary};

use crate::Store;

pub(crate) fn create_test_store() -> (Store, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");
    let store = Store::open(&db_path).unwrap();
    (store, temp_dir)
}

pub(crate) fn test_observation(memory_id: &str, project: &str, title: &str) -> Observation {
    Observation {
        id: 0,
        memory_session_id: memory_id.to_owned(),
        project: project.to_owned(),
        observation_type: ObservationType::Discovery,
        title: title.to_owned(),
        subtitle: Some("subtitle".to_owned()),
        narrative: Some("narrative".to_owned()),
        facts: vec!["fact one".to_owned(), "fact two".to_owned()],
        concepts: vec!["how-it-works".to_owned()],
        files_read: vec!["src/lib.rs".to_owned()],
        files_modified: vec![],
        discovery_tokens: 100,
        created_at_epoch: 1_700_000_000_000,
    }
}

pub(crate) fn test_summary(memory_id: &str, project: &str) -> SessionSummary {
    SessionSummary {
        id: 0,
        memory_session_id: memory_id.to_owned(),
        project: project.to_owned(),
        request: Some("add a feature".to_owned()),
        investigated: Some("read the router".to_owned()),
        learned: Some("routes are nested".to_owned()),
        completed: Some("shipped".to_owned()),
        next_steps: None,
        created_at_epoch: 1_700_000_000_000,
    }
}
