//! End-to-end engine scenarios over a real state directory.

use chrono::{Duration, Utc};
use std::sync::Arc;
use std::thread;
use steward_store::Concern;
use tempfile::{tempdir, TempDir};

use steward_engine::{
    Category, CheckpointDraft, CleanupOptions, EnginePolicy, LoopState, MemoryRecord, NewMemory,
    ProjectScope, SearchQuery, SessionCoordinator, StateStore,
};

fn setup() -> (TempDir, SessionCoordinator, ProjectScope) {
    let temp_dir = tempdir().unwrap();
    let project = temp_dir.path().join("project");
    std::fs::create_dir_all(&project).unwrap();
    let store = Arc::new(StateStore::new(temp_dir.path().join("state")));
    let coordinator = SessionCoordinator::new(store, EnginePolicy::default());
    (temp_dir, coordinator, ProjectScope::new(project))
}

/// remember, search by tag, then forget everything
#[test]
fn test_remember_search_forget() {
    let (_dir, coordinator, scope) = setup();
    let memory = coordinator.memory();

    let record = memory
        .remember(
            &scope,
            NewMemory::new("Forgot null check", "mistake").tags(["auth"]),
        )
        .unwrap()
        .value;

    let found = memory
        .search(
            &scope,
            &SearchQuery {
                tags: vec!["auth".to_string()],
                ..Default::default()
            },
        )
        .unwrap()
        .value;
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, record.id);

    assert_eq!(memory.forget(&scope).unwrap().value, 1);
    assert!(memory.recall(&scope).value.is_empty());
}

/// Second applied cleanup changes nothing
#[test]
fn test_cleanup_is_idempotent() {
    let (_dir, coordinator, scope) = setup();
    let memory = coordinator.memory();

    for content in [
        "The config loader reads YAML from the data directory",
        "The config loader reads YAML from the data directory.",
        "Tests need the fixture server running",
    ] {
        memory
            .remember(&scope, NewMemory::new(content, "discovery").tags(["config"]))
            .unwrap();
    }

    let apply = CleanupOptions {
        dry_run: false,
        ..Default::default()
    };
    let first = memory.cleanup(&scope, apply.clone()).unwrap().value;
    assert_eq!(first.merged.len(), 1);
    assert_eq!(first.total_after, 2);

    let second = memory.cleanup(&scope, apply).unwrap().value;
    assert!(second.is_noop(), "{:?}", second);
    assert_eq!(memory.recall(&scope).value.len(), 2);
}

/// Dry run reports without writing
#[test]
fn test_cleanup_dry_run_leaves_state() {
    let (_dir, coordinator, scope) = setup();
    let memory = coordinator.memory();
    for _ in 0..2 {
        memory
            .remember(&scope, NewMemory::new("Use the staging bucket for uploads", "context"))
            .unwrap();
    }

    let report = memory.cleanup(&scope, CleanupOptions::default()).unwrap().value;
    assert!(report.dry_run);
    assert_eq!(report.merged.len(), 1);
    assert_eq!(memory.recall(&scope).value.len(), 2);
}

/// Three edits then a failing or passing test
#[test]
fn test_loop_classification() {
    let (_dir, coordinator, scope) = setup();
    let loops = coordinator.loops();

    for _ in 0..3 {
        loops.record_edit(&scope, "f.py", None).unwrap();
    }
    assert_eq!(loops.check(&scope, "f.py").unwrap().value.state, LoopState::Watch);

    loops.record_test(&scope, false, Some("AssertionError")).unwrap();
    assert_eq!(
        loops.check(&scope, "f.py").unwrap().value.state,
        LoopState::SpiralRisk
    );

    loops.record_test(&scope, true, None).unwrap();
    assert_eq!(
        loops.check(&scope, "f.py").unwrap().value.state,
        LoopState::Improving
    );
}

/// Declared files and patterns
#[test]
fn test_scope_verdicts() {
    let (_dir, coordinator, scope) = setup();
    let guard = coordinator.scope();
    guard
        .declare(
            &scope,
            "refactor utils",
            vec!["a.py".to_string()],
            vec!["src/*.py".to_string()],
        )
        .unwrap();

    assert!(guard.check(&scope, "a.py").unwrap().value.in_scope);
    assert!(guard.check(&scope, "src/util.py").unwrap().value.in_scope);
    assert!(!guard.check(&scope, "b.py").unwrap().value.in_scope);
    assert_eq!(guard.status(&scope).value.violations.len(), 1);
}

/// Restore returns what was saved last
#[test]
fn test_checkpoint_round_trip() {
    let (_dir, coordinator, scope) = setup();
    let checkpoints = coordinator.checkpoints();

    checkpoints
        .save(
            &scope,
            CheckpointDraft {
                task_description: "add caching".to_string(),
                current_step: "design".to_string(),
                ..Default::default()
            },
        )
        .unwrap();
    let saved = checkpoints
        .save(
            &scope,
            CheckpointDraft {
                task_description: "add caching".to_string(),
                current_step: "implement".to_string(),
                completed_steps: vec!["design".to_string()],
                pending_steps: vec!["benchmark".to_string()],
                files_involved: vec!["src/cache.rs".to_string()],
                key_decisions: vec!["LRU over TTL".to_string()],
                handoff_summary: Some("eviction policy still open".to_string()),
                ..Default::default()
            },
        )
        .unwrap()
        .value;

    let restored = checkpoints.restore(&scope, None).unwrap().value;
    assert_eq!(restored, saved);
}

/// Protected memories survive aggressive cleanup
#[test]
fn test_protected_memories_survive_cleanup() {
    let temp_dir = tempdir().unwrap();
    let store = Arc::new(StateStore::new(temp_dir.path().join("state")));
    let coordinator = SessionCoordinator::new(store.clone(), EnginePolicy::default());
    let scope = ProjectScope::new(temp_dir.path().join("project"));

    let long_ago = Utc::now() - Duration::days(400);
    let aged = |id: &str, content: &str, category: Category| MemoryRecord {
        id: id.to_string(),
        content: content.to_string(),
        category,
        tags: Vec::new(),
        relevance: 3,
        created_at: long_ago,
        last_accessed: long_ago,
        cluster_id: None,
        source_file: None,
        decay_steps: 0,
        access_count: 0,
    };
    let records = vec![
        aged("r1", "Never push to main", Category::Rule),
        aged("m1", "Broke the build with a typo", Category::Mistake),
        aged("c1", "Old note about CI", Category::Context),
    ];
    store
        .save(&scope, Concern::Memory, &serde_json::json!({ "records": records }))
        .unwrap();

    let report = coordinator
        .memory()
        .cleanup(
            &scope,
            CleanupOptions {
                dry_run: false,
                ..Default::default()
            },
        )
        .unwrap()
        .value;
    assert_eq!(report.deleted, vec!["c1".to_string()]);

    let remaining = coordinator.memory().recall(&scope).value;
    let ids: Vec<_> = remaining.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, vec!["r1", "m1"]);
    assert!(remaining.iter().all(|m| m.relevance == 3));
}

/// A full session: start, work, end, start again
#[test]
fn test_session_lifecycle() {
    let (_dir, coordinator, scope) = setup();

    coordinator.session_start(&scope).unwrap();
    coordinator
        .log_mistake(&scope, "Skipped migration", Some("db/schema.sql"), None)
        .unwrap();
    coordinator.loops().record_edit(&scope, "db/schema.sql", None).unwrap();
    coordinator.loops().record_test(&scope, true, None).unwrap();
    let summary = coordinator.session_end(&scope).unwrap().value;
    assert!(summary.memory_id.is_some());
    assert_eq!(summary.mistakes, 1);

    let briefing = coordinator.session_start(&scope).unwrap();
    assert_eq!(briefing.protected_memories.len(), 1);
    assert_eq!(briefing.protected_memories[0].category, Category::Mistake);
    assert!(briefing
        .memories
        .iter()
        .any(|m| m.content.starts_with("SESSION:")));

    let report = coordinator.pre_edit_check(&scope, "db/schema.sql").unwrap();
    assert_eq!(report.mistakes_for_file.len(), 1);
    assert_eq!(report.loop_state.state, LoopState::Normal);
}

/// Concurrent writers neither corrupt nor lose each other's updates
#[test]
fn test_concurrent_writers_keep_every_update() {
    let (_dir, coordinator, scope) = setup();
    let coordinator = Arc::new(coordinator);

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let coordinator = coordinator.clone();
            let scope = scope.clone();
            thread::spawn(move || {
                for j in 0..10 {
                    coordinator
                        .memory()
                        .remember(
                            &scope,
                            NewMemory::new(format!("writer {i} note {j}"), "context"),
                        )
                        .unwrap();
                    coordinator
                        .loops()
                        .record_edit(&scope, &format!("file{i}.rs"), None)
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let recalled = coordinator.memory().recall(&scope);
    assert!(recalled.warnings.is_empty());
    assert_eq!(recalled.value.len(), 80);
    let status = coordinator.loops().status(&scope);
    assert!(status.warnings.is_empty());
    assert_eq!(status.value.len(), 8);
    let edits: usize = (0..8)
        .map(|i| {
            coordinator
                .loops()
                .check(&scope, &format!("file{i}.rs"))
                .unwrap()
                .value
                .edit_count
        })
        .sum();
    assert_eq!(edits, 80);
}
