//! Main test module for revmap
//!
//! This module includes all test suites:
//! - Integration tests for long random workloads
//! - Chaos tests for damaged storage
//! - Property-based tests for diff and merge invariants

pub mod chaos;
pub mod integration;
pub mod property;

#[cfg(test)]
mod edge_cases {
    use ::revmap::*;
    use serde_json::json;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    fn doc(pairs: &[(&str, serde_json::Value)]) -> Document {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn test_null_is_not_absent() {
        let mut repo = Revmap::in_memory().unwrap();
        let v1 = repo.commit(doc(&[("a", json!(1))]), "one", None).unwrap();
        let v2 = repo
            .commit(doc(&[("a", json!(1)), ("b", json!(null))]), "null", None)
            .unwrap();

        let changes = repo.diff(&v1.id, &v2.id).unwrap();
        assert_eq!(changes.added.get("b"), Some(&json!(null)));
        assert!(changes.removed.is_empty());

        // Setting a field to null and removing it are different changes
        let v3 = repo.commit(doc(&[("a", json!(1))]), "drop b", None).unwrap();
        let changes = repo.diff(&v2.id, &v3.id).unwrap();
        assert_eq!(changes.removed.get("b"), Some(&json!(null)));
    }

    #[test]
    fn test_nested_values_compared_structurally() {
        let mut repo = Revmap::in_memory().unwrap();
        let v1 = repo
            .commit(doc(&[("cfg", json!({"x": 1, "y": [1, 2]}))]), "one", None)
            .unwrap();

        // Same structure, different key order in the literal
        assert!(matches!(
            repo.commit(doc(&[("cfg", json!({"y": [1, 2], "x": 1}))]), "same", None),
            Err(RevmapError::NothingToCommit(_))
        ));

        let v2 = repo
            .commit(doc(&[("cfg", json!({"x": 1, "y": [2, 1]}))]), "reorder list", None)
            .unwrap();
        let changes = repo.diff(&v1.id, &v2.id).unwrap();
        assert_eq!(changes.modified.len(), 1);
    }

    #[test]
    fn test_delete_versus_modify_conflict() {
        let mut repo = Revmap::in_memory().unwrap();
        repo.commit(doc(&[("k", json!("v"))]), "base", None).unwrap();

        repo.create_branch("deleter", None).unwrap();
        repo.commit(doc(&[("other", json!(1))]), "delete k", None).unwrap();

        repo.switch_branch("main").unwrap();
        repo.commit(doc(&[("k", json!("changed"))]), "modify k", None).unwrap();

        let result = repo.merge("deleter", "main").unwrap();
        assert_eq!(result.conflicts.len(), 1);
        let conflict = &result.conflicts[0];
        assert_eq!(conflict.value_a, None);
        assert_eq!(conflict.value_b, Some(json!("changed")));
        assert_eq!(conflict.base_value, Some(json!("v")));

        let take_a = BTreeMap::from([("k".to_string(), Resolution::TakeA)]);
        let data = merge::apply_resolutions(&result.merged_data, &result.conflicts, &take_a).unwrap();
        assert_eq!(data, doc(&[("other", json!(1))]));
    }

    #[test]
    fn test_merge_into_branch_without_commits() {
        let backend = MemoryBackend::new();
        let mut repo = RevmapBuilder::new()
            .build_with_backend(Box::new(backend.clone()))
            .unwrap();
        let v1 = repo.commit(doc(&[("a", json!(1))]), "one", None).unwrap();
        repo.create_branch("keep", None).unwrap();

        // Leave main without commits while keep holds the history
        let mut branches = backend.load_branches().unwrap();
        branches.insert("main".to_string(), None);
        backend.save_branches(&branches).unwrap();
        backend.save_active_branch("main").unwrap();

        let mut repo = RevmapBuilder::new()
            .build_with_backend(Box::new(backend))
            .unwrap();
        assert_eq!(repo.active_branch().head, None);
        assert!(repo.working_data().is_empty());

        let result = repo.merge("keep", "main").unwrap();
        assert!(result.success);
        assert_eq!(result.context.as_ref().unwrap().base_version_id, None);
        assert_eq!(result.merged_data, doc(&[("a", json!(1))]));

        let merged = repo
            .complete_merge(result.merged_data, "keep", &v1.id, "adopt keep")
            .unwrap();
        assert_eq!(merged.parent_id, None);
        assert_eq!(merged.merge_parent_id.as_deref(), Some(v1.id.as_str()));
        assert!(repo.verify().is_valid());
    }

    #[test]
    fn test_ambiguous_and_unknown_prefixes() {
        let mut repo = Revmap::in_memory().unwrap();
        for i in 0..40 {
            repo.set("n", json!(i));
            repo.commit_working("step", None).unwrap();
        }

        // With 40 random UUIDs some leading hex digit repeats
        let first_chars: Vec<char> = repo
            .list_versions()
            .iter()
            .filter_map(|v| v.id.chars().next())
            .collect();
        let repeated = first_chars
            .iter()
            .find(|c| first_chars.iter().filter(|d| d == c).count() > 1)
            .unwrap()
            .to_string();

        assert!(repo.get_version(&repeated).unwrap_err().is_validation());
        assert!(repo.get_version("zzzz").unwrap_err().is_not_found());
        assert!(repo.get_version("").unwrap_err().is_not_found());
    }

    #[test]
    fn test_open_without_init() {
        let storage_dir = TempDir::new().unwrap();
        let err = Revmap::open(storage_dir.path().join("missing")).unwrap_err();
        assert!(matches!(err, RevmapError::StorageNotInitialized(_)));
        assert!(err.user_message().contains("revmap init"));
    }

    #[test]
    fn test_builder_reopens_existing_config() {
        let storage_dir = TempDir::new().unwrap();
        let path = storage_dir.path().join("repo");

        RevmapBuilder::new()
            .default_author("first@host")
            .compression_strategy(CompressionStrategy::None)
            .build(&path)
            .unwrap();

        let repo = RevmapBuilder::new()
            .default_author("second@host")
            .build(&path)
            .unwrap();
        assert_eq!(repo.config().default_author, "first@host");
        assert_eq!(repo.config().compression_strategy, CompressionStrategy::None);
    }
}
