//! Property-based testing for revmap
//!
//! Uses proptest to check diff, merge, ancestry, rollback and branch-name
//! invariants across randomly generated documents and histories.

use ::revmap::*;
use proptest::prelude::*;
use ::revmap::branch::validate_branch_name;
use ::revmap::merge::merge;
use serde_json::{json, Value};

/// Generate a JSON value, including nested ones
fn value_strategy() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::from),
        any::<i64>().prop_map(Value::from),
        any::<f64>()
            .prop_filter("finite", |f| f.is_finite())
            .prop_map(Value::from),
        "[a-z ]{0,8}".prop_map(Value::from),
    ];
    leaf.prop_recursive(2, 8, 3, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..3).prop_map(Value::from),
            prop::collection::btree_map("[a-c]", inner, 0..3)
                .prop_map(|m| Value::Object(m.into_iter().collect())),
        ]
    })
}

/// Generate a small document over a narrow key space so keys collide often
fn document_strategy() -> impl Strategy<Value = Document> {
    prop::collection::btree_map("[a-f]", value_strategy(), 0..6)
}

/// Generate a branch name that must be accepted
fn valid_name_strategy() -> impl Strategy<Value = String> {
    "[A-Za-z][A-Za-z0-9_-]{0,15}"
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn prop_diff_with_self_is_empty(doc in document_strategy()) {
        let result = diff::diff(&doc, &doc);
        prop_assert!(!result.has_changes());
        prop_assert_eq!(result.unchanged.len(), doc.len());
    }

    #[test]
    fn prop_diff_partitions_keys(old in document_strategy(), new in document_strategy()) {
        let result = diff::diff(&old, &new);

        for key in result.added.keys() {
            prop_assert!(!old.contains_key(key) && new.contains_key(key));
        }
        for key in result.removed.keys() {
            prop_assert!(old.contains_key(key) && !new.contains_key(key));
        }
        for (key, change) in &result.modified {
            prop_assert_eq!(&old[key], &change.before);
            prop_assert_eq!(&new[key], &change.after);
            prop_assert_ne!(&change.before, &change.after);
        }
        for key in &result.unchanged {
            prop_assert_eq!(&old[key], &new[key]);
        }

        let union: std::collections::BTreeSet<&String> = old.keys().chain(new.keys()).collect();
        let stats = result.stats();
        prop_assert_eq!(
            stats.keys_added + stats.keys_removed + stats.keys_modified + stats.keys_unchanged,
            union.len()
        );
    }

    #[test]
    fn prop_merge_with_unchanged_side_takes_other(base in document_strategy(), side in document_strategy()) {
        let result = merge(Some(&base), &side, &base);
        prop_assert!(result.success);
        prop_assert_eq!(&result.merged_data, &side);

        let result = merge(Some(&base), &base, &side);
        prop_assert!(result.success);
        prop_assert_eq!(&result.merged_data, &side);
    }

    #[test]
    fn prop_merge_identical_sides(base in document_strategy(), side in document_strategy()) {
        let result = merge(Some(&base), &side, &side);
        prop_assert!(result.success);
        prop_assert_eq!(&result.merged_data, &side);
    }

    #[test]
    fn prop_equal_independent_adds_merge_cleanly(value in value_strategy()) {
        let base = Document::new();
        let mut side = Document::new();
        side.insert("k".to_string(), value.clone());

        let result = merge(Some(&base), &side, &side.clone());
        prop_assert!(result.success);
        prop_assert_eq!(&result.merged_data["k"], &value);

        // Disjoint histories behave like an empty base
        let result = merge(None, &side, &side);
        prop_assert!(result.success);
    }

    #[test]
    fn prop_divergent_edit_is_one_conflict(
        base in document_strategy(),
        start in -1_000_000i64..1_000_000,
    ) {
        let mut base = base;
        base.insert("x".to_string(), json!(start));
        let mut a = base.clone();
        a.insert("x".to_string(), json!(start + 1));
        let mut b = base.clone();
        b.insert("x".to_string(), json!(start + 2));

        let result = merge(Some(&base), &a, &b);
        prop_assert!(!result.success);
        prop_assert_eq!(result.conflicts.len(), 1);
        let conflict = &result.conflicts[0];
        prop_assert_eq!(conflict.key.as_str(), "x");
        prop_assert_eq!(conflict.base_value.clone(), Some(json!(start)));
        prop_assert_eq!(conflict.value_a.clone(), Some(json!(start + 1)));
        prop_assert_eq!(conflict.value_b.clone(), Some(json!(start + 2)));
        prop_assert!(!result.merged_data.contains_key("x"));
    }

    #[test]
    fn prop_resolving_every_conflict_covers_union(
        base in document_strategy(),
        a in document_strategy(),
        b in document_strategy(),
    ) {
        let result = merge(Some(&base), &a, &b);
        let choices = result
            .conflicts
            .iter()
            .map(|c| (c.key.clone(), Resolution::TakeA))
            .collect();
        let data = merge::apply_resolutions(&result.merged_data, &result.conflicts, &choices).unwrap();

        // Every key in the result comes from one of the inputs
        for key in data.keys() {
            prop_assert!(base.contains_key(key) || a.contains_key(key) || b.contains_key(key));
        }
        // Taking A for every conflict never invents a value A lacks on those keys
        for conflict in &result.conflicts {
            prop_assert_eq!(data.get(&conflict.key), a.get(&conflict.key));
        }
    }

    #[test]
    fn prop_valid_branch_names_accepted(name in valid_name_strategy()) {
        prop_assert!(validate_branch_name(&name).is_ok());
    }

    #[test]
    fn prop_invalid_branch_names_rejected(name in "([0-9_-][A-Za-z0-9_-]{0,8}|[A-Za-z][a-z]{0,4}[ ./:@][a-z]{0,4})") {
        prop_assert!(matches!(
            validate_branch_name(&name),
            Err(RevmapError::InvalidBranchName(_))
        ));
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_common_ancestor_of_fork_is_fork_point(
        shared in 1usize..6,
        left in 1usize..5,
        right in 1usize..5,
    ) {
        let mut repo = Revmap::in_memory().unwrap();
        let mut fork_point = String::new();
        for i in 0..shared {
            repo.set("shared", json!(i));
            fork_point = repo.commit_working("shared", None).unwrap().id;
        }

        repo.create_branch("left", None).unwrap();
        for i in 0..left {
            repo.set("left", json!(i));
            repo.commit_working("left", None).unwrap();
        }

        repo.switch_branch("main").unwrap();
        for i in 0..right {
            repo.set("right", json!(i));
            repo.commit_working("right", None).unwrap();
        }

        let result = repo.merge("left", "main").unwrap();
        prop_assert!(result.success);
        prop_assert_eq!(
            result.context.unwrap().base_version_id,
            Some(fork_point)
        );
        prop_assert_eq!(&result.merged_data["left"], &json!(left - 1));
        prop_assert_eq!(&result.merged_data["right"], &json!(right - 1));
    }

    #[test]
    fn prop_documents_survive_reopen(doc in document_strategy()) {
        prop_assume!(!doc.is_empty());
        let storage_dir = tempfile::TempDir::new().unwrap();
        let path = storage_dir.path().join("repo");

        let version = Revmap::init(&path).unwrap().commit(doc.clone(), "doc", None).unwrap();

        let repo = Revmap::open(&path).unwrap();
        prop_assert_eq!(repo.working_data(), &doc);
        prop_assert_eq!(&repo.head_version().unwrap().state_hash, &version.state_hash);
        prop_assert!(repo.verify().is_valid());
    }

    #[test]
    fn prop_hard_rollback_leaves_head_at_target(
        commits in 2usize..8,
        pick in any::<prop::sample::Index>(),
    ) {
        let mut repo = Revmap::in_memory().unwrap();
        let mut versions = Vec::new();
        for i in 0..commits {
            repo.set("n", json!(i));
            versions.push(repo.commit_working("step", None).unwrap());
        }

        let target = &versions[pick.index(commits)];
        let result = repo.hard_rollback(&target.id).unwrap();

        prop_assert_eq!(result.deleted_ids.len(), versions.iter().filter(|v| v.timestamp > target.timestamp).count());
        prop_assert_eq!(repo.active_branch().head, Some(target.id.clone()));
        prop_assert!(repo.list_versions().iter().all(|v| v.timestamp <= target.timestamp));
        prop_assert!(!repo.has_uncommitted_changes());
        prop_assert_eq!(&repo.head_version().unwrap().data, &target.data);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_main_branch_protected() {
        let mut repo = Revmap::in_memory().unwrap();
        repo.set("a", json!(1));
        repo.commit_working("one", None).unwrap();
        repo.create_branch("other", None).unwrap();

        assert!(matches!(
            repo.delete_branch("main"),
            Err(RevmapError::ProtectedBranch { .. })
        ));
        // The active branch is protected too
        assert!(matches!(
            repo.delete_branch("other"),
            Err(RevmapError::ProtectedBranch { .. })
        ));

        repo.switch_branch("main").unwrap();
        repo.delete_branch("other").unwrap();
        assert_eq!(repo.branches().len(), 1);
    }
}
