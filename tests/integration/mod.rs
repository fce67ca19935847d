//! Integration tests for revmap
//!
//! Drives a file-backed repository through long random workloads of
//! commits, branches, merges and rollbacks, checking integrity and
//! persistence along the way.

use ::revmap::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tempfile::TempDir;
use tracing::info;

/// Test harness for random repository workloads
pub struct RevmapTestHarness {
    pub storage_dir: TempDir,
    pub repo: Revmap,
    pub rng: StdRng,
    pub operation_log: Vec<TestOperation>,
    branch_counter: usize,
}

#[derive(Debug, Clone)]
pub enum TestOperation {
    Commit { branch: String, id: String },
    CreateBranch { name: String },
    Switch { name: String },
    Merge { source: String, target: String, conflicts: usize },
    HardRollback { target: String, deleted: usize },
}

impl RevmapTestHarness {
    /// Create a new harness with a seeded random source
    pub fn new(seed: u64) -> Self {
        let storage_dir = TempDir::new().unwrap();
        let repo = RevmapBuilder::new()
            .default_author("harness@test")
            .compression_strategy(CompressionStrategy::Fast)
            .init(storage_dir.path().join("repo"))
            .unwrap();

        Self {
            storage_dir,
            repo,
            rng: StdRng::seed_from_u64(seed),
            operation_log: Vec::new(),
            branch_counter: 0,
        }
    }

    pub fn storage_path(&self) -> PathBuf {
        self.storage_dir.path().join("repo")
    }

    /// Randomly edit the working data
    pub fn mutate(&mut self, edits: usize) {
        for _ in 0..edits {
            let key = format!("k{}", self.rng.random_range(0..8));
            match self.rng.random_range(0..4) {
                0 => {
                    self.repo.remove(&key);
                }
                1 => {
                    self.repo.set(key, json!(self.rng.random_bool(0.5)));
                }
                2 => {
                    self.repo.set(key, json!({ "n": self.rng.random_range(0..100) }));
                }
                _ => {
                    self.repo.set(key, json!(self.rng.random_range(0..1000)));
                }
            }
        }
    }

    /// Mutate and commit, skipping if the edits cancelled out
    pub fn commit_random(&mut self) -> anyhow::Result<Option<Version>> {
        self.mutate(3);
        if !self.repo.has_uncommitted_changes() {
            return Ok(None);
        }

        let n = self.operation_log.len();
        let version = self.repo.commit_working(&format!("change {}", n), None)?;
        self.operation_log.push(TestOperation::Commit {
            branch: self.repo.active_branch().name,
            id: version.id.clone(),
        });
        Ok(Some(version))
    }

    /// Branch off the active head
    pub fn branch_random(&mut self) -> anyhow::Result<()> {
        if self.repo.head_version().is_none() {
            return Ok(());
        }

        self.branch_counter += 1;
        let name = format!("branch-{}", self.branch_counter);
        self.repo.create_branch(&name, None)?;
        self.operation_log.push(TestOperation::CreateBranch { name });
        Ok(())
    }

    /// Switch to a random branch
    pub fn switch_random(&mut self) -> anyhow::Result<()> {
        let branches = self.repo.branches();
        let name = branches[self.rng.random_range(0..branches.len())].name.clone();
        self.repo.switch_branch(&name)?;
        self.operation_log.push(TestOperation::Switch { name });
        Ok(())
    }

    /// Merge a random branch into the active one, resolving conflicts randomly
    pub fn merge_random(&mut self) -> anyhow::Result<()> {
        let target = self.repo.active_branch();
        let candidates: Vec<Branch> = self
            .repo
            .branches()
            .into_iter()
            .filter(|b| b.name != target.name && b.head.is_some() && b.head != target.head)
            .collect();
        let target = target.name;
        if candidates.is_empty() {
            return Ok(());
        }
        let source = candidates[self.rng.random_range(0..candidates.len())].name.clone();

        let result = self.repo.merge(&source, &target)?;
        let mut choices = BTreeMap::new();
        for conflict in &result.conflicts {
            let choice = match self.rng.random_range(0..4) {
                0 => Resolution::TakeA,
                1 => Resolution::TakeB,
                2 => Resolution::TakeBase,
                _ => Resolution::Value(json!("resolved")),
            };
            choices.insert(conflict.key.clone(), choice);
        }

        let data = merge::apply_resolutions(&result.merged_data, &result.conflicts, &choices)?;
        let source_id = result
            .context
            .as_ref()
            .map(|c| c.source_version_id.clone())
            .ok_or_else(|| anyhow::anyhow!("missing merge context"))?;
        self.repo
            .complete_merge(data, &source, &source_id, &format!("merge {}", source))?;

        self.operation_log.push(TestOperation::Merge {
            source,
            target,
            conflicts: result.conflicts.len(),
        });
        Ok(())
    }

    /// Run a random workload
    pub fn run_workload(&mut self, steps: usize) -> anyhow::Result<()> {
        for step in 0..steps {
            match self.rng.random_range(0..10) {
                0..=4 => {
                    self.commit_random()?;
                }
                5 => self.branch_random()?,
                6 | 7 => self.switch_random()?,
                _ => self.merge_random()?,
            }

            let report = self.repo.verify();
            anyhow::ensure!(
                report.is_valid(),
                "step {}: {} ({:?})",
                step,
                report.summary(),
                report.issues
            );
        }

        info!(
            "Workload finished: {} operations, {} versions",
            self.operation_log.len(),
            self.repo.list_versions().len()
        );
        Ok(())
    }
}

/// Summary of a reopened repository, for persistence comparisons
#[derive(Debug, PartialEq)]
pub struct RepositorySnapshot {
    pub versions: Vec<Version>,
    pub branches: Vec<Branch>,
    pub active: String,
    pub working: Document,
}

impl RepositorySnapshot {
    pub fn capture(repo: &Revmap) -> Self {
        Self {
            versions: repo.list_versions().to_vec(),
            branches: repo.branches(),
            active: repo.active_branch().name,
            working: repo.working_data().clone(),
        }
    }
}

fn doc(value: Value) -> Document {
    serde_json::from_value(value).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[test]
    #[traced_test]
    fn test_random_workload_stays_valid() {
        let mut harness = RevmapTestHarness::new(7);
        harness.commit_random().unwrap();
        harness.run_workload(150).unwrap();

        let before = RepositorySnapshot::capture(&harness.repo);
        let reopened = Revmap::open(harness.storage_path()).unwrap();
        assert_eq!(RepositorySnapshot::capture(&reopened), before);
    }

    #[test]
    #[traced_test]
    fn test_random_workloads_with_rollback() {
        for seed in [1u64, 2, 3] {
            let mut harness = RevmapTestHarness::new(seed);
            harness.commit_random().unwrap();
            harness.run_workload(60).unwrap();

            let versions: Vec<Version> = harness.repo.list_versions().to_vec();
            let target = &versions[harness.rng.random_range(0..versions.len())];
            let result = harness.repo.hard_rollback(&target.id).unwrap();
            harness.operation_log.push(TestOperation::HardRollback {
                target: target.id.clone(),
                deleted: result.deleted_ids.len(),
            });

            // Nothing newer than the target survives
            assert!(harness
                .repo
                .list_versions()
                .iter()
                .all(|v| v.timestamp <= target.timestamp));
            assert_eq!(
                harness.repo.active_branch().head.as_deref(),
                Some(target.id.as_str())
            );
            assert_eq!(harness.repo.working_data(), &target.data);

            let report = harness.repo.verify();
            assert!(report.is_valid(), "{:?}", report.issues);

            // Reopening sees the same state
            let reopened = Revmap::open(harness.storage_path()).unwrap();
            assert_eq!(
                RepositorySnapshot::capture(&reopened),
                RepositorySnapshot::capture(&harness.repo)
            );

            // Work continues after the rollback
            harness.run_workload(20).unwrap();
        }
    }

    #[test]
    fn test_criss_cross_merge() {
        let mut repo = Revmap::in_memory().unwrap();
        let base = repo.commit(doc(json!({"a": 0, "b": 0})), "base", None).unwrap();

        repo.create_branch("left", None).unwrap();
        let left = repo.commit(doc(json!({"a": 1, "b": 0})), "left", None).unwrap();

        repo.switch_branch("main").unwrap();
        let right = repo.commit(doc(json!({"a": 0, "b": 1})), "right", None).unwrap();

        // main takes left
        let result = repo.merge("left", "main").unwrap();
        assert!(result.success);
        assert_eq!(
            result.context.as_ref().unwrap().base_version_id.as_deref(),
            Some(base.id.as_str())
        );
        let merged_main = repo
            .complete_merge(result.merged_data, "left", &left.id, "main <- left")
            .unwrap();
        assert_eq!(merged_main.data, doc(json!({"a": 1, "b": 1})));

        // left takes main; the base follows primary parents only
        repo.switch_branch("left").unwrap();
        let result = repo.merge("main", "left").unwrap();
        assert!(result.success);
        assert_eq!(
            result.context.as_ref().unwrap().base_version_id.as_deref(),
            Some(base.id.as_str())
        );
        assert_eq!(result.merged_data, doc(json!({"a": 1, "b": 1})));

        let full = repo.full_history(&merged_main.id).unwrap();
        let ids: Vec<&str> = full.iter().map(|v| v.id.as_str()).collect();
        assert_eq!(ids.len(), 4);
        assert!(ids.contains(&right.id.as_str()));
        assert!(ids.contains(&left.id.as_str()));
    }

    #[test]
    fn test_branch_pointers_after_hard_rollback() {
        let mut repo = Revmap::in_memory().unwrap();
        let v1 = repo.commit(doc(json!({"n": 1})), "one", None).unwrap();

        // A branch created after the rollback target, with its own commits
        repo.create_branch("late", None).unwrap();
        let late = repo.commit(doc(json!({"n": 2})), "late work", None).unwrap();

        // Another branch that is still fully older than the target
        repo.switch_branch("main").unwrap();
        repo.create_branch("early", None).unwrap();

        repo.switch_branch("main").unwrap();
        let v3 = repo.commit(doc(json!({"n": 3})), "three", None).unwrap();

        let result = repo.hard_rollback(&v1.id).unwrap();
        assert_eq!(result.deleted_ids, vec![late.id.clone(), v3.id.clone()]);
        assert_eq!(
            result.repointed_branches,
            vec![("late".to_string(), Some(v1.id.clone()))]
        );
        assert_eq!(repo.head_of("early").unwrap().as_deref(), Some(v1.id.as_str()));
        assert_eq!(repo.head_of("late").unwrap().as_deref(), Some(v1.id.as_str()));
    }

    #[test]
    fn test_long_history() {
        let mut repo = RevmapBuilder::new()
            .compression_strategy(CompressionStrategy::None)
            .build_in_memory()
            .unwrap();

        let mut ids = Vec::new();
        for i in 0..500 {
            repo.set("counter", json!(i));
            ids.push(repo.commit_working(&format!("step {}", i), None).unwrap().id);
        }

        repo.create_branch("fork", Some(&ids[100])).unwrap();
        repo.set("fork", json!(true));
        repo.commit_working("fork work", None).unwrap();

        let result = repo.merge("fork", "main").unwrap();
        assert_eq!(
            result.context.unwrap().base_version_id.as_deref(),
            Some(ids[100].as_str())
        );
        assert!(result.success);
        assert_eq!(result.merged_data["counter"], json!(499));
        assert_eq!(result.merged_data["fork"], json!(true));

        assert_eq!(repo.history("main").unwrap().len(), 500);
        assert_eq!(repo.stats().max_depth, 500);
    }
}
