//! Chaos testing for revmap storage
//!
//! Damages the files of a file-backed repository in various ways and checks
//! that opening fails cleanly, that verification reports the damage, and
//! that a failed write never leaves a session half-updated.

use ::revmap::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::info;

/// A small repository on disk that tests can damage
pub struct RevmapChaosTest {
    pub storage_dir: TempDir,
    pub version_ids: Vec<String>,
}

impl RevmapChaosTest {
    /// Build a repository with a main line, a feature branch and a merge
    ///
    /// History is stored uncompressed so tests can edit it as JSON.
    pub fn new() -> Self {
        let storage_dir = TempDir::new().unwrap();
        let mut repo = RevmapBuilder::new()
            .compression_strategy(CompressionStrategy::None)
            .init(storage_dir.path().join("repo"))
            .unwrap();

        let mut version_ids = Vec::new();
        repo.set("title", json!("base"));
        version_ids.push(repo.commit_working("base", None).unwrap().id);

        repo.create_branch("feature", None).unwrap();
        repo.set("feature", json!(true));
        let feature = repo.commit_working("feature", None).unwrap();
        version_ids.push(feature.id.clone());

        repo.switch_branch("main").unwrap();
        repo.set("title", json!("main"));
        version_ids.push(repo.commit_working("main edit", None).unwrap().id);

        let result = repo.merge("feature", "main").unwrap();
        version_ids.push(
            repo.complete_merge(result.merged_data, "feature", &feature.id, "merge")
                .unwrap()
                .id,
        );

        Self {
            storage_dir,
            version_ids,
        }
    }

    pub fn path(&self) -> PathBuf {
        self.storage_dir.path().join("repo")
    }

    pub fn file(&self, name: &str) -> PathBuf {
        self.path().join(name)
    }

    /// Load versions.json as raw JSON
    pub fn raw_versions(&self) -> Vec<Value> {
        let raw = fs::read_to_string(self.file("versions.json")).unwrap();
        serde_json::from_str(&raw).unwrap()
    }

    /// Overwrite versions.json with raw JSON
    pub fn write_versions(&self, versions: &[Value]) {
        write_json(&self.file("versions.json"), versions);
    }

    pub fn verify(&self) -> VerificationReport {
        let backend = FileBackend::open(self.path()).unwrap();
        ::revmap::verification::verify_backend(&backend).unwrap()
    }
}

fn write_json(path: &Path, value: &(impl serde::Serialize + ?Sized)) {
    fs::write(path, serde_json::to_vec_pretty(value).unwrap()).unwrap();
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[test]
    #[traced_test]
    fn test_tampered_data_detected() {
        let chaos = RevmapChaosTest::new();
        let mut versions = chaos.raw_versions();
        versions[1]["data"]["feature"] = json!("tampered");
        chaos.write_versions(&versions);

        // Structure is intact, so the repository still opens
        let repo = Revmap::open(chaos.path()).unwrap();
        let report = repo.verify();
        assert!(!report.is_valid());
        assert_eq!(
            report.issues,
            vec![VerificationIssue::StateHashMismatch {
                version_id: chaos.version_ids[1].clone()
            }]
        );
        assert_eq!(report.valid_versions, 3);
    }

    #[test]
    #[traced_test]
    fn test_missing_parent_refuses_to_open() {
        let chaos = RevmapChaosTest::new();
        let mut versions = chaos.raw_versions();
        // Drop the root: every other version loses its ancestry
        versions.remove(0);
        chaos.write_versions(&versions);

        let err = Revmap::open(chaos.path()).unwrap_err();
        assert!(err.is_integrity(), "unexpected error: {}", err);

        let report = chaos.verify();
        assert!(report.issues.iter().any(|issue| matches!(
            issue,
            VerificationIssue::MissingParent { parent_id, .. } if *parent_id == chaos.version_ids[0]
        )));
    }

    #[test]
    #[traced_test]
    fn test_dangling_branch_head() {
        let chaos = RevmapChaosTest::new();
        write_json(
            &chaos.file("branches.json"),
            &json!({"main": chaos.version_ids[3], "feature": "no-such-version"}),
        );

        let err = Revmap::open(chaos.path()).unwrap_err();
        assert!(err.is_integrity());

        let report = chaos.verify();
        assert_eq!(
            report.issues,
            vec![VerificationIssue::DanglingBranchHead {
                branch: "feature".to_string(),
                head: "no-such-version".to_string()
            }]
        );
    }

    #[test]
    #[traced_test]
    fn test_head_names_unknown_branch() {
        let chaos = RevmapChaosTest::new();
        fs::write(chaos.file("HEAD"), "ghost\n").unwrap();

        assert!(Revmap::open(chaos.path()).unwrap_err().is_integrity());
        assert!(chaos.verify().issues.contains(&VerificationIssue::MissingActiveBranch {
            name: Some("ghost".to_string())
        }));
    }

    #[test]
    #[traced_test]
    fn test_truncated_files() {
        let chaos = RevmapChaosTest::new();
        let mut rng = StdRng::seed_from_u64(42);

        for name in ["versions.json", "branches.json"] {
            let path = chaos.file(name);
            let original = fs::read(&path).unwrap();

            // Cut somewhere strictly inside the document
            let cut = rng.random_range(1..original.len() - 1);
            fs::write(&path, &original[..cut]).unwrap();
            let err = Revmap::open(chaos.path()).unwrap_err();
            info!("Truncated {} at {}: {}", name, cut, err);
            assert!(matches!(err, RevmapError::Json(_)), "unexpected error: {}", err);

            fs::write(&path, &original).unwrap();
        }

        // Restored files open again
        assert!(Revmap::open(chaos.path()).unwrap().verify().is_valid());
    }

    #[test]
    #[traced_test]
    fn test_corrupted_compressed_history() {
        let storage_dir = TempDir::new().unwrap();
        let path = storage_dir.path().join("repo");
        {
            let mut repo = RevmapBuilder::new()
                .compression_strategy(CompressionStrategy::Fast)
                .init(&path)
                .unwrap();
            for i in 0..20 {
                repo.set("body", json!("the same paragraph of text, over and over again"));
                repo.set("n", json!(i));
                repo.commit_working("edit", None).unwrap();
            }
        }

        let versions_path = path.join("versions.json");
        let mut raw = fs::read(&versions_path).unwrap();
        assert!(::revmap::compression::is_compressed(&raw));

        // Keep the header but scramble the body
        let mut rng = StdRng::seed_from_u64(7);
        for byte in raw.iter_mut().skip(8) {
            *byte = rng.random();
        }
        fs::write(&versions_path, &raw).unwrap();

        let err = Revmap::open(&path).unwrap_err();
        assert!(
            matches!(err, RevmapError::Decompression(_) | RevmapError::Json(_)),
            "unexpected error: {}",
            err
        );
    }

    #[test]
    fn test_reordered_history_still_loads() {
        let chaos = RevmapChaosTest::new();
        let mut versions = chaos.raw_versions();
        versions.reverse();
        chaos.write_versions(&versions);

        let repo = Revmap::open(chaos.path()).unwrap();
        let ids: Vec<&str> = repo.list_versions().iter().map(|v| v.id.as_str()).collect();
        assert_eq!(ids, chaos.version_ids.iter().map(String::as_str).collect::<Vec<_>>());
        assert!(repo.verify().is_valid());
    }

    #[test]
    fn test_failed_writes_leave_session_intact() {
        let backend = MemoryBackend::new();
        let mut repo = RevmapBuilder::new()
            .build_with_backend(Box::new(backend.clone()))
            .unwrap();
        repo.set("a", json!(1));
        let v1 = repo.commit_working("one", None).unwrap();
        repo.create_branch("side", None).unwrap();
        repo.set("a", json!(2));
        repo.commit_working("two", None).unwrap();

        let saves = backend.save_count();
        backend.set_read_only(true);

        repo.set("a", json!(3));
        assert!(repo.commit_working("three", None).is_err());
        assert!(repo.switch_branch("main").is_err());
        assert!(repo.delete_branch("main").is_err());
        assert!(repo.soft_rollback(&v1.id, "restore").is_err());
        assert!(repo.hard_rollback(&v1.id).is_err());

        assert_eq!(backend.save_count(), saves);
        assert_eq!(repo.active_branch().name, "side");
        assert_eq!(repo.list_versions().len(), 2);
        assert_eq!(repo.branches().len(), 2);
        // Uncommitted edits survive a failed commit
        assert_eq!(repo.working_data()["a"], json!(3));

        backend.set_read_only(false);
        let v3 = repo.commit_working("three", None).unwrap();
        assert_eq!(v3.data["a"], json!(3));
    }
}
