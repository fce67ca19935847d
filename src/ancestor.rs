//! Lowest common ancestor resolution
//!
//! Walks follow only the primary `parent_id` link. This is what the three-way
//! merge needs as its base: for the fork-and-merge histories the engine
//! produces, the primary chains of two branch heads meet at the fork point.
//!
//! Every walk is bounded by the number of versions in the store. A walk that
//! runs longer must be revisiting versions, so it fails with
//! [`RevmapError::CircularDependency`] instead of looping forever.

use crate::error::{Result, RevmapError};
use crate::store::SnapshotStore;
use crate::version::Version;
use std::collections::HashSet;
use tracing::trace;

/// Ids on the primary-parent chain of `version_id`, starting with itself
///
/// # Errors
///
/// - [`RevmapError::VersionNotFound`] if `version_id` is not in the store
/// - [`RevmapError::MissingParent`] if the chain references a missing version
/// - [`RevmapError::CircularDependency`] if the chain does not terminate
pub fn ancestor_ids(version_id: &str, store: &SnapshotStore) -> Result<Vec<String>> {
    let mut ids = Vec::new();
    walk(version_id, store, |version| {
        ids.push(version.id.clone());
        false
    })?;
    Ok(ids)
}

/// Find the lowest common ancestor of two versions
///
/// Returns `Ok(None)` when the histories are disjoint; callers then merge
/// against an empty base. A version is its own ancestor, so
/// `common_ancestor(a, a)` is `a`, and if `v1` lies on the chain of `v2` the
/// result is `v1`.
///
/// # Examples
///
/// ```rust
/// use revmap::ancestor::common_ancestor;
/// use revmap::store::SnapshotStore;
/// use revmap::version::Document;
///
/// let mut store = SnapshotStore::new();
/// let base = store.create(Document::new(), None, "base", "me", None)?;
/// let left = store.create(Document::new(), Some(base.id.clone()), "left", "me", None)?;
/// let right = store.create(Document::new(), Some(base.id.clone()), "right", "me", None)?;
///
/// let lca = common_ancestor(&left.id, &right.id, &store)?;
/// assert_eq!(lca.map(|v| v.id.as_str()), Some(base.id.as_str()));
/// # Ok::<(), revmap::RevmapError>(())
/// ```
pub fn common_ancestor<'a>(
    v1: &str,
    v2: &str,
    store: &'a SnapshotStore,
) -> Result<Option<&'a Version>> {
    let seen: HashSet<String> = ancestor_ids(v1, store)?.into_iter().collect();

    let mut found = None;
    walk(v2, store, |version| {
        if seen.contains(&version.id) {
            found = Some(version.id.clone());
            true
        } else {
            false
        }
    })?;

    match found {
        Some(id) => {
            trace!("Common ancestor of {} and {} is {}", v1, v2, id);
            store.get(&id).map(Some)
        }
        None => Ok(None),
    }
}

/// Whether `ancestor` lies on the primary-parent chain of `descendant`
pub fn is_ancestor(ancestor: &str, descendant: &str, store: &SnapshotStore) -> Result<bool> {
    store.get(ancestor)?;

    let mut hit = false;
    walk(descendant, store, |version| {
        hit = version.id == ancestor;
        hit
    })?;
    Ok(hit)
}

/// Walk the primary-parent chain from `start`, calling `visit` on each
/// version until it returns `true` or the chain ends
fn walk<'a, F>(start: &str, store: &'a SnapshotStore, mut visit: F) -> Result<()>
where
    F: FnMut(&'a Version) -> bool,
{
    let limit = store.len();
    let mut current = store.get(start)?;
    let mut steps = 0;

    loop {
        if visit(current) {
            return Ok(());
        }

        steps += 1;
        if steps > limit {
            return Err(RevmapError::CircularDependency);
        }

        let Some(parent_id) = current.parent_id.as_deref() else {
            return Ok(());
        };
        current = store.find(parent_id).ok_or_else(|| RevmapError::MissingParent {
            id: current.id.clone(),
            parent_id: parent_id.to_string(),
        })?;
    }
}
